use std::time::Duration;

/// Pixel layouts a capture backend may hand over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgb24,
    Rgba32,
    Bgra32,
    Gray8,
    /// 8-bit Y plane followed by an interleaved, half-resolution UV plane
    /// using the same stride.
    Nv12,
    /// Packed 4:2:2, `Y0 U Y1 V` per pixel pair.
    Yuyv,
}

impl PixelFormat {
    /// Minimum number of bytes one row of `width` pixels occupies.
    pub fn min_stride(self, width: u32) -> usize {
        let w = width as usize;
        match self {
            PixelFormat::Rgb24 => w * 3,
            PixelFormat::Rgba32 | PixelFormat::Bgra32 => w * 4,
            PixelFormat::Gray8 => w,
            // Chroma rows hold whole U/V pairs, so odd widths round up.
            PixelFormat::Nv12 => w.div_ceil(2) * 2,
            PixelFormat::Yuyv => w.div_ceil(2) * 4,
        }
    }

    /// Bytes required to hold a `height`-row image with the given stride.
    /// The final row of each plane may omit its padding. `None` when the
    /// declared geometry does not fit in `usize`.
    pub fn required_len(self, width: u32, height: u32, stride: usize) -> Option<usize> {
        if width == 0 || height == 0 {
            return Some(0);
        }
        let row = self.min_stride(width);
        let h = height as usize;
        let padded_rows = match self {
            PixelFormat::Nv12 => h + h.div_ceil(2) - 1,
            _ => h - 1,
        };
        stride.checked_mul(padded_rows)?.checked_add(row)
    }
}

/// Borrowed view of one image plane.
#[derive(Debug, Clone, Copy)]
pub struct PixelPlane<'a> {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub data: &'a [u8],
}

/// A captured buffer as seen by the sample-buffer delegate.
///
/// It borrows memory owned by the capture backend and is only valid for the
/// duration of the delegate call.
#[derive(Debug, Clone, Copy)]
pub struct RawFrameBuffer<'a> {
    sequence: u64,
    timestamp: Duration,
    plane: Option<PixelPlane<'a>>,
}

impl<'a> RawFrameBuffer<'a> {
    pub fn new(sequence: u64, timestamp: Duration, plane: Option<PixelPlane<'a>>) -> Self {
        Self {
            sequence,
            timestamp,
            plane,
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// The image plane, or `None` when the buffer carries no usable pixels.
    pub fn plane(&self) -> Option<&PixelPlane<'a>> {
        self.plane.as_ref()
    }
}

/// Owned frame memory held by a backend until it is lent out as a
/// [`RawFrameBuffer`] on the sample queue.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    sequence: u64,
    timestamp: Duration,
    image: Option<CapturedImage>,
}

#[derive(Debug, Clone)]
struct CapturedImage {
    format: PixelFormat,
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl CapturedFrame {
    pub fn new(
        sequence: u64,
        format: PixelFormat,
        width: u32,
        height: u32,
        stride: usize,
        data: Vec<u8>,
    ) -> Self {
        Self {
            sequence,
            timestamp: Duration::ZERO,
            image: Some(CapturedImage {
                format,
                width,
                height,
                stride,
                data,
            }),
        }
    }

    /// Tightly packed frame (stride equals the minimum row length).
    pub fn packed(sequence: u64, format: PixelFormat, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self::new(sequence, format, width, height, format.min_stride(width), data)
    }

    /// A frame whose sample carried no image buffer.
    pub fn empty(sequence: u64) -> Self {
        Self {
            sequence,
            timestamp: Duration::ZERO,
            image: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: Duration) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn as_raw(&self) -> RawFrameBuffer<'_> {
        let plane = self.image.as_ref().map(|img| PixelPlane {
            format: img.format,
            width: img.width,
            height: img.height,
            stride: img.stride,
            data: &img.data,
        });
        RawFrameBuffer::new(self.sequence, self.timestamp, plane)
    }
}
