use thiserror::Error;

use crate::capture::domain::raw_frame_buffer::{PixelFormat, PixelPlane, RawFrameBuffer};
use crate::shared::decoded_image::DecodedImage;

/// Why a buffer could not be turned into an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameDrop {
    #[error("buffer carries no image")]
    NoImage,
    #[error("image has zero extent ({width}x{height})")]
    EmptyExtent { width: u32, height: u32 },
    #[error("stride {stride} is shorter than a {format:?} row ({min} bytes)")]
    StrideTooSmall {
        format: PixelFormat,
        stride: usize,
        min: usize,
    },
    #[error("stride {stride} over {height} rows overflows the address space")]
    ExtentOverflow { stride: usize, height: u32 },
    #[error("buffer holds {len} bytes, {required} needed")]
    Truncated { len: usize, required: usize },
}

/// Fixed-point BT.601 chroma contributions, precomputed per byte value.
struct ConversionContext {
    r_from_v: [i16; 256],
    g_from_u: [i16; 256],
    g_from_v: [i16; 256],
    b_from_u: [i16; 256],
}

impl ConversionContext {
    fn new() -> Self {
        let mut ctx = Self {
            r_from_v: [0; 256],
            g_from_u: [0; 256],
            g_from_v: [0; 256],
            b_from_u: [0; 256],
        };
        for i in 0..256 {
            let c = i as f32 - 128.0;
            ctx.r_from_v[i] = (1.402 * c).round() as i16;
            ctx.g_from_u[i] = (-0.344 * c).round() as i16;
            ctx.g_from_v[i] = (-0.714 * c).round() as i16;
            ctx.b_from_u[i] = (1.772 * c).round() as i16;
        }
        ctx
    }

    #[inline]
    fn yuv_to_rgb(&self, y: u8, u: u8, v: u8) -> [u8; 3] {
        let y = y as i16;
        let clamp = |c: i16| c.clamp(0, 255) as u8;
        [
            clamp(y + self.r_from_v[v as usize]),
            clamp(y + self.g_from_u[u as usize] + self.g_from_v[v as usize]),
            clamp(y + self.b_from_u[u as usize]),
        ]
    }
}

/// Turns borrowed capture buffers into owned RGB images.
///
/// The output depends only on the pixel content and the declared extent.
/// Buffers that cannot be converted are reported as `None` and counted as
/// dropped; that is a normal outcome, not an error.
pub struct FrameConverter {
    context: ConversionContext,
    converted: u64,
    dropped: u64,
}

impl FrameConverter {
    pub fn new() -> Self {
        Self {
            context: ConversionContext::new(),
            converted: 0,
            dropped: 0,
        }
    }

    pub fn convert(&mut self, buffer: &RawFrameBuffer<'_>) -> Option<DecodedImage> {
        match self.try_convert(buffer) {
            Ok(image) => {
                self.converted += 1;
                Some(image)
            }
            Err(reason) => {
                self.dropped += 1;
                log::debug!("Dropping frame {}: {reason}", buffer.sequence());
                None
            }
        }
    }

    /// Like [`Self::convert`], but says why a buffer was dropped. Does not
    /// touch the counters.
    pub fn try_convert(&self, buffer: &RawFrameBuffer<'_>) -> Result<DecodedImage, FrameDrop> {
        let plane = buffer.plane().ok_or(FrameDrop::NoImage)?;
        validate(plane)?;

        let (w, h) = (plane.width as usize, plane.height as usize);
        let mut rgb = Vec::with_capacity(w * h * DecodedImage::CHANNELS);
        match plane.format {
            PixelFormat::Rgb24 => {
                for row in rows(plane, h) {
                    rgb.extend_from_slice(&row[..w * 3]);
                }
            }
            PixelFormat::Rgba32 => {
                for row in rows(plane, h) {
                    for px in row[..w * 4].chunks_exact(4) {
                        rgb.extend_from_slice(&px[..3]);
                    }
                }
            }
            PixelFormat::Bgra32 => {
                for row in rows(plane, h) {
                    for px in row[..w * 4].chunks_exact(4) {
                        rgb.extend_from_slice(&[px[2], px[1], px[0]]);
                    }
                }
            }
            PixelFormat::Gray8 => {
                for row in rows(plane, h) {
                    for &g in &row[..w] {
                        rgb.extend_from_slice(&[g, g, g]);
                    }
                }
            }
            PixelFormat::Nv12 => {
                let chroma_base = plane.stride * h;
                for y in 0..h {
                    let luma = &plane.data[y * plane.stride..];
                    let chroma = &plane.data[chroma_base + (y / 2) * plane.stride..];
                    for x in 0..w {
                        let pair = (x / 2) * 2;
                        rgb.extend_from_slice(&self.context.yuv_to_rgb(
                            luma[x],
                            chroma[pair],
                            chroma[pair + 1],
                        ));
                    }
                }
            }
            PixelFormat::Yuyv => {
                for row in rows(plane, h) {
                    for x in 0..w {
                        let group = (x / 2) * 4;
                        let luma = row[group + (x % 2) * 2];
                        rgb.extend_from_slice(&self.context.yuv_to_rgb(
                            luma,
                            row[group + 1],
                            row[group + 3],
                        ));
                    }
                }
            }
        }

        Ok(DecodedImage::new(
            rgb,
            plane.width,
            plane.height,
            buffer.sequence(),
        ))
    }

    pub fn converted_count(&self) -> u64 {
        self.converted
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}

impl Default for FrameConverter {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(plane: &PixelPlane<'_>) -> Result<(), FrameDrop> {
    if plane.width == 0 || plane.height == 0 {
        return Err(FrameDrop::EmptyExtent {
            width: plane.width,
            height: plane.height,
        });
    }
    let min = plane.format.min_stride(plane.width);
    if plane.stride < min {
        return Err(FrameDrop::StrideTooSmall {
            format: plane.format,
            stride: plane.stride,
            min,
        });
    }
    // Once the length check passes every row offset below is in bounds.
    let required = plane
        .format
        .required_len(plane.width, plane.height, plane.stride)
        .ok_or(FrameDrop::ExtentOverflow {
            stride: plane.stride,
            height: plane.height,
        })?;
    if plane.data.len() < required {
        return Err(FrameDrop::Truncated {
            len: plane.data.len(),
            required,
        });
    }
    Ok(())
}

/// Row slices of a single-plane buffer; the last row may be unpadded.
fn rows<'a>(plane: &'a PixelPlane<'a>, height: usize) -> impl Iterator<Item = &'a [u8]> + 'a {
    (0..height).map(move |y| &plane.data[y * plane.stride..])
}
