use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::execution::executor::Executor;
use crate::shared::decoded_image::DecodedImage;

/// Receives converted frames on the session's delivery context.
///
/// Calls are strictly ordered and never overlap, so implementations need no
/// internal locking.
pub trait FrameConsumer: Send {
    fn captured(&mut self, image: DecodedImage);
}

impl<F> FrameConsumer for F
where
    F: FnMut(DecodedImage) + Send,
{
    fn captured(&mut self, image: DecodedImage) {
        self(image)
    }
}

struct ConsumerSlot {
    consumer: Option<Box<dyn FrameConsumer>>,
    /// Bumped on every registration change so a callback in flight knows
    /// whether it may put its consumer back.
    generation: u64,
}

/// Hands converted frames to the registered consumer on its delivery
/// executor, preserving capture order.
///
/// A slow consumer makes later frames queue up behind it; nothing is
/// dropped. Once `halted` is set, queued and future deliveries are
/// discarded without reaching the consumer.
#[derive(Clone)]
pub struct FrameDispatcher {
    slot: Arc<Mutex<ConsumerSlot>>,
    executor: Arc<dyn Executor>,
    halted: Arc<AtomicBool>,
}

fn lock(slot: &Mutex<ConsumerSlot>) -> MutexGuard<'_, ConsumerSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FrameDispatcher {
    pub fn new(executor: Arc<dyn Executor>, halted: Arc<AtomicBool>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(ConsumerSlot {
                consumer: None,
                generation: 0,
            })),
            executor,
            halted,
        }
    }

    /// Installs `consumer`, returning the one it replaces.
    pub fn register(&self, consumer: Box<dyn FrameConsumer>) -> Option<Box<dyn FrameConsumer>> {
        let mut slot = lock(&self.slot);
        slot.generation += 1;
        slot.consumer.replace(consumer)
    }

    /// Removes the consumer. While a delivery is in flight the consumer is
    /// out of its slot, so a call made then (from its own callback or from
    /// any other thread) returns `None`; the consumer is released once that
    /// callback returns and receives nothing further.
    pub fn deregister(&self) -> Option<Box<dyn FrameConsumer>> {
        let mut slot = lock(&self.slot);
        slot.generation += 1;
        slot.consumer.take()
    }

    pub fn has_consumer(&self) -> bool {
        lock(&self.slot).consumer.is_some()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Queues `image` for the consumer. Returns `false` if it was discarded
    /// up front (halted, or the delivery context is gone).
    pub fn deliver(&self, image: DecodedImage) -> bool {
        if self.is_halted() {
            return false;
        }
        let slot = self.slot.clone();
        let halted = self.halted.clone();
        let posted = self.executor.execute(Box::new(move || {
            run_delivery(&slot, &halted, image);
        }));
        if !posted {
            log::debug!("Delivery context closed, frame discarded");
        }
        posted
    }
}

fn run_delivery(slot: &Mutex<ConsumerSlot>, halted: &AtomicBool, image: DecodedImage) {
    if halted.load(Ordering::SeqCst) {
        return;
    }
    let (consumer, generation) = {
        let mut slot = lock(slot);
        (slot.consumer.take(), slot.generation)
    };
    let Some(mut consumer) = consumer else {
        log::trace!("No consumer registered, frame {} discarded", image.sequence());
        return;
    };

    // Run without the lock so the callback may register, deregister or stop.
    consumer.captured(image);

    let mut slot = lock(slot);
    if slot.generation == generation && slot.consumer.is_none() {
        slot.consumer = Some(consumer);
    }
}
