use std::cell::Cell;
use std::marker::PhantomData;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::execution::executor::{Executor, Job};

/// An execution context drained explicitly by the thread that owns it.
///
/// This models a UI/main-thread run loop: producers post through the
/// [`ManualExecutor`], and the owning thread calls [`ManualQueue::run_pending`]
/// or [`ManualQueue::run_next`] from its own loop. The queue is `!Sync`, so only
/// one thread can drain it and jobs never overlap.
pub struct ManualQueue {
    rx: Receiver<Job>,
    _not_sync: PhantomData<Cell<()>>,
}

/// Posting side of a [`ManualQueue`].
#[derive(Clone)]
pub struct ManualExecutor {
    tx: Sender<Job>,
}

impl ManualQueue {
    pub fn new() -> (Self, ManualExecutor) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            Self {
                rx,
                _not_sync: PhantomData,
            },
            ManualExecutor { tx },
        )
    }

    /// Runs every job that is already queued. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Waits up to `timeout` for one job and runs it.
    pub fn run_next(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(job) => {
                job();
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Keeps running jobs until `done` returns true or `timeout` elapses.
    /// Returns whether `done` was satisfied.
    pub fn run_until(&self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.run_next((deadline - now).min(Duration::from_millis(10)));
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Executor for ManualExecutor {
    fn execute(&self, job: Job) -> bool {
        self.tx.send(job).is_ok()
    }
}
