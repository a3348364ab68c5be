use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender};

use crate::execution::executor::{Executor, Job};

type StateJob<S> = Box<dyn FnOnce(&mut S) + Send>;

enum Message<S> {
    Run(StateJob<S>),
    Shutdown,
}

/// A dedicated worker thread that owns a piece of state and runs posted jobs
/// against it, strictly one after another.
///
/// The worker is the only code that ever touches `S`, so the state needs no
/// lock. Dropping the queue lets already-posted jobs finish, then stops the
/// worker; jobs posted after that are discarded.
pub struct SerialQueue<S: Send + 'static> {
    handle: QueueHandle<S>,
    thread: Option<JoinHandle<()>>,
}

/// Cloneable, thread-safe sender side of a [`SerialQueue`].
pub struct QueueHandle<S> {
    tx: Sender<Message<S>>,
    label: Arc<str>,
    worker: ThreadId,
}

impl<S> Clone for QueueHandle<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            label: self.label.clone(),
            worker: self.worker,
        }
    }
}

impl<S: Send + 'static> SerialQueue<S> {
    pub fn new(label: &str, state: S) -> std::io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded::<Message<S>>();
        let thread_label = label.to_string();
        let thread = thread::Builder::new()
            .name(label.to_string())
            .spawn(move || run_worker(&thread_label, state, rx))?;

        let handle = QueueHandle {
            tx,
            label: Arc::from(label),
            worker: thread.thread().id(),
        };
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> QueueHandle<S> {
        self.handle.clone()
    }

    pub fn label(&self) -> &str {
        &self.handle.label
    }

    pub fn post(&self, job: impl FnOnce(&mut S) + Send + 'static) -> bool {
        self.handle.post(job)
    }

    pub fn sync<R: Send + 'static>(
        &self,
        job: impl FnOnce(&mut S) -> R + Send + 'static,
    ) -> Option<R> {
        self.handle.sync(job)
    }
}

impl<S: Send + 'static> Drop for SerialQueue<S> {
    fn drop(&mut self) {
        let _ = self.handle.tx.send(Message::Shutdown);
        if let Some(thread) = self.thread.take() {
            if self.handle.is_current() {
                // Dropped from inside one of its own jobs: the worker exits on
                // its own once this job returns.
                return;
            }
            if thread.join().is_err() {
                log::error!("Queue '{}' worker panicked", self.handle.label);
            }
        }
    }
}

fn run_worker<S>(label: &str, mut state: S, rx: Receiver<Message<S>>) {
    log::debug!("Queue '{label}' started");
    for message in rx.iter() {
        match message {
            Message::Run(job) => job(&mut state),
            Message::Shutdown => break,
        }
    }
    let discarded = rx.try_iter().filter(|m| matches!(m, Message::Run(_))).count();
    if discarded > 0 {
        log::debug!("Queue '{label}' discarded {discarded} job(s) posted after shutdown");
    }
    log::debug!("Queue '{label}' stopped");
}

impl<S: Send + 'static> QueueHandle<S> {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// True when called from this queue's own worker thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.worker
    }

    /// Appends a job. Returns `false` if the worker has already gone away.
    pub fn post(&self, job: impl FnOnce(&mut S) + Send + 'static) -> bool {
        self.tx.send(Message::Run(Box::new(job))).is_ok()
    }

    /// Posts `job` and blocks until it has run, returning its result.
    ///
    /// Returns `None` if the queue shut down before running it, or when called
    /// from the worker itself (waiting there would never finish).
    pub fn sync<R: Send + 'static>(
        &self,
        job: impl FnOnce(&mut S) -> R + Send + 'static,
    ) -> Option<R> {
        if self.is_current() {
            log::warn!("sync on queue '{}' from its own worker ignored", self.label);
            return None;
        }
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let posted = self.post(move |state| {
            let _ = reply_tx.send(job(state));
        });
        if !posted {
            return None;
        }
        reply_rx.recv().ok()
    }
}

impl Executor for QueueHandle<()> {
    fn execute(&self, job: Job) -> bool {
        self.post(move |_| job())
    }

    fn flush(&self) {
        let _ = self.sync(|_| ());
    }
}
