use std::sync::mpsc::{self, Sender};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use tracing::warn;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// One background worker draining jobs in submission order. Two jobs on the
/// same queue never overlap.
pub struct SerialQueue {
    label: String,
    sender: Mutex<Option<Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SerialQueue {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        let (sender, receiver) = mpsc::channel::<Job>();
        let worker = thread::Builder::new()
            .name(label.clone())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job();
                }
            })
            .map_err(|err| warn!(queue = %label, error = %err, "failed to spawn queue worker"))
            .ok();
        Self {
            label,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(worker),
        }
    }

    /// Runs `job` after every previously submitted job has finished.
    /// Returns false if the queue has been shut down.
    pub fn dispatch<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = match self.sender.lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        let Some(sender) = guard.as_ref() else {
            return false;
        };
        if sender.send(Box::new(job)).is_err() {
            warn!(queue = %self.label, "queue worker is gone; job dropped");
            return false;
        }
        true
    }

    /// Stops accepting jobs and waits for queued ones to drain.
    pub fn shutdown(&self) {
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
        let handle = self.worker.lock().ok().and_then(|mut guard| guard.take());
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for SerialQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}
