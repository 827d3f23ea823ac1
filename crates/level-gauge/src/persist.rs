//! Asynchronous persistence of boundary images.
//!
//! Processing must never wait on disk: tasks go through an unbounded
//! channel to a single worker thread. The queue may grow under sustained
//! I/O slowness; in exchange no computed result is ever dropped. Dropping
//! the queue's sender and joining the worker drains everything that was
//! enqueued, which is what the session relies on at shutdown.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, warn};

/// A single image write: destination path and pre-encoded bytes.
pub(crate) struct PersistenceTask {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Write counters shared with the session; completed + failed equals the
/// number of tasks consumed.
#[derive(Debug, Default)]
pub(crate) struct PersistenceCounters {
    pub completed: AtomicUsize,
    pub failed: AtomicUsize,
}

impl PersistenceCounters {
    pub fn reset(&self) {
        self.completed.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
    }
}

pub(crate) struct PersistenceQueue {
    sender: Sender<PersistenceTask>,
    worker: JoinHandle<()>,
}

impl PersistenceQueue {
    /// Spawn the worker thread. Counters are owned by the caller so they
    /// survive the queue itself.
    pub fn spawn(counters: Arc<PersistenceCounters>) -> Self {
        let (sender, receiver) = channel();
        let worker = thread::spawn(move || worker_loop(receiver, counters));
        Self { sender, worker }
    }

    /// Enqueue a write. Never blocks and never drops: the channel is
    /// unbounded and the worker outlives every sender.
    pub fn enqueue(&self, task: PersistenceTask) {
        // Send only fails if the worker panicked.
        if self.sender.send(task).is_err() {
            warn!("persistence worker unavailable; boundary image dropped");
        }
    }

    /// Close the queue and block until every enqueued task has been
    /// written. Returns once the worker has exited.
    pub fn shutdown(self) {
        drop(self.sender);
        let _ = self.worker.join();
    }
}

fn worker_loop(receiver: Receiver<PersistenceTask>, counters: Arc<PersistenceCounters>) {
    while let Ok(task) = receiver.recv() {
        match std::fs::write(&task.path, &task.bytes) {
            Ok(()) => {
                counters.completed.fetch_add(1, Ordering::SeqCst);
            }
            Err(err) => {
                counters.failed.fetch_add(1, Ordering::SeqCst);
                warn!("failed to write {}: {err}", task.path.display());
            }
        }
    }
    debug!("persistence queue drained");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_drains_every_enqueued_task() {
        let dir = tempfile::tempdir().expect("tempdir");
        let counters = Arc::new(PersistenceCounters::default());
        let queue = PersistenceQueue::spawn(counters.clone());

        let n = 25;
        for i in 0..n {
            queue.enqueue(PersistenceTask {
                path: dir.path().join(format!("img_{i}.bin")),
                bytes: vec![i as u8; 64],
            });
        }
        queue.shutdown();

        assert_eq!(counters.completed.load(Ordering::SeqCst), n);
        assert_eq!(counters.failed.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), n);
    }

    #[test]
    fn failed_write_is_counted_and_does_not_stop_the_worker() {
        let dir = tempfile::tempdir().expect("tempdir");
        let counters = Arc::new(PersistenceCounters::default());
        let queue = PersistenceQueue::spawn(counters.clone());

        queue.enqueue(PersistenceTask {
            path: dir.path().join("missing-subdir").join("img.bin"),
            bytes: vec![0u8; 8],
        });
        queue.enqueue(PersistenceTask {
            path: dir.path().join("ok.bin"),
            bytes: vec![1u8; 8],
        });
        queue.shutdown();

        assert_eq!(counters.failed.load(Ordering::SeqCst), 1);
        assert_eq!(counters.completed.load(Ordering::SeqCst), 1);
        assert!(dir.path().join("ok.bin").exists());
    }
}
