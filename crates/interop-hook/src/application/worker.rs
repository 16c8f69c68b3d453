//! Callback worker: runs hotkey callbacks off the hook thread.
//!
//! Jobs run one at a time in submission order. A panicking job is logged and
//! the worker moves on to the next one.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

enum WorkItem {
    Run(Job),
    Stop,
}

struct Running {
    queue: Sender<WorkItem>,
    done: Receiver<()>,
    thread: JoinHandle<()>,
}

/// A single background thread that executes queued jobs.
pub struct CallbackWorker {
    name: String,
    running: Mutex<Option<Running>>,
}

impl CallbackWorker {
    /// Spawns the worker thread.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn start(name: &str) -> std::io::Result<Self> {
        let (queue, items) = mpsc::channel::<WorkItem>();
        let (done_tx, done) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_jobs(items, done_tx))?;

        Ok(Self {
            name: name.to_string(),
            running: Mutex::new(Some(Running { queue, done, thread })),
        })
    }

    /// Queues a job. Returns `false` once the worker has been shut down.
    pub fn submit(&self, job: Job) -> bool {
        match self.running.lock().as_ref() {
            Some(running) => running.queue.send(WorkItem::Run(job)).is_ok(),
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Stops accepting jobs and waits up to `timeout` for queued ones to
    /// finish.
    ///
    /// Returns `true` if the thread exited in time. On timeout the thread is
    /// detached and left to finish on its own. Later calls return `true`.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let Some(running) = self.running.lock().take() else {
            return true;
        };

        let _ = running.queue.send(WorkItem::Stop);
        match running.done.recv_timeout(timeout) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                if running.thread.join().is_err() {
                    tracing::error!(worker = %self.name, "callback worker thread panicked");
                }
                true
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    worker = %self.name,
                    timeout_ms = timeout.as_millis() as u64,
                    "callback worker did not stop in time; detaching"
                );
                false
            }
        }
    }
}

impl Drop for CallbackWorker {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            let _ = running.queue.send(WorkItem::Stop);
        }
    }
}

fn run_jobs(items: Receiver<WorkItem>, done: Sender<()>) {
    while let Ok(item) = items.recv() {
        match item {
            WorkItem::Run(job) => {
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    tracing::error!("an exception was thrown while executing a hotkey callback");
                }
            }
            WorkItem::Stop => break,
        }
    }
    let _ = done.send(());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn wait_for(counter: &AtomicUsize, expected: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while counter.load(Ordering::SeqCst) < expected && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_jobs_run_in_submission_order() {
        // Arrange
        let worker = CallbackWorker::start("test-order").unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        // Act
        for i in 0..20 {
            let log = Arc::clone(&log);
            assert!(worker.submit(Box::new(move || log.lock().push(i))));
        }
        assert!(worker.shutdown(Duration::from_secs(5)));

        // Assert
        assert_eq!(*log.lock(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_panicking_job_does_not_stop_worker() {
        let worker = CallbackWorker::start("test-panic").unwrap();
        let ran = Arc::new(AtomicUsize::new(0));

        worker.submit(Box::new(|| panic!("callback failure")));
        let counter = Arc::clone(&ran);
        worker.submit(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        wait_for(&ran, 1);

        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(worker.is_running());
    }

    #[test]
    fn test_submit_after_shutdown_is_rejected_and_shutdown_is_idempotent() {
        let worker = CallbackWorker::start("test-idempotent").unwrap();

        assert!(worker.shutdown(Duration::from_secs(1)));
        assert!(worker.shutdown(Duration::from_secs(1)));
        assert!(!worker.submit(Box::new(|| {})));
        assert!(!worker.is_running());
    }

    #[test]
    fn test_shutdown_times_out_on_stuck_job() {
        // Arrange
        let worker = CallbackWorker::start("test-stuck").unwrap();
        worker.submit(Box::new(|| thread::sleep(Duration::from_millis(500))));

        // Act
        let started = Instant::now();
        let stopped = worker.shutdown(Duration::from_millis(50));

        // Assert
        assert!(!stopped);
        assert!(started.elapsed() < Duration::from_millis(400));
    }
}
