use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{debug, error, warn};

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Workers above the core size exit after waiting this long for a job.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

struct Shared {
    receiver: Mutex<mpsc::Receiver<Job>>,
    /// Workers waiting for a job, minus jobs already queued for them.
    idle: AtomicUsize,
    live: AtomicUsize,
    next_id: AtomicUsize,
}

impl Shared {
    // Claim an idle worker, if there is one.
    fn reserve(&self) -> bool {
        self.idle
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// A pool of worker threads that grows when every worker is busy, so a job
/// never waits behind jobs that block.
pub struct ThreadPool {
    sender: mpsc::Sender<Job>,
    shared: Arc<Shared>,
}

#[derive(Debug)]
pub struct ExecutionError {
    message: String,
}

impl ExecutionError {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread execution error: {}", &self.message)
    }
}

impl std::error::Error for ExecutionError {}

impl From<mpsc::SendError<Job>> for ExecutionError {
    fn from(_: mpsc::SendError<Job>) -> Self {
        ExecutionError::new("failed to send job message")
    }
}

impl ThreadPool {
    /// ThreadPool manages a pool of worker threads where Jobs can be executed.
    ///
    /// # Arguments
    /// * `size`: number of worker threads kept alive, at least 1
    pub fn new(size: usize) -> Result<ThreadPool, ExecutionError> {
        let (sender, receiver) = mpsc::channel();
        let shared = Arc::new(Shared {
            receiver: Mutex::new(receiver),
            idle: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
            next_id: AtomicUsize::new(0),
        });
        let pool = ThreadPool { sender, shared };
        for _ in 0..size.max(1) {
            pool.shared.idle.fetch_add(1, Ordering::SeqCst);
            pool.spawn_worker(true)?;
        }
        Ok(pool)
    }

    /// Number of live workers.
    pub fn size(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    pub fn execute<F>(&self, f: F) -> Result<(), ExecutionError>
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.shared.reserve() {
            debug!("all {} workers busy, adding one", self.size());
            self.spawn_worker(false)?;
        }
        let job = Box::new(f);
        self.sender.send(job)?;
        Ok(())
    }

    fn spawn_worker(&self, core: bool) -> Result<(), ExecutionError> {
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        shared.live.fetch_add(1, Ordering::SeqCst);
        thread::Builder::new()
            .name(format!("jbcontent-worker-{}", id))
            .spawn(move || work(id, core, shared))
            .map(|_| ())
            .map_err(|e| {
                error!("failed to spawn worker {}: {}", id, e);
                self.shared.live.fetch_sub(1, Ordering::SeqCst);
                ExecutionError::new(&format!("failed to spawn worker: {}", e))
            })
    }
}

// Workers exit once the pool is dropped and the queue is drained. Dropping
// the pool does not wait for jobs still running.
fn work(id: usize, core: bool, shared: Arc<Shared>) {
    loop {
        let received = {
            let receiver = match shared.receiver.lock() {
                Ok(receiver) => receiver,
                Err(poisoned) => poisoned.into_inner(),
            };
            receiver.recv_timeout(IDLE_TIMEOUT)
        };

        match received {
            Ok(job) => {
                // A panicking job must not take the worker down with it.
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    warn!("job panicked on worker {}", id);
                }
                shared.idle.fetch_add(1, Ordering::SeqCst);
            }
            Err(RecvTimeoutError::Timeout) => {
                if !core && shared.reserve() {
                    debug!("worker {} idle, exiting", id);
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    shared.live.fetch_sub(1, Ordering::SeqCst);
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn test_execute() {
        let pool = ThreadPool::new(2).unwrap();
        let (tx, rx) = channel();
        for i in 0..8 {
            let tx = tx.clone();
            pool.execute(move || tx.send(i).unwrap()).unwrap();
        }
        let mut got: Vec<i32> = rx.iter().take(8).collect();
        got.sort();
        assert_eq!(got, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_panicking_job_keeps_worker() {
        let pool = ThreadPool::new(1).unwrap();
        pool.execute(|| panic!("boom")).unwrap();
        let (tx, rx) = channel();
        for _ in 0..3 {
            let tx = tx.clone();
            pool.execute(move || tx.send(()).unwrap()).unwrap();
        }
        assert_eq!(rx.iter().take(3).count(), 3);
        assert!(pool.size() >= 1);
    }

    #[test]
    fn test_grows_past_blocked_workers() {
        let pool = ThreadPool::new(1).unwrap();
        let (release_tx, release_rx) = channel::<()>();
        let (done_tx, done_rx) = channel();
        let blocked_done = done_tx.clone();
        pool.execute(move || {
            release_rx.recv().unwrap();
            blocked_done.send("blocked").unwrap();
        })
        .unwrap();
        pool.execute(move || done_tx.send("free").unwrap()).unwrap();

        assert_eq!(done_rx.recv().unwrap(), "free");
        assert_eq!(pool.size(), 2);
        release_tx.send(()).unwrap();
        assert_eq!(done_rx.recv().unwrap(), "blocked");
    }

    #[test]
    fn test_drop_does_not_wait_for_blocked_jobs() {
        let pool = ThreadPool::new(1).unwrap();
        let (release_tx, release_rx) = channel::<()>();
        pool.execute(move || {
            let _ = release_rx.recv();
        })
        .unwrap();
        drop(pool);
        drop(release_tx);
    }
}
