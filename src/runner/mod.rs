//! Runners implement threading strategies for pipe producers.
use std::thread;

pub use threadpool::{ExecutionError, ThreadPool};

mod threadpool;

/// Spawns a new thread for each job.
pub struct ThreadRunner;

impl ThreadRunner {
    pub fn run<F>(&self, f: F) -> Result<(), ExecutionError>
    where
        F: FnOnce() + Send + 'static,
    {
        thread::Builder::new()
            .name("jbcontent-pipe".to_string())
            .spawn(f)
            .map(|_| ())
            .map_err(|e| ExecutionError::new(&format!("failed to spawn thread: {}", e)))
    }
}

pub struct ThreadPoolRunner {
    threadpool: ThreadPool,
}

impl ThreadPoolRunner {
    pub fn new(pool_size: usize) -> Result<Self, ExecutionError> {
        Ok(Self {
            threadpool: ThreadPool::new(pool_size)?,
        })
    }
    pub fn run<F>(&self, f: F) -> Result<(), ExecutionError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.threadpool.execute(f)
    }
}

/// Jobs never run on the calling thread: a pipe producer running inline
/// would block on its own reader.
pub enum Runner {
    Thread(ThreadRunner),
    ThreadPool(ThreadPoolRunner),
}

impl Runner {
    pub fn run<F>(&self, f: F) -> Result<(), ExecutionError>
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            Self::Thread(runner) => runner.run(f),
            Self::ThreadPool(runner) => runner.run(f),
        }
    }

    /// Create a new runner using the specified number of threads.
    /// 0 is infinite, a new thread will be created for each job.
    /// Any other number creates a thread pool keeping that many workers,
    /// which grows while every worker is busy.
    pub fn new(n_threads: usize) -> Result<Self, ExecutionError> {
        match n_threads {
            0 => Ok(Self::Thread(ThreadRunner)),
            n => Ok(Self::ThreadPool(ThreadPoolRunner::new(n)?)),
        }
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::Thread(ThreadRunner)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn test_runners_run_off_thread() {
        for n_threads in [0, 1, 3] {
            let runner = Runner::new(n_threads).unwrap();
            let caller = thread::current().id();
            let (tx, rx) = channel();
            for i in 0..4 {
                let tx = tx.clone();
                runner
                    .run(move || tx.send((i, thread::current().id())).unwrap())
                    .unwrap();
            }
            drop(tx);
            let mut got: Vec<_> = rx.iter().collect();
            got.sort_by_key(|(i, _)| *i);
            assert_eq!(got.len(), 4);
            assert!(got.iter().all(|(_, id)| *id != caller));
        }
    }
}
