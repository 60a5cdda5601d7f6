//! Completion tokens for work spawned off the calling thread.

use log::warn;
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

type JobResult<T> = Result<T, Box<dyn Any + Send + 'static>>;

struct JobState<T> {
    result: Mutex<Option<JobResult<T>>>,
    finished: Condvar,
}

/// Handle to a spawned job. Consuming it with [`JobHandle::complete`] is the
/// only way to reach the job's output, so dependants cannot read results
/// before the job has finished.
#[must_use = "the job output is only reachable through the handle"]
pub struct JobHandle<T> {
    label: &'static str,
    state: Arc<JobState<T>>,
}

impl<T: Send + 'static> JobHandle<T> {
    /// Runs `job` on the rayon pool (or a plain thread without the
    /// `parallel` feature).
    pub fn spawn<F>(label: &'static str, job: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let state = Arc::new(JobState {
            result: Mutex::new(None),
            finished: Condvar::new(),
        });
        let worker = Arc::clone(&state);
        let run = move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(job));
            *worker.result.lock() = Some(outcome);
            worker.finished.notify_all();
        };

        #[cfg(feature = "parallel")]
        rayon::spawn(run);
        #[cfg(not(feature = "parallel"))]
        std::thread::spawn(run);

        Self { label, state }
    }
}

impl<T> JobHandle<T> {
    /// A handle whose job already ran on the calling thread.
    pub fn completed(label: &'static str, value: T) -> Self {
        Self {
            label,
            state: Arc::new(JobState {
                result: Mutex::new(Some(Ok(value))),
                finished: Condvar::new(),
            }),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn is_completed(&self) -> bool {
        self.state.result.lock().is_some()
    }

    /// Blocks until the job finished and returns its output. A panic inside
    /// the job is resumed on the caller.
    pub fn complete(self) -> T {
        let mut guard = self.state.result.lock();
        loop {
            if let Some(outcome) = guard.take() {
                return unwrap_outcome(outcome);
            }
            self.state.finished.wait(&mut guard);
        }
    }

    /// Waits at most `timeout`. On expiry the handle is handed back so the
    /// caller can keep waiting later.
    pub fn complete_timeout(self, timeout: Duration) -> Result<T, Self> {
        let deadline = Instant::now() + timeout;
        let outcome = {
            let mut guard = self.state.result.lock();
            while guard.is_none() {
                if self.state.finished.wait_until(&mut guard, deadline).timed_out() {
                    break;
                }
            }
            guard.take()
        };

        match outcome {
            Some(outcome) => Ok(unwrap_outcome(outcome)),
            None => {
                warn!(
                    "{} not completed after {:.2} ms",
                    self.label,
                    timeout.as_secs_f32() * 1000.0
                );
                Err(self)
            }
        }
    }
}

fn unwrap_outcome<T>(outcome: JobResult<T>) -> T {
    match outcome {
        Ok(value) => value,
        Err(payload) => panic::resume_unwind(payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn spawned_job_delivers_output() {
        let handle = JobHandle::spawn("sum", || (1..=10).sum::<u32>());
        assert_eq!(handle.complete(), 55);
    }

    #[test]
    fn timeout_returns_handle() {
        let (tx, rx) = mpsc::channel::<()>();
        let handle = JobHandle::spawn("blocked", move || {
            let _ = rx.recv();
            7
        });
        let handle = match handle.complete_timeout(Duration::from_millis(5)) {
            Ok(_) => panic!("job should still be blocked"),
            Err(handle) => handle,
        };
        assert!(!handle.is_completed());
        tx.send(()).unwrap();
        assert_eq!(handle.complete(), 7);
    }

    #[test]
    fn completed_handle_is_ready() {
        let handle = JobHandle::completed("inline", "done");
        assert!(handle.is_completed());
        assert_eq!(handle.complete_timeout(Duration::ZERO).ok(), Some("done"));
    }
}
