use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender, after, bounded, select};

use crate::control::SupervisorError;

/// Result of one unit of poller work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Background thread that waits one period, does one unit of work, and
/// reschedules itself until cancelled or the work returns [`Flow::Stop`].
pub struct Poller {
    name: String,
    cancel: Option<Sender<()>>,
    done: crossbeam_channel::Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn spawn<F>(name: &str, period: Duration, mut work: F) -> Result<Self, SupervisorError>
    where
        F: FnMut() -> Flow + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        // Never sent on; disconnects when the thread exits.
        let (done_tx, done_rx) = bounded::<()>(0);
        let thread_name = name.to_string();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _done = done_tx;
                tracing::debug!(poller = %thread_name, "poller started");
                loop {
                    select! {
                        recv(cancel_rx) -> _ => break,
                        recv(after(period)) -> _ => {
                            if work() == Flow::Stop {
                                break;
                            }
                        }
                    }
                }
                tracing::debug!(poller = %thread_name, "poller stopped");
            })
            .map_err(SupervisorError::Thread)?;

        Ok(Self {
            name: name.to_string(),
            cancel: Some(cancel_tx),
            done: done_rx,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Cancel and join, waiting at most `timeout`. A poller that does not
    /// stop in time is detached and `false` is returned.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        drop(self.cancel.take());
        let Some(handle) = self.handle.take() else {
            return true;
        };
        match self.done.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(poller = %self.name, "poller did not stop in time, detaching");
                false
            }
            _ => {
                if handle.join().is_err() {
                    tracing::warn!(poller = %self.name, "poller panicked");
                }
                true
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop(Duration::from_secs(2));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_until_stopped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let mut poller = Poller::spawn("test-ticks", Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Flow::Continue
        })
        .unwrap();

        while ticks.load(Ordering::SeqCst) < 3 {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(poller.stop(Duration::from_secs(1)));
        let after_stop = ticks.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
        assert!(poller.is_finished());
    }

    #[test]
    fn work_can_end_the_loop() {
        let poller = Poller::spawn("test-once", Duration::from_millis(1), || Flow::Stop).unwrap();
        while !poller.is_finished() {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(poller.name(), "test-once");
    }

    #[test]
    fn cancellation_is_prompt() {
        let mut poller =
            Poller::spawn("test-slow", Duration::from_secs(60), || Flow::Continue).unwrap();
        let start = std::time::Instant::now();
        assert!(poller.stop(Duration::from_secs(1)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
