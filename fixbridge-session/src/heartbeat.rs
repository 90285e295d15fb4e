/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Harness heartbeat.
//!
//! A background thread sends one heartbeat per interval while the session
//! handle holds a live session. It sleeps in slices no longer than the
//! configured ceiling so a stop request is seen promptly, and a failed send
//! is logged and retried on the next cycle.

use crate::handle::{SessionHandle, SessionId};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use fixbridge_core::error::{BridgeError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Sends one heartbeat for a live session.
pub trait HeartbeatSender: Send + 'static {
    /// Sends a heartbeat to `session_id`.
    ///
    /// # Errors
    /// Returns an error if the engine refused the message.
    fn send_heartbeat(&mut self, session_id: &SessionId) -> Result<()>;
}

impl<F> HeartbeatSender for F
where
    F: FnMut(&SessionId) -> Result<()> + Send + 'static,
{
    fn send_heartbeat(&mut self, session_id: &SessionId) -> Result<()> {
        self(session_id)
    }
}

/// Handle to a running heartbeat thread.
#[derive(Debug)]
pub struct HeartbeatScheduler {
    stop_tx: Option<Sender<()>>,
    done_rx: Receiver<()>,
    thread: Option<JoinHandle<()>>,
    sent: Arc<AtomicU64>,
    interval: Duration,
}

impl HeartbeatScheduler {
    /// Starts the heartbeat thread.
    ///
    /// # Arguments
    /// * `session` - Handle checked before every send
    /// * `interval` - Time between heartbeats
    /// * `ceiling` - Longest single sleep of the loop
    /// * `sender` - Performs the actual send
    ///
    /// # Errors
    /// Returns `BridgeError::Engine` if the thread cannot be spawned.
    pub fn spawn<S: HeartbeatSender>(
        session: SessionHandle,
        interval: Duration,
        ceiling: Duration,
        mut sender: S,
    ) -> Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<()>(1);
        let sent = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&sent);
        let ceiling = ceiling.max(Duration::from_millis(1));

        let thread = thread::Builder::new()
            .name("fixbridge-heartbeat".to_string())
            .spawn(move || {
                let mut next_due = Instant::now() + interval;
                loop {
                    let now = Instant::now();
                    if now >= next_due {
                        if let Some(session_id) = session.get() {
                            match sender.send_heartbeat(&session_id) {
                                Ok(()) => {
                                    counter.fetch_add(1, Ordering::Relaxed);
                                    debug!(session = %session_id, "heartbeat sent");
                                }
                                Err(e) => warn!(session = %session_id, error = %e, "heartbeat failed"),
                            }
                        }
                        next_due = now + interval;
                        continue;
                    }

                    match stop_rx.recv_timeout((next_due - now).min(ceiling)) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                let _ = done_tx.send(());
            })
            .map_err(|e| BridgeError::Engine(format!("cannot spawn heartbeat thread: {e}")))?;

        info!(interval_ms = interval.as_millis() as u64, "heartbeat started");
        Ok(Self {
            stop_tx: Some(stop_tx),
            done_rx,
            thread: Some(thread),
            sent,
            interval,
        })
    }

    /// Returns the number of heartbeats sent so far.
    #[must_use]
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Returns the heartbeat interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true until [`HeartbeatScheduler::stop`] has been called.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.stop_tx.is_some()
    }

    /// Signals the thread and waits up to `join_timeout` for it to exit.
    ///
    /// Returns false if the thread did not finish in time; it is then left
    /// detached and exits on its next wake-up. Calling this twice is a no-op.
    pub fn stop(&mut self, join_timeout: Duration) -> bool {
        let Some(stop_tx) = self.stop_tx.take() else {
            return true;
        };
        let _ = stop_tx.try_send(());
        drop(stop_tx);

        match self.done_rx.recv_timeout(join_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(thread) = self.thread.take() {
                    let _ = thread.join();
                }
                info!(sent = self.sent(), "heartbeat stopped");
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                self.thread.take();
                warn!(
                    timeout_ms = join_timeout.as_millis() as u64,
                    "heartbeat thread did not stop in time"
                );
                false
            }
        }
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        self.stop(Duration::from_millis(500));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn live_handle() -> SessionHandle {
        let handle = SessionHandle::new();
        handle.set(SessionId::new("FIX.4.4", "CLIENT", "VENUE"));
        handle
    }

    #[test]
    fn test_heartbeat_cadence() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let started = Instant::now();
        let mut hb = HeartbeatScheduler::spawn(
            live_handle(),
            Duration::from_millis(50),
            Duration::from_millis(10),
            move |_: &SessionId| -> Result<()> {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .unwrap();

        thread::sleep(Duration::from_millis(230));
        assert!(hb.stop(Duration::from_millis(500)));
        let elapsed = started.elapsed();

        let count = calls.load(Ordering::SeqCst) as u128;
        assert!(count >= 2, "expected several heartbeats, got {count}");
        assert!(count <= elapsed.as_millis() / 50, "too many heartbeats: {count}");
        assert_eq!(hb.sent() as u128, count);
    }

    #[test]
    fn test_no_heartbeat_after_stop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut hb = HeartbeatScheduler::spawn(
            live_handle(),
            Duration::from_millis(20),
            Duration::from_millis(5),
            move |_: &SessionId| -> Result<()> {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .unwrap();

        thread::sleep(Duration::from_millis(70));
        assert!(hb.stop(Duration::from_millis(500)));
        let after_stop = calls.load(Ordering::SeqCst);

        thread::sleep(Duration::from_millis(80));
        assert_eq!(calls.load(Ordering::SeqCst), after_stop);
        assert!(!hb.is_running());
        assert!(hb.stop(Duration::from_millis(10)));
    }

    #[test]
    fn test_no_heartbeat_without_session() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut hb = HeartbeatScheduler::spawn(
            SessionHandle::new(),
            Duration::from_millis(10),
            Duration::from_millis(5),
            move |_: &SessionId| -> Result<()> {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .unwrap();

        thread::sleep(Duration::from_millis(60));
        hb.stop(Duration::from_millis(500));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_send_failure_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut hb = HeartbeatScheduler::spawn(
            live_handle(),
            Duration::from_millis(15),
            Duration::from_millis(5),
            move |_: &SessionId| -> Result<()> {
                seen.fetch_add(1, Ordering::SeqCst);
                Err(BridgeError::NotConnected)
            },
        )
        .unwrap();

        thread::sleep(Duration::from_millis(100));
        hb.stop(Duration::from_millis(500));
        assert!(calls.load(Ordering::SeqCst) >= 2);
        assert_eq!(hb.sent(), 0);
    }

    #[test]
    fn test_stop_is_prompt_with_long_interval() {
        let mut hb = HeartbeatScheduler::spawn(
            live_handle(),
            Duration::from_secs(10),
            Duration::from_millis(20),
            |_: &SessionId| -> Result<()> { Ok(()) },
        )
        .unwrap();

        let started = Instant::now();
        assert!(hb.stop(Duration::from_millis(500)));
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
