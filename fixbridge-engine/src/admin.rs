/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Resend request handling.
//!
//! A ResendRequest arrives on the engine thread. The callback only queues a
//! [`GapFillJob`]; a fixed pool of worker threads builds the
//! SequenceReset-GapFill from a pooled buffer and hands it to the engine.
//! Failures are logged and never reach order callers.

use crate::application::SessionId;
use crate::engine::SessionEngine;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, select, unbounded};
use fixbridge_core::error::{BridgeError, Result};
use fixbridge_core::field::tags;
use fixbridge_core::message::{Message, MsgType};
use fixbridge_session::pool::MessagePool;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A gap fill owed to the counterparty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapFillJob {
    /// Session the request arrived on.
    pub session_id: SessionId,
    /// BeginSeqNo of the request.
    pub begin_seq_no: u64,
    /// EndSeqNo of the request.
    pub end_seq_no: u64,
}

impl GapFillJob {
    /// Reads a job from a ResendRequest.
    ///
    /// # Errors
    /// Returns `BridgeError::TransientAdmin` if BeginSeqNo or EndSeqNo is
    /// missing or not a number, or EndSeqNo leaves no room for a NewSeqNo.
    pub fn from_resend_request(message: &Message, session_id: &SessionId) -> Result<Self> {
        let seq = |tag: u32| {
            message.get_field_as::<u64>(tag).map_err(|e| {
                BridgeError::TransientAdmin(format!("unreadable resend request: {e}"))
            })
        };
        let begin_seq_no = seq(tags::BEGIN_SEQ_NO)?;
        let end_seq_no = seq(tags::END_SEQ_NO)?;
        if end_seq_no.checked_add(1).is_none() {
            return Err(BridgeError::TransientAdmin(format!(
                "EndSeqNo {end_seq_no} out of range"
            )));
        }
        Ok(Self {
            session_id: session_id.clone(),
            begin_seq_no,
            end_seq_no,
        })
    }

    /// Returns the NewSeqNo the gap fill announces.
    #[must_use]
    pub const fn new_seq_no(&self) -> u64 {
        self.end_seq_no.saturating_add(1)
    }
}

/// Writes a SequenceReset-GapFill for `job` into `message`.
pub fn build_gap_fill(message: &mut Message, job: &GapFillJob) {
    message.set_msg_type(&MsgType::SequenceReset);
    message.set_field(tags::BEGIN_STRING, &job.session_id.begin_string);
    message.set_field(tags::SENDER_COMP_ID, &job.session_id.sender_comp_id);
    message.set_field(tags::TARGET_COMP_ID, &job.session_id.target_comp_id);
    message.set_field(tags::NEW_SEQ_NO, job.new_seq_no());
    message.set_bool(tags::GAP_FILL_FLAG, true);
}

/// Producer side of the admin work queue. Never blocks.
#[derive(Debug, Clone)]
pub struct AdminQueue {
    tx: Sender<GapFillJob>,
}

impl AdminQueue {
    /// Queues a gap fill.
    ///
    /// # Errors
    /// Returns `BridgeError::TransientAdmin` if the workers are gone.
    pub fn submit(&self, job: GapFillJob) -> Result<()> {
        self.tx
            .send(job)
            .map_err(|_| BridgeError::TransientAdmin("admin workers stopped".to_string()))
    }
}

/// Fixed pool of gap-fill worker threads.
#[derive(Debug)]
pub struct AdminWorkerPool {
    stop_tx: Option<Sender<()>>,
    done_rx: Receiver<()>,
    workers: Vec<JoinHandle<()>>,
    sent: Arc<AtomicU64>,
}

impl AdminWorkerPool {
    /// Creates the work queue. Jobs queue up until [`AdminWorkerPool::spawn`].
    #[must_use]
    pub fn channel() -> (AdminQueue, Receiver<GapFillJob>) {
        let (tx, rx) = unbounded();
        (AdminQueue { tx }, rx)
    }

    /// Starts `workers` threads (at least one) consuming `jobs`.
    ///
    /// # Errors
    /// Returns `BridgeError::Engine` if a thread cannot be spawned; threads
    /// already started exit on their own.
    pub fn spawn(
        jobs: Receiver<GapFillJob>,
        workers: usize,
        engine: Arc<dyn SessionEngine>,
        pool: Arc<MessagePool>,
    ) -> Result<Self> {
        let workers = workers.max(1);
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let (done_tx, done_rx) = bounded::<()>(workers);
        let sent = Arc::new(AtomicU64::new(0));

        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let jobs = jobs.clone();
            let stop_rx = stop_rx.clone();
            let done_tx = done_tx.clone();
            let engine = Arc::clone(&engine);
            let pool = Arc::clone(&pool);
            let sent = Arc::clone(&sent);
            let handle = thread::Builder::new()
                .name(format!("fixbridge-admin-{index}"))
                .spawn(move || {
                    loop {
                        select! {
                            recv(stop_rx) -> _ => break,
                            recv(jobs) -> job => match job {
                                Ok(job) => match send_gap_fill(engine.as_ref(), &pool, &job) {
                                    Ok(()) => {
                                        sent.fetch_add(1, Ordering::Relaxed);
                                    }
                                    Err(e) => warn!(session = %job.session_id, error = %e, "gap fill failed"),
                                },
                                Err(_) => break,
                            },
                        }
                    }
                    let _ = done_tx.send(());
                })
                .map_err(|e| BridgeError::Engine(format!("cannot spawn admin worker: {e}")))?;
            handles.push(handle);
        }

        debug!(workers, "admin workers started");
        Ok(Self {
            stop_tx: Some(stop_tx),
            done_rx,
            workers: handles,
            sent,
        })
    }

    /// Returns the number of gap fills handed to the engine.
    #[must_use]
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Returns the number of worker threads not yet joined.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Signals the workers and joins them, waiting at most `join_timeout`
    /// in total. Queued jobs not yet picked up are dropped.
    ///
    /// Returns false if some worker did not finish in time; it is detached.
    pub fn shutdown(&mut self, join_timeout: Duration) -> bool {
        let Some(stop_tx) = self.stop_tx.take() else {
            return true;
        };
        drop(stop_tx);

        let deadline = Instant::now() + join_timeout;
        let mut finished = 0;
        while finished < self.workers.len() {
            match self.done_rx.recv_deadline(deadline) {
                Ok(()) => finished += 1,
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    finished = self.workers.len();
                }
            }
        }

        let handles = std::mem::take(&mut self.workers);
        if finished < handles.len() {
            warn!(
                stuck = handles.len() - finished,
                "admin workers did not stop in time, detaching"
            );
            return false;
        }
        for handle in handles {
            let _ = handle.join();
        }
        info!(sent = self.sent(), "admin workers stopped");
        true
    }
}

impl Drop for AdminWorkerPool {
    fn drop(&mut self) {
        self.shutdown(Duration::from_millis(500));
    }
}

fn send_gap_fill(engine: &dyn SessionEngine, pool: &Arc<MessagePool>, job: &GapFillJob) -> Result<()> {
    let mut message = pool.checkout();
    build_gap_fill(&mut message, job);
    if !engine.send_to_target(&message, &job.session_id) {
        return Err(BridgeError::TransientAdmin(format!(
            "engine refused gap fill {}..{}",
            job.begin_seq_no, job.end_seq_no
        )));
    }
    info!(
        session = %job.session_id,
        begin = job.begin_seq_no,
        new_seq_no = job.new_seq_no(),
        "sent SequenceReset-GapFill"
    );
    Ok(())
}
