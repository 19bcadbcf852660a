//! [`TimedEngine`] – bounds the latency of every inference call.
//!
//! The wrapped engine lives on a dedicated worker thread.  Each request
//! carries a sequence number; the caller waits up to `timeout` for the reply
//! with the matching number and reports [`TurretError::ScoreUnavailable`]
//! otherwise.  Replies that arrive after their caller gave up are dropped
//! when the next request drains the channel.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use turret_types::{SampleBuffer, TurretError};

use crate::inference::{EngineOutput, InferenceEngine};

struct Request {
    seq: u64,
    input: SampleBuffer,
}

struct Reply {
    seq: u64,
    result: Result<EngineOutput, TurretError>,
}

/// An [`InferenceEngine`] adapter that enforces a per-call timeout.
pub struct TimedEngine {
    id: String,
    timeout: Duration,
    requests: Sender<Request>,
    replies: Receiver<Reply>,
    next_seq: u64,
}

impl TimedEngine {
    /// Move `engine` onto a worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::ScoreUnavailable`] if the worker thread cannot
    /// be spawned.
    pub fn spawn<E: InferenceEngine + 'static>(
        mut engine: E,
        timeout: Duration,
    ) -> Result<Self, TurretError> {
        let id = engine.id().to_string();
        let (request_tx, request_rx) = mpsc::channel::<Request>();
        let (reply_tx, reply_rx) = mpsc::channel::<Reply>();

        thread::Builder::new()
            .name(format!("inference-{id}"))
            .spawn(move || {
                for request in request_rx {
                    let result = engine.infer(&request.input);
                    if reply_tx
                        .send(Reply {
                            seq: request.seq,
                            result,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
            })
            .map_err(|e| TurretError::ScoreUnavailable(format!("spawning worker: {e}")))?;

        Ok(Self {
            id,
            timeout,
            requests: request_tx,
            replies: reply_rx,
            next_seq: 0,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl InferenceEngine for TimedEngine {
    fn id(&self) -> &str {
        &self.id
    }

    fn infer(&mut self, input: &SampleBuffer) -> Result<EngineOutput, TurretError> {
        let seq = self.next_seq;
        self.next_seq += 1;

        self.requests
            .send(Request {
                seq,
                input: input.clone(),
            })
            .map_err(|_| TurretError::ScoreUnavailable("inference worker stopped".to_string()))?;

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.replies.recv_timeout(remaining) {
                Ok(reply) if reply.seq == seq => return reply.result,
                Ok(late) => {
                    debug!(engine = %self.id, seq = late.seq, "discarding late inference reply");
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(engine = %self.id, seq, timeout_ms = self.timeout.as_millis() as u64, "inference timed out");
                    return Err(TurretError::ScoreUnavailable(format!(
                        "inference exceeded {} ms",
                        self.timeout.as_millis()
                    )));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(TurretError::ScoreUnavailable(
                        "inference worker stopped".to_string(),
                    ));
                }
            }
        }
    }
}
