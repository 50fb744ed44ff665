use futures_util::{SinkExt, StreamExt};
use grhost_core::{EventBus, HostEvent, ProcessId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, info, warn};

use super::{DuplexFault, wire};

const MAX_LINE: usize = 1024 * 1024;

/// Lifecycle of the underlying duplex channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Created,
    Opened,
    Closing,
    Closed,
    Faulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FaultCode {
    ActionNotSupported,
    InvalidMessage,
    InternalServiceFault,
    ServerTooBusy,
}

/// One line on the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SessionMessage {
    Invoke {
        seq: u64,
        operation: String,
        #[serde(default)]
        body: Value,
    },
    Reply {
        seq: u64,
        #[serde(default)]
        body: Value,
    },
    Fault {
        seq: u64,
        code: FaultCode,
        reason: String,
    },
    /// Call from the game process back into the platform
    Callback {
        name: String,
        #[serde(default)]
        body: Value,
    },
}

type LineWriter = FramedWrite<Box<dyn AsyncWrite + Send + Unpin>, LinesCodec>;

struct SessionIo {
    writer: LineWriter,
    replies: mpsc::UnboundedReceiver<SessionMessage>,
    next_seq: u64,
}

/// Duplex session accepted from the game process.
///
/// Calls are issued one at a time; the game answers every `Invoke` with a
/// `Reply` or `Fault` carrying the same sequence number.
pub struct DuplexSession {
    pid: ProcessId,
    state: Arc<Mutex<ChannelState>>,
    io: tokio::sync::Mutex<SessionIo>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl DuplexSession {
    pub fn open<S>(stream: S, pid: ProcessId, events: EventBus) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let state = Arc::new(Mutex::new(ChannelState::Created));
        let (read_half, write_half) = tokio::io::split(stream);
        let (replies_tx, replies) = mpsc::unbounded_channel();

        let lines = FramedRead::new(read_half, LinesCodec::new_with_max_length(MAX_LINE));
        let reader = tokio::spawn(Self::reader_loop(lines, replies_tx, state.clone(), events, pid));

        let writer: Box<dyn AsyncWrite + Send + Unpin> = Box::new(write_half);
        *state.lock() = ChannelState::Opened;
        debug!(pid = %pid, "Duplex session opened");

        Self {
            pid,
            state,
            io: tokio::sync::Mutex::new(SessionIo {
                writer: FramedWrite::new(writer, LinesCodec::new_with_max_length(MAX_LINE)),
                replies,
                next_seq: 0,
            }),
            reader: Mutex::new(Some(reader)),
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    async fn reader_loop<R>(
        mut lines: FramedRead<R, LinesCodec>,
        replies: mpsc::UnboundedSender<SessionMessage>,
        state: Arc<Mutex<ChannelState>>,
        events: EventBus,
        pid: ProcessId,
    ) where
        R: AsyncRead + Unpin,
    {
        let mut failed = false;
        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(pid = %pid, error = %e, "Duplex session read failed");
                    failed = true;
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<SessionMessage>(&line) {
                Ok(SessionMessage::Callback { name, body }) => on_callback(&events, pid, &name, &body),
                Ok(SessionMessage::Invoke { operation, .. }) => {
                    debug!(pid = %pid, operation = %operation, "Ignoring invoke from game process");
                }
                Ok(reply) => {
                    let _ = replies.send(reply);
                }
                Err(e) => warn!(pid = %pid, error = %e, "Ignoring malformed session message"),
            }
        }

        let mut state = state.lock();
        *state = match *state {
            ChannelState::Closing | ChannelState::Closed if !failed => ChannelState::Closed,
            _ => ChannelState::Faulted,
        };
        info!(pid = %pid, state = ?*state, "Duplex session ended");
    }

    /// Invoke `operation` and wait for its reply
    pub async fn call(
        &self,
        operation: &str,
        body: Value,
        timeout: Duration,
    ) -> Result<Value, DuplexFault> {
        let state = self.state();
        if state != ChannelState::Opened {
            return Err(DuplexFault::ChannelNotOpen(state));
        }

        let mut io = self.io.lock().await;
        // Calls are sequential; the deadline covers only this exchange
        let deadline = Instant::now() + timeout;
        let state = self.state();
        if state != ChannelState::Opened {
            return Err(DuplexFault::ChannelNotOpen(state));
        }

        // Replies to calls that already timed out
        while let Ok(stale) = io.replies.try_recv() {
            debug!(pid = %self.pid, message = ?stale, "Discarding stale reply");
        }

        io.next_seq += 1;
        let seq = io.next_seq;
        let line = serde_json::to_string(&SessionMessage::Invoke {
            seq,
            operation: operation.to_string(),
            body,
        })
        .map_err(|e| DuplexFault::Protocol(e.to_string()))?;

        if let Err(e) = io.writer.send(line).await {
            *self.state.lock() = ChannelState::Faulted;
            return Err(DuplexFault::Communication(e.to_string()));
        }

        loop {
            match tokio::time::timeout_at(deadline, io.replies.recv()).await {
                Err(_) => return Err(DuplexFault::Timeout),
                Ok(None) => {
                    return Err(DuplexFault::Communication(
                        "session closed while waiting for reply".to_string(),
                    ));
                }
                Ok(Some(SessionMessage::Reply { seq: got, body })) if got == seq => return Ok(body),
                Ok(Some(SessionMessage::Fault {
                    seq: got,
                    code,
                    reason,
                })) if got == seq => return Err(DuplexFault::Remote { code, reason }),
                Ok(Some(other)) => {
                    debug!(pid = %self.pid, message = ?other, "Discarding out-of-sequence reply");
                }
            }
        }
    }

    /// Close the session locally. Idempotent.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            if matches!(*state, ChannelState::Closed | ChannelState::Faulted) {
                return;
            }
            *state = ChannelState::Closing;
        }
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        *self.state.lock() = ChannelState::Closed;
        debug!(pid = %self.pid, "Duplex session closed");
    }
}

impl Drop for DuplexSession {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
    }
}

fn on_callback(events: &EventBus, pid: ProcessId, name: &str, body: &Value) {
    match name {
        "Exiting" => {
            info!(pid = %pid, "Game process announced exit");
            events.publish(HostEvent::RuntimeExiting { pid });
        }
        "StateChanged" => {
            let state = body
                .get("state")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
                .map(wire::state_from_wire);
            match state {
                Some(Ok(state)) => events.publish(HostEvent::RuntimeStateChanged { pid, state }),
                Some(Err(e)) => warn!(pid = %pid, error = %e, "Ignoring state change callback"),
                None => warn!(pid = %pid, "State change callback without a state"),
            }
        }
        other => debug!(pid = %pid, callback = other, "Ignoring unknown callback"),
    }
}
