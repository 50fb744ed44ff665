//! Binary stub protocol over a named pipe.
//!
//! The pipe is opened once when the client is built. Requests are answered in
//! order; a response repeats the request opcode with [`wire::RESPONSE_BIT`]
//! set and leads its payload with a status byte.

pub mod codec;
pub mod wire;

use crate::transport::{AsyncStream, TransportContext, connect_with_retry};
use async_trait::async_trait;
use codec::{StubCodec, StubFrame};
use futures_util::{SinkExt, StreamExt};
use grhost_core::{
    ButtonMask, ButtonState, CallFailure, CallPolicy, Endpoint, HostError, JackpotNotice,
    MappingError, Outcome, PresentationClient, PresentationOverride, ProcessId, ReelClient,
    ReelState, RuntimeClient, RuntimeCondition, RuntimeState,
};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio_util::bytes::{Buf, Bytes};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};
use wire::{Opcode, Payload};

const TRANSPORT: &str = "pipe";

#[derive(Debug, Clone, Error)]
pub enum PipeError {
    #[error("pipe is not connected")]
    NotConnected,

    #[error("pipe broken: {0}")]
    Broken(String),

    #[error("call timed out")]
    Timeout,

    #[error("remote returned status {0}")]
    Status(u8),

    #[error("request payload of {0} bytes exceeds the frame limit")]
    Oversized(usize),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Mapping(#[from] MappingError),
}

impl CallFailure for PipeError {
    fn presumed_dead(&self, _shutdown_requested: bool) -> bool {
        matches!(
            self,
            PipeError::NotConnected | PipeError::Broken(_) | PipeError::Timeout
        )
    }
}

type Channel = Framed<Box<dyn AsyncStream>, StubCodec>;

/// Runtime channel client for the pipe transport
pub struct PipeClient {
    policy: CallPolicy,
    call_timeout: Duration,
    channel: tokio::sync::Mutex<Option<Channel>>,
    connected: AtomicBool,
    next_seq: AtomicU32,
}

/// Platform path of the pipe called `name`.
///
/// On Unix a bare name lives in the temp directory; anything containing a
/// path separator is used as is.
#[cfg(unix)]
pub fn pipe_path(name: &str) -> std::path::PathBuf {
    if name.contains('/') {
        std::path::PathBuf::from(name)
    } else {
        std::env::temp_dir().join(format!("{name}.pipe"))
    }
}

#[cfg(windows)]
pub fn pipe_path(name: &str) -> std::path::PathBuf {
    std::path::PathBuf::from(format!(r"\\.\pipe\{name}"))
}

async fn open_pipe(name: &str) -> io::Result<Box<dyn AsyncStream>> {
    #[cfg(unix)]
    {
        let stream = tokio::net::UnixStream::connect(pipe_path(name)).await?;
        Ok(Box::new(stream))
    }

    #[cfg(windows)]
    {
        let client = tokio::net::windows::named_pipe::ClientOptions::new().open(pipe_path(name))?;
        Ok(Box::new(client))
    }
}

impl PipeClient {
    /// Open the pipe, retrying while the game process has not created it yet
    pub async fn connect(name: &str, ctx: TransportContext) -> Result<Self, HostError> {
        let stream = connect_with_retry(TRANSPORT, &ctx.retry, ctx.connect_timeout, move || async move {
            open_pipe(name)
                .await
                .map_err(|e| HostError::connection_failed(format!("pipe {name}: {e}")))
        })
        .await?;

        info!(pid = %ctx.pid, pipe = name, "Pipe channel established");
        Ok(Self::from_stream(stream, ctx))
    }

    pub fn from_stream<S>(stream: S, ctx: TransportContext) -> Self
    where
        S: AsyncStream + 'static,
    {
        let stream: Box<dyn AsyncStream> = Box::new(stream);
        Self {
            policy: CallPolicy::new(TRANSPORT, ctx.pid, ctx.events),
            call_timeout: ctx.call_timeout,
            channel: tokio::sync::Mutex::new(Some(Framed::new(stream, StubCodec))),
            connected: AtomicBool::new(true),
            next_seq: AtomicU32::new(1),
        }
    }

    /// Send one request and return the response body after the status byte
    async fn call(&self, opcode: Opcode, payload: Bytes) -> Result<Bytes, PipeError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(PipeError::NotConnected);
        }
        if payload.len() > codec::MAX_PAYLOAD {
            return Err(PipeError::Oversized(payload.len()));
        }

        let mut guard = self.channel.lock().await;
        let Some(channel) = guard.as_mut() else {
            return Err(PipeError::NotConnected);
        };

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let request = StubFrame {
            opcode: opcode.code(),
            seq,
            payload,
        };
        let result = match tokio::time::timeout(self.call_timeout, exchange(channel, request)).await {
            Ok(result) => result,
            Err(_) => Err(PipeError::Timeout),
        };

        // A timed out exchange leaves the stream mid-frame
        if matches!(result, Err(PipeError::Broken(_) | PipeError::Timeout)) {
            warn!(pid = %self.policy.pid(), opcode = ?opcode, "Dropping pipe channel");
            self.connected.store(false, Ordering::SeqCst);
            *guard = None;
        }
        result
    }

    async fn send(&self, opcode: Opcode, payload: Payload) -> Result<(), PipeError> {
        self.call(opcode, payload.finish()).await.map(|_| ())
    }

    async fn fetch_state(&self) -> Result<RuntimeState, PipeError> {
        let mut body = self.call(Opcode::GetState, Bytes::new()).await?;
        if !body.has_remaining() {
            return Err(PipeError::Malformed("GetState response without a state".to_string()));
        }
        Ok(wire::state_from_wire(body.get_u8())?)
    }

    async fn fetch_flag(&self, condition: RuntimeCondition) -> Result<bool, PipeError> {
        let payload = Payload::new().u8(wire::condition_to_wire(condition)).finish();
        let mut body = self.call(Opcode::GetFlag, payload).await?;
        if !body.has_remaining() {
            return Err(PipeError::Malformed("GetFlag response without a value".to_string()));
        }
        Ok(body.get_u8() != 0)
    }
}

async fn exchange(channel: &mut Channel, request: StubFrame) -> Result<Bytes, PipeError> {
    let opcode = request.opcode;
    let seq = request.seq;
    channel.send(request).await.map_err(|e| match e.kind() {
        io::ErrorKind::InvalidInput => PipeError::Malformed(e.to_string()),
        _ => PipeError::Broken(e.to_string()),
    })?;

    loop {
        let frame = match channel.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => return Err(PipeError::Broken(e.to_string())),
            None => return Err(PipeError::Broken("end of stream".to_string())),
        };

        if frame.opcode != opcode | wire::RESPONSE_BIT || frame.seq != seq {
            debug!(
                opcode = frame.opcode,
                seq = frame.seq,
                "Skipping unexpected pipe frame"
            );
            continue;
        }

        let mut body = frame.payload;
        if !body.has_remaining() {
            return Err(PipeError::Malformed("response without status".to_string()));
        }
        return match body.get_u8() {
            wire::STATUS_OK => Ok(body),
            status => Err(PipeError::Status(status)),
        };
    }
}

impl Endpoint for PipeClient {
    fn process_id(&self) -> ProcessId {
        self.policy.pid()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn dispose(&self) {
        self.connected.store(false, Ordering::SeqCst);
        // An in-flight call still owns the channel and drops it on its own
        if let Ok(mut channel) = self.channel.try_lock() {
            *channel = None;
        }
    }
}

#[async_trait]
impl RuntimeClient for PipeClient {
    async fn update_state(&self, state: RuntimeState) {
        let payload = Payload::new().u8(wire::state_to_wire(state));
        self.policy
            .invoke("UpdateState", self.send(Opcode::UpdateState, payload))
            .await
    }

    async fn get_state(&self) -> RuntimeState {
        self.policy.invoke("GetState", self.fetch_state()).await
    }

    async fn update_flag(&self, condition: RuntimeCondition, value: bool) {
        let payload = Payload::new()
            .u8(wire::condition_to_wire(condition))
            .bool(value);
        self.policy
            .invoke("UpdateFlag", self.send(Opcode::UpdateFlag, payload))
            .await
    }

    async fn get_flag(&self, condition: RuntimeCondition) -> bool {
        self.policy
            .invoke("GetFlag", self.fetch_flag(condition))
            .await
    }

    async fn update_button_state(&self, button_id: u32, mask: ButtonMask, state: ButtonState) {
        let payload = Payload::new()
            .u32(button_id)
            .u8(wire::button_mask_to_wire(mask))
            .u8(wire::button_state_to_wire(state));
        self.policy
            .invoke(
                "UpdateButtonState",
                self.send(Opcode::UpdateButtonState, payload),
            )
            .await
    }

    async fn update_volume(&self, level: f32) {
        self.policy
            .invoke(
                "UpdateVolume",
                self.send(Opcode::UpdateVolume, Payload::new().f32(level)),
            )
            .await
    }

    async fn update_balance(&self, credits: u64) {
        self.policy
            .invoke(
                "UpdateBalance",
                self.send(Opcode::UpdateBalance, Payload::new().u64(credits)),
            )
            .await
    }

    async fn update_platform_message(&self, messages: &[String]) {
        let payload = messages
            .iter()
            .fold(Payload::new().count(messages.len()), |p, m| p.str(m));
        self.policy
            .invoke(
                "UpdatePlatformMessage",
                self.send(Opcode::UpdatePlatformMessage, payload),
            )
            .await
    }

    async fn update_parameters(&self, parameters: &HashMap<String, String>) {
        let payload = parameters
            .iter()
            .fold(Payload::new().count(parameters.len()), |p, (k, v)| {
                p.str(k).str(v)
            });
        self.policy
            .invoke(
                "UpdateParameters",
                self.send(Opcode::UpdateParameters, payload),
            )
            .await
    }

    async fn update_outcomes(&self, outcomes: &[Outcome]) {
        let payload = outcomes
            .iter()
            .fold(Payload::new().count(outcomes.len()), |p, o| {
                p.u8(wire::outcome_type_to_wire(o.kind))
                    .u64(o.value)
                    .str(&o.lookup_data)
            });
        self.policy
            .invoke("UpdateOutcomes", self.send(Opcode::UpdateOutcomes, payload))
            .await
    }

    async fn jackpot_notification(&self, notice: &JackpotNotice) {
        let payload = Payload::new()
            .str(&notice.pool_name)
            .u32(notice.level_id)
            .u64(notice.amount);
        self.policy
            .invoke(
                "JackpotNotification",
                self.send(Opcode::JackpotNotification, payload),
            )
            .await
    }

    async fn update_jackpot_values(&self, values: &HashMap<u32, u64>) {
        let payload = values
            .iter()
            .fold(Payload::new().count(values.len()), |p, (level, amount)| {
                p.u32(*level).u64(*amount)
            });
        self.policy
            .invoke(
                "UpdateJackpotValues",
                self.send(Opcode::UpdateJackpotValues, payload),
            )
            .await
    }

    async fn shutdown(&self) {
        self.policy
            .invoke_shutdown(self.send(Opcode::Shutdown, Payload::new()))
            .await
    }
}

#[async_trait]
impl ReelClient for PipeClient {
    async fn update_reel_state(&self, states: &HashMap<u32, ReelState>) {
        let payload = states
            .iter()
            .fold(Payload::new().count(states.len()), |p, (reel, state)| {
                p.u32(*reel).u8(wire::reel_state_to_wire(*state))
            });
        self.policy
            .invoke(
                "UpdateReelState",
                self.send(Opcode::UpdateReelState, payload),
            )
            .await
    }

    async fn reels_stopped(&self) {
        self.policy
            .invoke(
                "ReelsStopped",
                self.send(Opcode::ReelsStopped, Payload::new()),
            )
            .await
    }
}

#[async_trait]
impl PresentationClient for PipeClient {
    async fn present_overridden(&self, overrides: &[PresentationOverride]) {
        let payload = overrides
            .iter()
            .fold(Payload::new().count(overrides.len()), |p, o| {
                p.u8(wire::override_kind_to_wire(o.kind)).str(&o.message)
            });
        self.policy
            .invoke(
                "PresentOverridden",
                self.send(Opcode::PresentOverridden, payload),
            )
            .await
    }
}
