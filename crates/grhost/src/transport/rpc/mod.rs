//! Multiplexed request/response adapter.
//!
//! Frames are length-delimited JSON documents. Any number of calls may be in
//! flight; responses are routed back by request id. Every call carries a
//! deadline and a child token of the shared [`CancellationScope`], so a
//! process exit fails all outstanding calls at once.

pub mod wire;

use crate::transport::{TransportContext, connect_local, connect_with_retry};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use grhost_core::{
    ButtonMask, ButtonState, CallFailure, CallPolicy, CancellationScope, Endpoint, EventBus,
    HostError, HostEvent, JackpotNotice, LocalEndpoint, MappingError, Outcome,
    PresentationClient, PresentationOverride, ProcessId, ReelClient, ReelState, RuntimeClient,
    RuntimeCondition, RuntimeState,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::bytes::Bytes;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, info, warn};

const TRANSPORT: &str = "rpc";

/// Largest frame either side may send
pub const MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

/// Status codes carried by error frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcStatus {
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    Unimplemented,
    Internal,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RpcFrame {
    Request {
        id: u64,
        method: String,
        #[serde(default)]
        params: Value,
    },
    Response {
        id: u64,
        #[serde(default)]
        result: Value,
    },
    Error {
        id: u64,
        status: RpcStatus,
        message: String,
    },
    /// Unsolicited notification from the game process
    Event {
        name: String,
        #[serde(default)]
        payload: Value,
    },
}

impl RpcFrame {
    fn request_id(&self) -> Option<u64> {
        match self {
            RpcFrame::Request { id, .. } => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum RpcError {
    #[error("remote returned {status:?}: {message}")]
    Status { status: RpcStatus, message: String },

    #[error("call deadline exceeded")]
    DeadlineExceeded,

    #[error("call cancelled")]
    Cancelled,

    #[error("connection lost")]
    ConnectionLost,

    #[error("client disposed")]
    Disposed,

    #[error("malformed reply: {0}")]
    Codec(String),

    #[error("request not sent: {0}")]
    Encode(String),

    #[error(transparent)]
    Mapping(#[from] MappingError),
}

impl CallFailure for RpcError {
    fn presumed_dead(&self, shutdown_requested: bool) -> bool {
        match self {
            RpcError::Status { status, .. } => match status {
                RpcStatus::Unavailable | RpcStatus::DeadlineExceeded => true,
                RpcStatus::Cancelled => !shutdown_requested,
                _ => false,
            },
            RpcError::DeadlineExceeded | RpcError::ConnectionLost => true,
            RpcError::Cancelled => !shutdown_requested,
            RpcError::Disposed
            | RpcError::Codec(_)
            | RpcError::Encode(_)
            | RpcError::Mapping(_) => false,
        }
    }
}

type Reply = Result<Value, RpcError>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

/// Runtime channel client for the rpc transport
pub struct RpcClient {
    policy: CallPolicy,
    scope: Arc<CancellationScope>,
    call_timeout: Duration,
    next_id: AtomicU64,
    outbound: mpsc::Sender<RpcFrame>,
    pending: Pending,
    connected: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RpcClient {
    /// Connect to the game process, retrying while it is still starting up
    pub async fn connect(endpoint: &LocalEndpoint, ctx: TransportContext) -> Result<Self, HostError> {
        let stream = connect_with_retry(TRANSPORT, &ctx.retry, ctx.connect_timeout, move || async move {
            connect_local(endpoint)
                .await
                .map_err(|e| HostError::connection_failed(format!("{endpoint}: {e}")))
        })
        .await?;

        info!(pid = %ctx.pid, endpoint = %endpoint, "Rpc channel established");
        Ok(Self::from_stream(stream, ctx))
    }

    /// Run the client over an already connected stream
    pub fn from_stream<S>(stream: S, ctx: TransportContext) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let codec = LengthDelimitedCodec::builder()
            .max_frame_length(MAX_FRAME_LEN)
            .new_codec();
        let (sink, source) = Framed::new(stream, codec).split();
        let (outbound, outbound_rx) = mpsc::channel(64);
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));

        let writer = tokio::spawn(Self::writer_loop(
            sink,
            outbound_rx,
            pending.clone(),
            connected.clone(),
        ));
        let reader = tokio::spawn(Self::reader_loop(
            source,
            outbound.clone(),
            pending.clone(),
            connected.clone(),
            ctx.events.clone(),
            ctx.pid,
        ));

        Self {
            policy: CallPolicy::new(TRANSPORT, ctx.pid, ctx.events),
            scope: ctx.scope,
            call_timeout: ctx.call_timeout,
            next_id: AtomicU64::new(1),
            outbound,
            pending,
            connected,
            tasks: Mutex::new(vec![writer, reader]),
        }
    }

    async fn writer_loop<S>(
        mut sink: SplitSink<Framed<S, LengthDelimitedCodec>, Bytes>,
        mut outbound: mpsc::Receiver<RpcFrame>,
        pending: Pending,
        connected: Arc<AtomicBool>,
    ) where
        S: AsyncRead + AsyncWrite,
    {
        while let Some(frame) = outbound.recv().await {
            let id = frame.request_id();
            let bytes = match serde_json::to_vec(&frame) {
                Ok(bytes) => Bytes::from(bytes),
                Err(e) => {
                    reject(&pending, id, format!("unserializable frame: {e}"));
                    continue;
                }
            };
            if bytes.len() > MAX_FRAME_LEN {
                reject(
                    &pending,
                    id,
                    format!("frame of {} bytes exceeds the limit", bytes.len()),
                );
                continue;
            }
            if let Err(e) = sink.send(bytes).await {
                // The codec refuses before writing anything, so the stream is intact
                if e.kind() == io::ErrorKind::InvalidInput {
                    reject(&pending, id, e.to_string());
                    continue;
                }
                warn!(error = %e, "Rpc write failed");
                break;
            }
        }
        connected.store(false, Ordering::SeqCst);
        fail_pending(&pending, RpcError::ConnectionLost);
    }

    async fn reader_loop<S>(
        mut source: SplitStream<Framed<S, LengthDelimitedCodec>>,
        outbound: mpsc::Sender<RpcFrame>,
        pending: Pending,
        connected: Arc<AtomicBool>,
        events: EventBus,
        pid: ProcessId,
    ) where
        S: AsyncRead + AsyncWrite,
    {
        while let Some(item) = source.next().await {
            let bytes = match item {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(pid = %pid, error = %e, "Rpc read failed");
                    break;
                }
            };
            let frame: RpcFrame = match serde_json::from_slice(&bytes) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(pid = %pid, error = %e, "Ignoring malformed rpc frame");
                    continue;
                }
            };

            match frame {
                RpcFrame::Response { id, result } => complete(&pending, id, Ok(result)),
                RpcFrame::Error {
                    id,
                    status,
                    message,
                } => complete(&pending, id, Err(RpcError::Status { status, message })),
                RpcFrame::Event { name, payload } => on_event(&events, pid, &name, &payload),
                RpcFrame::Request { id, method, .. } => {
                    debug!(pid = %pid, method = %method, "Rejecting inbound request");
                    let _ = outbound
                        .send(RpcFrame::Error {
                            id,
                            status: RpcStatus::Unimplemented,
                            message: format!("{method} is not served by the platform"),
                        })
                        .await;
                }
            }
        }

        info!(pid = %pid, "Rpc channel closed");
        connected.store(false, Ordering::SeqCst);
        fail_pending(&pending, RpcError::ConnectionLost);
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(RpcError::ConnectionLost);
        }

        let token = self.scope.token();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().insert(id, reply_tx);

        let request = RpcFrame::Request {
            id,
            method: method.to_string(),
            params,
        };
        if self.outbound.send(request).await.is_err() {
            self.pending.lock().remove(&id);
            return Err(RpcError::ConnectionLost);
        }

        let outcome = tokio::select! {
            _ = token.cancelled() => Err(RpcError::Cancelled),
            reply = tokio::time::timeout(self.call_timeout, reply_rx) => match reply {
                Ok(Ok(reply)) => reply,
                Ok(Err(_)) => Err(RpcError::ConnectionLost),
                Err(_) => Err(RpcError::DeadlineExceeded),
            },
        };

        if outcome.is_err() {
            self.pending.lock().remove(&id);
        }
        outcome
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), RpcError> {
        self.call(method, params).await.map(|_| ())
    }

    async fn fetch_state(&self) -> Result<RuntimeState, RpcError> {
        let reply = self.call("GetState", Value::Null).await?;
        let ordinal = field_u32(&reply, "state")?;
        Ok(wire::state_from_wire(ordinal)?)
    }

    async fn fetch_flag(&self, condition: RuntimeCondition) -> Result<bool, RpcError> {
        let reply = self
            .call(
                "GetFlag",
                json!({ "condition": wire::condition_to_wire(condition) }),
            )
            .await?;
        reply
            .get("value")
            .and_then(Value::as_bool)
            .ok_or_else(|| RpcError::Codec("GetFlag reply without a boolean value".to_string()))
    }
}

fn complete(pending: &Pending, id: u64, reply: Reply) {
    match pending.lock().remove(&id) {
        Some(waiter) => {
            let _ = waiter.send(reply);
        }
        None => debug!(id, "Reply for a call nobody is waiting on"),
    }
}

/// Fail the caller waiting on a request that could not be written
fn reject(pending: &Pending, id: Option<u64>, reason: String) {
    warn!(id, reason = %reason, "Dropping outbound rpc frame");
    if let Some(id) = id {
        complete(pending, id, Err(RpcError::Encode(reason)));
    }
}

fn fail_pending(pending: &Pending, error: RpcError) {
    let waiters: Vec<_> = pending.lock().drain().collect();
    for (_, waiter) in waiters {
        let _ = waiter.send(Err(error.clone()));
    }
}

fn on_event(events: &EventBus, pid: ProcessId, name: &str, payload: &Value) {
    match name {
        "exiting" => {
            info!(pid = %pid, "Game process announced exit");
            events.publish(HostEvent::RuntimeExiting { pid });
        }
        "stateChanged" => match field_u32(payload, "state")
            .map_err(|e| e.to_string())
            .and_then(|ordinal| wire::state_from_wire(ordinal).map_err(|e| e.to_string()))
        {
            Ok(state) => events.publish(HostEvent::RuntimeStateChanged { pid, state }),
            Err(e) => warn!(pid = %pid, error = %e, "Ignoring state change notification"),
        },
        other => debug!(pid = %pid, event = other, "Ignoring unknown notification"),
    }
}

fn field_u32(value: &Value, field: &str) -> Result<u32, RpcError> {
    value
        .get(field)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| RpcError::Codec(format!("missing or invalid `{field}`")))
}

impl Endpoint for RpcClient {
    fn process_id(&self) -> ProcessId {
        self.policy.pid()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.policy.is_shutdown_requested()
    }

    fn dispose(&self) {
        self.connected.store(false, Ordering::SeqCst);
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        fail_pending(&self.pending, RpcError::Disposed);
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[async_trait]
impl RuntimeClient for RpcClient {
    async fn update_state(&self, state: RuntimeState) {
        self.policy
            .invoke(
                "UpdateState",
                self.notify("UpdateState", json!({ "state": wire::state_to_wire(state) })),
            )
            .await
    }

    async fn get_state(&self) -> RuntimeState {
        self.policy.invoke("GetState", self.fetch_state()).await
    }

    async fn update_flag(&self, condition: RuntimeCondition, value: bool) {
        self.policy
            .invoke(
                "UpdateFlag",
                self.notify(
                    "UpdateFlag",
                    json!({ "condition": wire::condition_to_wire(condition), "value": value }),
                ),
            )
            .await
    }

    async fn get_flag(&self, condition: RuntimeCondition) -> bool {
        self.policy
            .invoke("GetFlag", self.fetch_flag(condition))
            .await
    }

    async fn update_button_state(&self, button_id: u32, mask: ButtonMask, state: ButtonState) {
        let params = json!({
            "buttonId": button_id,
            "mask": wire::button_mask_to_wire(mask),
            "state": wire::button_state_to_wire(state),
        });
        self.policy
            .invoke("UpdateButtonState", self.notify("UpdateButtonState", params))
            .await
    }

    async fn update_volume(&self, level: f32) {
        self.policy
            .invoke(
                "UpdateVolume",
                self.notify("UpdateVolume", json!({ "level": level })),
            )
            .await
    }

    async fn update_balance(&self, credits: u64) {
        self.policy
            .invoke(
                "UpdateBalance",
                self.notify("UpdateBalance", json!({ "credits": credits })),
            )
            .await
    }

    async fn update_platform_message(&self, messages: &[String]) {
        self.policy
            .invoke(
                "UpdatePlatformMessage",
                self.notify("UpdatePlatformMessage", json!({ "messages": messages })),
            )
            .await
    }

    async fn update_parameters(&self, parameters: &HashMap<String, String>) {
        self.policy
            .invoke(
                "UpdateParameters",
                self.notify("UpdateParameters", json!({ "parameters": parameters })),
            )
            .await
    }

    async fn update_outcomes(&self, outcomes: &[Outcome]) {
        let outcomes: Vec<Value> = outcomes
            .iter()
            .map(|outcome| {
                json!({
                    "type": wire::outcome_type_to_wire(outcome.kind),
                    "value": outcome.value,
                    "lookupData": outcome.lookup_data,
                })
            })
            .collect();
        self.policy
            .invoke(
                "UpdateOutcomes",
                self.notify("UpdateOutcomes", json!({ "outcomes": outcomes })),
            )
            .await
    }

    async fn jackpot_notification(&self, notice: &JackpotNotice) {
        let params = json!({
            "poolName": notice.pool_name,
            "levelId": notice.level_id,
            "amount": notice.amount,
        });
        self.policy
            .invoke(
                "JackpotNotification",
                self.notify("JackpotNotification", params),
            )
            .await
    }

    async fn update_jackpot_values(&self, values: &HashMap<u32, u64>) {
        self.policy
            .invoke(
                "UpdateJackpotValues",
                self.notify("UpdateJackpotValues", json!({ "values": values })),
            )
            .await
    }

    async fn shutdown(&self) {
        self.policy
            .invoke_shutdown(self.notify("Shutdown", Value::Null))
            .await
    }
}

#[async_trait]
impl ReelClient for RpcClient {
    async fn update_reel_state(&self, states: &HashMap<u32, ReelState>) {
        let reels: HashMap<u32, u32> = states
            .iter()
            .map(|(reel, state)| (*reel, wire::reel_state_to_wire(*state)))
            .collect();
        self.policy
            .invoke(
                "UpdateReelState",
                self.notify("UpdateReelState", json!({ "reels": reels })),
            )
            .await
    }

    async fn reels_stopped(&self) {
        self.policy
            .invoke("ReelsStopped", self.notify("ReelsStopped", Value::Null))
            .await
    }
}

#[async_trait]
impl PresentationClient for RpcClient {
    async fn present_overridden(&self, overrides: &[PresentationOverride]) {
        let overrides: Vec<Value> = overrides
            .iter()
            .map(|o| json!({ "kind": o.kind.as_str(), "message": o.message }))
            .collect();
        self.policy
            .invoke(
                "PresentOverridden",
                self.notify("PresentOverridden", json!({ "overrides": overrides })),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grhost_core::RetryConfig;
    use tokio::io::DuplexStream;
    use tokio::sync::broadcast;
    use tokio::sync::broadcast::error::TryRecvError;

    type ServerFrames = Framed<DuplexStream, LengthDelimitedCodec>;

    fn context(scope: Arc<CancellationScope>) -> (TransportContext, broadcast::Receiver<HostEvent>) {
        let events = EventBus::default();
        let receiver = events.subscribe();
        let ctx = TransportContext {
            pid: ProcessId(77),
            events,
            scope,
            call_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(1),
            retry: RetryConfig::no_retry(),
        };
        (ctx, receiver)
    }

    fn client() -> (RpcClient, ServerFrames, broadcast::Receiver<HostEvent>, Arc<CancellationScope>) {
        let scope = Arc::new(CancellationScope::new());
        let (ctx, events) = context(scope.clone());
        let (client_io, server_io) = tokio::io::duplex(16 * 1024);
        let client = RpcClient::from_stream(client_io, ctx);
        let server = Framed::new(server_io, LengthDelimitedCodec::new());
        (client, server, events, scope)
    }

    async fn recv_request(server: &mut ServerFrames) -> (u64, String, Value) {
        let bytes = server.next().await.unwrap().unwrap();
        match serde_json::from_slice(&bytes).unwrap() {
            RpcFrame::Request { id, method, params } => (id, method, params),
            other => panic!("expected request, got {other:?}"),
        }
    }

    async fn send_frame(server: &mut ServerFrames, frame: RpcFrame) {
        let bytes = serde_json::to_vec(&frame).unwrap();
        server.send(Bytes::from(bytes)).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_state_decodes_reply() {
        let (client, mut server, mut events, _) = client();

        let peer = tokio::spawn(async move {
            let (id, method, _) = recv_request(&mut server).await;
            assert_eq!(method, "GetState");
            send_frame(
                &mut server,
                RpcFrame::Response {
                    id,
                    result: json!({ "state": wire::state_to_wire(RuntimeState::Running) }),
                },
            )
            .await;
            server
        });

        assert_eq!(client.get_state().await, RuntimeState::Running);
        assert!(client.is_connected());
        let _server = peer.await.unwrap();
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_connection_loss_raises_one_hung_event() {
        let (client, server, mut events, _) = client();
        drop(server);

        assert!(!client.get_flag(RuntimeCondition::InLockup).await);
        client.update_balance(500).await;

        assert_eq!(
            events.recv().await.unwrap(),
            HostEvent::ProcessHung { pid: ProcessId(77) }
        );
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_oversized_request_defaults_and_keeps_channel() {
        let (client, mut server, mut events, _) = client();

        let huge = vec!["x".repeat(MAX_FRAME_LEN + 1)];
        client.update_platform_message(&huge).await;
        assert!(client.is_connected());
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

        let peer = tokio::spawn(async move {
            let (id, method, _) = recv_request(&mut server).await;
            assert_eq!(method, "GetState");
            send_frame(
                &mut server,
                RpcFrame::Response {
                    id,
                    result: json!({ "state": wire::state_to_wire(RuntimeState::Running) }),
                },
            )
            .await;
            server
        });

        assert_eq!(client.get_state().await, RuntimeState::Running);
        let _server = peer.await.unwrap();
        assert!(client.is_connected());
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_remote_invalid_argument_is_not_a_liveness_signal() {
        let (client, mut server, mut events, _) = client();

        let peer = tokio::spawn(async move {
            let (id, _, _) = recv_request(&mut server).await;
            send_frame(
                &mut server,
                RpcFrame::Error {
                    id,
                    status: RpcStatus::InvalidArgument,
                    message: "bad button".to_string(),
                },
            )
            .await;
            server
        });

        client
            .update_button_state(3, ButtonMask::Lamps, ButtonState::Blinking)
            .await;
        let _server = peer.await.unwrap();
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_scope_invalidation_fails_in_flight_calls() {
        let (client, mut server, mut events, scope) = client();

        let invalidate = tokio::spawn(async move {
            // Wait for the request so the call is really in flight
            let _ = recv_request(&mut server).await;
            scope.invalidate();
            server
        });

        let started = tokio::time::Instant::now();
        assert_eq!(client.get_state().await, RuntimeState::Initialization);
        assert!(started.elapsed() < Duration::from_secs(2));
        let _server = invalidate.await.unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            HostEvent::ProcessHung { pid: ProcessId(77) }
        );
    }

    #[tokio::test]
    async fn test_calls_after_shutdown_are_silent_no_ops() {
        let (client, mut server, mut events, _) = client();

        let peer = tokio::spawn(async move {
            let (id, method, _) = recv_request(&mut server).await;
            assert_eq!(method, "Shutdown");
            send_frame(&mut server, RpcFrame::Response { id, result: Value::Null }).await;
            // Game goes away right after acknowledging
        });

        client.shutdown().await;
        peer.await.unwrap();

        assert!(!client.is_connected());
        assert_eq!(client.get_state().await, RuntimeState::Initialization);
        assert!(!client.get_flag(RuntimeCondition::AllowGameRound).await);
        client.update_volume(0.5).await;
        client.reels_stopped().await;

        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_inbound_notifications_are_republished() {
        let (_client, mut server, mut events, _) = client();

        send_frame(
            &mut server,
            RpcFrame::Event {
                name: "stateChanged".to_string(),
                payload: json!({ "state": wire::state_to_wire(RuntimeState::Pause) }),
            },
        )
        .await;
        send_frame(
            &mut server,
            RpcFrame::Event {
                name: "exiting".to_string(),
                payload: Value::Null,
            },
        )
        .await;

        assert_eq!(
            events.recv().await.unwrap(),
            HostEvent::RuntimeStateChanged {
                pid: ProcessId(77),
                state: RuntimeState::Pause
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            HostEvent::RuntimeExiting { pid: ProcessId(77) }
        );
    }

    #[test]
    fn test_failure_classification() {
        let unavailable = RpcError::Status {
            status: RpcStatus::Unavailable,
            message: String::new(),
        };
        assert!(unavailable.presumed_dead(false));
        assert!(RpcError::DeadlineExceeded.presumed_dead(false));
        assert!(RpcError::Cancelled.presumed_dead(false));
        assert!(!RpcError::Cancelled.presumed_dead(true));
        assert!(!RpcError::Disposed.presumed_dead(false));
        assert!(!RpcError::Encode(String::new()).presumed_dead(false));
        assert!(!RpcError::Mapping(MappingError::new("RuntimeState", 0u32)).presumed_dead(false));
    }

    #[test]
    fn test_frame_wire_format() {
        let frame = RpcFrame::Error {
            id: 4,
            status: RpcStatus::DeadlineExceeded,
            message: "slow".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({ "type": "error", "id": 4, "status": "DEADLINE_EXCEEDED", "message": "slow" })
        );
    }
}
