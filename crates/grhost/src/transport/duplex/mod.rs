//! Legacy duplex session adapter.
//!
//! The platform listens and the game process dials in after start. Calls are
//! strictly sequential over one line-delimited JSON session; the game uses the
//! same session for `Exiting` and `StateChanged` callbacks.

mod session;
pub mod wire;

pub use session::{ChannelState, DuplexSession, FaultCode, SessionMessage};

use crate::transport::{LocalListener, TransportContext};
use async_trait::async_trait;
use grhost_core::{
    ButtonMask, ButtonState, CallFailure, CallPolicy, Endpoint, HostError, JackpotNotice,
    LocalEndpoint, MappingError, Outcome, PresentationClient, PresentationOverride, ProcessId,
    ReelClient, ReelState, RuntimeClient, RuntimeCondition, RuntimeState,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

const TRANSPORT: &str = "duplex";

#[derive(Debug, Clone, Error)]
pub enum DuplexFault {
    #[error("channel is {0:?}")]
    ChannelNotOpen(ChannelState),

    #[error("client disconnected")]
    Disconnected,

    #[error("communication failure: {0}")]
    Communication(String),

    #[error("call timed out")]
    Timeout,

    #[error("remote fault {code:?}: {reason}")]
    Remote { code: FaultCode, reason: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Mapping(#[from] MappingError),
}

impl CallFailure for DuplexFault {
    fn presumed_dead(&self, shutdown_requested: bool) -> bool {
        match self {
            DuplexFault::ChannelNotOpen(_) => !shutdown_requested,
            DuplexFault::Communication(_) | DuplexFault::Timeout => true,
            DuplexFault::Disconnected
            | DuplexFault::Remote { .. }
            | DuplexFault::Protocol(_)
            | DuplexFault::Mapping(_) => false,
        }
    }
}

/// Listening side of the duplex transport.
///
/// Bound before the game process starts so its first dial-in is never refused.
pub struct DuplexListener {
    listener: LocalListener,
}

impl DuplexListener {
    pub async fn bind(endpoint: &LocalEndpoint) -> Result<Self, HostError> {
        let listener = LocalListener::bind(endpoint)
            .await
            .map_err(|e| HostError::transport_error(format!("bind {endpoint}: {e}")))?;
        Ok(Self { listener })
    }

    pub fn local_endpoint(&self) -> Result<LocalEndpoint, HostError> {
        Ok(self.listener.local_endpoint()?)
    }

    /// Wait for the game process to open its session
    pub async fn accept(self, ctx: TransportContext) -> Result<DuplexClient, HostError> {
        let stream = tokio::time::timeout(ctx.connect_timeout, self.listener.accept())
            .await
            .map_err(|_| HostError::timeout("waiting for duplex session"))??;

        info!(pid = %ctx.pid, "Duplex session accepted");
        Ok(DuplexClient::from_stream(stream, ctx))
    }
}

/// Runtime channel client for the duplex transport
pub struct DuplexClient {
    session: DuplexSession,
    policy: CallPolicy,
    disconnected: AtomicBool,
    call_timeout: Duration,
}

impl DuplexClient {
    pub fn from_stream<S>(stream: S, ctx: TransportContext) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self {
            session: DuplexSession::open(stream, ctx.pid, ctx.events.clone()),
            policy: CallPolicy::new(TRANSPORT, ctx.pid, ctx.events),
            disconnected: AtomicBool::new(false),
            call_timeout: ctx.call_timeout,
        }
    }

    pub fn channel_state(&self) -> ChannelState {
        self.session.state()
    }

    async fn call(&self, operation: &str, body: Value) -> Result<Value, DuplexFault> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(DuplexFault::Disconnected);
        }
        self.session.call(operation, body, self.call_timeout).await
    }

    async fn send(&self, operation: &str, body: Value) -> Result<(), DuplexFault> {
        self.call(operation, body).await.map(|_| ())
    }

    async fn fetch_state(&self) -> Result<RuntimeState, DuplexFault> {
        let reply = self.call("GetState", Value::Null).await?;
        let ordinal = reply
            .get("state")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| DuplexFault::Protocol("GetState reply without a state".to_string()))?;
        Ok(wire::state_from_wire(ordinal)?)
    }

    async fn fetch_flag(&self, condition: RuntimeCondition) -> Result<bool, DuplexFault> {
        let reply = self
            .call(
                "GetFlag",
                json!({ "condition": wire::condition_to_wire(condition) }),
            )
            .await?;
        reply
            .get("value")
            .and_then(Value::as_bool)
            .ok_or_else(|| DuplexFault::Protocol("GetFlag reply without a value".to_string()))
    }
}

impl Endpoint for DuplexClient {
    fn process_id(&self) -> ProcessId {
        self.policy.pid()
    }

    fn is_connected(&self) -> bool {
        self.session.state() == ChannelState::Opened
            && !self.disconnected.load(Ordering::SeqCst)
            && !self.policy.is_shutdown_requested()
    }

    fn dispose(&self) {
        if !self.disconnected.swap(true, Ordering::SeqCst) {
            self.session.close();
        }
    }
}

#[async_trait]
impl RuntimeClient for DuplexClient {
    async fn update_state(&self, state: RuntimeState) {
        self.policy
            .invoke(
                "SetState",
                self.send("SetState", json!({ "state": wire::state_to_wire(state) })),
            )
            .await
    }

    async fn get_state(&self) -> RuntimeState {
        self.policy.invoke("GetState", self.fetch_state()).await
    }

    async fn update_flag(&self, condition: RuntimeCondition, value: bool) {
        self.policy
            .invoke(
                "SetFlag",
                self.send(
                    "SetFlag",
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
        let body = json!({
            "button": button_id,
            "mask": wire::button_mask_to_wire(mask),
            "state": wire::button_state_to_wire(state),
        });
        self.policy
            .invoke("ButtonStateChanged", self.send("ButtonStateChanged", body))
            .await
    }

    async fn update_volume(&self, level: f32) {
        self.policy
            .invoke("SetVolume", self.send("SetVolume", json!({ "level": level })))
            .await
    }

    async fn update_balance(&self, credits: u64) {
        self.policy
            .invoke(
                "SetBalance",
                self.send("SetBalance", json!({ "credits": credits })),
            )
            .await
    }

    async fn update_platform_message(&self, messages: &[String]) {
        self.policy
            .invoke(
                "SetPlatformMessage",
                self.send("SetPlatformMessage", json!({ "messages": messages })),
            )
            .await
    }

    async fn update_parameters(&self, parameters: &HashMap<String, String>) {
        self.policy
            .invoke(
                "SetParameters",
                self.send("SetParameters", json!({ "parameters": parameters })),
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
                "SetOutcomes",
                self.send("SetOutcomes", json!({ "outcomes": outcomes })),
            )
            .await
    }

    async fn jackpot_notification(&self, notice: &JackpotNotice) {
        let body = json!({
            "poolName": notice.pool_name,
            "levelId": notice.level_id,
            "amount": notice.amount,
        });
        self.policy
            .invoke("JackpotWin", self.send("JackpotWin", body))
            .await
    }

    async fn update_jackpot_values(&self, values: &HashMap<u32, u64>) {
        self.policy
            .invoke(
                "SetJackpotValues",
                self.send("SetJackpotValues", json!({ "values": values })),
            )
            .await
    }

    async fn shutdown(&self) {
        self.policy
            .invoke_shutdown(self.send("Shutdown", Value::Null))
            .await
    }
}

#[async_trait]
impl ReelClient for DuplexClient {
    async fn update_reel_state(&self, states: &HashMap<u32, ReelState>) {
        let reels: HashMap<u32, u32> = states
            .iter()
            .map(|(reel, state)| (*reel, wire::reel_state_to_wire(*state)))
            .collect();
        self.policy
            .invoke(
                "SetReelStates",
                self.send("SetReelStates", json!({ "reels": reels })),
            )
            .await
    }

    async fn reels_stopped(&self) {
        self.policy
            .invoke("ReelsStopped", self.send("ReelsStopped", Value::Null))
            .await
    }
}

#[async_trait]
impl PresentationClient for DuplexClient {
    async fn present_overridden(&self, overrides: &[PresentationOverride]) {
        let overrides: Vec<Value> = overrides
            .iter()
            .map(|o| json!({ "kind": wire::override_kind_to_wire(o.kind), "message": o.message }))
            .collect();
        self.policy
            .invoke(
                "PresentOverride",
                self.send("PresentOverride", json!({ "overrides": overrides })),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use grhost_core::{CancellationScope, EventBus, HostEvent, RetryConfig};
    use std::sync::Arc;
    use tokio::io::DuplexStream;
    use tokio::sync::broadcast;
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio_util::codec::{Framed, LinesCodec};

    type Peer = Framed<DuplexStream, LinesCodec>;

    fn context(call_timeout: Duration) -> (TransportContext, broadcast::Receiver<HostEvent>) {
        let events = EventBus::default();
        let receiver = events.subscribe();
        let ctx = TransportContext {
            pid: ProcessId(31),
            events,
            scope: Arc::new(CancellationScope::new()),
            call_timeout,
            connect_timeout: Duration::from_secs(2),
            retry: RetryConfig::no_retry(),
        };
        (ctx, receiver)
    }

    fn client_with_timeout(call_timeout: Duration) -> (DuplexClient, Peer, broadcast::Receiver<HostEvent>) {
        let (ctx, events) = context(call_timeout);
        let (client_io, game_io) = tokio::io::duplex(16 * 1024);
        let client = DuplexClient::from_stream(client_io, ctx);
        (client, Framed::new(game_io, LinesCodec::new()), events)
    }

    fn client() -> (DuplexClient, Peer, broadcast::Receiver<HostEvent>) {
        client_with_timeout(Duration::from_secs(2))
    }

    async fn recv_invoke(peer: &mut Peer) -> (u64, String, Value) {
        let line = peer.next().await.unwrap().unwrap();
        match serde_json::from_str(&line).unwrap() {
            SessionMessage::Invoke {
                seq,
                operation,
                body,
            } => (seq, operation, body),
            other => panic!("expected invoke, got {other:?}"),
        }
    }

    async fn send_message(peer: &mut Peer, message: SessionMessage) {
        peer.send(serde_json::to_string(&message).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_flag_reads_reply_body() {
        let (client, mut peer, mut events) = client();

        let game = tokio::spawn(async move {
            let (seq, operation, body) = recv_invoke(&mut peer).await;
            assert_eq!(operation, "GetFlag");
            assert_eq!(
                body["condition"],
                json!(wire::condition_to_wire(RuntimeCondition::InLockup))
            );
            send_message(
                &mut peer,
                SessionMessage::Reply {
                    seq,
                    body: json!({ "value": true }),
                },
            )
            .await;
            peer
        });

        assert!(client.get_flag(RuntimeCondition::InLockup).await);
        let _peer = game.await.unwrap();
        assert!(client.is_connected());
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_late_reply_is_not_taken_for_the_next_call() {
        let (client, mut peer, _events) = client_with_timeout(Duration::from_millis(100));

        let game = tokio::spawn(async move {
            let (first, _, _) = recv_invoke(&mut peer).await;
            tokio::time::sleep(Duration::from_millis(200)).await;
            send_message(
                &mut peer,
                SessionMessage::Reply {
                    seq: first,
                    body: json!({ "state": wire::state_to_wire(RuntimeState::Error) }),
                },
            )
            .await;

            let (second, _, _) = recv_invoke(&mut peer).await;
            send_message(
                &mut peer,
                SessionMessage::Reply {
                    seq: second,
                    body: json!({ "state": wire::state_to_wire(RuntimeState::Running) }),
                },
            )
            .await;
            peer
        });

        assert_eq!(client.get_state().await, RuntimeState::Initialization);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(client.get_state().await, RuntimeState::Running);
        let _peer = game.await.unwrap();
    }

    #[tokio::test]
    async fn test_queued_call_gets_its_own_timeout() {
        let (client, mut peer, mut events) = client_with_timeout(Duration::from_millis(400));

        let game = tokio::spawn(async move {
            for _ in 0..2 {
                let (seq, _, _) = recv_invoke(&mut peer).await;
                tokio::time::sleep(Duration::from_millis(300)).await;
                send_message(
                    &mut peer,
                    SessionMessage::Reply {
                        seq,
                        body: json!({ "value": true }),
                    },
                )
                .await;
            }
            peer
        });

        let (first, second) = tokio::join!(
            client.get_flag(RuntimeCondition::InLockup),
            client.get_flag(RuntimeCondition::CashingOut)
        );
        assert!(first && second);
        let _peer = game.await.unwrap();
        assert!(client.is_connected());
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_session_loss_raises_one_hung_event() {
        let (client, peer, mut events) = client();
        drop(peer);

        // Let the reader observe end of stream
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(client.channel_state(), ChannelState::Faulted);
        assert!(!client.is_connected());

        client.update_balance(10).await;
        client.reels_stopped().await;

        assert_eq!(
            events.recv().await.unwrap(),
            HostEvent::ProcessHung { pid: ProcessId(31) }
        );
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_remote_fault_is_not_a_liveness_signal() {
        let (client, mut peer, mut events) = client();

        let game = tokio::spawn(async move {
            let (seq, operation, _) = recv_invoke(&mut peer).await;
            assert_eq!(operation, "SetVolume");
            send_message(
                &mut peer,
                SessionMessage::Fault {
                    seq,
                    code: FaultCode::InvalidMessage,
                    reason: "volume out of range".to_string(),
                },
            )
            .await;
            peer
        });

        client.update_volume(0.25).await;
        let _peer = game.await.unwrap();
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_shutdown_then_session_close_is_silent() {
        let (client, mut peer, mut events) = client();

        let game = tokio::spawn(async move {
            let (seq, operation, _) = recv_invoke(&mut peer).await;
            assert_eq!(operation, "Shutdown");
            send_message(&mut peer, SessionMessage::Reply { seq, body: Value::Null }).await;
        });

        client.shutdown().await;
        game.await.unwrap();

        assert!(!client.is_connected());
        assert!(!client.get_flag(RuntimeCondition::AllowGameRound).await);
        client.update_state(RuntimeState::Pause).await;
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_disposed_client_is_quiet() {
        let (client, _peer, mut events) = client();

        client.dispose();
        client.dispose();

        assert!(!client.is_connected());
        assert_eq!(client.channel_state(), ChannelState::Closed);
        client.update_balance(1).await;
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_listener_accepts_session_and_forwards_callbacks() {
        let endpoint = LocalEndpoint::Tcp("127.0.0.1:0".parse().unwrap());
        let listener = DuplexListener::bind(&endpoint).await.unwrap();
        let bound = listener.local_endpoint().unwrap();
        let (ctx, mut events) = context(Duration::from_secs(2));

        let game = tokio::spawn(async move {
            let stream = crate::transport::connect_local(&bound).await.unwrap();
            let mut peer = Framed::new(stream, LinesCodec::new());
            for message in [
                SessionMessage::Callback {
                    name: "StateChanged".to_string(),
                    body: json!({ "state": wire::state_to_wire(RuntimeState::Recovery) }),
                },
                SessionMessage::Callback {
                    name: "Exiting".to_string(),
                    body: Value::Null,
                },
            ] {
                peer.send(serde_json::to_string(&message).unwrap())
                    .await
                    .unwrap();
            }
            peer
        });

        let client = listener.accept(ctx).await.unwrap();
        assert!(client.is_connected());
        assert_eq!(
            events.recv().await.unwrap(),
            HostEvent::RuntimeStateChanged {
                pid: ProcessId(31),
                state: RuntimeState::Recovery
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            HostEvent::RuntimeExiting { pid: ProcessId(31) }
        );
        let _peer = game.await.unwrap();
    }

    #[test]
    fn test_failure_classification() {
        assert!(DuplexFault::ChannelNotOpen(ChannelState::Faulted).presumed_dead(false));
        assert!(!DuplexFault::ChannelNotOpen(ChannelState::Closed).presumed_dead(true));
        assert!(DuplexFault::Timeout.presumed_dead(true));
        assert!(!DuplexFault::Disconnected.presumed_dead(false));
        assert!(
            !DuplexFault::Remote {
                code: FaultCode::ServerTooBusy,
                reason: String::new()
            }
            .presumed_dead(false)
        );
    }
}
