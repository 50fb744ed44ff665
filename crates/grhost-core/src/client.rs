use crate::process::ProcessId;
use crate::runtime::{
    ButtonMask, ButtonState, JackpotNotice, Outcome, PresentationOverride, ReelState,
    RuntimeCondition, RuntimeState,
};
use async_trait::async_trait;
use std::collections::HashMap;

/// A live transport adapter connected to one game render host.
///
/// Every client role below extends this trait so an [`crate::EndpointProvider`]
/// can dispose whatever it holds.
pub trait Endpoint: Send + Sync {
    /// Process the endpoint talks to
    fn process_id(&self) -> ProcessId;

    /// Liveness probe; derived from transport state, never from a round trip
    fn is_connected(&self) -> bool;

    /// Release the transport. Idempotent.
    fn dispose(&self);
}

/// Commands, notifications and queries on the runtime channel.
///
/// Implementations never fail: a call that cannot be delivered returns the
/// default value for its result type.
#[async_trait]
pub trait RuntimeClient: Endpoint {
    async fn update_state(&self, state: RuntimeState);

    async fn get_state(&self) -> RuntimeState;

    async fn update_flag(&self, condition: RuntimeCondition, value: bool);

    async fn get_flag(&self, condition: RuntimeCondition) -> bool;

    async fn update_button_state(&self, button_id: u32, mask: ButtonMask, state: ButtonState);

    /// Master volume in the range `0.0..=1.0`
    async fn update_volume(&self, level: f32);

    /// Credit balance in millicents
    async fn update_balance(&self, credits: u64);

    async fn update_platform_message(&self, messages: &[String]);

    async fn update_parameters(&self, parameters: &HashMap<String, String>);

    async fn update_outcomes(&self, outcomes: &[Outcome]);

    async fn jackpot_notification(&self, notice: &JackpotNotice);

    async fn update_jackpot_values(&self, values: &HashMap<u32, u64>);

    /// Terminal: every later call on this client is a logged no-op
    async fn shutdown(&self);
}

/// Reel-notification channel
#[async_trait]
pub trait ReelClient: Endpoint {
    async fn update_reel_state(&self, states: &HashMap<u32, ReelState>);

    async fn reels_stopped(&self);
}

/// Presentation-override channel
#[async_trait]
pub trait PresentationClient: Endpoint {
    async fn present_overridden(&self, overrides: &[PresentationOverride]);
}
