use crate::client::{PresentationClient, ReelClient, RuntimeClient};
use crate::endpoint::EndpointProvider;
use crate::runtime::{
    ButtonMask, ButtonState, JackpotNotice, Outcome, PresentationOverride, ReelState,
    RuntimeCondition, RuntimeState,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Stable entry point the rest of the platform calls.
///
/// Every call forwards to whatever endpoint is registered at the moment of the
/// call and degrades to a no-op (or the default result) when none is.
#[derive(Clone)]
pub struct RuntimeProxy {
    runtime: Arc<EndpointProvider<dyn RuntimeClient>>,
    reels: Arc<EndpointProvider<dyn ReelClient>>,
    presentation: Arc<EndpointProvider<dyn PresentationClient>>,
}

impl RuntimeProxy {
    pub fn new(
        runtime: Arc<EndpointProvider<dyn RuntimeClient>>,
        reels: Arc<EndpointProvider<dyn ReelClient>>,
        presentation: Arc<EndpointProvider<dyn PresentationClient>>,
    ) -> Self {
        Self {
            runtime,
            reels,
            presentation,
        }
    }

    fn runtime(&self, operation: &str) -> Option<Arc<dyn RuntimeClient>> {
        let client = self.runtime.client();
        if client.is_none() {
            debug!(operation, "No runtime endpoint connected");
        }
        client
    }

    fn reels(&self, operation: &str) -> Option<Arc<dyn ReelClient>> {
        let client = self.reels.client();
        if client.is_none() {
            debug!(operation, "No reel endpoint connected");
        }
        client
    }

    fn presentation(&self, operation: &str) -> Option<Arc<dyn PresentationClient>> {
        let client = self.presentation.client();
        if client.is_none() {
            debug!(operation, "No presentation endpoint connected");
        }
        client
    }

    pub fn is_connected(&self) -> bool {
        self.runtime
            .client()
            .is_some_and(|client| client.is_connected())
    }

    pub async fn update_state(&self, state: RuntimeState) {
        if let Some(client) = self.runtime("update_state") {
            client.update_state(state).await;
        }
    }

    pub async fn get_state(&self) -> RuntimeState {
        match self.runtime("get_state") {
            Some(client) => client.get_state().await,
            None => RuntimeState::default(),
        }
    }

    pub async fn update_flag(&self, condition: RuntimeCondition, value: bool) {
        if let Some(client) = self.runtime("update_flag") {
            client.update_flag(condition, value).await;
        }
    }

    pub async fn get_flag(&self, condition: RuntimeCondition) -> bool {
        match self.runtime("get_flag") {
            Some(client) => client.get_flag(condition).await,
            None => false,
        }
    }

    pub async fn update_button_state(&self, button_id: u32, mask: ButtonMask, state: ButtonState) {
        if let Some(client) = self.runtime("update_button_state") {
            client.update_button_state(button_id, mask, state).await;
        }
    }

    pub async fn update_volume(&self, level: f32) {
        if let Some(client) = self.runtime("update_volume") {
            client.update_volume(level.clamp(0.0, 1.0)).await;
        }
    }

    pub async fn update_balance(&self, credits: u64) {
        if let Some(client) = self.runtime("update_balance") {
            client.update_balance(credits).await;
        }
    }

    pub async fn update_platform_message(&self, messages: &[String]) {
        if let Some(client) = self.runtime("update_platform_message") {
            client.update_platform_message(messages).await;
        }
    }

    pub async fn update_parameters(&self, parameters: &HashMap<String, String>) {
        if let Some(client) = self.runtime("update_parameters") {
            client.update_parameters(parameters).await;
        }
    }

    pub async fn update_outcomes(&self, outcomes: &[Outcome]) {
        if let Some(client) = self.runtime("update_outcomes") {
            client.update_outcomes(outcomes).await;
        }
    }

    pub async fn jackpot_notification(&self, notice: &JackpotNotice) {
        if let Some(client) = self.runtime("jackpot_notification") {
            client.jackpot_notification(notice).await;
        }
    }

    pub async fn update_jackpot_values(&self, values: &HashMap<u32, u64>) {
        if let Some(client) = self.runtime("update_jackpot_values") {
            client.update_jackpot_values(values).await;
        }
    }

    pub async fn shutdown(&self) {
        if let Some(client) = self.runtime("shutdown") {
            client.shutdown().await;
        }
    }

    pub async fn update_reel_state(&self, states: &HashMap<u32, ReelState>) {
        if let Some(client) = self.reels("update_reel_state") {
            client.update_reel_state(states).await;
        }
    }

    pub async fn reels_stopped(&self) {
        if let Some(client) = self.reels("reels_stopped") {
            client.reels_stopped().await;
        }
    }

    pub async fn present_overridden(&self, overrides: &[PresentationOverride]) {
        if let Some(client) = self.presentation("present_overridden") {
            client.present_overridden(overrides).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Endpoint;
    use crate::process::ProcessId;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        calls: Mutex<Vec<String>>,
        flags: Mutex<HashMap<RuntimeCondition, bool>>,
    }

    impl Endpoint for RecordingClient {
        fn process_id(&self) -> ProcessId {
            ProcessId(5)
        }

        fn is_connected(&self) -> bool {
            true
        }

        fn dispose(&self) {}
    }

    #[async_trait]
    impl RuntimeClient for RecordingClient {
        async fn update_state(&self, state: RuntimeState) {
            self.calls.lock().push(format!("state:{state:?}"));
        }

        async fn get_state(&self) -> RuntimeState {
            RuntimeState::Running
        }

        async fn update_flag(&self, condition: RuntimeCondition, value: bool) {
            self.flags.lock().insert(condition, value);
        }

        async fn get_flag(&self, condition: RuntimeCondition) -> bool {
            self.flags.lock().get(&condition).copied().unwrap_or(false)
        }

        async fn update_button_state(&self, _: u32, _: ButtonMask, _: ButtonState) {}

        async fn update_volume(&self, level: f32) {
            self.calls.lock().push(format!("volume:{level}"));
        }

        async fn update_balance(&self, _: u64) {}

        async fn update_platform_message(&self, _: &[String]) {}

        async fn update_parameters(&self, _: &HashMap<String, String>) {}

        async fn update_outcomes(&self, _: &[Outcome]) {}

        async fn jackpot_notification(&self, _: &JackpotNotice) {}

        async fn update_jackpot_values(&self, _: &HashMap<u32, u64>) {}

        async fn shutdown(&self) {
            self.calls.lock().push("shutdown".to_string());
        }
    }

    fn proxy() -> (RuntimeProxy, Arc<EndpointProvider<dyn RuntimeClient>>) {
        let runtime = Arc::new(EndpointProvider::<dyn RuntimeClient>::new("runtime"));
        let proxy = RuntimeProxy::new(
            runtime.clone(),
            Arc::new(EndpointProvider::new("reels")),
            Arc::new(EndpointProvider::new("presentation")),
        );
        (proxy, runtime)
    }

    #[tokio::test]
    async fn test_unconnected_proxy_degrades_to_defaults() {
        let (proxy, _) = proxy();

        proxy.update_state(RuntimeState::Running).await;
        proxy.reels_stopped().await;
        proxy.shutdown().await;

        assert!(!proxy.is_connected());
        assert_eq!(proxy.get_state().await, RuntimeState::Initialization);
        assert!(!proxy.get_flag(RuntimeCondition::InLockup).await);
    }

    #[tokio::test]
    async fn test_forwards_to_registered_endpoint() {
        let (proxy, runtime) = proxy();
        let client = Arc::new(RecordingClient::default());
        runtime.add_or_update(client.clone());

        proxy.update_state(RuntimeState::Pause).await;
        proxy.update_flag(RuntimeCondition::InLockup, true).await;
        proxy.update_volume(3.5).await;

        assert!(proxy.is_connected());
        assert_eq!(proxy.get_state().await, RuntimeState::Running);
        assert!(proxy.get_flag(RuntimeCondition::InLockup).await);
        assert_eq!(
            *client.calls.lock(),
            vec!["state:Pause".to_string(), "volume:1".to_string()]
        );

        runtime.clear();
        assert!(!proxy.get_flag(RuntimeCondition::InLockup).await);
    }
}
