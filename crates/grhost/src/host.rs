use crate::factory::create_process_manager;
use crate::package::{ImageMounter, RuntimePackageProvider, SystemImageMounter};
use crate::supervisor::ProcessSupervisor;
use crate::transport::duplex::DuplexListener;
use crate::transport::pipe::PipeClient;
use crate::transport::rpc::RpcClient;
use crate::transport::{EndpointSet, TransportContext};
use grhost_core::{
    CancellationScope, EventBus, HostConfig, HostError, HostEvent, LaunchSpec, ProcessId,
    ProcessManager, RuntimeProxy, TransportConfig,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Supervises one game render host and the runtime channel to it
pub struct GameHost {
    config: HostConfig,
    events: EventBus,
    supervisor: ProcessSupervisor,
    endpoints: EndpointSet,
    scope: Arc<CancellationScope>,
    proxy: RuntimeProxy,
    packages: tokio::sync::Mutex<RuntimePackageProvider>,
    current: Mutex<Option<ProcessId>>,
    listener: JoinHandle<()>,
}

impl GameHost {
    /// Build a host with the platform process manager and system image mounter.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: HostConfig) -> Result<Self, HostError> {
        Self::with_parts(config, create_process_manager(), Arc::new(SystemImageMounter))
    }

    pub fn with_parts(
        config: HostConfig,
        manager: Arc<dyn ProcessManager>,
        mounter: Arc<dyn ImageMounter>,
    ) -> Result<Self, HostError> {
        config
            .validate()
            .map_err(|e| HostError::configuration_error(e.to_string()))?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            HostError::configuration_error("GameHost requires a running tokio runtime")
        })?;

        let events = EventBus::default();
        let supervisor = ProcessSupervisor::new(
            manager,
            events.clone(),
            config.process_name_filter.clone(),
            config.termination_timeout(),
        );

        let endpoints = EndpointSet::default();
        let scope = Arc::new(CancellationScope::new());
        supervisor.add_exit_hook(scope.clone());
        supervisor.add_exit_hook(endpoints.runtime.clone());
        supervisor.add_exit_hook(endpoints.reels.clone());
        supervisor.add_exit_hook(endpoints.presentation.clone());

        let proxy = RuntimeProxy::new(
            endpoints.runtime.clone(),
            endpoints.reels.clone(),
            endpoints.presentation.clone(),
        );
        let listener = runtime.spawn(watch_runtime_notifications(
            events.subscribe(),
            supervisor.clone(),
        ));
        let packages = RuntimePackageProvider::new(config.packages.clone(), mounter);

        info!(transport = config.transport.name(), "Game host created");
        Ok(Self {
            config,
            events,
            supervisor,
            endpoints,
            scope,
            proxy,
            packages: tokio::sync::Mutex::new(packages),
            current: Mutex::new(None),
            listener,
        })
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }

    pub fn proxy(&self) -> &RuntimeProxy {
        &self.proxy
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    pub fn packages(&self) -> &tokio::sync::Mutex<RuntimePackageProvider> {
        &self.packages
    }

    /// Process currently owned by this host, if it is still alive
    pub fn current_process(&self) -> Option<ProcessId> {
        let current = *self.current.lock();
        current.filter(|pid| self.supervisor.is_tracked(*pid))
    }

    /// Start the game render host and connect the runtime channel.
    ///
    /// If the channel cannot be established the process is ended without an
    /// exit notification.
    pub async fn launch(&self, spec: &LaunchSpec) -> Result<ProcessId, HostError> {
        if let Some(pid) = self.current_process() {
            return Err(HostError::process_error(format!(
                "runtime host {pid} is still running"
            )));
        }

        let pid = match &self.config.transport {
            TransportConfig::Duplex { endpoint } => {
                // Listen before launch; the game dials in as soon as it starts
                let listener = DuplexListener::bind(endpoint).await?;
                let pid = self.start(spec).await?;
                match listener.accept(self.context(pid)).await {
                    Ok(client) => self.endpoints.register(Arc::new(client)),
                    Err(e) => return Err(self.abandon(pid, e).await),
                }
                pid
            }
            TransportConfig::Rpc { endpoint } => {
                let pid = self.start(spec).await?;
                match RpcClient::connect(endpoint, self.context(pid)).await {
                    Ok(client) => self.endpoints.register(Arc::new(client)),
                    Err(e) => return Err(self.abandon(pid, e).await),
                }
                pid
            }
            TransportConfig::Pipe { name } => {
                let pid = self.start(spec).await?;
                match PipeClient::connect(name, self.context(pid)).await {
                    Ok(client) => self.endpoints.register(Arc::new(client)),
                    Err(e) => return Err(self.abandon(pid, e).await),
                }
                pid
            }
        };

        // The exit hooks may have run before the endpoint was registered
        if !self.supervisor.is_tracked(pid) {
            self.endpoints.runtime.clear_for(pid);
            self.endpoints.reels.clear_for(pid);
            self.endpoints.presentation.clear_for(pid);
            return Err(HostError::process_error(format!(
                "runtime host {pid} exited while connecting"
            )));
        }

        *self.current.lock() = Some(pid);
        info!(pid = %pid, transport = self.config.transport.name(), "Runtime host launched");
        Ok(pid)
    }

    async fn start(&self, spec: &LaunchSpec) -> Result<ProcessId, HostError> {
        self.supervisor.start_process(spec).await.ok_or_else(|| {
            HostError::process_error(format!(
                "failed to start {}",
                spec.runtime_host.display()
            ))
        })
    }

    async fn abandon(&self, pid: ProcessId, cause: HostError) -> HostError {
        error!(pid = %pid, error = %cause, "Runtime channel not established, ending runtime host");
        self.supervisor.end_process(pid, false, true).await;
        cause
    }

    fn context(&self, pid: ProcessId) -> TransportContext {
        TransportContext {
            pid,
            events: self.events.clone(),
            scope: self.scope.clone(),
            call_timeout: self.config.call_timeout(),
            connect_timeout: self.config.connect_timeout(),
            retry: self.config.connect_retry.clone(),
        }
    }

    /// End the current runtime host as an expected exit
    pub async fn terminate(&self, notify_exited: bool) {
        let Some(pid) = self.current.lock().take() else {
            debug!("No runtime host to terminate");
            return;
        };
        self.supervisor.end_process(pid, notify_exited, true).await;
        self.endpoints.runtime.clear_for(pid);
        self.endpoints.reels.clear_for(pid);
        self.endpoints.presentation.clear_for(pid);
    }

    /// End runtime hosts left behind by an earlier platform instance.
    ///
    /// Returns how many were found.
    pub async fn kill_orphans(&self) -> usize {
        let orphans: Vec<ProcessId> = self
            .supervisor
            .running_processes()
            .await
            .into_iter()
            .filter(|pid| !self.supervisor.is_tracked(*pid))
            .collect();

        for pid in &orphans {
            warn!(pid = %pid, "Ending orphaned runtime host");
            self.supervisor.end_process(*pid, false, true).await;
        }
        orphans.len()
    }
}

impl Drop for GameHost {
    fn drop(&mut self) {
        self.listener.abort();
        self.endpoints.clear();
    }
}

/// Turn `RuntimeExiting` announcements into expected exits
async fn watch_runtime_notifications(
    mut events: broadcast::Receiver<HostEvent>,
    supervisor: ProcessSupervisor,
) {
    loop {
        match events.recv().await {
            Ok(HostEvent::RuntimeExiting { pid }) => {
                if supervisor.exiting_for(pid) {
                    info!(pid = %pid, "Runtime host is exiting on its own");
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Host event listener lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grhost_core::{HostConfigBuilder, RetryConfig};

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = HostConfigBuilder::default()
            .call_timeout_ms(0u64)
            .build()
            .unwrap();
        assert!(matches!(
            GameHost::new(config),
            Err(HostError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_requires_runtime() {
        assert!(matches!(
            GameHost::new(HostConfig::default()),
            Err(HostError::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_start_leaves_host_idle() {
        let config = HostConfigBuilder::default()
            .connect_retry(RetryConfig::no_retry())
            .build()
            .unwrap();
        let host = GameHost::new(config).unwrap();
        let mut events = host.subscribe();

        let spec = LaunchSpec::builder()
            .runtime_host("/nonexistent/GameRenderHost")
            .build()
            .unwrap();
        assert!(matches!(
            host.launch(&spec).await,
            Err(HostError::ProcessError(_))
        ));

        assert!(host.current_process().is_none());
        assert!(!host.proxy().is_connected());
        assert!(events.try_recv().is_err());
        host.terminate(true).await;
    }
}
