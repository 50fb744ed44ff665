use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Retry settings used while establishing a transport connection to a freshly
/// launched game render host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Minimum delay between connection attempts (in milliseconds)
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Maximum delay between connection attempts (in milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Total number of attempts (1 means a single attempt, no retries)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Whether to use exponential backoff (true) or fixed delay (false)
    #[serde(default = "default_use_exponential_backoff")]
    pub use_exponential_backoff: bool,

    /// Whether to randomize delays
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            use_exponential_backoff: default_use_exponential_backoff(),
            jitter: default_jitter(),
        }
    }
}

impl RetryConfig {
    /// A single connection attempt, no retries
    pub fn no_retry() -> Self {
        Self {
            min_delay_ms: 0,
            max_delay_ms: 0,
            max_attempts: 1,
            use_exponential_backoff: false,
            jitter: false,
        }
    }

    /// Validate the configuration and return errors if invalid
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_delay_ms > self.max_delay_ms {
            return Err(anyhow::anyhow!(
                "min_delay_ms cannot be greater than max_delay_ms"
            ));
        }

        if self.max_attempts == 0 {
            return Err(anyhow::anyhow!("max_attempts must be at least 1"));
        }

        if self.max_attempts > 50 {
            return Err(anyhow::anyhow!(
                "max_attempts should not exceed 50 to bound launch time"
            ));
        }

        if self.max_delay_ms > 60_000 {
            return Err(anyhow::anyhow!("max_delay_ms should not exceed 60 seconds"));
        }

        Ok(())
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Number of retries after the first attempt
    pub fn retries(&self) -> usize {
        self.max_attempts.saturating_sub(1) as usize
    }
}

/// A local socket address the platform and the game process rendezvous on
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LocalEndpoint {
    /// Loopback TCP socket
    Tcp(SocketAddr),
    /// Unix domain socket path (Unix only)
    Unix(PathBuf),
}

impl Default for LocalEndpoint {
    fn default() -> Self {
        LocalEndpoint::Tcp(SocketAddr::from((Ipv4Addr::LOCALHOST, 50051)))
    }
}

impl std::fmt::Display for LocalEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocalEndpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
            LocalEndpoint::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// Which wire mechanism carries the runtime channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum TransportConfig {
    /// Multiplexed request/response RPC; the platform connects to the game
    Rpc { endpoint: LocalEndpoint },
    /// Legacy duplex callback session; the game connects to the platform
    Duplex { endpoint: LocalEndpoint },
    /// Stub protocol over a named pipe opened once by the platform
    Pipe { name: String },
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Rpc {
            endpoint: LocalEndpoint::default(),
        }
    }
}

impl TransportConfig {
    pub fn name(&self) -> &'static str {
        match self {
            TransportConfig::Rpc { .. } => "rpc",
            TransportConfig::Duplex { .. } => "duplex",
            TransportConfig::Pipe { .. } => "pipe",
        }
    }
}

/// Where runtime packages live and how they are mounted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PackageConfig {
    #[serde(default = "default_packages_dir")]
    pub packages_dir: PathBuf,

    /// Root under which every package gets a private mount directory
    #[serde(default = "default_mount_root")]
    pub mount_root: PathBuf,

    /// File extension of runtime package images, without the dot
    #[serde(default = "default_package_extension")]
    pub extension: String,

    /// File name of the runtime host executable inside a mounted package
    #[serde(default = "default_host_binary")]
    pub host_binary: String,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            packages_dir: default_packages_dir(),
            mount_root: default_mount_root(),
            extension: default_package_extension(),
            host_binary: default_host_binary(),
        }
    }
}

/// Main host configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Builder)]
#[serde(rename_all = "camelCase")]
#[builder(setter(into), default)]
pub struct HostConfig {
    #[serde(default)]
    pub transport: TransportConfig,

    /// Deadline applied to every call on the runtime channel
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Deadline for a single connection attempt
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// How long `end_process` waits for the OS to confirm an unnotified exit
    #[serde(default = "default_termination_timeout_ms")]
    pub termination_timeout_ms: u64,

    /// Process name fragment identifying runtime host processes
    #[serde(default = "default_process_name_filter")]
    pub process_name_filter: String,

    #[serde(default)]
    pub connect_retry: RetryConfig,

    #[serde(default)]
    pub packages: PackageConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            call_timeout_ms: default_call_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            termination_timeout_ms: default_termination_timeout_ms(),
            process_name_filter: default_process_name_filter(),
            connect_retry: RetryConfig::default(),
            packages: PackageConfig::default(),
        }
    }
}

impl HostConfig {
    pub fn builder() -> HostConfigBuilder {
        HostConfigBuilder::default()
    }

    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        let config: HostConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.connect_retry.validate()?;

        if self.call_timeout_ms == 0 {
            return Err(anyhow::anyhow!("call_timeout_ms must be positive"));
        }

        if self.connect_timeout_ms == 0 {
            return Err(anyhow::anyhow!("connect_timeout_ms must be positive"));
        }

        if self.process_name_filter.trim().is_empty() {
            return Err(anyhow::anyhow!("process_name_filter must not be empty"));
        }

        if let TransportConfig::Pipe { name } = &self.transport {
            if name.is_empty() {
                return Err(anyhow::anyhow!("pipe name must not be empty"));
            }
        }

        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn termination_timeout(&self) -> Duration {
        Duration::from_millis(self.termination_timeout_ms)
    }
}

// Default value functions for serde
fn default_min_delay_ms() -> u64 {
    100
}
fn default_max_delay_ms() -> u64 {
    2_000
}
fn default_max_attempts() -> u32 {
    20
}
fn default_use_exponential_backoff() -> bool {
    true
}
fn default_jitter() -> bool {
    true
}
fn default_call_timeout_ms() -> u64 {
    30_000
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_termination_timeout_ms() -> u64 {
    5_000
}
fn default_process_name_filter() -> String {
    "GameRenderHost".to_string()
}
fn default_packages_dir() -> PathBuf {
    PathBuf::from("packages")
}
fn default_mount_root() -> PathBuf {
    PathBuf::from("runtimes")
}
fn default_package_extension() -> String {
    "iso".to_string()
}
fn default_host_binary() -> String {
    if cfg!(windows) {
        "GameRenderHost.exe".to_string()
    } else {
        "GameRenderHost".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HostConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.call_timeout(), Duration::from_secs(30));
        assert_eq!(config.transport.name(), "rpc");
    }

    #[test]
    fn test_no_retry_config() {
        let config = RetryConfig::no_retry();
        assert!(config.validate().is_ok());
        assert_eq!(config.retries(), 0);
    }

    #[test]
    fn test_invalid_retry_config() {
        let mut config = RetryConfig {
            min_delay_ms: 1000,
            max_delay_ms: 500,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.min_delay_ms = 100;
        config.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_overrides() {
        let config = HostConfig::builder()
            .transport(TransportConfig::Pipe {
                name: "grhost-test".to_string(),
            })
            .call_timeout_ms(5_000u64)
            .build()
            .unwrap();

        assert_eq!(config.transport.name(), "pipe");
        assert_eq!(config.call_timeout_ms, 5_000);
        assert_eq!(config.process_name_filter, "GameRenderHost");
    }

    #[test]
    fn test_empty_pipe_name_rejected() {
        let config = HostConfig {
            transport: TransportConfig::Pipe {
                name: String::new(),
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_file_with_partial_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.json");
        std::fs::write(
            &path,
            r#"{
                "transport": { "kind": "duplex", "endpoint": { "tcp": "127.0.0.1:6100" } },
                "callTimeoutMs": 15000,
                "packages": { "packagesDir": "/opt/packages" }
            }"#,
        )
        .unwrap();

        let config = HostConfig::from_json_file(&path).unwrap();
        assert_eq!(config.call_timeout_ms, 15_000);
        assert_eq!(config.connect_timeout_ms, 10_000);
        assert_eq!(config.packages.packages_dir, PathBuf::from("/opt/packages"));
        assert_eq!(config.packages.extension, "iso");
        assert_eq!(
            config.transport,
            TransportConfig::Duplex {
                endpoint: LocalEndpoint::Tcp("127.0.0.1:6100".parse().unwrap()),
            }
        );
    }
}
