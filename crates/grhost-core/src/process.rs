use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Unique identifier for a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub u32);

impl From<u32> for ProcessId {
    fn from(value: u32) -> Self {
        ProcessId(value)
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a process after termination
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessStatus {
    /// Process is currently running
    Running,
    /// Process exited with status information
    Exited(std::process::ExitStatus),
    /// Process was terminated by a signal (Unix) or forcibly terminated (Windows)
    Terminated,
    /// Process status is unknown
    Unknown,
}

/// Result of a process termination operation
#[derive(Debug, Clone, PartialEq)]
pub enum TerminationResult {
    /// Process was successfully terminated
    Success,
    /// Process was not found (already exited)
    ProcessNotFound,
    /// Insufficient privileges
    AccessDenied,
    /// Operation failed with specific error message
    Failed(String),
}

/// Trait representing a handle to a spawned process
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// Get the process ID (None if process has exited and been reaped)
    fn get_pid(&self) -> Option<ProcessId>;

    /// Get the command that started this process
    fn get_command(&self) -> &str;

    /// Get the arguments passed to this process
    fn get_args(&self) -> &[String];

    /// Try to get exit status without blocking
    async fn try_wait(&mut self) -> Result<Option<ProcessStatus>>;

    /// Wait for the process to exit
    async fn wait(&mut self) -> Result<ProcessStatus>;
}

/// Process creation and discovery
#[async_trait]
pub trait ProcessLifecycle: Send + Sync {
    /// Spawn a new process with the given command and arguments.
    ///
    /// An `Err` means the OS refused to create the process.
    async fn spawn_process(
        &self,
        command: &Path,
        args: &[String],
        working_dir: Option<&Path>,
        env: &HashMap<String, String>,
    ) -> std::result::Result<Box<dyn ProcessHandle>, std::io::Error>;

    /// Find running processes whose executable name contains `filter` (case-insensitive)
    async fn find_processes_by_name(&self, filter: &str) -> Result<Vec<ProcessId>>;

    /// Check whether a process with the given id currently exists
    async fn is_running(&self, pid: ProcessId) -> bool;
}

/// Trait for comprehensive process termination including process trees
#[async_trait]
pub trait ProcessTermination: Send + Sync {
    /// Ask a single process to terminate (SIGTERM on Unix)
    async fn terminate_gracefully(&self, pid: ProcessId) -> TerminationResult;

    /// Force kill a single process (SIGKILL on Unix)
    async fn force_kill(&self, pid: ProcessId) -> TerminationResult;

    /// Find all child processes of a given process
    async fn find_child_processes(&self, pid: ProcessId) -> Result<Vec<ProcessId>>;

    /// Terminate an entire process tree (parent and all descendants)
    async fn terminate_process_tree(&self, root_pid: ProcessId) -> TerminationResult;

    /// Graceful termination escalating to a forced kill after `grace`
    async fn terminate_with_escalation(
        &self,
        pid: ProcessId,
        grace: Duration,
    ) -> TerminationResult {
        match self.terminate_gracefully(pid).await {
            TerminationResult::Success => {
                tokio::time::sleep(grace).await;
                match self.force_kill(pid).await {
                    TerminationResult::ProcessNotFound => TerminationResult::Success,
                    other => other,
                }
            }
            TerminationResult::ProcessNotFound => TerminationResult::ProcessNotFound,
            _ => self.force_kill(pid).await,
        }
    }
}

/// Diagnostics for a live process
#[async_trait]
pub trait ProcessDiagnostics: Send + Sync {
    /// Write a mini-dump of `pid` into `dir` and return the dump file path
    async fn create_mini_dump(&self, pid: ProcessId, dir: &Path) -> Result<PathBuf>;
}

/// Process manager combining lifecycle, termination and diagnostics
pub trait ProcessManager: ProcessLifecycle + ProcessTermination + ProcessDiagnostics {
    /// Create a new process manager instance
    fn new() -> Self
    where
        Self: Sized;
}

/// Factory trait for creating platform-specific process managers
pub trait ProcessManagerFactory {
    /// The type of process manager this factory creates
    type Manager: ProcessManager + 'static;

    /// Create a process manager for the current platform
    fn create_process_manager() -> Self::Manager;

    /// Get the platform name for logging and debugging
    fn platform_name() -> &'static str;
}

/// Case-insensitive match of a process name against a filter fragment
pub fn process_name_matches(name: &str, filter: &str) -> bool {
    name.to_lowercase().contains(&filter.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_name_matching() {
        assert!(process_name_matches("GameRenderHost.exe", "gamerenderhost"));
        assert!(process_name_matches("gamerenderhost", "GameRenderHost"));
        assert!(!process_name_matches("platform", "GameRenderHost"));
    }

    #[test]
    fn test_process_id_display() {
        assert_eq!(ProcessId::from(4242).to_string(), "4242");
    }
}
