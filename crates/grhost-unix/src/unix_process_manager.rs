#[cfg(unix)]
mod unix_impl {
    use anyhow::Result;
    use async_trait::async_trait;
    use grhost_core::{
        ProcessDiagnostics, ProcessHandle, ProcessId, ProcessLifecycle, ProcessManager,
        ProcessStatus, ProcessTermination, TerminationResult, process_name_matches,
    };
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid as NixPid;
    use parking_lot::Mutex;
    use std::time::Duration;
    use sysinfo::System;
    use tokio::process::{Child, Command};
    use tracing::{debug, info, warn};

    /// Time a process gets between SIGTERM and SIGKILL
    const KILL_GRACE: Duration = Duration::from_millis(500);

    /// Unix-specific process handle implementation
    pub struct UnixProcessHandle {
        child: Child,
        command: String,
        args: Vec<String>,
    }

    impl UnixProcessHandle {
        pub fn new(child: Child, command: String, args: Vec<String>) -> Self {
            Self {
                child,
                command,
                args,
            }
        }
    }

    #[async_trait]
    impl ProcessHandle for UnixProcessHandle {
        fn get_pid(&self) -> Option<ProcessId> {
            self.child.id().map(ProcessId::from)
        }

        fn get_command(&self) -> &str {
            &self.command
        }

        fn get_args(&self) -> &[String] {
            &self.args
        }

        async fn try_wait(&mut self) -> Result<Option<ProcessStatus>> {
            match self.child.try_wait()? {
                Some(status) => Ok(Some(ProcessStatus::Exited(status))),
                None => Ok(None),
            }
        }

        async fn wait(&mut self) -> Result<ProcessStatus> {
            let status = self.child.wait().await?;
            Ok(ProcessStatus::Exited(status))
        }
    }

    /// Unix process manager driving the runtime host through signals
    pub struct UnixProcessManager {
        system: Mutex<System>,
    }

    impl Default for UnixProcessManager {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ProcessLifecycle for UnixProcessManager {
        async fn spawn_process(
            &self,
            command: &Path,
            args: &[String],
            working_dir: Option<&Path>,
            env: &HashMap<String, String>,
        ) -> Result<Box<dyn ProcessHandle>, std::io::Error> {
            let mut cmd = Command::new(command);
            cmd.args(args);

            if let Some(dir) = working_dir {
                cmd.current_dir(dir);
            }

            for (key, value) in env {
                cmd.env(key, value);
            }

            // Own process group so the whole render host tree can be signalled
            cmd.process_group(0);

            let child = cmd.spawn()?;

            if let Some(pid) = child.id() {
                info!(
                    pid = %pid,
                    command = %command.display(),
                    args = ?args,
                    "Spawned runtime host process"
                );
            }

            Ok(Box::new(UnixProcessHandle::new(
                child,
                command.display().to_string(),
                args.to_vec(),
            )))
        }

        async fn find_processes_by_name(&self, filter: &str) -> Result<Vec<ProcessId>> {
            let mut system = self.system.lock();
            system.refresh_processes_specifics(
                sysinfo::ProcessesToUpdate::All,
                true,
                sysinfo::ProcessRefreshKind::default(),
            );

            let own_pid = std::process::id();
            let mut matches: Vec<ProcessId> = system
                .processes()
                .iter()
                .filter(|(pid, process)| {
                    pid.as_u32() != own_pid
                        && process_name_matches(&process.name().to_string_lossy(), filter)
                })
                .map(|(pid, _)| ProcessId(pid.as_u32()))
                .collect();
            matches.sort();

            debug!(filter, count = matches.len(), "Scanned process table");
            Ok(matches)
        }

        async fn is_running(&self, pid: ProcessId) -> bool {
            match signal::kill(NixPid::from_raw(pid.0 as i32), None) {
                Ok(()) => true,
                Err(nix::errno::Errno::EPERM) => true,
                Err(_) => false,
            }
        }
    }

    #[async_trait]
    impl ProcessTermination for UnixProcessManager {
        async fn terminate_gracefully(&self, pid: ProcessId) -> TerminationResult {
            Self::send_signal(pid, Signal::SIGTERM)
        }

        async fn force_kill(&self, pid: ProcessId) -> TerminationResult {
            Self::send_signal(pid, Signal::SIGKILL)
        }

        async fn find_child_processes(&self, parent_pid: ProcessId) -> Result<Vec<ProcessId>> {
            let mut system = self.system.lock();
            system.refresh_processes_specifics(
                sysinfo::ProcessesToUpdate::All,
                true,
                sysinfo::ProcessRefreshKind::default(),
            );

            let mut children = Vec::new();
            Self::find_children_recursive(&system, parent_pid.0, &mut children);

            Ok(children.into_iter().map(ProcessId::from).collect())
        }

        async fn terminate_process_tree(&self, root_pid: ProcessId) -> TerminationResult {
            info!(root_pid = %root_pid, "Terminating process tree");

            let children = match self.find_child_processes(root_pid).await {
                Ok(children) => children,
                Err(e) => {
                    warn!(root_pid = %root_pid, error = %e, "Failed to find child processes");
                    return TerminationResult::Failed(format!("Failed to enumerate children: {e}"));
                }
            };

            if !children.is_empty() {
                info!(count = children.len(), "Terminating child processes");

                // Descendants were collected deepest first
                for child_pid in &children {
                    match self.terminate_with_escalation(*child_pid, KILL_GRACE).await {
                        TerminationResult::Success | TerminationResult::ProcessNotFound => {}
                        result => {
                            warn!(pid = %child_pid, result = ?result, "Failed to terminate child process");
                        }
                    }
                }
            }

            self.terminate_with_escalation(root_pid, KILL_GRACE).await
        }
    }

    #[async_trait]
    impl ProcessDiagnostics for UnixProcessManager {
        async fn create_mini_dump(&self, pid: ProcessId, dir: &Path) -> Result<PathBuf> {
            tokio::fs::create_dir_all(dir).await?;
            let prefix = dir.join("runtime-host");

            // gcore writes `<prefix>.<pid>`
            let output = Command::new("gcore")
                .arg("-o")
                .arg(&prefix)
                .arg(pid.0.to_string())
                .output()
                .await
                .map_err(|e| anyhow::anyhow!("failed to run gcore: {e}"))?;

            if !output.status.success() {
                return Err(anyhow::anyhow!(
                    "gcore failed for pid {pid}: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ));
            }

            let dump = dir.join(format!("runtime-host.{pid}"));
            info!(pid = %pid, dump = %dump.display(), "Core dump written");
            Ok(dump)
        }
    }

    impl UnixProcessManager {
        fn send_signal(pid: ProcessId, sig: Signal) -> TerminationResult {
            match signal::kill(NixPid::from_raw(pid.0 as i32), sig) {
                Ok(()) => {
                    info!(pid = %pid, signal = %sig, "Signal sent");
                    TerminationResult::Success
                }
                Err(nix::errno::Errno::ESRCH) => {
                    debug!(pid = %pid, "Process not found (already terminated)");
                    TerminationResult::ProcessNotFound
                }
                Err(nix::errno::Errno::EPERM) => {
                    warn!(pid = %pid, signal = %sig, "Permission denied");
                    TerminationResult::AccessDenied
                }
                Err(e) => {
                    warn!(pid = %pid, signal = %sig, error = %e, "Failed to send signal");
                    TerminationResult::Failed(format!("{sig} failed: {e}"))
                }
            }
        }

        /// Recursively find all child processes
        fn find_children_recursive(system: &System, parent_pid: u32, result: &mut Vec<u32>) {
            for (pid, process) in system.processes() {
                #[allow(clippy::collapsible_if)]
                if let Some(ppid) = process.parent() {
                    if ppid.as_u32() == parent_pid {
                        let child_pid = pid.as_u32();
                        // Grandchildren first
                        Self::find_children_recursive(system, child_pid, result);
                        result.push(child_pid);
                    }
                }
            }
        }
    }

    impl ProcessManager for UnixProcessManager {
        fn new() -> Self {
            info!("Initializing Unix process manager with system monitoring");
            Self {
                system: Mutex::new(System::new_all()),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_spawn_wait_and_liveness() {
            let manager = UnixProcessManager::new();
            let mut handle = manager
                .spawn_process(
                    Path::new("/bin/sh"),
                    &["-c".to_string(), "exit 3".to_string()],
                    None,
                    &HashMap::new(),
                )
                .await
                .unwrap();

            let pid = handle.get_pid().unwrap();
            assert_eq!(handle.get_command(), "/bin/sh");
            match handle.wait().await.unwrap() {
                ProcessStatus::Exited(status) => assert_eq!(status.code(), Some(3)),
                other => panic!("unexpected status {other:?}"),
            }
            assert!(!manager.is_running(pid).await);
        }

        #[tokio::test]
        async fn test_spawn_missing_binary_fails() {
            let manager = UnixProcessManager::new();
            let result = manager
                .spawn_process(
                    Path::new("/nonexistent/GameRenderHost"),
                    &[],
                    None,
                    &HashMap::new(),
                )
                .await;
            assert!(result.is_err());
        }

        #[tokio::test]
        async fn test_terminate_process_tree_kills_sleeper() {
            let manager = UnixProcessManager::new();
            let mut handle = manager
                .spawn_process(
                    Path::new("/bin/sh"),
                    &["-c".to_string(), "sleep 30".to_string()],
                    None,
                    &HashMap::new(),
                )
                .await
                .unwrap();
            let pid = handle.get_pid().unwrap();

            let result = manager.terminate_process_tree(pid).await;
            assert_eq!(result, TerminationResult::Success);

            let status = tokio::time::timeout(Duration::from_secs(5), handle.wait())
                .await
                .unwrap()
                .unwrap();
            assert!(matches!(status, ProcessStatus::Exited(_)));
        }

        #[tokio::test]
        async fn test_signal_to_missing_process() {
            let manager = UnixProcessManager::new();
            // Above the default pid_max
            let result = manager.terminate_gracefully(ProcessId(4_194_305)).await;
            assert_eq!(result, TerminationResult::ProcessNotFound);
        }
    }
}

#[cfg(unix)]
pub use unix_impl::{UnixProcessHandle, UnixProcessManager};

#[cfg(not(unix))]
pub struct UnixProcessHandle;

#[cfg(not(unix))]
pub struct UnixProcessManager;

#[cfg(not(unix))]
impl UnixProcessManager {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(unix))]
impl Default for UnixProcessManager {
    fn default() -> Self {
        Self::new()
    }
}
