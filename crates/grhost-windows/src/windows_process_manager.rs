use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysinfo::System;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use grhost_core::*;

/// Time a process gets between a polite taskkill and a forced one
const KILL_GRACE: Duration = Duration::from_millis(1000);

/// Windows-specific process handle implementation
pub struct WindowsProcessHandle {
    child: Child,
    command: String,
    args: Vec<String>,
}

impl WindowsProcessHandle {
    pub fn new(child: Child, command: String, args: Vec<String>) -> Self {
        Self {
            child,
            command,
            args,
        }
    }
}

#[async_trait]
impl ProcessHandle for WindowsProcessHandle {
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

/// Windows process manager built on taskkill and the process snapshot
pub struct WindowsProcessManager {
    system: Mutex<System>,
}

impl Default for WindowsProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessLifecycle for WindowsProcessManager {
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

        #[cfg(windows)]
        {
            // CREATE_NO_WINDOW
            cmd.creation_flags(0x08000000);
        }

        let child = cmd.spawn()?;

        if let Some(pid) = child.id() {
            info!(
                pid = %pid,
                command = %command.display(),
                args = ?args,
                "Spawned runtime host process"
            );
        }

        Ok(Box::new(WindowsProcessHandle::new(
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
        let mut system = self.system.lock();
        let target = sysinfo::Pid::from_u32(pid.0);
        system.refresh_processes_specifics(
            sysinfo::ProcessesToUpdate::Some(&[target]),
            true,
            sysinfo::ProcessRefreshKind::default(),
        );
        system.process(target).is_some()
    }
}

#[async_trait]
impl ProcessTermination for WindowsProcessManager {
    async fn terminate_gracefully(&self, pid: ProcessId) -> TerminationResult {
        match self.taskkill(pid.0, false).await {
            Ok(true) => {
                info!(pid = %pid, "Sent graceful termination to process");
                TerminationResult::Success
            }
            Ok(false) => {
                debug!(pid = %pid, "Process not found for graceful termination");
                TerminationResult::ProcessNotFound
            }
            Err(e) => {
                warn!(pid = %pid, error = %e, "Failed to gracefully terminate process");
                TerminationResult::Failed(format!("Graceful termination failed: {e}"))
            }
        }
    }

    async fn force_kill(&self, pid: ProcessId) -> TerminationResult {
        match self.taskkill(pid.0, true).await {
            Ok(true) => {
                info!(pid = %pid, "Force killed process");
                TerminationResult::Success
            }
            Ok(false) => {
                debug!(pid = %pid, "Process not found for force kill");
                TerminationResult::ProcessNotFound
            }
            Err(e) => {
                warn!(pid = %pid, error = %e, "Failed to force kill process");
                TerminationResult::Failed(format!("Force kill failed: {e}"))
            }
        }
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

        match self.taskkill_tree(root_pid.0).await {
            Ok(true) => {
                info!(root_pid = %root_pid, "Terminated process tree");
                TerminationResult::Success
            }
            Ok(false) => {
                info!(root_pid = %root_pid, "Process tree not found");
                TerminationResult::ProcessNotFound
            }
            Err(e) => {
                warn!(root_pid = %root_pid, error = %e, "taskkill /T failed, walking the tree");

                let children = match self.find_child_processes(root_pid).await {
                    Ok(children) => children,
                    Err(e) => {
                        warn!(root_pid = %root_pid, error = %e, "Failed to find child processes");
                        return TerminationResult::Failed(format!(
                            "Failed to enumerate children: {e}"
                        ));
                    }
                };

                for child_pid in &children {
                    match self.terminate_with_escalation(*child_pid, KILL_GRACE).await {
                        TerminationResult::Success | TerminationResult::ProcessNotFound => {}
                        result => {
                            warn!(pid = %child_pid, result = ?result, "Failed to terminate child process");
                        }
                    }
                }

                self.terminate_with_escalation(root_pid, KILL_GRACE).await
            }
        }
    }
}

#[async_trait]
impl ProcessDiagnostics for WindowsProcessManager {
    async fn create_mini_dump(&self, pid: ProcessId, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let dump = dir.join(format!("GameRenderHost-{pid}.dmp"));

        let target = dump.clone();
        tokio::task::spawn_blocking(move || minidump::write(pid.0, &target))
            .await
            .map_err(|e| anyhow::anyhow!("mini-dump task failed: {e}"))??;

        info!(pid = %pid, dump = %dump.display(), "Mini-dump written");
        Ok(dump)
    }
}

impl WindowsProcessManager {
    /// Use taskkill to terminate a single process
    async fn taskkill(&self, pid: u32, force: bool) -> Result<bool> {
        let pid_string = pid.to_string();
        let mut args = vec!["/PID", &pid_string];
        if force {
            args.push("/F");
        }

        let output = Command::new("taskkill").args(&args).output().await?;

        Ok(output.status.success())
    }

    /// Use taskkill with /T to terminate a process tree
    async fn taskkill_tree(&self, pid: u32) -> Result<bool> {
        let output = Command::new("taskkill")
            .args(["/F", "/T", "/PID", &pid.to_string()])
            .output()
            .await?;

        Ok(output.status.success())
    }

    /// Recursively find all child processes
    fn find_children_recursive(system: &System, parent_pid: u32, result: &mut Vec<u32>) {
        for (pid, process) in system.processes() {
            #[allow(clippy::collapsible_if)]
            if let Some(ppid) = process.parent() {
                if ppid.as_u32() == parent_pid {
                    let child_pid = pid.as_u32();
                    Self::find_children_recursive(system, child_pid, result);
                    result.push(child_pid);
                }
            }
        }
    }
}

impl ProcessManager for WindowsProcessManager {
    fn new() -> Self {
        info!("Initializing Windows process manager with system monitoring");
        Self {
            system: Mutex::new(System::new_all()),
        }
    }
}

#[cfg(windows)]
mod minidump {
    use anyhow::Result;
    use std::fs::File;
    use std::os::windows::io::AsRawHandle;
    use std::path::Path;
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::System::Diagnostics::Debug::{MiniDumpWithFullMemory, MiniDumpWriteDump};
    use windows::Win32::System::Threading::{
        OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
    };

    pub fn write(pid: u32, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let file_handle = HANDLE(file.as_raw_handle());

        unsafe {
            let process = OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, false, pid)
                .map_err(|e| anyhow::anyhow!("OpenProcess({pid}) failed: {e}"))?;

            let written = MiniDumpWriteDump(
                process,
                pid,
                file_handle,
                MiniDumpWithFullMemory,
                None,
                None,
                None,
            );
            let _ = CloseHandle(process);
            written.map_err(|e| anyhow::anyhow!("MiniDumpWriteDump({pid}) failed: {e}"))?;
        }

        file.sync_all()?;
        Ok(())
    }
}

#[cfg(not(windows))]
mod minidump {
    use anyhow::Result;
    use std::path::Path;

    pub fn write(_pid: u32, _path: &Path) -> Result<()> {
        Err(anyhow::anyhow!("mini-dumps are only supported on Windows"))
    }
}
