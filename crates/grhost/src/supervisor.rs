use grhost_core::{
    EventBus, ExitHook, HostError, HostEvent, LaunchSpec, ProcessId, ProcessManager,
    TerminationResult,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// How the next observed exit of a process is classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ExitFlags {
    expected_exit: bool,
    notify: bool,
}

impl Default for ExitFlags {
    fn default() -> Self {
        Self {
            expected_exit: false,
            notify: true,
        }
    }
}

struct ProcessRecord {
    flags: ExitFlags,
    /// Flipped to `true` once the exit callback has finished
    exited: watch::Sender<bool>,
}

struct SupervisorInner {
    manager: Arc<dyn ProcessManager>,
    records: Mutex<HashMap<ProcessId, ProcessRecord>>,
    hooks: RwLock<Vec<Arc<dyn ExitHook>>>,
    events: EventBus,
    process_name_filter: String,
    termination_timeout: Duration,
}

/// Launches, tracks and terminates game render host processes.
///
/// Explicit termination and the asynchronously observed OS exit meet on one
/// lock: `end_process` writes the exit flags before it kills, and the exit
/// callback removes the record (and with it the flags) exactly once.
#[derive(Clone)]
pub struct ProcessSupervisor {
    inner: Arc<SupervisorInner>,
}

impl ProcessSupervisor {
    pub fn new(
        manager: Arc<dyn ProcessManager>,
        events: EventBus,
        process_name_filter: impl Into<String>,
        termination_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SupervisorInner {
                manager,
                records: Mutex::new(HashMap::new()),
                hooks: RwLock::new(Vec::new()),
                events,
                process_name_filter: process_name_filter.into(),
                termination_timeout,
            }),
        }
    }

    /// Register something that must react when a supervised process dies.
    ///
    /// Hooks run before the exit event is published.
    pub fn add_exit_hook(&self, hook: Arc<dyn ExitHook>) {
        self.inner.hooks.write().push(hook);
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Start the runtime host described by `spec`.
    ///
    /// Returns `None` when the OS refuses to create the process. No record is
    /// kept in that case, so no exit event can follow.
    pub async fn start_process(&self, spec: &LaunchSpec) -> Option<ProcessId> {
        let args = spec.args();
        info!(
            command = %spec.runtime_host.display(),
            command_line = %spec.command_line(),
            "Starting runtime host"
        );

        let handle = match self
            .inner
            .manager
            .spawn_process(
                &spec.runtime_host,
                &args,
                spec.working_directory.as_deref(),
                &spec.env,
            )
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                error!(
                    command = %spec.runtime_host.display(),
                    error = %e,
                    "Failed to start runtime host"
                );
                return None;
            }
        };

        let Some(pid) = handle.get_pid() else {
            error!(command = %spec.runtime_host.display(), "Runtime host exited before it could be tracked");
            return None;
        };

        {
            let (exited, _) = watch::channel(false);
            self.inner.records.lock().insert(
                pid,
                ProcessRecord {
                    flags: ExitFlags::default(),
                    exited,
                },
            );
        }

        let supervisor = self.clone();
        tokio::spawn(async move {
            let mut handle = handle;
            match handle.wait().await {
                Ok(status) => info!(pid = %pid, status = ?status, "Runtime host exited"),
                Err(e) => warn!(pid = %pid, error = %e, "Lost track of runtime host"),
            }
            supervisor.on_process_exited(pid);
        });

        info!(pid = %pid, "Runtime host started");
        Some(pid)
    }

    /// Terminate the process tree rooted at `pid`.
    ///
    /// The exit flags are written before the kill is issued. With
    /// `notify_exited == false` this returns only after the exit callback
    /// for `pid` has completed, or after the termination timeout.
    pub async fn end_process(&self, pid: ProcessId, notify_exited: bool, terminate_expected: bool) {
        let exited = {
            let mut records = self.inner.records.lock();
            records.get_mut(&pid).map(|record| {
                record.flags = ExitFlags {
                    expected_exit: terminate_expected,
                    notify: notify_exited,
                };
                record.exited.subscribe()
            })
        };

        if exited.is_none() {
            warn!(pid = %pid, "Ending a process that is not tracked");
        }

        info!(
            pid = %pid,
            notify = notify_exited,
            expected = terminate_expected,
            "Ending runtime host"
        );
        match self.inner.manager.terminate_process_tree(pid).await {
            TerminationResult::Success | TerminationResult::ProcessNotFound => {}
            result => warn!(pid = %pid, result = ?result, "Runtime host termination reported a problem"),
        }

        if notify_exited {
            return;
        }

        if let Some(mut exited) = exited {
            let confirmed = tokio::time::timeout(self.inner.termination_timeout, async {
                exited.wait_for(|done| *done).await.map(|_| ())
            })
            .await;

            match confirmed {
                Ok(Ok(())) => debug!(pid = %pid, "Exit confirmed"),
                Ok(Err(_)) => debug!(pid = %pid, "Exit record dropped"),
                Err(_) => warn!(
                    pid = %pid,
                    timeout_ms = self.inner.termination_timeout.as_millis() as u64,
                    "Timed out waiting for runtime host exit"
                ),
            }
        }
    }

    /// The game process is shutting itself down; the next exit is expected
    pub fn exiting(&self) {
        let mut records = self.inner.records.lock();
        for (pid, record) in records.iter_mut() {
            debug!(pid = %pid, "Marking exit as expected");
            record.flags.expected_exit = true;
        }
    }

    /// `pid` announced its own shutdown; only its next exit is expected.
    ///
    /// Returns false when `pid` is not tracked.
    pub fn exiting_for(&self, pid: ProcessId) -> bool {
        match self.inner.records.lock().get_mut(&pid) {
            Some(record) => {
                debug!(pid = %pid, "Marking exit as expected");
                record.flags.expected_exit = true;
                true
            }
            None => false,
        }
    }

    /// OS processes that look like runtime hosts, tracked or not
    pub async fn running_processes(&self) -> Vec<ProcessId> {
        match self
            .inner
            .manager
            .find_processes_by_name(&self.inner.process_name_filter)
            .await
        {
            Ok(pids) => pids,
            Err(e) => {
                warn!(filter = %self.inner.process_name_filter, error = %e, "Failed to enumerate processes");
                Vec::new()
            }
        }
    }

    pub async fn create_mini_dump(&self, pid: ProcessId, dir: &Path) -> Result<PathBuf, HostError> {
        info!(pid = %pid, dir = %dir.display(), "Creating mini-dump");
        Ok(self.inner.manager.create_mini_dump(pid, dir).await?)
    }

    pub fn is_tracked(&self, pid: ProcessId) -> bool {
        self.inner.records.lock().contains_key(&pid)
    }

    pub fn tracked_processes(&self) -> Vec<ProcessId> {
        let mut pids: Vec<ProcessId> = self.inner.records.lock().keys().copied().collect();
        pids.sort();
        pids
    }

    /// Consume the OS exit notification for `pid`.
    ///
    /// The first call for a given process removes its record, runs the exit
    /// hooks and publishes at most one event. Later calls are no-ops.
    pub fn on_process_exited(&self, pid: ProcessId) {
        let Some(record) = self.inner.records.lock().remove(&pid) else {
            debug!(pid = %pid, "Exit already handled");
            return;
        };

        let hooks = self.inner.hooks.read().clone();
        for hook in &hooks {
            hook.on_process_exited(pid);
        }

        let unexpected = !record.flags.expected_exit;
        if record.flags.notify {
            if unexpected {
                error!(pid = %pid, "Runtime host exited unexpectedly");
            } else {
                info!(pid = %pid, "Runtime host exited as expected");
            }
            self.inner
                .events
                .publish(HostEvent::ProcessExited { pid, unexpected });
        } else {
            debug!(pid = %pid, "Exit notification suppressed");
        }

        record.exited.send_replace(true);
    }
}
