use crate::events::{EventBus, HostEvent};
use crate::process::ProcessId;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// Per-transport classification of a failed call
pub trait CallFailure: std::fmt::Display {
    /// True when the failure means the remote process should be presumed dead.
    ///
    /// Cancellation caused by an application-initiated shutdown must not count.
    fn presumed_dead(&self, shutdown_requested: bool) -> bool;
}

/// Invocation policy shared by every transport adapter.
///
/// 1. Once shutdown was requested, calls are skipped and return their default.
/// 2. A presumed-dead failure publishes [`HostEvent::ProcessHung`] and defaults.
/// 3. Any other failure is logged and defaults.
pub struct CallPolicy {
    transport: &'static str,
    pid: ProcessId,
    events: EventBus,
    shutdown_requested: AtomicBool,
    hung_reported: AtomicBool,
}

impl CallPolicy {
    pub fn new(transport: &'static str, pid: ProcessId, events: EventBus) -> Self {
        Self {
            transport,
            pid,
            events,
            shutdown_requested: AtomicBool::new(false),
            hung_reported: AtomicBool::new(false),
        }
    }

    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    pub fn transport(&self) -> &'static str {
        self.transport
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub async fn invoke<T, E, F>(&self, operation: &str, call: F) -> T
    where
        T: Default,
        E: CallFailure,
        F: Future<Output = Result<T, E>>,
    {
        if self.is_shutdown_requested() {
            info!(
                transport = self.transport,
                pid = %self.pid,
                operation,
                "Shutdown requested, skipping call"
            );
            return T::default();
        }

        match call.await {
            Ok(value) => value,
            Err(e) => {
                self.on_failure(operation, &e);
                T::default()
            }
        }
    }

    /// Mark the client as shut down and deliver the shutdown call itself.
    ///
    /// Failures of the shutdown call are logged only; the remote was asked to go away.
    pub async fn invoke_shutdown<E, F>(&self, call: F)
    where
        E: CallFailure,
        F: Future<Output = Result<(), E>>,
    {
        if self.shutdown_requested.swap(true, Ordering::SeqCst) {
            info!(
                transport = self.transport,
                pid = %self.pid,
                "Shutdown already requested"
            );
            return;
        }

        match call.await {
            Ok(()) => debug!(transport = self.transport, pid = %self.pid, "Shutdown delivered"),
            Err(e) => warn!(
                transport = self.transport,
                pid = %self.pid,
                error = %e,
                "Shutdown call failed"
            ),
        }
    }

    fn on_failure<E: CallFailure>(&self, operation: &str, failure: &E) {
        if failure.presumed_dead(self.is_shutdown_requested()) {
            error!(
                transport = self.transport,
                pid = %self.pid,
                operation,
                error = %failure,
                "Runtime channel presumed dead"
            );
            if !self.hung_reported.swap(true, Ordering::SeqCst) {
                self.events.publish(HostEvent::ProcessHung { pid: self.pid });
            }
        } else {
            warn!(
                transport = self.transport,
                pid = %self.pid,
                operation,
                error = %failure,
                "Runtime call failed"
            );
        }
    }
}
