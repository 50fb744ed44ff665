use crate::client::Endpoint;
use crate::events::ExitHook;
use crate::process::ProcessId;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Single-slot registry holding the active endpoint for one client role.
///
/// All operations serialize on one lock. The outgoing endpoint is disposed
/// before the incoming one is stored, so readers never see a half-replaced slot.
pub struct EndpointProvider<C: ?Sized + Endpoint> {
    role: &'static str,
    slot: Mutex<Option<Arc<C>>>,
}

impl<C: ?Sized + Endpoint> EndpointProvider<C> {
    pub fn new(role: &'static str) -> Self {
        Self {
            role,
            slot: Mutex::new(None),
        }
    }

    pub fn role(&self) -> &'static str {
        self.role
    }

    /// The currently registered endpoint, if any
    pub fn client(&self) -> Option<Arc<C>> {
        self.slot.lock().clone()
    }

    pub fn add_or_update(&self, client: Arc<C>) {
        let mut slot = self.slot.lock();
        if let Some(previous) = slot.take() {
            if Arc::ptr_eq(&previous, &client) {
                *slot = Some(previous);
                return;
            }
            debug!(role = self.role, pid = %previous.process_id(), "Disposing replaced endpoint");
            previous.dispose();
        }
        info!(role = self.role, pid = %client.process_id(), "Endpoint registered");
        *slot = Some(client);
    }

    pub fn clear(&self) {
        let mut slot = self.slot.lock();
        if let Some(previous) = slot.take() {
            info!(role = self.role, pid = %previous.process_id(), "Endpoint cleared");
            previous.dispose();
        }
    }

    /// Clear the slot only if it holds an endpoint for `pid`
    pub fn clear_for(&self, pid: ProcessId) -> bool {
        let mut slot = self.slot.lock();
        match slot.as_ref() {
            Some(current) if current.process_id() == pid => {
                if let Some(previous) = slot.take() {
                    info!(role = self.role, pid = %pid, "Endpoint cleared after process exit");
                    previous.dispose();
                }
                true
            }
            _ => false,
        }
    }
}

impl<C: ?Sized + Endpoint> ExitHook for EndpointProvider<C> {
    fn on_process_exited(&self, pid: ProcessId) {
        if !self.clear_for(pid) {
            debug!(role = self.role, pid = %pid, "No endpoint registered for exited process");
        }
    }
}
