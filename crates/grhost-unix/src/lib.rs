//! Unix process management for the game render host

mod unix_process_manager;

pub use unix_process_manager::{UnixProcessHandle, UnixProcessManager};

/// Unix-specific process manager factory
pub struct UnixProcessManagerFactory;

#[cfg(unix)]
impl grhost_core::ProcessManagerFactory for UnixProcessManagerFactory {
    type Manager = UnixProcessManager;

    fn create_process_manager() -> UnixProcessManager {
        use grhost_core::ProcessManager;
        UnixProcessManager::new()
    }

    fn platform_name() -> &'static str {
        "Unix"
    }
}
