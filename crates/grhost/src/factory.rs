use grhost_core::{ProcessManager, ProcessManagerFactory};
use std::sync::Arc;

/// Platform-independent factory that selects the appropriate implementation at compile time
pub struct PlatformProcessManagerFactory;

impl ProcessManagerFactory for PlatformProcessManagerFactory {
    #[cfg(unix)]
    type Manager = grhost_unix::UnixProcessManager;

    #[cfg(windows)]
    type Manager = grhost_windows::WindowsProcessManager;

    fn create_process_manager() -> Self::Manager {
        #[cfg(unix)]
        return grhost_unix::UnixProcessManagerFactory::create_process_manager();

        #[cfg(windows)]
        return grhost_windows::WindowsProcessManagerFactory::create_process_manager();
    }

    fn platform_name() -> &'static str {
        #[cfg(unix)]
        return grhost_unix::UnixProcessManagerFactory::platform_name();

        #[cfg(windows)]
        return grhost_windows::WindowsProcessManagerFactory::platform_name();
    }
}

/// Convenience function to create the platform process manager behind a trait object
pub fn create_process_manager() -> Arc<dyn ProcessManager> {
    Arc::new(PlatformProcessManagerFactory::create_process_manager())
}
