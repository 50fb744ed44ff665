//! GRHost - supervision of the out-of-process game render host
//!
//! Launches the runtime host selected from mounted runtime packages, connects
//! the runtime channel over the configured transport and exposes it through a
//! never-failing [`RuntimeProxy`].

pub mod factory;
pub mod host;
pub mod logging;
pub mod package;
pub mod supervisor;
pub mod transport;

pub use factory::{PlatformProcessManagerFactory, create_process_manager};
pub use host::GameHost;
pub use logging::init_logging;
pub use package::{Mount, RuntimePackageProvider, RuntimeVersion};
pub use supervisor::ProcessSupervisor;

// Re-export core functionality
pub use grhost_core::*;
