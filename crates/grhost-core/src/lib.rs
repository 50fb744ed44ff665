//! GRHost Core - Platform-independent abstractions for supervising the game render host
//!
//! This crate provides the configuration, error types, process traits, runtime
//! channel contracts and the endpoint/proxy plumbing shared by the platform
//! crates and the transport adapters.

mod client;
mod config;
mod endpoint;
mod error;
mod events;
mod launch;
mod policy;
mod process;
mod proxy;
mod runtime;
mod scope;

pub use client::*;
pub use config::*;
pub use endpoint::*;
pub use error::*;
pub use events::*;
pub use launch::*;
pub use policy::*;
pub use process::*;
pub use proxy::*;
pub use runtime::*;
pub use scope::*;
