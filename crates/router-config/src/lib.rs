//! Configuration for the routing engine.
//!
//! Parameters arrive from a governance-controlled feed; the engine treats them
//! as read-only and applies updates atomically between requests through
//! [`ConfigHandle`], never mid-execution.

pub mod handle;
pub mod loader;
pub mod types;

pub use handle::ConfigHandle;
pub use loader::{load_config, ConfigLoader};
pub use types::*;
