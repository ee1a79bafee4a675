//! Shared test utilities for PulseSync test suites
//!
//! Provides a programmable in-memory remote store, temp-backed local
//! stores, and test logging configuration, so the engine and repository
//! suites exercise the same failure modes without duplicating fakes.
//!
//! # Modules
//!
//! - [`remote`]: scripted in-memory implementation of every remote trait
//! - [`store`]: temp-directory local store builders
//! - [`logging`]: test logging configuration

pub mod logging;
pub mod remote;
pub mod store;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::logging::{init_test_logging, suppress_logs};
    pub use crate::remote::ScriptedRemote;
    pub use crate::store::{temp_store, uninitialized_store, TempStore};
}
