//! Configuration
//!
//! Server credentials, import metadata and per-title promotion defaults,
//! read from `patchflow.toml`.

pub mod parser;
pub mod schema;
pub mod store;

pub use schema::{ImportConfig, PatchflowConfig, PromoteConfigEntry, ServerConfig};
pub use store::ConfigStore;
