//! Versioned settings persistence: what the user tuned, written as
//! camelCase JSON with a schema version guard.

pub mod document;
pub mod service;

pub use document::{AppSettings, CURRENT_VERSION};
pub use service::{JsonSettingsService, MemorySettingsService, SettingsService};
