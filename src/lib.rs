// Library exports for the CLI and integration tests

pub mod config;
pub mod models;
pub mod palette;

pub mod convert;
pub mod file_set;
pub mod merge;
pub mod render;
pub mod session;
pub mod view_sync;

// Re-export the session entry points at crate root for easier access
pub use session::{SessionEvent, SessionHandle, SessionService};

// Test support (only available with test-utils feature)
#[cfg(feature = "test-utils")]
pub mod test_support;
