//! Contract Core Library
//!
//! Shared types, configuration, amount formatting and PDF rendering for the
//! contract signing system.

pub mod config;
pub mod error;
#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;
pub mod format;
pub mod render;
pub mod types;

pub use error::{Error, Result};
pub use render::{DocumentRenderer, RenderDefaults};
