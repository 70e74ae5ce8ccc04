//! # oidc-core
//!
//! Configuration, audit events and logging setup shared by the OIDC request
//! and response object crates.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod logging;

pub use config::{Config, KeyConfig, KeySelectionStrategy, RequestObjectConfig, TokenConfig};
pub use error::{ConfigError, ConfigResult};
pub use event::{Event, EventBuilder, EventOutcome, EventType};
