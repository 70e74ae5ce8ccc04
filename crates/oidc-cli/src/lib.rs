//! # oidc-cli
//!
//! `oidc-keytool`: manages the server key store and inspects compact tokens.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use config::ToolConfig;
pub use error::{CliError, CliResult};
