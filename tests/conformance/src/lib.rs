//! # oidc-conformance-tests
//!
//! Starts the OIDC endpoints on a loopback port with an in-memory client,
//! user and key setup, and drives them over HTTP the way a relying party
//! would. The scenarios live under `tests/`.
//!
//! ```bash
//! cargo test -p oidc-conformance-tests
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod harness;

pub use harness::TestServer;
