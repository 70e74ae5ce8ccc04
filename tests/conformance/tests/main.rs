//! End-to-end scenarios against an in-process server.
//!
//! Each scenario starts its own [`TestServer`](oidc_conformance_tests::TestServer)
//! so they can run in parallel.

mod claims;
mod encryption;
mod flows;
mod jwks;
mod request_objects;
mod revocation;
