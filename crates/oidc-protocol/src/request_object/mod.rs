//! Request objects and protected responses.
//!
//! - [`builder`] signs and encrypts claim sets
//! - [`validator`] verifies and decrypts them
//! - [`fetch`] retrieves objects passed by `request_uri`

pub mod builder;
pub mod fetch;
pub mod validator;

pub use builder::{BuiltObject, KeyHints, Protection, RequestObjectBuilder, protect, protect_claims};
pub use fetch::RequestUriFetcher;
pub use validator::{RequestObjectValidator, ValidationPolicy, decode};
