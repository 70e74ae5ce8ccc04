//! # oidc-protocol
//!
//! `OpenID` Connect request and response objects.
//!
//! This crate builds and validates the compact tokens exchanged around an
//! authorization request:
//! - Request objects passed by value (`request`) or reference (`request_uri`)
//! - ID Tokens and signed or encrypted `UserInfo` responses
//! - JWT-encoded `state` values
//!
//! and serves them over HTTP together with the token, revocation and JWKS
//! endpoints.
//!
//! ## Unsigned objects
//!
//! `alg=none` is refused unless the server configuration allows it and the
//! client registered `none` as its request object signing algorithm.
//!
//! ## Modules
//!
//! - [`authorization`] - Authorization response encoding (query, fragment, form post)
//! - [`claims`] - Claims requests, ID Token claims and claims release
//! - [`client`] - Registered client metadata and per-client key providers
//! - [`endpoints`] - Axum HTTP handlers
//! - [`error`] - Protocol and request object error types
//! - [`jwt`] - Validated token with claim accessors
//! - [`request`] - Request types for the endpoints
//! - [`request_object`] - Request object builder, validator and `request_uri` fetcher
//! - [`response`] - ID Token and `UserInfo` construction
//! - [`state`] - JWT-encoded `state` parameter

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod authorization;
pub mod claims;
pub mod client;
pub mod endpoints;
pub mod error;
pub mod jwt;
pub mod request;
pub mod request_object;
pub mod response;
pub mod state;

pub use authorization::{AuthorizationResponse, Delivery, ResponseMode};
pub use claims::{AddressClaim, Audience, ClaimConstraint, ClaimsRequest, IdTokenClaims, SubjectProfile};
pub use client::{ClientMetadata, ClientRegistry, InMemoryClientRegistry};
pub use endpoints::{AppState, oidc_router};
pub use error::{ErrorResponse, OidcError, OidcResult, RequestObjectError, RequestObjectResult};
pub use jwt::Jwt;
pub use request::{AuthorizationRequest, RevocationRequest, TokenRequest, UserInfoRequest};
pub use request_object::{
    BuiltObject, KeyHints, Protection, RequestObjectBuilder, RequestObjectValidator, RequestUriFetcher,
    ValidationPolicy,
};
pub use response::{IdTokenParams, UserInfoResponse, issue_id_token, userinfo_response};
pub use state::StateClaims;
