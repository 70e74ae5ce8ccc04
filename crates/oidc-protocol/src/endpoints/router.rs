//! Router configuration.

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use super::authorization::authorize;
use super::jwks::jwks;
use super::revocation::revoke;
use super::state::AppState;
use super::token::token;
use super::userinfo::{userinfo_get, userinfo_post};

/// Creates the protocol router.
///
/// | Method   | Path         | Handler     |
/// |----------|--------------|-------------|
/// | GET      | `/authorize` | `authorize` |
/// | POST     | `/token`     | `token`     |
/// | GET/POST | `/userinfo`  | `userinfo`  |
/// | POST     | `/revoke`    | `revoke`    |
/// | GET      | `/jwks`      | `jwks`      |
pub fn oidc_router() -> Router<AppState> {
    Router::new()
        .route("/authorize", get(authorize))
        .route("/token", post(token))
        .route("/userinfo", get(userinfo_get).post(userinfo_post))
        .route("/revoke", post(revoke))
        .route("/jwks", get(jwks))
        .layer(TraceLayer::new_for_http())
}
