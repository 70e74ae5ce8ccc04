//! JWKS endpoint.

use axum::Json;
use axum::extract::State;
use oidc_crypto::JsonWebKeySet;

use super::state::AppState;

/// GET `/jwks`
///
/// Returns the public half of every key in the server key store.
pub async fn jwks(State(state): State<AppState>) -> Json<JsonWebKeySet> {
    Json(state.server_keys.read().public_jwks())
}
