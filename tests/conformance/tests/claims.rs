//! Claims requested through a request object.

use oidc_conformance_tests::TestServer;
use oidc_conformance_tests::harness::{CLIENT_ID, REDIRECT_URI, SUBJECT, str_member, unverified_claims};
use oidc_crypto::SignatureAlgorithm;
use oidc_protocol::{ClaimConstraint, KeyHints, Protection, RequestObjectBuilder};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
async fn essential_claims_are_released() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let built = RequestObjectBuilder::new(CLIENT_ID)
        .response_types(["code"])
        .scopes(["openid"])
        .redirect_uri(REDIRECT_URI)
        .nonce("n-claims")
        .id_token_claim("email", ClaimConstraint::essential())
        .userinfo_claim("address", ClaimConstraint::essential())
        .build(Protection::Signed(SignatureAlgorithm::Rs256), &server.rp_key_provider(), KeyHints::default())
        .await?;

    let tokens = server.code_flow(&[("request", built.token.as_str())]).await?;

    let id_token = unverified_claims(str_member(&tokens, "id_token")?)?;
    assert_eq!(id_token["sub"], SUBJECT);
    assert_eq!(id_token["email"], "alice@example.org");
    assert_eq!(id_token["nonce"], "n-claims");
    assert!(id_token.get("address").is_none());

    let response = server.userinfo(str_member(&tokens, "access_token")?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let userinfo: Value = response.json().await?;
    assert_eq!(userinfo["sub"], SUBJECT);
    assert_eq!(
        userinfo["address"],
        json!({"street_address": "1 Main Street", "locality": "Springfield", "country": "US"})
    );
    assert!(userinfo.get("name").is_none());
    Ok(())
}

#[tokio::test]
async fn value_constraint_withholds_mismatching_claim() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let built = RequestObjectBuilder::new(CLIENT_ID)
        .response_types(["code"])
        .scopes(["openid"])
        .redirect_uri(REDIRECT_URI)
        .userinfo_claim("address.country", ClaimConstraint::value("DE"))
        .userinfo_claim("email", ClaimConstraint::value("alice@example.org"))
        .build(Protection::Signed(SignatureAlgorithm::Hs256), &server.rp_key_provider(), KeyHints::default())
        .await?;

    let tokens = server.code_flow(&[("request", built.token.as_str())]).await?;
    let userinfo: Value = server
        .userinfo(str_member(&tokens, "access_token")?)
        .await?
        .json()
        .await?;
    assert_eq!(userinfo["email"], "alice@example.org");
    assert!(userinfo.get("address").is_none());
    Ok(())
}

#[tokio::test]
async fn scope_claims_reach_userinfo() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let tokens = server.code_flow(&[("scope", "openid profile email")]).await?;

    let userinfo: Value = server
        .userinfo(str_member(&tokens, "access_token")?)
        .await?
        .json()
        .await?;
    assert_eq!(userinfo["name"], "Alice Example");
    assert_eq!(userinfo["email_verified"], true);
    Ok(())
}
