//! Response types and response modes at the authorization endpoint.

use oidc_conformance_tests::TestServer;
use oidc_conformance_tests::harness::{CLIENT_ID, REDIRECT_URI, SUBJECT, unverified_claims};
use oidc_crypto::{HashAlgorithm, left_half_hash};
use oidc_protocol::endpoints::state::SUBJECT_HEADER;
use pretty_assertions::assert_eq;
use reqwest::StatusCode;

#[tokio::test]
async fn hybrid_response_binds_code_and_token() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let redirect = server
        .authorize(&[
            ("client_id", CLIENT_ID),
            ("response_type", "code id_token token"),
            ("scope", "openid email"),
            ("nonce", "n-hybrid"),
            ("state", "s-hybrid"),
        ])
        .await?;

    let id_token = unverified_claims(&redirect["id_token"])?;
    assert_eq!(id_token["sub"], SUBJECT);
    assert_eq!(id_token["nonce"], "n-hybrid");
    assert_eq!(id_token["c_hash"], left_half_hash(HashAlgorithm::Sha256, &redirect["code"]));
    assert_eq!(id_token["at_hash"], left_half_hash(HashAlgorithm::Sha256, &redirect["access_token"]));
    assert_eq!(redirect["token_type"], "Bearer");
    assert_eq!(redirect["state"], "s-hybrid");

    let response = server.userinfo(&redirect["access_token"]).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn id_token_requires_nonce() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let redirect = server
        .authorize(&[
            ("client_id", CLIENT_ID),
            ("response_type", "id_token"),
            ("scope", "openid"),
            ("state", "s1"),
        ])
        .await?;
    assert_eq!(redirect["error"], "invalid_request");
    assert_eq!(redirect["state"], "s1");
    Ok(())
}

#[tokio::test]
async fn form_post_renders_auto_submitting_form() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let response = server
        .http
        .get(server.url("/authorize"))
        .header(SUBJECT_HEADER, SUBJECT)
        .query(&[
            ("client_id", CLIENT_ID),
            ("response_type", "code"),
            ("scope", "openid"),
            ("response_mode", "form_post"),
            ("state", "s<1>"),
        ])
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let page = response.text().await?;
    assert!(page.contains(&format!(r#"action="{REDIRECT_URI}""#)));
    assert!(page.contains(r#"name="code""#));
    assert!(page.contains("s&lt;1&gt;"));
    Ok(())
}

#[tokio::test]
async fn missing_session_is_login_required() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let response = server
        .http
        .get(server.url("/authorize"))
        .query(&[("client_id", CLIENT_ID), ("response_type", "code"), ("scope", "openid")])
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(location.contains("error=login_required"), "{location}");
    Ok(())
}
