//! Token revocation and its effect on refresh and `UserInfo`.

use oidc_conformance_tests::TestServer;
use oidc_conformance_tests::harness::{CLIENT_ID, str_member};
use pretty_assertions::assert_eq;
use reqwest::{StatusCode, header};

#[tokio::test]
async fn revoking_refresh_token_cascades_to_access_tokens() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let tokens = server.code_flow(&[]).await?;
    let access = str_member(&tokens, "access_token")?;
    let refresh = str_member(&tokens, "refresh_token")?;

    assert_eq!(server.userinfo(access).await?.status(), StatusCode::OK);
    assert_eq!(server.revoke(refresh, Some("refresh_token")).await?, StatusCode::OK);

    let (status, body) = server
        .token(&[("grant_type", "refresh_token"), ("refresh_token", refresh)])
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_grant");

    let response = server.userinfo(access).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenge = response
        .headers()
        .get(header::WWW_AUTHENTICATE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(challenge.contains("invalid_token"), "{challenge}");
    Ok(())
}

#[tokio::test]
async fn revoking_access_token_blocks_its_refresh_token() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let tokens = server.code_flow(&[]).await?;
    let access = str_member(&tokens, "access_token")?;
    let refresh = str_member(&tokens, "refresh_token")?;

    assert_eq!(server.revoke(access, None).await?, StatusCode::OK);
    assert_eq!(server.userinfo(access).await?.status(), StatusCode::UNAUTHORIZED);

    let (status, _) = server
        .token(&[("grant_type", "refresh_token"), ("refresh_token", refresh)])
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn refreshed_tokens_survive_until_revoked() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let tokens = server.code_flow(&[]).await?;
    let (status, refreshed) = server
        .token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", str_member(&tokens, "refresh_token")?),
        ])
        .await?;
    assert_eq!(status, StatusCode::OK, "{refreshed}");
    assert!(refreshed.get("id_token").is_some());

    let access = str_member(&refreshed, "access_token")?;
    assert_eq!(server.userinfo(access).await?.status(), StatusCode::OK);
    assert_eq!(
        server.revoke(str_member(&refreshed, "refresh_token")?, None).await?,
        StatusCode::OK
    );
    assert_eq!(server.userinfo(access).await?.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn revocation_is_idempotent() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let tokens = server.code_flow(&[]).await?;
    let refresh = str_member(&tokens, "refresh_token")?;

    for _ in 0..2 {
        assert_eq!(server.revoke(refresh, Some("refresh_token")).await?, StatusCode::OK);
    }
    assert_eq!(server.revoke("never-issued", None).await?, StatusCode::OK);
    assert_eq!(server.revoke("never-issued", Some("unknown_hint")).await?, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn revocation_requires_client_authentication() -> anyhow::Result<()> {
    let server = TestServer::start().await?;

    let response = server
        .http
        .post(server.url("/revoke"))
        .form(&[("token", "some-token")])
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = server
        .http
        .post(server.url("/revoke"))
        .form(&[("token", "some-token"), ("client_id", CLIENT_ID), ("client_secret", "wrong")])
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = server
        .http
        .post(server.url("/revoke"))
        .basic_auth(CLIENT_ID, Some(oidc_conformance_tests::harness::CLIENT_SECRET))
        .form(&[("token_type_hint", "access_token")])
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
