//! Published keys and ID Token verification by a relying party.

use std::time::Duration;

use oidc_conformance_tests::TestServer;
use oidc_conformance_tests::harness::{CLIENT_ID, SUBJECT, str_member};
use oidc_crypto::{KeyUse, SignatureAlgorithm};
use oidc_keystore::{DefaultKeyProvider, JwksClient};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn jwks_publishes_public_halves_only() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let jwks = JwksClient::new(Duration::from_secs(5))?.fetch(&server.url("/jwks")).await?;

    assert_eq!(jwks.len(), 2);
    assert!(jwks.keys.iter().any(|k| k.key_use == Some(KeyUse::Sig)));
    assert!(jwks.keys.iter().any(|k| k.key_use == Some(KeyUse::Enc)));

    let raw: serde_json::Value = server.http.get(server.url("/jwks")).send().await?.json().await?;
    for key in raw["keys"].as_array().into_iter().flatten() {
        for private in ["d", "p", "q", "dp", "dq", "qi"] {
            assert!(key.get(private).is_none(), "{private} published");
        }
    }
    Ok(())
}

#[tokio::test]
async fn id_token_verifies_against_published_keys() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let tokens = server.code_flow(&[("nonce", "n-jwks")]).await?;
    let id_token = str_member(&tokens, "id_token")?;

    let keys = DefaultKeyProvider::new().with_jwks_uri(
        &server.url("/jwks"),
        Duration::from_secs(5),
        Duration::from_secs(60),
    )?;
    let jwt = oidc_protocol::request_object::decode(id_token, &keys, &[SignatureAlgorithm::Rs256]).await?;

    assert_eq!(jwt.get_claim_as_string("sub").as_deref(), Some(SUBJECT));
    assert_eq!(jwt.get_claim_as_string("iss").as_deref(), Some(server.base_url.as_str()));
    assert_eq!(jwt.get_claim_as_string("nonce").as_deref(), Some("n-jwks"));
    assert!(jwt.audience_contains(CLIENT_ID));
    assert!(jwt.has_claim("at_hash"));

    assert!(
        oidc_protocol::request_object::decode(id_token, &keys, &[SignatureAlgorithm::Es256])
            .await
            .is_err()
    );
    Ok(())
}
