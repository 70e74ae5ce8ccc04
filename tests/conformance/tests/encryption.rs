//! Encrypted request objects.

use oidc_conformance_tests::TestServer;
use oidc_conformance_tests::harness::{CLIENT_ID, REDIRECT_URI};
use oidc_crypto::{BlockEncryptionAlgorithm, KeyEncryptionAlgorithm, SignatureAlgorithm, b64_decode, b64_encode};
use oidc_protocol::{KeyHints, Protection, RequestObjectBuilder};

fn request_object(state: &str) -> RequestObjectBuilder {
    RequestObjectBuilder::new(CLIENT_ID)
        .response_types(["code"])
        .scopes(["openid"])
        .redirect_uri(REDIRECT_URI)
        .state(state)
}

async fn send(server: &TestServer, token: &str) -> anyhow::Result<std::collections::BTreeMap<String, String>> {
    server
        .authorize(&[
            ("client_id", CLIENT_ID),
            ("response_type", "code"),
            ("scope", "openid"),
            ("request", token),
        ])
        .await
}

#[tokio::test]
async fn signed_then_encrypted_matrix() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let keys = server.rp_key_provider();

    for alg in [KeyEncryptionAlgorithm::RsaOaep, KeyEncryptionAlgorithm::A128Kw] {
        for enc in BlockEncryptionAlgorithm::ALL {
            let state = format!("{alg}+{enc}");
            let protection = Protection::SignedThenEncrypted {
                signing: SignatureAlgorithm::Es256,
                alg,
                enc,
            };
            let built = request_object(&state).build(protection, &keys, KeyHints::default()).await?;
            assert_eq!(built.token.split('.').count(), 5);

            let redirect = send(&server, &built.token).await?;
            assert_eq!(redirect.get("state"), Some(&state));
            assert!(redirect.contains_key("code"), "{state}: {redirect:?}");
        }
    }
    Ok(())
}

#[tokio::test]
async fn encrypted_claims_without_signature_are_accepted() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let protection = Protection::Encrypted {
        alg: KeyEncryptionAlgorithm::RsaOaep,
        enc: BlockEncryptionAlgorithm::A256Gcm,
    };
    let built = request_object("sealed")
        .build(protection, &server.rp_key_provider(), KeyHints::default())
        .await?;

    let redirect = send(&server, &built.token).await?;
    assert_eq!(redirect["state"], "sealed");
    Ok(())
}

#[tokio::test]
async fn tampered_ciphertext_is_rejected() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let protection = Protection::SignedThenEncrypted {
        signing: SignatureAlgorithm::Rs256,
        alg: KeyEncryptionAlgorithm::RsaOaep,
        enc: BlockEncryptionAlgorithm::A128CbcHs256,
    };
    let built = request_object("s1")
        .build(protection, &server.rp_key_provider(), KeyHints::default())
        .await?;

    let mut segments: Vec<String> = built.token.split('.').map(str::to_string).collect();
    let mut ciphertext = b64_decode(&segments[3], "ciphertext")?;
    ciphertext[0] ^= 0x01;
    segments[3] = b64_encode(&ciphertext);

    let redirect = send(&server, &segments.join(".")).await?;
    assert_eq!(redirect["error"], "invalid_request_object");
    assert!(!redirect.contains_key("code"));
    Ok(())
}
