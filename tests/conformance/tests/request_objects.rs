//! Signed request objects passed by value and by reference.

use oidc_conformance_tests::TestServer;
use oidc_conformance_tests::harness::{CLIENT_ID, REDIRECT_URI, RP_SIGNING_ALGS};
use oidc_crypto::{SignatureAlgorithm, b64_encode};
use oidc_protocol::{KeyHints, Protection, RequestObjectBuilder};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request_object(server: &TestServer, state: &str) -> RequestObjectBuilder {
    RequestObjectBuilder::new(CLIENT_ID)
        .response_types(["code"])
        .scopes(["openid"])
        .redirect_uri(REDIRECT_URI)
        .state(state)
        .nonce("n-0S6_WzA2Mj")
        .audience(server.base_url.clone())
}

#[tokio::test]
async fn signed_request_objects_are_accepted() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let keys = server.rp_key_provider();

    let algorithms = [SignatureAlgorithm::Hs256, SignatureAlgorithm::Hs512]
        .into_iter()
        .chain(RP_SIGNING_ALGS);
    for alg in algorithms {
        let state = format!("state-{alg}");
        let built = request_object(&server, &state)
            .build(Protection::Signed(alg), &keys, KeyHints::default())
            .await?;

        let redirect = server
            .authorize(&[
                ("client_id", CLIENT_ID),
                ("response_type", "code"),
                ("scope", "openid"),
                ("request", built.token.as_str()),
            ])
            .await?;
        assert_eq!(redirect.get("state"), Some(&state), "{alg}");
        assert!(redirect.contains_key("code"), "{alg}: {redirect:?}");
    }
    Ok(())
}

#[tokio::test]
async fn request_object_overrides_query_parameters() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let built = request_object(&server, "from-object")
        .build(Protection::Signed(SignatureAlgorithm::Es256), &server.rp_key_provider(), KeyHints::default())
        .await?;

    let redirect = server
        .authorize(&[
            ("client_id", CLIENT_ID),
            ("response_type", "code"),
            ("scope", "openid"),
            ("state", "from-query"),
            ("request", built.token.as_str()),
        ])
        .await?;
    assert_eq!(redirect["state"], "from-object");
    Ok(())
}

#[tokio::test]
async fn invalid_request_object_is_reported_to_the_client() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let redirect = server
        .authorize(&[
            ("client_id", CLIENT_ID),
            ("response_type", "code"),
            ("scope", "openid"),
            ("state", "s1"),
            ("request", "INVALID_OPENID_REQUEST_OBJECT"),
        ])
        .await?;
    assert_eq!(redirect["error"], "invalid_request_object");
    assert_eq!(redirect["state"], "s1");
    assert!(!redirect.contains_key("code"));
    Ok(())
}

#[tokio::test]
async fn tampered_payload_is_rejected() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let built = request_object(&server, "s1")
        .build(Protection::Signed(SignatureAlgorithm::Rs256), &server.rp_key_provider(), KeyHints::default())
        .await?;
    let segments: Vec<&str> = built.token.split('.').collect();
    let forged = format!(
        "{}.{}.{}",
        segments[0],
        b64_encode(format!(r#"{{"client_id":"{CLIENT_ID}","scope":"openid profile"}}"#).as_bytes()),
        segments[2]
    );

    let redirect = server
        .authorize(&[
            ("client_id", CLIENT_ID),
            ("response_type", "code"),
            ("scope", "openid"),
            ("request", forged.as_str()),
        ])
        .await?;
    assert_eq!(redirect["error"], "invalid_request_object");
    Ok(())
}

#[tokio::test]
async fn request_and_request_uri_are_exclusive() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let redirect = server
        .authorize(&[
            ("client_id", CLIENT_ID),
            ("response_type", "code"),
            ("scope", "openid"),
            ("request", "a.b.c"),
            ("request_uri", "https://rp.example.org/request.jwt"),
        ])
        .await?;
    assert_eq!(redirect["error"], "invalid_request");
    Ok(())
}

#[tokio::test]
async fn request_uri_is_fetched() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let built = request_object(&server, "by-reference")
        .build(Protection::Signed(SignatureAlgorithm::Ps384), &server.rp_key_provider(), KeyHints::default())
        .await?;

    let rp = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/request.jwt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(built.token))
        .expect(1)
        .mount(&rp)
        .await;

    let request_uri = format!("{}/request.jwt", rp.uri());
    let redirect = server
        .authorize(&[
            ("client_id", CLIENT_ID),
            ("response_type", "code"),
            ("scope", "openid"),
            ("request_uri", request_uri.as_str()),
        ])
        .await?;
    assert_eq!(redirect["state"], "by-reference");
    assert!(redirect.contains_key("code"));
    Ok(())
}
