//! Certificates fetched over HTTP.

mod common;

use common::{encrypted_data, unseal_value, CERT_PEM, SECRETS};
use secret_sealer::{ResMap, SealError, SealerConfig, Transformer};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn seals_with_fetched_certificate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/cert.pem"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CERT_PEM))
        .expect(1)
        .mount(&server)
        .await;

    let mut map = ResMap::from_yaml(SECRETS).unwrap();
    let config = SealerConfig::new(format!("{}/v1/cert.pem", server.uri()));
    Transformer::new(config).transform(&mut map).await.unwrap();

    let sealed = map.of_kind("SealedSecret").next().unwrap();
    assert_eq!(
        unseal_value(&encrypted_data(sealed)["user"], "default", "db"),
        b"admin"
    );
}

#[tokio::test]
async fn certificate_fetched_once_per_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cert.pem"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CERT_PEM))
        .expect(1)
        .mount(&server)
        .await;

    let two_secrets = format!(
        "{SECRETS}---\napiVersion: v1\nkind: Secret\nmetadata:\n  name: other\ndata:\n  k: dg==\n"
    );
    let mut map = ResMap::from_yaml(&two_secrets).unwrap();
    let config = SealerConfig::new(format!("{}/cert.pem", server.uri()));
    Transformer::new(config).transform(&mut map).await.unwrap();
    assert_eq!(map.of_kind("SealedSecret").count(), 2);
}

#[tokio::test]
async fn non_success_status_is_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut map = ResMap::from_yaml(SECRETS).unwrap();
    let config = SealerConfig::new(format!("{}/missing.pem", server.uri()));
    let err = Transformer::new(config).transform(&mut map).await.unwrap_err();

    match err.root() {
        SealError::CertFetch { reason, .. } => assert!(reason.contains("404")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(map.of_kind("Secret").count(), 1);
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(CERT_PEM)
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut map = ResMap::from_yaml(SECRETS).unwrap();
    let mut config = SealerConfig::new(format!("{}/cert.pem", server.uri()));
    config.timeout_seconds = 1;
    let err = Transformer::new(config).transform(&mut map).await.unwrap_err();
    assert!(matches!(err.root(), SealError::Timeout { .. }));
}
