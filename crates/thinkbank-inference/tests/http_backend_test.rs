//! Contract tests for the model service client against a mock HTTP server.

use thinkbank_inference::{Error, HttpInferenceBackend, InferenceBackend};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_analyze_image_posts_form_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/analyzeImage"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("url=http%3A%2F%2Fhost%2Fnormalized%2F1.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "caption": "a dog on a beach",
            "embedding": vec![0.25f32; 512],
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = HttpInferenceBackend::new(mock_server.uri());
    let analysis = backend
        .analyze_image("http://host/normalized/1.jpg")
        .await
        .unwrap();

    assert_eq!(analysis.caption, "a dog on a beach");
    assert_eq!(analysis.embedding.len(), 512);
}

#[tokio::test]
async fn test_analyze_text_posts_form_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/analyzeText"))
        .and(body_string_contains("text=sunset"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embedding": vec![0.5f32; 512],
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = HttpInferenceBackend::new(mock_server.uri());
    let embedding = backend.analyze_text("sunset").await.unwrap();
    assert_eq!(embedding, vec![0.5f32; 512]);
}

#[tokio::test]
async fn test_non_success_status_is_upstream_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/analyzeImage"))
        .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
        .mount(&mock_server)
        .await;

    let backend = HttpInferenceBackend::new(mock_server.uri());
    let err = backend.analyze_image("http://host/1.jpg").await.unwrap_err();
    match err {
        Error::Upstream(msg) => assert!(msg.contains("503")),
        other => panic!("expected Upstream, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_json_is_upstream_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/analyzeText"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&mock_server)
        .await;

    let backend = HttpInferenceBackend::new(mock_server.uri());
    assert!(matches!(
        backend.analyze_text("x").await,
        Err(Error::Upstream(_))
    ));
}

#[tokio::test]
async fn test_wrong_dimension_is_upstream_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/analyzeImage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "caption": "tiny",
            "embedding": [0.1, 0.2, 0.3],
        })))
        .mount(&mock_server)
        .await;

    let backend = HttpInferenceBackend::new(mock_server.uri());
    assert!(matches!(
        backend.analyze_image("http://host/1.jpg").await,
        Err(Error::Upstream(_))
    ));
}

#[tokio::test]
async fn test_unreachable_service_is_transport_error() {
    let backend = HttpInferenceBackend::new("http://127.0.0.1:1");
    assert!(matches!(
        backend.analyze_text("x").await,
        Err(Error::Transport(_))
    ));
}

#[tokio::test]
async fn test_health_check() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    assert!(HttpInferenceBackend::new(mock_server.uri())
        .health_check()
        .await
        .unwrap());
    assert!(!HttpInferenceBackend::new("http://127.0.0.1:1")
        .health_check()
        .await
        .unwrap());
}
