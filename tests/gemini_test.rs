use loopmemory::config::EmbeddingConfig;
use loopmemory::embedding::gemini::GeminiEmbeddingProvider;
use loopmemory::embedding::EmbeddingProvider;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer, dimensions: usize) -> EmbeddingConfig {
    EmbeddingConfig {
        base_url: server.uri(),
        api_key: Some("test-key".into()),
        dimensions,
        ..Default::default()
    }
}

#[tokio::test]
async fn embed_content_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/text-embedding-004:embedContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "model": "models/text-embedding-004",
            "content": { "parts": [{ "text": "hello world" }] },
            "outputDimensionality": 3,
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "embedding": { "values": [0.1, 0.2, 0.3] } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = GeminiEmbeddingProvider::new(&config(&server, 3)).unwrap();
    let values = provider.embed("hello world").await.unwrap();
    assert_eq!(values, vec![0.1, 0.2, 0.3]);
}

#[tokio::test]
async fn api_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT" }
        })))
        .mount(&server)
        .await;

    let provider = GeminiEmbeddingProvider::new(&config(&server, 3)).unwrap();
    let err = provider.embed("hello").await.unwrap_err();
    assert!(err.to_string().contains("API key not valid"), "{err:#}");
}

#[tokio::test]
async fn wrong_dimension_count_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embedding": { "values": [1.0] } })),
        )
        .mount(&server)
        .await;

    let provider = GeminiEmbeddingProvider::new(&config(&server, 3)).unwrap();
    let err = provider.embed("hello").await.unwrap_err();
    assert!(err.to_string().contains("expected 3"), "{err:#}");
}

#[tokio::test]
async fn server_error_without_body_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let provider = GeminiEmbeddingProvider::new(&config(&server, 3)).unwrap();
    assert!(provider.embed("hello").await.is_err());
}
