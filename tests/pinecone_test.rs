use loopmemory::config::IndexConfig;
use loopmemory::index::pinecone::PineconeIndex;
use loopmemory::index::{VectorIndex, VectorRecord};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer, namespace: Option<&str>) -> IndexConfig {
    IndexConfig {
        provider: "pinecone".into(),
        host: Some(server.uri()),
        api_key: Some("pc-key".into()),
        namespace: namespace.map(String::from),
        ..Default::default()
    }
}

#[tokio::test]
async fn upsert_sends_vectors_with_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .and(header("Api-Key", "pc-key"))
        .and(header("X-Pinecone-API-Version", "2024-07"))
        .and(body_partial_json(json!({
            "vectors": [{ "id": "m1", "values": [0.5, 0.5], "metadata": { "content": "hi" } }],
            "namespace": "notes",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "upsertedCount": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    let index = PineconeIndex::new(&config(&server, Some("notes"))).unwrap();
    let mut metadata = serde_json::Map::new();
    metadata.insert("content".into(), json!("hi"));
    index
        .upsert(vec![VectorRecord {
            id: "m1".into(),
            values: vec![0.5, 0.5],
            metadata,
        }])
        .await
        .unwrap();
}

#[tokio::test]
async fn query_parses_matches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_partial_json(json!({ "topK": 2, "includeMetadata": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [
                { "id": "a", "score": 0.91, "metadata": { "content": "first" } },
                { "id": "b", "score": 0.42 }
            ],
            "namespace": ""
        })))
        .mount(&server)
        .await;

    let index = PineconeIndex::new(&config(&server, None)).unwrap();
    let matches = index.query(&[0.1, 0.2], 2).await.unwrap();

    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].id, "a");
    assert_eq!(matches[0].metadata.as_ref().unwrap()["content"], "first");
    assert!(matches[1].metadata.is_none());
}

#[tokio::test]
async fn delete_and_stats() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/vectors/delete"))
        .and(body_partial_json(json!({ "ids": ["a", "b"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/describe_index_stats"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "dimension": 768, "totalVectorCount": 12 })),
        )
        .mount(&server)
        .await;

    let index = PineconeIndex::new(&config(&server, None)).unwrap();
    index.delete(&["a".into(), "b".into()]).await.unwrap();
    assert_eq!(index.count().await.unwrap(), Some(12));
}

#[tokio::test]
async fn http_errors_carry_service_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "code": 16, "message": "Invalid API Key" })),
        )
        .mount(&server)
        .await;

    let index = PineconeIndex::new(&config(&server, None)).unwrap();
    let err = index.query(&[0.1], 1).await.unwrap_err();
    assert!(err.to_string().contains("Invalid API Key"), "{err:#}");
}
