use super::*;
use serial_test::serial;

fn sample_result(id: &str, distance: f32) -> SearchResult {
    SearchResult {
        document_id: id.to_string(),
        distance,
        document: "Dash Ability\u{1f}A short horizontal burst of speed".to_string(),
        metadata: DocumentMetadata {
            source_id: 42,
            game_id: "game_a".to_string(),
            content_hash: "abc123".to_string(),
            updated_at: None,
            model: "text-embedding-3-large".to_string(),
            dimension: 3072,
            token_count: 11,
            generated_at: "2024-01-01T00:00:00Z".to_string(),
        },
    }
}

#[test]
fn hit_carries_source_id_out_of_metadata() {
    let hit = SearchHit::from(sample_result("feature_42", 0.25));

    assert_eq!(hit.document_id, "feature_42");
    assert_eq!(hit.source_id, 42);
    assert_eq!(hit.metadata.source_id, 42);
    assert!((hit.distance - 0.25).abs() < f32::EPSILON);
}

#[tokio::test]
#[serial]
async fn empty_query_is_rejected_before_embedding() {
    // Construct a client against a dead endpoint; it must never be called.
    let config = crate::config::Config::default();

    // SAFETY: test-only env mutation, no other thread reads this variable
    // at this point in the test binary.
    unsafe {
        std::env::set_var(crate::config::settings::API_KEY_ENV, "test-key");
    }
    let client = OpenAiClient::new(&config).expect("should build client");

    let temp_dir = tempfile::TempDir::new().expect("should create temp dir");
    let store_config = crate::config::Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..crate::config::Config::default()
    };
    let store = VectorStore::open(&store_config, crate::database::postgres::RecordKind::Feature)
        .await
        .expect("should open store");

    let interface = SearchInterface::new(client, store);

    let result = interface.search("   ", 5, None).await;
    assert!(matches!(result, Err(SyncError::EmptyContent(_))));
}
