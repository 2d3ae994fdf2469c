#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a PostgreSQL instance with the game
// metadata schema loaded.
// Run with: GAMEVEC_TEST_DATABASE_URL=postgres://... cargo test --test integration_postgres

use gamevec::database::Database;
use gamevec::database::postgres::RecordKind;
use gamevec::sync::SourceReader;
use std::env;

const DATABASE_URL_VAR: &str = "GAMEVEC_TEST_DATABASE_URL";

async fn test_database() -> Option<Database> {
    let url = match env::var(DATABASE_URL_VAR) {
        Ok(url) => url,
        Err(_) => {
            eprintln!("skipping: {DATABASE_URL_VAR} is not set");
            return None;
        }
    };
    Some(
        Database::new(&url)
            .await
            .expect("should connect to test database"),
    )
}

#[tokio::test]
async fn fetches_normalized_feature_records() {
    let Some(database) = test_database().await else {
        return;
    };

    let records = database
        .fetch(RecordKind::Feature, Some(10), None)
        .await
        .expect("should fetch features");

    for record in &records {
        assert_eq!(record.kind, RecordKind::Feature);
        assert!(record.document_id().starts_with("feature_"));
        assert_eq!(record.text_fields.len(), 2);
        assert_eq!(record.text_fields[0].0, "name");
        assert_eq!(record.text_fields[1].0, "description");
    }
}

#[tokio::test]
async fn fetches_normalized_screenshot_records() {
    let Some(database) = test_database().await else {
        return;
    };

    let records = database
        .fetch(RecordKind::Screenshot, Some(10), None)
        .await
        .expect("should fetch screenshots");

    for record in &records {
        assert_eq!(record.kind, RecordKind::Screenshot);
        assert!(record.document_id().starts_with("screenshot_"));
        assert_eq!(record.text_fields.len(), 3);
        assert_eq!(record.text_fields[2].0, "elements");
    }
}

#[tokio::test]
async fn limit_caps_the_row_count() {
    let Some(database) = test_database().await else {
        return;
    };

    let records = database
        .fetch(RecordKind::Feature, Some(3), None)
        .await
        .expect("should fetch features");

    assert!(records.len() <= 3);
}

#[tokio::test]
async fn game_filter_restricts_ownership() {
    let Some(database) = test_database().await else {
        return;
    };

    let all = database
        .fetch(RecordKind::Feature, Some(1), None)
        .await
        .expect("should fetch features");
    let Some(sample) = all.first() else {
        eprintln!("skipping: no feature rows in test database");
        return;
    };

    let filtered = database
        .fetch(RecordKind::Feature, None, Some(&sample.game_id))
        .await
        .expect("should fetch filtered features");

    assert!(!filtered.is_empty());
    for record in &filtered {
        assert_eq!(record.game_id, sample.game_id);
    }
}

#[tokio::test]
async fn row_counts_are_consistent_with_fetch() {
    let Some(database) = test_database().await else {
        return;
    };

    let count = database
        .count_rows(RecordKind::Feature)
        .await
        .expect("should count features");
    let records = database
        .fetch(RecordKind::Feature, None, None)
        .await
        .expect("should fetch features");

    assert_eq!(records.len() as i64, count);
}
