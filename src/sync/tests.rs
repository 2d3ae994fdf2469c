use super::*;
use crate::database::lancedb::IndexEntry;
use chrono::TimeZone;

fn feature_record(id: i64, description: &str) -> SourceRecord {
    SourceRecord {
        id,
        kind: RecordKind::Feature,
        text_fields: vec![
            ("name".to_string(), format!("Feature {id}")),
            ("description".to_string(), description.to_string()),
        ],
        updated_at: Some(Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()),
        game_id: "game_a".to_string(),
    }
}

fn stored_entry(record: &SourceRecord) -> IndexEntry {
    IndexEntry {
        content_hash: record.fingerprint(),
        updated_at: record.updated_at.map(|ts| ts.to_rfc3339()),
    }
}

fn index_of(entries: &[(&str, IndexEntry)]) -> StoreIndex {
    entries
        .iter()
        .map(|(id, entry)| (id.to_string(), entry.clone()))
        .collect()
}

#[test]
fn classify_partitions_completely_and_disjointly() {
    let unchanged = feature_record(1, "stable text");
    let changed = feature_record(2, "revised text");
    let brand_new = feature_record(3, "new text");

    let mut stale = stored_entry(&changed);
    stale.content_hash = "different_hash".to_string();

    let index = index_of(&[
        ("feature_1", stored_entry(&unchanged)),
        ("feature_2", stale),
    ]);

    let records = vec![unchanged, changed, brand_new];
    let total = records.len();
    let result = classify(records, &index, ChangePolicy::ContentHash);

    assert_eq!(result.new.len() + result.changed.len() + result.unchanged.len(), total);
    assert_eq!(result.new[0].id, 3);
    assert_eq!(result.changed[0].id, 2);
    assert_eq!(result.unchanged[0].id, 1);

    let mut ids: Vec<_> = result
        .new
        .iter()
        .chain(&result.changed)
        .chain(&result.unchanged)
        .map(SourceRecord::document_id)
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), total);
}

#[test]
fn content_hash_policy_ignores_timestamp_drift() {
    let mut record = feature_record(1, "same text");
    let mut entry = stored_entry(&record);
    // Timestamp moved but the content did not
    entry.updated_at = Some("2020-01-01T00:00:00+00:00".to_string());
    record.updated_at = Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());

    let index = index_of(&[("feature_1", entry)]);
    let result = classify(vec![record], &index, ChangePolicy::ContentHash);

    assert!(result.changed.is_empty());
    assert_eq!(result.unchanged.len(), 1);
}

#[test]
fn force_all_marks_everything_changed() {
    let record = feature_record(1, "stable text");
    let index = index_of(&[("feature_1", stored_entry(&record))]);

    let result = classify(vec![record], &index, ChangePolicy::ForceAll);

    assert_eq!(result.changed.len(), 1);
    assert!(result.new.is_empty());
    assert!(result.unchanged.is_empty());
}

#[test]
fn force_all_still_treats_absent_ids_as_new() {
    let result = classify(
        vec![feature_record(9, "text")],
        &StoreIndex::new(),
        ChangePolicy::ForceAll,
    );

    assert_eq!(result.new.len(), 1);
    assert!(result.changed.is_empty());
}

#[test]
fn skip_existing_never_reembeds_stale_documents() {
    let record = feature_record(1, "revised text");
    let mut stale = stored_entry(&record);
    stale.content_hash = "old_hash".to_string();
    stale.updated_at = Some("2000-01-01T00:00:00+00:00".to_string());

    let index = index_of(&[("feature_1", stale)]);
    let result = classify(vec![record, feature_record(2, "new")], &index, ChangePolicy::SkipExisting);

    assert_eq!(result.unchanged.len(), 1);
    assert_eq!(result.new.len(), 1);
    assert!(result.changed.is_empty());
}

#[test]
fn timestamp_policy_compares_strictly() {
    let record = feature_record(1, "text");
    let same = stored_entry(&record);

    let mut older = same.clone();
    older.updated_at = Some("2024-03-09T12:00:00+00:00".to_string());

    let index = index_of(&[("feature_1", same)]);
    let result = classify(vec![record.clone()], &index, ChangePolicy::Timestamp);
    assert_eq!(result.unchanged.len(), 1, "equal timestamps are unchanged");

    let index = index_of(&[("feature_1", older)]);
    let result = classify(vec![record], &index, ChangePolicy::Timestamp);
    assert_eq!(result.changed.len(), 1, "newer source row is changed");
}

#[test]
fn timestamp_policy_without_source_timestamp_is_unchanged() {
    let mut record = feature_record(1, "text");
    record.updated_at = None;

    let mut entry = stored_entry(&record);
    entry.updated_at = Some("2024-03-09T12:00:00+00:00".to_string());

    let index = index_of(&[("feature_1", entry)]);
    let result = classify(vec![record], &index, ChangePolicy::Timestamp);

    assert_eq!(result.unchanged.len(), 1);
}

#[test]
fn timestamp_policy_treats_unparseable_stored_value_as_stale() {
    let record = feature_record(1, "text");
    let mut entry = stored_entry(&record);
    entry.updated_at = Some("not a timestamp".to_string());

    let index = index_of(&[("feature_1", entry.clone())]);
    let result = classify(vec![record.clone()], &index, ChangePolicy::Timestamp);
    assert_eq!(result.changed.len(), 1);

    entry.updated_at = None;
    let index = index_of(&[("feature_1", entry)]);
    let result = classify(vec![record], &index, ChangePolicy::Timestamp);
    assert_eq!(result.changed.len(), 1);
}

#[test]
fn duplicate_document_ids_keep_the_later_row() {
    let earlier = feature_record(1, "first version");
    let later = feature_record(1, "second version");
    let later_hash = later.fingerprint();

    let result = classify(vec![earlier, later], &StoreIndex::new(), ChangePolicy::ContentHash);

    assert_eq!(result.new.len(), 1);
    assert_eq!(result.new[0].fingerprint(), later_hash);
}

#[test]
fn pending_preserves_new_then_changed_order() {
    let changed = feature_record(1, "revised");
    let mut stale = stored_entry(&changed);
    stale.content_hash = "old".to_string();

    let index = index_of(&[("feature_1", stale)]);
    let result = classify(
        vec![changed, feature_record(2, "brand new")],
        &index,
        ChangePolicy::ContentHash,
    );

    let pending = result.pending();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].id, 2, "new records come first");
    assert_eq!(pending[1].id, 1);
}

#[test]
fn policy_parses_accepted_spellings() {
    assert_eq!("content_hash".parse::<ChangePolicy>().unwrap(), ChangePolicy::ContentHash);
    assert_eq!("hash".parse::<ChangePolicy>().unwrap(), ChangePolicy::ContentHash);
    assert_eq!("Timestamp".parse::<ChangePolicy>().unwrap(), ChangePolicy::Timestamp);
    assert_eq!("force-all".parse::<ChangePolicy>().unwrap(), ChangePolicy::ForceAll);
    assert_eq!("skip_existing".parse::<ChangePolicy>().unwrap(), ChangePolicy::SkipExisting);
    assert!("everything".parse::<ChangePolicy>().is_err());
}

#[test]
fn policy_default_is_content_hash() {
    assert_eq!(ChangePolicy::default(), ChangePolicy::ContentHash);
    for policy in ChangePolicy::ALL {
        assert_eq!(policy.to_string().parse::<ChangePolicy>().unwrap(), policy);
    }
}
