use super::*;

fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[test]
fn fingerprint_is_deterministic() {
    let input = fields(&[
        ("name", "Daily Rewards"),
        ("description", "Login bonus calendar with streak multipliers"),
    ]);

    let first = content_fingerprint(&input);
    let second = content_fingerprint(&input);

    assert_eq!(first, second);
    assert_eq!(first.len(), 64, "expected a full SHA-256 hex digest");
    assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn fingerprint_changes_when_any_field_changes() {
    let base = fields(&[
        ("caption", "Main menu"),
        ("description", "Home screen with play button"),
        ("elements", "Element: Play - Type: button"),
    ]);
    let base_hash = content_fingerprint(&base);

    // Mutate one character in each field in turn
    for i in 0..base.len() {
        let mut mutated = base.clone();
        let mut value = mutated[i].1.clone();
        value.replace_range(0..1, "X");
        mutated[i].1 = value;

        assert_ne!(
            content_fingerprint(&mutated),
            base_hash,
            "mutating field {} should change the fingerprint",
            base[i].0
        );
    }
}

#[test]
fn field_boundaries_are_preserved() {
    // Without a delimiter these would concatenate to the same string
    let a = fields(&[("name", "ab"), ("description", "c")]);
    let b = fields(&[("name", "a"), ("description", "bc")]);

    assert_ne!(content_fingerprint(&a), content_fingerprint(&b));
}

#[test]
fn empty_fields_are_skipped() {
    let with_empty = fields(&[
        ("name", "Crafting"),
        ("description", ""),
        ("elements", "Element: Anvil"),
    ]);
    let without = fields(&[("name", "Crafting"), ("elements", "Element: Anvil")]);

    assert_eq!(
        content_fingerprint(&with_empty),
        content_fingerprint(&without)
    );
}

#[test]
fn all_empty_input_is_stable() {
    let empty = fields(&[("name", ""), ("description", "")]);

    assert_eq!(content_fingerprint(&empty), content_fingerprint(&[]));
    // SHA-256 of the empty string
    assert_eq!(
        content_fingerprint(&[]),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn combined_text_matches_embedded_document() {
    let input = fields(&[("name", "Shop"), ("description", "In-game store")]);

    let combined = combine_fields(&input);
    assert_eq!(combined, format!("Shop{}In-game store", FIELD_DELIMITER));
}

#[test]
fn field_order_matters() {
    let forward = fields(&[("name", "alpha"), ("description", "beta")]);
    let reversed = fields(&[("description", "beta"), ("name", "alpha")]);

    assert_ne!(
        content_fingerprint(&forward),
        content_fingerprint(&reversed)
    );
}
