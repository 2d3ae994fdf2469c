// Content fingerprinting
// Detects semantic text changes independent of metadata churn

#[cfg(test)]
mod tests;

use sha2::{Digest, Sha256};

/// Delimiter between field values. The ASCII unit separator cannot appear in
/// normal text content, so "ab" + "c" and "a" + "bc" hash differently.
pub const FIELD_DELIMITER: char = '\u{1f}';

/// Compute the content fingerprint for an ordered set of text fields.
///
/// Empty field values are skipped; the remaining values are joined in input
/// order with [`FIELD_DELIMITER`] and hashed with SHA-256. The result is a
/// lowercase hex digest, stable across runs and processes. All-empty input
/// is valid and yields the digest of the empty string.
#[inline]
pub fn content_fingerprint(fields: &[(String, String)]) -> String {
    let combined = combine_fields(fields);
    let mut hasher = Sha256::new();
    hasher.update(combined.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Join non-empty field values in order with the field delimiter.
///
/// This is the exact text that gets embedded, so the stored document text
/// can be re-fingerprinted to verify the stored hash.
#[inline]
pub fn combine_fields(fields: &[(String, String)]) -> String {
    let mut combined = String::new();
    for (_, value) in fields {
        if value.is_empty() {
            continue;
        }
        if !combined.is_empty() {
            combined.push(FIELD_DELIMITER);
        }
        combined.push_str(value);
    }
    combined
}
