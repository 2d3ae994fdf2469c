
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::fingerprint::{combine_fields, content_fingerprint};

/// Which source table a record came from. Determines the vector-store
/// collection and the document-id namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Feature,
    Screenshot,
}

impl RecordKind {
    /// Vector-store collection (LanceDB table) for this kind.
    #[inline]
    pub fn collection_name(self) -> &'static str {
        match self {
            RecordKind::Feature => "game_features",
            RecordKind::Screenshot => "game_screenshots",
        }
    }

    /// Stable document id: `feature_123` / `screenshot_456`. Upserts key on
    /// this, so it must never change for a given source row.
    #[inline]
    pub fn document_id(self, source_id: i64) -> String {
        match self {
            RecordKind::Feature => format!("feature_{source_id}"),
            RecordKind::Screenshot => format!("screenshot_{source_id}"),
        }
    }
}

impl std::fmt::Display for RecordKind {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            RecordKind::Feature => write!(f, "features"),
            RecordKind::Screenshot => write!(f, "screenshots"),
        }
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "feature" | "features" => Ok(RecordKind::Feature),
            "screenshot" | "screenshots" => Ok(RecordKind::Screenshot),
            other => Err(format!(
                "unknown record kind '{other}' (expected 'features' or 'screenshots')"
            )),
        }
    }
}

/// One normalized source row, ready for fingerprinting and embedding.
///
/// `text_fields` is ordered; concatenation order defines both the embedded
/// text and the content fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: i64,
    pub kind: RecordKind,
    pub text_fields: Vec<(String, String)>,
    pub updated_at: Option<DateTime<Utc>>,
    pub game_id: String,
}

impl SourceRecord {
    #[inline]
    pub fn document_id(&self) -> String {
        self.kind.document_id(self.id)
    }

    /// The exact text that gets embedded and stored as the document body.
    #[inline]
    pub fn combined_text(&self) -> String {
        combine_fields(&self.text_fields)
    }

    #[inline]
    pub fn fingerprint(&self) -> String {
        content_fingerprint(&self.text_fields)
    }

    /// True when no field carries embeddable text.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text_fields.iter().all(|(_, v)| v.trim().is_empty())
    }
}

/// Raw row from `features_game`.
#[derive(Debug, Clone, FromRow)]
pub struct FeatureRow {
    pub feature_id: i64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub game_id: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl FeatureRow {
    #[inline]
    pub fn into_record(self) -> SourceRecord {
        SourceRecord {
            id: self.feature_id,
            kind: RecordKind::Feature,
            text_fields: vec![
                ("name".to_string(), self.name.unwrap_or_default()),
                (
                    "description".to_string(),
                    self.description.unwrap_or_default(),
                ),
            ],
            updated_at: self.updated_at,
            game_id: self.game_id.unwrap_or_default(),
        }
    }
}

/// Raw row from `screenshots`. `elements` is a JSONB column describing UI
/// elements on the screenshot.
#[derive(Debug, Clone, FromRow)]
pub struct ScreenshotRow {
    pub screenshot_id: i64,
    pub caption: Option<String>,
    pub description: Option<String>,
    pub elements: Option<serde_json::Value>,
    pub game_id: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ScreenshotRow {
    #[inline]
    pub fn into_record(self) -> SourceRecord {
        let elements_text = self
            .elements
            .as_ref()
            .map(flatten_elements)
            .unwrap_or_default();

        SourceRecord {
            id: self.screenshot_id,
            kind: RecordKind::Screenshot,
            text_fields: vec![
                ("caption".to_string(), self.caption.unwrap_or_default()),
                (
                    "description".to_string(),
                    self.description.unwrap_or_default(),
                ),
                ("elements".to_string(), elements_text),
            ],
            updated_at: self.updated_at,
            game_id: self.game_id.unwrap_or_default(),
        }
    }
}

/// Flatten the JSONB `elements` structure to searchable text.
///
/// A list of objects becomes `Element: Play - Type: button - Description:
/// starts a match; Element: ...`; a single object is one such entry; any
/// other JSON shape falls back to its string form.
pub fn flatten_elements(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Array(items) => {
            let formatted: Vec<String> =
                items.iter().filter_map(format_element_object).collect();
            formatted.join("; ")
        }
        serde_json::Value::Object(_) => format_element_object(value).unwrap_or_default(),
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_element_object(value: &serde_json::Value) -> Option<String> {
    let obj = value.as_object()?;
    let mut parts = Vec::new();

    if let Some(name) = obj.get("name").and_then(|v| v.as_str()) {
        parts.push(format!("Element: {name}"));
    }
    if let Some(kind) = obj.get("type").and_then(|v| v.as_str()) {
        parts.push(format!("Type: {kind}"));
    }
    if let Some(description) = obj.get("description").and_then(|v| v.as_str()) {
        parts.push(format!("Description: {description}"));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" - "))
    }
}
