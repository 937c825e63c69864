//! Data models for SAM documents
//!
//! Defines the persisted document, its metadata projection, and the
//! payloads used to create and patch documents.
//!
//! Timestamps are serialized as epoch milliseconds and field names use
//! camelCase, matching the persisted record layout:
//!
//! ```text
//! { key, createdAt, modifiedAt, name?, description?, generationStatus?, body }
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Progress of the derived computation run over a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Pending,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Pending => "pending",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the known generation statuses
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown generation status '{0}' (expected pending, completed or failed)")]
pub struct ParseGenerationStatusError(pub String);

impl FromStr for GenerationStatus {
    type Err = ParseGenerationStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(GenerationStatus::Pending),
            "completed" => Ok(GenerationStatus::Completed),
            "failed" => Ok(GenerationStatus::Failed),
            _ => Err(ParseGenerationStatusError(s.to_string())),
        }
    }
}

/// A complete Social Accounting Matrix document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SamDocument {
    /// Unique identifier, assigned by the storage engine on create
    pub key: String,
    /// When the document was created; never changes afterwards
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// When the document was last replaced
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub modified_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_status: Option<GenerationStatus>,
    /// Matrix content and scratch data. Stored as given, never inspected.
    #[serde(default = "empty_body")]
    pub body: Value,
}

impl SamDocument {
    /// Build a stored document from a create payload
    pub fn from_new(key: impl Into<String>, new: NewSam, now: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            created_at: now,
            modified_at: now,
            name: new.name,
            description: new.description,
            generation_status: new.generation_status,
            body: new.body,
        }
    }

    /// Project the document down to its list-view fields
    pub fn metadata(&self) -> SamMetadata {
        SamMetadata {
            key: self.key.clone(),
            created_at: self.created_at,
            modified_at: self.modified_at,
            name: self.name.clone(),
            description: self.description.clone(),
            generation_status: self.generation_status,
        }
    }

    /// Name for display, falling back to the key
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.key)
    }
}

/// Body-less projection of a document used by list views
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SamMetadata {
    pub key: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub modified_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_status: Option<GenerationStatus>,
}

impl SamMetadata {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.key)
    }
}

/// Payload for creating a document
///
/// Carries no key or timestamps; the storage engine assigns those.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewSam {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub generation_status: Option<GenerationStatus>,
    #[serde(default = "empty_body")]
    pub body: Value,
}

impl Default for NewSam {
    fn default() -> Self {
        Self {
            name: None,
            description: None,
            generation_status: None,
            body: empty_body(),
        }
    }
}

impl NewSam {
    /// Create a payload with the given name and an empty body
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: GenerationStatus) -> Self {
        self.generation_status = Some(status);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }
}

/// Partial update of an existing document, keyed by document key
///
/// Unset fields keep their stored value. `Some(None)` clears an optional
/// field. The key and creation time cannot be patched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamPatch {
    pub key: String,
    pub name: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub generation_status: Option<Option<GenerationStatus>>,
    pub body: Option<Value>,
}

impl SamPatch {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn name(mut self, name: Option<String>) -> Self {
        self.name = Some(name);
        self
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    pub fn generation_status(mut self, status: Option<GenerationStatus>) -> Self {
        self.generation_status = Some(status);
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// True when the patch would not change any field
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.generation_status.is_none()
            && self.body.is_none()
    }

    /// Apply the set fields over `existing`, stamping `modified_at = now`
    pub fn merge_into(&self, existing: &SamDocument, now: DateTime<Utc>) -> SamDocument {
        let mut merged = existing.clone();
        if let Some(ref name) = self.name {
            merged.name = name.clone();
        }
        if let Some(ref description) = self.description {
            merged.description = description.clone();
        }
        if let Some(status) = self.generation_status {
            merged.generation_status = status;
        }
        if let Some(ref body) = self.body {
            merged.body = body.clone();
        }
        merged.modified_at = now;
        merged
    }
}

fn empty_body() -> Value {
    Value::Object(serde_json::Map::new())
}
