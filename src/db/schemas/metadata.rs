//! Timestamps and soft-delete flag shared by every document

use bson::DateTime;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Metadata {
    #[serde(default)]
    pub is_deleted: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

impl Metadata {
    pub fn new() -> Self {
        let now = DateTime::now();
        Self {
            is_deleted: false,
            deleted_at: None,
            updated_at: Some(now),
            created_at: Some(now),
        }
    }

    /// Creation time, falling back to the epoch for legacy documents
    pub fn created(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at.unwrap_or(DateTime::from_millis(0)).to_chrono()
    }

    pub fn updated(&self) -> chrono::DateTime<chrono::Utc> {
        self.updated_at
            .or(self.created_at)
            .unwrap_or(DateTime::from_millis(0))
            .to_chrono()
    }
}
