//! Common metadata for all documents
//!
//! Tracks creation and update timestamps. Both stores stamp these on write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Common metadata for all documents
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    /// When the document was last written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// When the document was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Metadata {
    /// Create new metadata with current timestamp
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            updated_at: Some(now),
            created_at: Some(now),
        }
    }

    /// Stamp a first write
    pub fn mark_created(&mut self) {
        let now = Utc::now();
        self.created_at = Some(now);
        self.updated_at = Some(now);
    }

    /// Stamp a subsequent write
    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
        if self.created_at.is_none() {
            self.created_at = self.updated_at;
        }
    }
}
