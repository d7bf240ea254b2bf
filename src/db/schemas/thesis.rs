//! Thesis document schema
//!
//! One thesis per registered group, carrying the progress, defer and
//! correction state machines.

use bson::Document;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{lookup_index, unique_index, IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::db::store::Record;
use crate::workflow::{CorrectionState, DeferStatus, StageSlots};

pub const THESIS_COLLECTION: &str = "theses";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ThesisDoc {
    /// Same value as `group_id`
    pub thesis_id: i64,

    pub group_id: i64,

    /// Roster snapshot taken at registration
    pub student_ids: Vec<String>,

    pub topic: String,

    pub supervisor_id: String,

    #[serde(rename = "abstract")]
    pub summary: String,

    /// Number of stages submitted (0-3)
    #[serde(default)]
    pub progress: u8,

    #[serde(default)]
    pub feedback: StageSlots<String>,

    /// Stored report paths
    #[serde(default)]
    pub reports: StageSlots<Option<String>>,

    #[serde(default)]
    pub defer_status: DeferStatus,

    #[serde(default)]
    pub correction: CorrectionState,

    /// Assigned research or teaching assistant
    #[serde(rename = "RaTa", default, skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,

    #[serde(default)]
    pub version: i64,

    #[serde(default)]
    pub metadata: Metadata,
}

impl ThesisDoc {
    pub fn new(
        group_id: i64,
        student_ids: Vec<String>,
        supervisor_id: impl Into<String>,
        topic: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            thesis_id: group_id,
            group_id,
            student_ids,
            topic: topic.into(),
            supervisor_id: supervisor_id.into(),
            summary: summary.into(),
            progress: 0,
            feedback: StageSlots::default(),
            reports: StageSlots::default(),
            defer_status: DeferStatus::None,
            correction: CorrectionState::Idle,
            assistant_id: None,
            version: 0,
            metadata: Metadata::new(),
        }
    }

    pub fn has_student(&self, user_id: &str) -> bool {
        self.student_ids.iter().any(|s| s == user_id)
    }

    /// Supervisor or the assigned assistant
    pub fn is_reviewer(&self, user_id: &str) -> bool {
        self.supervisor_id == user_id || self.assistant_id.as_deref() == Some(user_id)
    }
}

impl IntoIndexes for ThesisDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            unique_index("thesis_id"),
            unique_index("group_id"),
            lookup_index("supervisor_id"),
            lookup_index("student_ids"),
        ]
    }
}

impl MutMetadata for ThesisDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Record for ThesisDoc {
    type Key = i64;
    const COLLECTION: &'static str = THESIS_COLLECTION;
    const KEY_FIELD: &'static str = "thesis_id";
    const UNIQUE_FIELDS: &'static [&'static str] = &["group_id"];

    fn key(&self) -> i64 {
        self.thesis_id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}
