//! Proposal document schema

use bson::Document;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::mongo::{lookup_index, unique_index, IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::db::store::Record;
use crate::workflow::ProposalStatus;

pub const PROPOSAL_COLLECTION: &str = "student_proposals";

/// Faculty member who last triaged a proposal
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Reviewer {
    pub faculty_id: String,
    pub name: String,
    pub email: String,
}

/// A student's topic pitch
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProposalDoc {
    pub id: String,

    pub student_id: String,

    pub domain: String,

    pub idea: String,

    #[serde(default)]
    pub status: ProposalStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<Reviewer>,

    #[serde(default)]
    pub version: i64,

    #[serde(default)]
    pub metadata: Metadata,
}

impl ProposalDoc {
    pub fn new(student_id: impl Into<String>, domain: impl Into<String>, idea: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.into(),
            domain: domain.into(),
            idea: idea.into(),
            status: ProposalStatus::Pending,
            updated_by: None,
            version: 0,
            metadata: Metadata::new(),
        }
    }

    /// Faculty id recorded by the last triage
    pub fn reviewer_id(&self) -> Option<&str> {
        self.updated_by.as_ref().map(|r| r.faculty_id.as_str())
    }
}

impl IntoIndexes for ProposalDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            unique_index("id"),
            unique_index("student_id"),
            lookup_index("status"),
        ]
    }
}

impl MutMetadata for ProposalDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Record for ProposalDoc {
    type Key = String;
    const COLLECTION: &'static str = PROPOSAL_COLLECTION;
    const KEY_FIELD: &'static str = "id";
    const UNIQUE_FIELDS: &'static [&'static str] = &["student_id"];

    fn key(&self) -> String {
        self.id.clone()
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}
