//! Approval request schema
//!
//! Requests waiting on an administrator: new faculty accounts, domain
//! additions, and free-form asks.

use bson::Document;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::mongo::{lookup_index, unique_index, IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::db::store::Record;

pub const APPROVAL_COLLECTION: &str = "approval";

/// Kind filed automatically when a non-student registers
pub const REGISTRATION_KIND: &str = "registration";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ApprovalDoc {
    pub id: String,

    pub requester_id: String,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub msg: String,

    #[serde(default)]
    pub version: i64,

    #[serde(default)]
    pub metadata: Metadata,
}

impl ApprovalDoc {
    pub fn new(requester_id: impl Into<String>, kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            requester_id: requester_id.into(),
            kind: kind.into(),
            msg: msg.into(),
            version: 0,
            metadata: Metadata::new(),
        }
    }
}

impl IntoIndexes for ApprovalDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            unique_index("id"),
            lookup_index("requester_id"),
            lookup_index("msg"),
        ]
    }
}

impl MutMetadata for ApprovalDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Record for ApprovalDoc {
    type Key = String;
    const COLLECTION: &'static str = APPROVAL_COLLECTION;
    const KEY_FIELD: &'static str = "id";

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
