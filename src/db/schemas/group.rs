//! Group document schema

use bson::Document;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{unique_index, IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::db::store::Record;

pub const GROUP_COLLECTION: &str = "groups";

/// A cohort of 3-5 students that owns one thesis
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GroupDoc {
    pub id: i64,

    /// Ordered roster; the first member is the leader
    pub members: Vec<String>,

    /// Set once the group's thesis is registered; never cleared
    #[serde(default)]
    pub registered: bool,

    #[serde(default)]
    pub version: i64,

    #[serde(default)]
    pub metadata: Metadata,
}

impl GroupDoc {
    pub fn new(id: i64, members: Vec<String>) -> Self {
        Self {
            id,
            members,
            registered: false,
            version: 0,
            metadata: Metadata::new(),
        }
    }

    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }
}

impl IntoIndexes for GroupDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            unique_index("id"),
            // Multikey: a student id can appear in only one group
            unique_index("members"),
        ]
    }
}

impl MutMetadata for GroupDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Record for GroupDoc {
    type Key = i64;
    const COLLECTION: &'static str = GROUP_COLLECTION;
    const KEY_FIELD: &'static str = "id";
    const UNIQUE_FIELDS: &'static [&'static str] = &["members"];

    fn key(&self) -> i64 {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}
