//! Shared resource schema

use bson::Document;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::mongo::{unique_index, IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::db::store::Record;

pub const RESOURCE_COLLECTION: &str = "resources";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ResourceDoc {
    pub id: String,

    pub title: String,

    /// Public path under `/files/resources/`
    #[serde(rename = "filePath")]
    pub file_path: String,

    pub uploaded_by: String,

    #[serde(default)]
    pub version: i64,

    #[serde(default)]
    pub metadata: Metadata,
}

impl ResourceDoc {
    pub fn new(title: impl Into<String>, file_path: String, uploaded_by: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            file_path,
            uploaded_by: uploaded_by.into(),
            version: 0,
            metadata: Metadata::new(),
        }
    }
}

impl IntoIndexes for ResourceDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![unique_index("id")]
    }
}

impl MutMetadata for ResourceDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Record for ResourceDoc {
    type Key = String;
    const COLLECTION: &'static str = RESOURCE_COLLECTION;
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
