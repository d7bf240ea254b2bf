//! Synopsis document schema
//!
//! Topics faculty advertise for students looking for a supervisor.

use bson::Document;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{lookup_index, unique_index, IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::db::store::Record;

pub const SYNOPSIS_COLLECTION: &str = "synopsis";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SynopsisDoc {
    pub syn_id: i64,

    pub sup_id: String,

    pub name: String,

    pub mail: String,

    pub topic: String,

    /// Whether the supervisor is still taking students on this topic
    #[serde(default)]
    pub open: bool,

    #[serde(default)]
    pub version: i64,

    #[serde(default)]
    pub metadata: Metadata,
}

impl IntoIndexes for SynopsisDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![unique_index("syn_id"), lookup_index("sup_id")]
    }
}

impl MutMetadata for SynopsisDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Record for SynopsisDoc {
    type Key = i64;
    const COLLECTION: &'static str = SYNOPSIS_COLLECTION;
    const KEY_FIELD: &'static str = "syn_id";

    fn key(&self) -> i64 {
        self.syn_id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}
