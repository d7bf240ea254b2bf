//! Research domain schemas
//!
//! `DomainEntryDoc` is the catalogue proposals must pick from;
//! `ExpertiseDoc` records what a faculty member supervises.

use bson::Document;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{unique_index, IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::db::store::Record;

pub const DOMAIN_LIST_COLLECTION: &str = "domain_list";
pub const EXPERTISE_COLLECTION: &str = "domain";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DomainEntryDoc {
    pub id_no: i64,

    pub domain_subject: String,

    #[serde(default)]
    pub version: i64,

    #[serde(default)]
    pub metadata: Metadata,
}

impl DomainEntryDoc {
    pub fn new(id_no: i64, domain_subject: impl Into<String>) -> Self {
        Self {
            id_no,
            domain_subject: domain_subject.into(),
            version: 0,
            metadata: Metadata::new(),
        }
    }

    pub fn matches_subject(&self, subject: &str) -> bool {
        self.domain_subject.trim().eq_ignore_ascii_case(subject.trim())
    }
}

impl IntoIndexes for DomainEntryDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![unique_index("id_no"), unique_index("domain_subject")]
    }
}

impl MutMetadata for DomainEntryDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Record for DomainEntryDoc {
    type Key = i64;
    const COLLECTION: &'static str = DOMAIN_LIST_COLLECTION;
    const KEY_FIELD: &'static str = "id_no";
    const UNIQUE_FIELDS: &'static [&'static str] = &["domain_subject"];

    fn key(&self) -> i64 {
        self.id_no
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}

/// A faculty member's supervision area
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExpertiseDoc {
    pub sup_id: String,

    #[serde(default)]
    pub domain: String,

    #[serde(default)]
    pub field: String,

    #[serde(default)]
    pub version: i64,

    #[serde(default)]
    pub metadata: Metadata,
}

impl ExpertiseDoc {
    pub fn new(sup_id: impl Into<String>, domain: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            sup_id: sup_id.into(),
            domain: domain.into(),
            field: field.into(),
            version: 0,
            metadata: Metadata::new(),
        }
    }
}

impl IntoIndexes for ExpertiseDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![unique_index("sup_id")]
    }
}

impl MutMetadata for ExpertiseDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Record for ExpertiseDoc {
    type Key = String;
    const COLLECTION: &'static str = EXPERTISE_COLLECTION;
    const KEY_FIELD: &'static str = "sup_id";

    fn key(&self) -> String {
        self.sup_id.clone()
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}
