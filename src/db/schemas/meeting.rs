//! Meeting book schema
//!
//! One document per faculty member holding every booked event.

use bson::Document;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{unique_index, IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::db::store::Record;

pub const MEETING_COLLECTION: &str = "faculty_approvals";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MeetingEvent {
    pub student_id: String,

    /// `YYYY-MM-DD`
    pub date: String,

    pub time: String,

    #[serde(rename = "type")]
    pub kind: String,

    /// Confirmed by the faculty member
    #[serde(default)]
    pub confirmed: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MeetingBookDoc {
    pub faculty_id: String,

    #[serde(default)]
    pub events: Vec<MeetingEvent>,

    #[serde(default)]
    pub version: i64,

    #[serde(default)]
    pub metadata: Metadata,
}

impl MeetingBookDoc {
    pub fn new(faculty_id: impl Into<String>, events: Vec<MeetingEvent>) -> Self {
        Self {
            faculty_id: faculty_id.into(),
            events,
            version: 0,
            metadata: Metadata::new(),
        }
    }
}

impl IntoIndexes for MeetingBookDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![unique_index("faculty_id")]
    }
}

impl MutMetadata for MeetingBookDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Record for MeetingBookDoc {
    type Key = String;
    const COLLECTION: &'static str = MEETING_COLLECTION;
    const KEY_FIELD: &'static str = "faculty_id";

    fn key(&self) -> String {
        self.faculty_id.clone()
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}
