//! User document schema
//!
//! Students, faculty, assistants and administrators share one collection,
//! keyed by university id.

use bson::Document;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::db::mongo::{lookup_index, unique_index, IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::db::store::Record;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// Account lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    /// Waiting for an administrator to approve the account
    Pending,
    Disabled,
}

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserDoc {
    /// University id (student or staff number)
    pub user_id: String,

    pub name: String,

    /// Lowercased mail address
    pub mail: String,

    /// Argon2 password hash
    pub password_hash: String,

    pub role: Role,

    #[serde(default)]
    pub status: AccountStatus,

    /// Profile picture URL
    #[serde(default)]
    pub profile_pic: String,

    #[serde(default)]
    pub version: i64,

    /// Common metadata (created_at, updated_at)
    #[serde(default)]
    pub metadata: Metadata,
}

/// Public view of a user, without credentials
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserProfile {
    pub user_id: String,
    pub name: String,
    pub mail: String,
    pub role: Role,
    pub status: AccountStatus,
    pub profile_pic: String,
}

impl UserDoc {
    /// Create a new user document
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        mail: impl Into<String>,
        password_hash: String,
        role: Role,
        status: AccountStatus,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            mail: mail.into().trim().to_lowercase(),
            password_hash,
            role,
            status,
            profile_pic: String::new(),
            version: 0,
            metadata: Metadata::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            mail: self.mail.clone(),
            role: self.role,
            status: self.status,
            profile_pic: self.profile_pic.clone(),
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            unique_index("user_id"),
            unique_index("mail"),
            lookup_index("role"),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Record for UserDoc {
    type Key = String;
    const COLLECTION: &'static str = USER_COLLECTION;
    const KEY_FIELD: &'static str = "user_id";
    const UNIQUE_FIELDS: &'static [&'static str] = &["mail"];

    fn key(&self) -> String {
        self.user_id.clone()
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}
