//! Services layer for Quire
//!
//! Business operations behind the HTTP routes. Each takes the shared
//! [`Context`] and the authenticated [`Actor`](crate::auth::Actor), applies
//! the workflow rules and persists through the stores.
//!
//! ## Services
//!
//! - **Accounts**: registration, login, password reset, user profiles
//! - **Approvals**: account and catalogue requests awaiting an administrator
//! - **Groups**: 3-5 student cohorts
//! - **Thesis**: registration, stage reports, feedback, defer and correction
//! - **Proposals**: pre-thesis topic pitches and faculty triage
//! - **Catalogue**: research domains and faculty expertise
//! - **Synopsis**, **Meetings**, **Resources**: faculty-facing catalogues
//! - **Mail**, **Files**: outbound mail and uploaded file storage

pub mod accounts;
pub mod approvals;
pub mod catalogue;
pub mod files;
pub mod groups;
pub mod mail;
pub mod meetings;
pub mod proposals;
pub mod resources;
pub mod synopsis;
pub mod thesis;

use std::collections::HashMap;
use std::sync::Arc;

pub use files::{FileArea, FileStore, StoredFile, Upload};
pub use mail::{LogMailer, MailMessage, Mailer, RecordingMailer, RelayMailer};

use crate::auth::{Actor, JwtValidator};
use crate::db::{Query, Stores, UserProfile};
use crate::logging::AuditLogger;
use crate::types::{QuireError, Result};

/// Deployment values the services need
#[derive(Debug, Clone)]
pub struct Settings {
    /// Registrations from this mail domain are students
    pub student_mail_domain: String,
    /// Base URL for links in outgoing mail
    pub frontend_url: String,
    pub reset_token_ttl_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            student_mail_domain: "g.bracu.ac.bd".into(),
            frontend_url: "http://localhost:3000".into(),
            reset_token_ttl_seconds: 900,
        }
    }
}

/// Everything an operation may touch
#[derive(Clone)]
pub struct Context {
    pub stores: Stores,
    pub mailer: Arc<dyn Mailer>,
    pub files: FileStore,
    pub audit: AuditLogger,
    pub jwt: Arc<JwtValidator>,
    pub settings: Settings,
}

pub(crate) fn require_admin(actor: &Actor) -> Result<()> {
    if actor.is_admin() {
        return Ok(());
    }
    Err(QuireError::forbidden("Administrator access required"))
}

pub(crate) fn require_staff(actor: &Actor) -> Result<()> {
    if actor.is_staff() {
        return Ok(());
    }
    Err(QuireError::forbidden("Staff access required"))
}

/// Trimmed value of a required text field
pub(crate) fn require_text(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(QuireError::validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

/// Profiles for a set of user ids, fetched in one query
pub(crate) async fn profiles_by_id(
    ctx: &Context,
    ids: &[String],
) -> Result<HashMap<String, UserProfile>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let users = ctx
        .stores
        .users
        .find(&Query::all().any_of("user_id", ids.iter().cloned()))
        .await?;
    Ok(users
        .into_iter()
        .map(|u| (u.user_id.clone(), u.profile()))
        .collect())
}

/// Profiles in the order of `ids`, skipping unknown ids
pub(crate) fn ordered_profiles(
    ids: &[String],
    profiles: &HashMap<String, UserProfile>,
) -> Vec<UserProfile> {
    ids.iter().filter_map(|id| profiles.get(id).cloned()).collect()
}
