//! Audit logging for workflow decisions
//!
//! Every state transition, administrative override and account decision is
//! mirrored to `tracing` and, when configured, appended to a JSONL file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::auth::{Actor, Role};

/// Audit event types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// A lifecycle rule moved a record to a new state
    Transition,
    /// An administrator bypassed the lifecycle rules
    Override,
    /// Account created, approved or changed
    Account,
    /// Login attempt
    AuthAttempt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: AuditKind,
    /// Record type, e.g. `thesis`, `group`, `proposal`
    pub entity: String,
    pub entity_id: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl AuditEvent {
    pub fn new(kind: AuditKind, entity: &str, entity_id: impl ToString, action: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            entity: entity.to_string(),
            entity_id: entity_id.to_string(),
            action: action.to_string(),
            actor_id: None,
            actor_role: None,
            detail: None,
        }
    }

    pub fn with_actor(mut self, actor: &Actor) -> Self {
        self.actor_id = Some(actor.user_id.clone());
        self.actor_role = Some(actor.role);
        self
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Convert to JSONL line
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Audit logger that writes events to tracing and an optional JSONL file
#[derive(Clone, Default)]
pub struct AuditLogger {
    inner: Arc<Mutex<Option<BufWriter<File>>>>,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize file logging to the specified path
    pub async fn init_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        *self.inner.lock().await = Some(BufWriter::new(file));

        info!("Audit logging initialized to {}", path.display());
        Ok(())
    }

    /// Log an audit event
    pub async fn log(&self, event: AuditEvent) {
        let actor = event.actor_id.as_deref().unwrap_or("-");
        match event.kind {
            AuditKind::Override => warn!(
                target: "quire::audit",
                "{} {} {} overridden by {}", event.entity, event.entity_id, event.action, actor
            ),
            _ => info!(
                target: "quire::audit",
                "{} {} {} by {}", event.entity, event.entity_id, event.action, actor
            ),
        }

        let mut writer = self.inner.lock().await;
        let Some(writer) = writer.as_mut() else {
            return;
        };

        let jsonl = match event.to_jsonl() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize audit event: {}", e);
                return;
            }
        };

        if let Err(e) = writeln!(writer, "{}", jsonl) {
            error!("Failed to write audit event: {}", e);
        }
        if let Err(e) = writer.flush() {
            error!("Failed to flush audit log: {}", e);
        }
    }

    /// Log a lifecycle transition `from -> to`
    pub async fn transition(
        &self,
        actor: &Actor,
        entity: &str,
        entity_id: impl ToString,
        action: &str,
        from: impl ToString,
        to: impl ToString,
    ) {
        let event = AuditEvent::new(AuditKind::Transition, entity, entity_id, action)
            .with_actor(actor)
            .with_detail(serde_json::json!({
                "from": from.to_string(),
                "to": to.to_string(),
            }));
        self.log(event).await;
    }

    /// Log an administrative override with the applied changes
    pub async fn overridden(
        &self,
        actor: &Actor,
        entity: &str,
        entity_id: impl ToString,
        changes: serde_json::Value,
    ) {
        let event = AuditEvent::new(AuditKind::Override, entity, entity_id, "update")
            .with_actor(actor)
            .with_detail(changes);
        self.log(event).await;
    }

    /// Log an account decision
    pub async fn account(&self, actor: Option<&Actor>, user_id: &str, action: &str) {
        let mut event = AuditEvent::new(AuditKind::Account, "user", user_id, action);
        if let Some(actor) = actor {
            event = event.with_actor(actor);
        }
        self.log(event).await;
    }

    /// Log a login attempt
    pub async fn auth_attempt(&self, identifier: &str, success: bool) {
        let event = AuditEvent::new(AuditKind::AuthAttempt, "user", identifier, "login")
            .with_detail(serde_json::json!({ "success": success }));
        self.log(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let actor = Actor::new("F1", Role::Faculty);
        let event = AuditEvent::new(AuditKind::Transition, "thesis", 4, "defer_decision")
            .with_actor(&actor)
            .with_detail(serde_json::json!({ "from": "pending", "to": "approved" }));

        let jsonl = event.to_jsonl().unwrap();
        assert!(jsonl.contains("\"kind\":\"transition\""));
        assert!(jsonl.contains("\"entity_id\":\"4\""));
        assert!(jsonl.contains("\"actor_role\":\"Faculty\""));
        assert!(jsonl.contains("approved"));
    }

    #[test]
    fn test_event_without_actor_omits_fields() {
        let event = AuditEvent::new(AuditKind::AuthAttempt, "user", "s1", "login");
        let jsonl = event.to_jsonl().unwrap();
        assert!(!jsonl.contains("actor_id"));
        assert!(!jsonl.contains("detail"));
    }

    #[tokio::test]
    async fn test_file_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let logger = AuditLogger::new();
        logger.init_file(path.clone()).await.unwrap();

        let admin = Actor::new("A1", Role::Admin);
        logger
            .overridden(&admin, "thesis", 2, serde_json::json!({ "progress": 1 }))
            .await;
        logger.auth_attempt("s1", false).await;

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"kind\":\"override\""));
        assert!(lines[1].contains("\"success\":false"));
    }
}
