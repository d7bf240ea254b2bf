//! Outgoing mail
//!
//! Mail leaves through a [`Mailer`]. Production posts to an HTTP mail relay;
//! without one configured, messages are only logged.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::Actor;
use crate::db::Query;
use crate::services::{require_text, Context};
use crate::types::{QuireError, Result};

/// A message ready to hand to a mailer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MailMessage {
    pub to: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<String>,
    pub subject: String,
    pub text: String,
}

impl MailMessage {
    pub fn new(to: Vec<String>, subject: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            to,
            bcc: Vec::new(),
            subject: subject.into(),
            text: text.into(),
        }
    }

    pub fn with_bcc(mut self, bcc: Vec<String>) -> Self {
        self.bcc = bcc;
        self
    }

    fn recipient_count(&self) -> usize {
        self.to.len() + self.bcc.len()
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Posts messages as JSON to an HTTP mail relay
pub struct RelayMailer {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    from: String,
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    #[serde(flatten)]
    message: &'a MailMessage,
}

impl RelayMailer {
    pub fn new(url: impl Into<String>, api_key: Option<String>, from: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("quire/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            client,
            url: url.into(),
            api_key,
            from: from.into(),
        }
    }
}

#[async_trait]
impl Mailer for RelayMailer {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        let mut request = self.client.post(&self.url).json(&RelayPayload {
            from: &self.from,
            message,
        });
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QuireError::Mail(format!("relay returned {}: {}", status, body)));
        }

        debug!(
            "Mail '{}' relayed to {} recipient(s)",
            message.subject,
            message.recipient_count()
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "relay"
    }
}

/// Logs messages instead of sending them
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        info!(
            "[mail] to={:?} bcc={} subject='{}'\n{}",
            message.to,
            message.bcc.len(),
            message.subject,
            message.text
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Keeps sent messages in memory; can be switched to fail every send
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(QuireError::Mail("recording mailer set to fail".into()));
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

// =============================================================================
// Direct mail and broadcast
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SendMailRequest {
    pub mail: String,
    pub subject: String,
    pub msg: String,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub subject: String,
    pub msg: String,
}

/// Send one message on behalf of a staff member. Delivery failure is an error.
pub async fn send_direct(ctx: &Context, actor: &Actor, req: SendMailRequest) -> Result<()> {
    if !actor.is_staff() {
        return Err(QuireError::forbidden("Only staff can send mail"));
    }
    let to = require_text(&req.mail, "mail")?;
    require_text(&req.subject, "subject")?;
    require_text(&req.msg, "msg")?;

    let message = MailMessage::new(vec![to.clone()], req.subject, req.msg);
    ctx.mailer.send(&message).await?;
    info!("Mail sent by {} to {}", actor.user_id, to);
    Ok(())
}

/// BCC a message to every account. Returns the recipient count.
pub async fn broadcast(ctx: &Context, actor: &Actor, req: BroadcastRequest) -> Result<usize> {
    if !actor.is_admin() {
        return Err(QuireError::forbidden("Only administrators can broadcast"));
    }
    require_text(&req.subject, "subject")?;
    require_text(&req.msg, "msg")?;

    let recipients: Vec<String> = ctx
        .stores
        .users
        .find(&Query::all())
        .await?
        .into_iter()
        .map(|u| u.mail)
        .filter(|m| !m.is_empty())
        .collect();

    if recipients.is_empty() {
        warn!("Broadcast requested but there are no recipients");
        return Ok(0);
    }

    let count = recipients.len();
    let message = MailMessage::new(Vec::new(), req.subject, req.msg).with_bcc(recipients);
    ctx.mailer.send(&message).await?;
    info!("Broadcast by {} delivered to {} recipient(s)", actor.user_id, count);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::services::testing::{seed_user, test_context};

    #[tokio::test]
    async fn test_direct_mail_requires_staff() {
        let (ctx, mailer, _dir) = test_context().await;
        let student = Actor::new("s1", Role::Student);
        let req = SendMailRequest {
            mail: "x@uni.edu".into(),
            subject: "Hi".into(),
            msg: "Hello".into(),
        };
        let err = send_direct(&ctx, &student, req).await.unwrap_err();
        assert!(matches!(err, QuireError::Forbidden(_)));
        assert!(mailer.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_direct_mail_failure_is_fatal() {
        let (ctx, mailer, _dir) = test_context().await;
        mailer.set_failing(true);
        let faculty = Actor::new("f1", Role::Faculty);
        let req = SendMailRequest {
            mail: "x@uni.edu".into(),
            subject: "Hi".into(),
            msg: "Hello".into(),
        };
        let err = send_direct(&ctx, &faculty, req).await.unwrap_err();
        assert!(matches!(err, QuireError::Mail(_)));
    }

    #[tokio::test]
    async fn test_broadcast_uses_bcc() {
        let (ctx, mailer, _dir) = test_context().await;
        seed_user(&ctx, "s1", Role::Student).await;
        seed_user(&ctx, "f1", Role::Faculty).await;

        let admin = Actor::new("a1", Role::Admin);
        let count = broadcast(
            &ctx,
            &admin,
            BroadcastRequest {
                subject: "Deadline".into(),
                msg: "P2 due Friday".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(count, 2);

        let sent = mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].to.is_empty());
        assert_eq!(sent[0].bcc.len(), 2);
    }
}
