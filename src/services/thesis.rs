//! Thesis records
//!
//! Registration turns a group into a thesis. After that the thesis moves
//! through three stage reports, and carries two side workflows: defer
//! requests and topic corrections. Transitions are decided in
//! [`crate::workflow`]; this module loads, authorizes and persists.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{Actor, Role};
use crate::db::{mutate, Query, ThesisDoc, UserProfile};
use crate::services::files::{FileArea, Upload};
use crate::services::mail::MailMessage;
use crate::services::{ordered_profiles, profiles_by_id, require_admin, require_text, Context};
use crate::types::{QuireError, Result};
use crate::workflow::{
    correction, defer, progress, CorrectionEvent, CorrectionState, DeferDecision, DeferEvent,
    DeferStatus, Stage, StageSlots, FINAL_PROGRESS,
};

// =============================================================================
// Requests and views
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterThesisRequest {
    pub group_id: i64,
    #[serde(alias = "student_id")]
    pub supervisor_id: String,
    pub topic: String,
    #[serde(rename = "abstract")]
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct RegistrationOutcome {
    pub thesis: ThesisDoc,
    pub email_sent: bool,
    pub email_message: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub stage: String,
    pub feedback: String,
}

#[derive(Debug, Deserialize)]
pub struct AssistantRequest {
    #[serde(alias = "id")]
    pub assistant_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ThesisRef {
    pub thesis_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct DeferDecisionRequest {
    pub thesis_id: i64,
    pub decision: String,
}

#[derive(Debug, Deserialize)]
pub struct CorrectionApproval {
    pub thesis_id: i64,
    #[serde(default)]
    pub approve: bool,
}

#[derive(Debug, Deserialize)]
pub struct CorrectionUpdate {
    #[serde(default)]
    pub topic: String,
    #[serde(default, rename = "abstract")]
    pub summary: String,
}

/// Administrative override. Bypasses every workflow rule.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ThesisPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervisor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, rename = "RaTa", skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defer_status: Option<DeferStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<CorrectionState>,
}

impl ThesisPatch {
    fn is_empty(&self) -> bool {
        self.topic.is_none()
            && self.summary.is_none()
            && self.supervisor_id.is_none()
            && self.progress.is_none()
            && self.assistant_id.is_none()
            && self.defer_status.is_none()
            && self.correction.is_none()
    }

    fn apply(&self, thesis: &mut ThesisDoc) {
        if let Some(ref topic) = self.topic {
            thesis.topic = topic.clone();
        }
        if let Some(ref summary) = self.summary {
            thesis.summary = summary.clone();
        }
        if let Some(ref supervisor) = self.supervisor_id {
            thesis.supervisor_id = supervisor.clone();
        }
        if let Some(progress) = self.progress {
            thesis.progress = progress;
        }
        if let Some(ref assistant) = self.assistant_id {
            thesis.assistant_id = Some(assistant.clone()).filter(|a| !a.is_empty());
        }
        if let Some(status) = self.defer_status {
            thesis.defer_status = status;
        }
        if let Some(state) = self.correction {
            thesis.correction = state;
        }
    }
}

/// Thesis with member profiles and the flag view of the correction state
///
/// `correction_approved` is true only while an approval is unused, so a
/// correction can be applied exactly when it is set.
#[derive(Debug, Serialize)]
pub struct ThesisDetail {
    #[serde(flatten)]
    pub thesis: ThesisDoc,
    pub correction_request: bool,
    pub correction_approved: bool,
    pub updated_topic: u8,
    pub students: Vec<UserProfile>,
}

impl ThesisDetail {
    fn new(thesis: ThesisDoc, students: Vec<UserProfile>) -> Self {
        Self {
            correction_request: thesis.correction.requested(),
            correction_approved: thesis.correction.approved(),
            updated_topic: u8::from(thesis.correction.topic_updated()),
            thesis,
            students,
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ProgressSummary {
    pub thesis_id: i64,
    pub group_id: i64,
    pub supervisor_id: String,
    pub progress: u8,
    pub reports: StageSlots<Option<String>>,
}

impl From<&ThesisDoc> for ProgressSummary {
    fn from(thesis: &ThesisDoc) -> Self {
        Self {
            thesis_id: thesis.thesis_id,
            group_id: thesis.group_id,
            supervisor_id: thesis.supervisor_id.clone(),
            progress: thesis.progress,
            reports: thesis.reports.clone(),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DeferEntry {
    pub thesis_id: i64,
    pub student_ids: Vec<String>,
    pub progress: u8,
    pub defer_status: DeferStatus,
    pub supervisor_id: String,
}

// =============================================================================
// Helpers
// =============================================================================

async fn load(ctx: &Context, thesis_id: i64) -> Result<ThesisDoc> {
    ctx.stores
        .theses
        .get(&thesis_id)
        .await?
        .ok_or_else(|| QuireError::not_found(format!("Thesis {} not found", thesis_id)))
}

fn require_member(actor: &Actor, thesis: &ThesisDoc) -> Result<()> {
    if actor.is_admin() || thesis.has_student(&actor.user_id) {
        return Ok(());
    }
    Err(QuireError::forbidden("Only members of this thesis group can do this"))
}

fn require_supervisor(actor: &Actor, thesis: &ThesisDoc) -> Result<()> {
    if actor.is_admin() || thesis.supervisor_id == actor.user_id {
        return Ok(());
    }
    Err(QuireError::forbidden("Only the supervisor can do this"))
}

fn require_reviewer(actor: &Actor, thesis: &ThesisDoc) -> Result<()> {
    if actor.is_admin() || thesis.is_reviewer(&actor.user_id) {
        return Ok(());
    }
    Err(QuireError::forbidden(
        "Only the supervisor or assigned assistant can do this",
    ))
}

fn registration_mail(recipients: Vec<String>, thesis: &ThesisDoc) -> MailMessage {
    let text = format!(
        "Your thesis has been registered.\n\n\
         Thesis ID: {}\nGroup ID: {}\nSupervisor: {}\nTopic: {}\n\nAbstract:\n{}\n",
        thesis.thesis_id, thesis.group_id, thesis.supervisor_id, thesis.topic, thesis.summary
    );
    MailMessage::new(
        recipients,
        format!("Thesis Registration Successful - Group ID {}", thesis.group_id),
        text,
    )
}

// =============================================================================
// Registration
// =============================================================================

pub async fn register(ctx: &Context, actor: &Actor, req: RegisterThesisRequest) -> Result<RegistrationOutcome> {
    let topic = require_text(&req.topic, "topic")?;
    let summary = require_text(&req.summary, "abstract")?;
    let supervisor_id = req.supervisor_id.trim().to_string();

    let supervisor = ctx
        .stores
        .users
        .get(&supervisor_id)
        .await?
        .filter(|u| u.role == Role::Faculty)
        .ok_or_else(|| QuireError::validation("Invalid faculty ID"))?;

    let group = ctx
        .stores
        .groups
        .get(&req.group_id)
        .await?
        .ok_or_else(|| QuireError::not_found(format!("Group {} not found", req.group_id)))?;

    if !actor.is_admin() && !group.has_member(&actor.user_id) {
        return Err(QuireError::forbidden(
            "Only members of the group can register its thesis",
        ));
    }
    if group.registered {
        return Err(QuireError::conflict(format!(
            "Group {} already has a registered thesis",
            group.id
        )));
    }

    let roster = group.members.clone();
    let thesis = ctx
        .stores
        .theses
        .insert(ThesisDoc::new(group.id, roster.clone(), &supervisor_id, topic, summary))
        .await?;

    let flagged = mutate(ctx.stores.groups.as_ref(), &group.id, "Group", |g| {
        if g.registered {
            return Err(QuireError::conflict(format!(
                "Group {} already has a registered thesis",
                g.id
            )));
        }
        if g.members != roster {
            return Err(QuireError::conflict(
                "Group membership changed during registration, retry",
            ));
        }
        g.registered = true;
        Ok(())
    })
    .await;

    if let Err(e) = flagged {
        warn!("Rolling back thesis {}: {}", thesis.thesis_id, e);
        ctx.stores.theses.delete(&thesis.thesis_id).await?;
        return Err(e);
    }

    ctx.audit
        .transition(actor, "thesis", thesis.thesis_id, "register", "unregistered", "registered")
        .await;

    // Notification is best-effort
    let profiles = profiles_by_id(ctx, &roster).await?;
    let mut recipients: Vec<String> = ordered_profiles(&roster, &profiles)
        .into_iter()
        .map(|p| p.mail)
        .collect();
    recipients.push(supervisor.mail.clone());

    let (email_sent, email_message) = match ctx.mailer.send(&registration_mail(recipients, &thesis)).await {
        Ok(()) => (true, "Registration email sent".to_string()),
        Err(e) => {
            warn!("Registration mail for thesis {} failed: {}", thesis.thesis_id, e);
            (false, "Registration email could not be sent".to_string())
        }
    };

    info!(
        "Thesis {} registered by {} with supervisor {}",
        thesis.thesis_id, actor.user_id, supervisor_id
    );

    Ok(RegistrationOutcome {
        thesis,
        email_sent,
        email_message,
    })
}

// =============================================================================
// Reads
// =============================================================================

pub async fn get(ctx: &Context, thesis_id: i64) -> Result<ThesisDetail> {
    let thesis = load(ctx, thesis_id).await?;
    let profiles = profiles_by_id(ctx, &thesis.student_ids).await?;
    let students = ordered_profiles(&thesis.student_ids, &profiles);
    Ok(ThesisDetail::new(thesis, students))
}

pub async fn list(ctx: &Context) -> Result<Vec<ThesisDetail>> {
    let theses = ctx.stores.theses.find(&Query::all()).await?;
    let ids: Vec<String> = theses.iter().flat_map(|t| t.student_ids.iter().cloned()).collect();
    let profiles = profiles_by_id(ctx, &ids).await?;

    Ok(theses
        .into_iter()
        .map(|thesis| {
            let students = ordered_profiles(&thesis.student_ids, &profiles);
            ThesisDetail::new(thesis, students)
        })
        .collect())
}

pub async fn progress_list(ctx: &Context) -> Result<Vec<ProgressSummary>> {
    let theses = ctx.stores.theses.find(&Query::all()).await?;
    Ok(theses.iter().map(ProgressSummary::from).collect())
}

pub async fn progress_get(ctx: &Context, thesis_id: i64) -> Result<ProgressSummary> {
    Ok(ProgressSummary::from(&load(ctx, thesis_id).await?))
}

// =============================================================================
// Stage reports and feedback
// =============================================================================

/// Store a stage report and advance progress.
///
/// The order check runs before the file is written; the file is removed again
/// if the record could not be updated.
pub async fn submit_stage_report(
    ctx: &Context,
    actor: &Actor,
    thesis_id: i64,
    stage: Stage,
    upload: Upload,
) -> Result<ThesisDoc> {
    let thesis = load(ctx, thesis_id).await?;
    require_member(actor, &thesis)?;
    progress::ensure_next_stage(thesis.progress, stage)?;

    let stored = ctx
        .files
        .save(FileArea::ThesisProgress, &upload.file_name, &upload.data)
        .await?;
    let path = stored.public_path();

    let result = mutate(ctx.stores.theses.as_ref(), &thesis_id, "Thesis", |t| {
        let from = t.progress;
        progress::submit_report(&mut t.progress, &mut t.reports, stage, path.clone())?;
        Ok(from)
    })
    .await;

    match result {
        Ok((saved, from)) => {
            ctx.audit
                .transition(actor, "thesis", thesis_id, "submit_report", from, saved.progress)
                .await;
            Ok(saved)
        }
        Err(e) => {
            ctx.files.remove(&path).await;
            Err(e)
        }
    }
}

pub async fn get_feedback(ctx: &Context, thesis_id: i64) -> Result<StageSlots<String>> {
    Ok(load(ctx, thesis_id).await?.feedback)
}

pub async fn get_stage_feedback(ctx: &Context, thesis_id: i64, stage: Stage) -> Result<String> {
    let thesis = load(ctx, thesis_id).await?;
    Ok(thesis.feedback.get(stage).clone())
}

pub async fn update_feedback(
    ctx: &Context,
    actor: &Actor,
    thesis_id: i64,
    req: FeedbackRequest,
) -> Result<ThesisDoc> {
    let stage: Stage = req.stage.parse()?;
    let thesis = load(ctx, thesis_id).await?;
    require_reviewer(actor, &thesis)?;

    let (saved, ()) = mutate(ctx.stores.theses.as_ref(), &thesis_id, "Thesis", |t| {
        t.feedback.set(stage, req.feedback.clone());
        Ok(())
    })
    .await?;
    Ok(saved)
}

pub async fn clear_feedback(ctx: &Context, actor: &Actor, thesis_id: i64) -> Result<ThesisDoc> {
    let thesis = load(ctx, thesis_id).await?;
    require_reviewer(actor, &thesis)?;

    let (saved, ()) = mutate(ctx.stores.theses.as_ref(), &thesis_id, "Thesis", |t| {
        t.feedback = StageSlots::default();
        Ok(())
    })
    .await?;
    Ok(saved)
}

pub async fn assign_assistant(
    ctx: &Context,
    actor: &Actor,
    group_id: i64,
    req: AssistantRequest,
) -> Result<ThesisDoc> {
    let assistant_id = require_text(&req.assistant_id, "id")?;
    let thesis = ctx
        .stores
        .theses
        .find_one(&Query::all().eq("group_id", group_id))
        .await?
        .ok_or_else(|| QuireError::not_found(format!("No thesis registered for group {}", group_id)))?;
    require_supervisor(actor, &thesis)?;

    let (saved, ()) = mutate(ctx.stores.theses.as_ref(), &thesis.thesis_id, "Thesis", |t| {
        t.assistant_id = Some(assistant_id.clone());
        Ok(())
    })
    .await?;

    info!("Assistant {} assigned to thesis {} by {}", assistant_id, saved.thesis_id, actor.user_id);
    Ok(saved)
}

// =============================================================================
// Defer workflow
// =============================================================================

async fn apply_defer(
    ctx: &Context,
    actor: &Actor,
    thesis_id: i64,
    action: &str,
    event: impl Fn(&ThesisDoc) -> DeferEvent + Send + Sync,
) -> Result<ThesisDoc> {
    let (saved, from) = mutate(ctx.stores.theses.as_ref(), &thesis_id, "Thesis", |t| {
        let from = t.defer_status;
        t.defer_status = defer::transition(from, event(t))?;
        Ok(from)
    })
    .await?;

    ctx.audit
        .transition(actor, "thesis", thesis_id, action, from, saved.defer_status)
        .await;
    Ok(saved)
}

pub async fn request_defer(ctx: &Context, actor: &Actor, req: ThesisRef) -> Result<ThesisDoc> {
    let thesis = load(ctx, req.thesis_id).await?;
    require_member(actor, &thesis)?;
    apply_defer(ctx, actor, req.thesis_id, "defer_request", |t| DeferEvent::Request {
        progress: t.progress,
    })
    .await
}

pub async fn decide_defer(ctx: &Context, actor: &Actor, req: DeferDecisionRequest) -> Result<ThesisDoc> {
    let decision: DeferDecision = req.decision.parse()?;
    let thesis = load(ctx, req.thesis_id).await?;
    require_supervisor(actor, &thesis)?;
    apply_defer(ctx, actor, req.thesis_id, "defer_decision", |_| {
        DeferEvent::Decide(decision)
    })
    .await
}

pub async fn reset_defer(ctx: &Context, actor: &Actor, req: ThesisRef) -> Result<ThesisDoc> {
    require_admin(actor)?;
    apply_defer(ctx, actor, req.thesis_id, "defer_reset", |_| DeferEvent::Reset).await
}

/// Defer status of the theses visible to the caller
pub async fn list_defer(ctx: &Context, actor: &Actor) -> Result<Vec<DeferEntry>> {
    let query = match actor.role {
        Role::Admin => Query::all(),
        Role::Student => Query::all().eq("student_ids", actor.user_id.clone()),
        Role::Ra | Role::Ta => Query::all().eq("RaTa", actor.user_id.clone()),
        Role::Faculty => Query::all().eq("supervisor_id", actor.user_id.clone()),
    };

    let theses = ctx.stores.theses.find(&query).await?;
    Ok(theses
        .into_iter()
        .map(|t| DeferEntry {
            thesis_id: t.thesis_id,
            student_ids: t.student_ids,
            progress: t.progress,
            defer_status: t.defer_status,
            supervisor_id: t.supervisor_id,
        })
        .collect())
}

// =============================================================================
// Correction workflow
// =============================================================================

async fn apply_correction_event(
    ctx: &Context,
    actor: &Actor,
    thesis_id: i64,
    action: &str,
    event: CorrectionEvent,
    mut edit: impl FnMut(&mut ThesisDoc) + Send,
) -> Result<ThesisDoc> {
    let (saved, from) = mutate(ctx.stores.theses.as_ref(), &thesis_id, "Thesis", |t| {
        let from = t.correction;
        t.correction = correction::transition(from, event)?;
        edit(t);
        Ok(from)
    })
    .await?;

    ctx.audit
        .transition(actor, "thesis", thesis_id, action, from, saved.correction)
        .await;
    Ok(saved)
}

pub async fn request_correction(ctx: &Context, actor: &Actor, req: ThesisRef) -> Result<ThesisDoc> {
    let thesis = load(ctx, req.thesis_id).await?;
    require_member(actor, &thesis)?;
    apply_correction_event(ctx, actor, req.thesis_id, "correction_request", CorrectionEvent::Request, |_| {})
        .await
}

pub async fn approve_correction(ctx: &Context, actor: &Actor, req: CorrectionApproval) -> Result<ThesisDoc> {
    if !req.approve {
        return Err(QuireError::validation("approve must be true"));
    }
    let thesis = load(ctx, req.thesis_id).await?;
    require_supervisor(actor, &thesis)?;
    apply_correction_event(ctx, actor, req.thesis_id, "correction_approve", CorrectionEvent::Approve, |_| {})
        .await
}

/// Overwrite topic and abstract under an approved correction
pub async fn apply_correction(
    ctx: &Context,
    actor: &Actor,
    thesis_id: i64,
    req: CorrectionUpdate,
) -> Result<ThesisDoc> {
    if req.topic.trim().is_empty() || req.summary.trim().is_empty() {
        return Err(QuireError::validation("Both topic and abstract are required"));
    }
    let thesis = load(ctx, thesis_id).await?;
    require_member(actor, &thesis)?;

    let CorrectionUpdate { topic, summary } = req;
    apply_correction_event(ctx, actor, thesis_id, "correction_apply", CorrectionEvent::Apply, |t| {
        t.topic = topic.clone();
        t.summary = summary.clone();
    })
    .await
}

pub async fn reset_correction(ctx: &Context, actor: &Actor, req: ThesisRef) -> Result<ThesisDoc> {
    require_admin(actor)?;
    apply_correction_event(ctx, actor, req.thesis_id, "correction_reset", CorrectionEvent::Reset, |_| {})
        .await
}

// =============================================================================
// Administrative override
// =============================================================================

pub async fn patch(ctx: &Context, actor: &Actor, thesis_id: i64, patch: ThesisPatch) -> Result<ThesisDoc> {
    require_admin(actor)?;
    if patch.is_empty() {
        return Err(QuireError::validation("No fields to update"));
    }
    if patch.progress.is_some_and(|p| p > FINAL_PROGRESS) {
        return Err(QuireError::validation(format!(
            "progress must be between 0 and {}",
            FINAL_PROGRESS
        )));
    }

    let (saved, ()) = mutate(ctx.stores.theses.as_ref(), &thesis_id, "Thesis", |t| {
        patch.apply(t);
        Ok(())
    })
    .await?;

    let changes = serde_json::to_value(&patch)?;
    ctx.audit.overridden(actor, "thesis", thesis_id, changes).await;
    Ok(saved)
}
