//! Requests waiting for an administrator
//!
//! Faculty registrations file a `registration` request automatically; users
//! can file other kinds (e.g. a new catalogue domain) themselves.

use serde::Deserialize;
use tracing::info;

use crate::auth::{Actor, Role};
use crate::db::{mutate, AccountStatus, ApprovalDoc, Query, UserProfile};
use crate::services::{require_admin, require_text, Context};
use crate::types::Result;

#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Deserialize)]
pub struct AccountDecision {
    #[serde(alias = "usr_type")]
    pub role: Role,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

fn active_by_default() -> bool {
    true
}

pub async fn request(ctx: &Context, actor: &Actor, req: ApprovalRequest) -> Result<ApprovalDoc> {
    let kind = require_text(&req.kind, "type")?;
    let approval = ctx
        .stores
        .approvals
        .insert(ApprovalDoc::new(&actor.user_id, kind, req.msg.trim()))
        .await?;
    info!("Approval request {} ({}) filed by {}", approval.id, approval.kind, actor.user_id);
    Ok(approval)
}

pub async fn list(ctx: &Context, actor: &Actor) -> Result<Vec<ApprovalDoc>> {
    require_admin(actor)?;
    ctx.stores.approvals.find(&Query::all()).await
}

pub async fn for_user(ctx: &Context, actor: &Actor, user_id: &str) -> Result<Vec<ApprovalDoc>> {
    require_admin(actor)?;
    ctx.stores
        .approvals
        .find(&Query::all().eq("requester_id", user_id))
        .await
}

/// Set a user's role and status and close their open requests
pub async fn decide_account(
    ctx: &Context,
    actor: &Actor,
    user_id: &str,
    decision: AccountDecision,
) -> Result<UserProfile> {
    require_admin(actor)?;
    let status = if decision.active {
        AccountStatus::Active
    } else {
        AccountStatus::Disabled
    };

    let (user, ()) = mutate(ctx.stores.users.as_ref(), &user_id.to_string(), "User", |u| {
        u.role = decision.role;
        u.status = status;
        Ok(())
    })
    .await?;

    let closed = ctx
        .stores
        .approvals
        .delete_where(&Query::all().eq("requester_id", user_id))
        .await?;

    let action = if decision.active { "approve" } else { "disable" };
    ctx.audit.account(Some(actor), &user.user_id, action).await;
    info!(
        "Account {} set to {} ({:?}); {} request(s) closed",
        user.user_id, user.role, user.status, closed
    );
    Ok(user.profile())
}
