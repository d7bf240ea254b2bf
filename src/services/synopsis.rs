//! Faculty topic synopses
//!
//! Supervisors advertise topics and whether they are taking students.

use serde::Deserialize;

use crate::auth::Actor;
use crate::db::{insert_with_next_id, mutate, Metadata, Query, SynopsisDoc};
use crate::services::{require_staff, require_text, Context};
use crate::types::{QuireError, Result};

#[derive(Debug, Deserialize)]
pub struct SynopsisRequest {
    pub topic: String,
    #[serde(default, alias = "status")]
    pub open: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct SynopsisUpdate {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default, alias = "status")]
    pub open: Option<bool>,
}

async fn load_owned(ctx: &Context, actor: &Actor, syn_id: i64) -> Result<SynopsisDoc> {
    let synopsis = ctx
        .stores
        .synopses
        .get(&syn_id)
        .await?
        .ok_or_else(|| QuireError::not_found(format!("Synopsis {} not found", syn_id)))?;

    if !actor.is_self_or_admin(&synopsis.sup_id) {
        return Err(QuireError::forbidden("Only the owner can change this synopsis"));
    }
    Ok(synopsis)
}

pub async fn create(ctx: &Context, actor: &Actor, req: SynopsisRequest) -> Result<SynopsisDoc> {
    require_staff(actor)?;
    let topic = require_text(&req.topic, "topic")?;
    let owner = ctx
        .stores
        .users
        .get(&actor.user_id)
        .await?
        .ok_or_else(|| QuireError::not_found("Account not found"))?;

    insert_with_next_id(ctx.stores.synopses.as_ref(), |syn_id| SynopsisDoc {
        syn_id,
        sup_id: owner.user_id.clone(),
        name: owner.name.clone(),
        mail: owner.mail.clone(),
        topic: topic.clone(),
        open: req.open,
        version: 0,
        metadata: Metadata::new(),
    })
    .await
}

pub async fn list(ctx: &Context) -> Result<Vec<SynopsisDoc>> {
    ctx.stores.synopses.find(&Query::all()).await
}

pub async fn by_supervisor(ctx: &Context, sup_id: &str) -> Result<Vec<SynopsisDoc>> {
    let entries = ctx
        .stores
        .synopses
        .find(&Query::all().eq("sup_id", sup_id))
        .await?;
    if entries.is_empty() {
        return Err(QuireError::not_found(format!("No synopsis found for {}", sup_id)));
    }
    Ok(entries)
}

pub async fn update(ctx: &Context, actor: &Actor, syn_id: i64, update: SynopsisUpdate) -> Result<SynopsisDoc> {
    let topic = update.topic.as_deref().map(|t| require_text(t, "topic")).transpose()?;
    load_owned(ctx, actor, syn_id).await?;

    let (saved, ()) = mutate(ctx.stores.synopses.as_ref(), &syn_id, "Synopsis", |s| {
        if let Some(ref topic) = topic {
            s.topic = topic.clone();
        }
        if let Some(open) = update.open {
            s.open = open;
        }
        Ok(())
    })
    .await?;
    Ok(saved)
}

pub async fn delete(ctx: &Context, actor: &Actor, syn_id: i64) -> Result<()> {
    load_owned(ctx, actor, syn_id).await?;
    ctx.stores.synopses.delete(&syn_id).await?;
    Ok(())
}
