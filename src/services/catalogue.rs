//! Research domain catalogue and faculty expertise

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::Actor;
use crate::db::{insert_with_next_id, mutate, DomainEntryDoc, ExpertiseDoc, Query};
use crate::services::{require_admin, require_staff, require_text, Context};
use crate::types::{QuireError, Result};

#[derive(Debug, Deserialize)]
pub struct DomainSubject {
    pub domain_subject: String,
}

#[derive(Debug, Serialize)]
pub struct Enlisted {
    pub domain: DomainEntryDoc,
    pub closed_requests: u64,
}

#[derive(Debug, Deserialize)]
pub struct ExpertiseRequest {
    /// Only honoured for administrators; faculty always edit their own entry
    #[serde(default)]
    pub sup_id: Option<String>,
    #[serde(default)]
    pub domain: String,
    #[serde(default, alias = "Field")]
    pub field: String,
}

// =============================================================================
// Domain catalogue
// =============================================================================

async fn ensure_unique_subject(ctx: &Context, subject: &str, except: Option<i64>) -> Result<()> {
    let entries = ctx.stores.domains.find(&Query::all()).await?;
    if entries
        .iter()
        .any(|e| Some(e.id_no) != except && e.matches_subject(subject))
    {
        return Err(QuireError::conflict(format!("Domain '{}' already exists", subject)));
    }
    Ok(())
}

pub async fn register_domain(ctx: &Context, actor: &Actor, req: DomainSubject) -> Result<DomainEntryDoc> {
    require_admin(actor)?;
    let subject = require_text(&req.domain_subject, "domain_subject")?;
    ensure_unique_subject(ctx, &subject, None).await?;

    insert_with_next_id(ctx.stores.domains.as_ref(), |id| {
        DomainEntryDoc::new(id, subject.clone())
    })
    .await
}

pub async fn list_domains(ctx: &Context) -> Result<Vec<DomainEntryDoc>> {
    ctx.stores.domains.find(&Query::all()).await
}

pub async fn update_domain(
    ctx: &Context,
    actor: &Actor,
    id_no: i64,
    req: DomainSubject,
) -> Result<DomainEntryDoc> {
    require_admin(actor)?;
    let subject = require_text(&req.domain_subject, "domain_subject")?;
    ensure_unique_subject(ctx, &subject, Some(id_no)).await?;

    let (entry, ()) = mutate(ctx.stores.domains.as_ref(), &id_no, "Domain", |d| {
        d.domain_subject = subject.clone();
        Ok(())
    })
    .await?;
    Ok(entry)
}

pub async fn delete_domain(ctx: &Context, actor: &Actor, id_no: i64) -> Result<DomainEntryDoc> {
    require_admin(actor)?;
    ctx.stores
        .domains
        .delete(&id_no)
        .await?
        .ok_or_else(|| QuireError::not_found(format!("Domain {} not found", id_no)))
}

/// Add a requested domain and close the requests that asked for it
pub async fn enlist(ctx: &Context, actor: &Actor, req: DomainSubject) -> Result<Enlisted> {
    let domain = register_domain(ctx, actor, DomainSubject {
        domain_subject: req.domain_subject.clone(),
    })
    .await?;

    let closed_requests = ctx
        .stores
        .approvals
        .delete_where(&Query::all().eq("msg", domain.domain_subject.clone()))
        .await?;

    info!(
        "Domain '{}' enlisted by {}, {} request(s) closed",
        domain.domain_subject, actor.user_id, closed_requests
    );
    Ok(Enlisted {
        domain,
        closed_requests,
    })
}

// =============================================================================
// Faculty expertise
// =============================================================================

fn target_supervisor(actor: &Actor, requested: Option<&str>) -> Result<String> {
    require_staff(actor)?;
    match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(sup_id) if actor.is_admin() => Ok(sup_id.to_string()),
        Some(sup_id) if sup_id != actor.user_id => Err(QuireError::forbidden(
            "You can only manage your own expertise",
        )),
        _ => Ok(actor.user_id.clone()),
    }
}

pub async fn register_expertise(ctx: &Context, actor: &Actor, req: ExpertiseRequest) -> Result<ExpertiseDoc> {
    let sup_id = target_supervisor(actor, req.sup_id.as_deref())?;
    let domain = require_text(&req.domain, "domain")?;
    let field = require_text(&req.field, "Field")?;

    if ctx.stores.expertise.get(&sup_id).await?.is_some() {
        return Err(QuireError::conflict(format!(
            "Expertise for {} is already registered",
            sup_id
        )));
    }
    ctx.stores
        .expertise
        .insert(ExpertiseDoc::new(sup_id, domain, field))
        .await
}

pub async fn update_expertise(ctx: &Context, actor: &Actor, req: ExpertiseRequest) -> Result<ExpertiseDoc> {
    let sup_id = target_supervisor(actor, req.sup_id.as_deref())?;
    let domain = require_text(&req.domain, "domain")?;
    let field = require_text(&req.field, "Field")?;

    let (saved, ()) = mutate(ctx.stores.expertise.as_ref(), &sup_id, "Expertise", |e| {
        e.domain = domain.clone();
        e.field = field.clone();
        Ok(())
    })
    .await?;
    Ok(saved)
}

pub async fn clear_expertise(ctx: &Context, actor: &Actor, sup_id: Option<&str>) -> Result<ExpertiseDoc> {
    let sup_id = target_supervisor(actor, sup_id)?;
    let (saved, ()) = mutate(ctx.stores.expertise.as_ref(), &sup_id, "Expertise", |e| {
        e.domain.clear();
        e.field.clear();
        Ok(())
    })
    .await?;
    Ok(saved)
}

pub async fn get_expertise(ctx: &Context, sup_id: &str) -> Result<ExpertiseDoc> {
    ctx.stores
        .expertise
        .get(&sup_id.to_string())
        .await?
        .ok_or_else(|| QuireError::not_found(format!("No expertise registered for {}", sup_id)))
}

pub async fn list_expertise(ctx: &Context) -> Result<Vec<ExpertiseDoc>> {
    ctx.stores.expertise.find(&Query::all()).await
}
