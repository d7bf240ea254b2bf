//! Student proposals
//!
//! A student pitches one idea in a catalogue domain; faculty mark it
//! Interested, Rejected or Approved. An approval belongs to the approving
//! faculty member and hides the proposal from everyone else.

use serde::Deserialize;
use tracing::info;

use crate::auth::{Actor, Role};
use crate::db::{mutate, remove_checked, ProposalDoc, Query, Reviewer};
use crate::services::{require_text, Context};
use crate::types::{QuireError, Result};
use crate::workflow::proposal::{check_editable, check_status_change, check_withdrawable};
use crate::workflow::ProposalStatus;

#[derive(Debug, Deserialize)]
pub struct ProposalRequest {
    pub domain: String,
    pub idea: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListFilter {
    pub faculty_id: Option<String>,
}

async fn load(ctx: &Context, id: &str) -> Result<ProposalDoc> {
    ctx.stores
        .proposals
        .get(&id.to_string())
        .await?
        .ok_or_else(|| QuireError::not_found("Proposal not found"))
}

/// Catalogue spelling of `domain`, matched case-insensitively
async fn catalogue_domain(ctx: &Context, domain: &str) -> Result<String> {
    let entries = ctx.stores.domains.find(&Query::all()).await?;
    entries
        .into_iter()
        .find(|entry| entry.matches_subject(domain))
        .map(|entry| entry.domain_subject)
        .ok_or_else(|| QuireError::validation(format!("Unknown domain '{}'", domain)))
}

pub async fn create(ctx: &Context, actor: &Actor, req: ProposalRequest) -> Result<ProposalDoc> {
    if !actor.is_student() {
        return Err(QuireError::forbidden("Only students can submit proposals"));
    }
    let domain = require_text(&req.domain, "domain")?;
    let idea = require_text(&req.idea, "idea")?;
    let domain = catalogue_domain(ctx, &domain).await?;

    if ctx
        .stores
        .proposals
        .find_one(&Query::all().eq("student_id", actor.user_id.clone()))
        .await?
        .is_some()
    {
        return Err(QuireError::conflict("You have already submitted a proposal"));
    }

    let proposal = ctx
        .stores
        .proposals
        .insert(ProposalDoc::new(&actor.user_id, domain, idea))
        .await?;
    info!("Proposal {} submitted by {}", proposal.id, actor.user_id);
    Ok(proposal)
}

/// Open proposals plus those approved by `faculty_id`
async fn faculty_view(ctx: &Context, faculty_id: &str) -> Result<Vec<ProposalDoc>> {
    let open = Query::all().any_of(
        "status",
        ProposalStatus::OPEN_TO_ALL.iter().map(|s| s.as_str()),
    );
    let mine = Query::all()
        .eq("status", ProposalStatus::Approved.as_str())
        .eq("updated_by.faculty_id", faculty_id);

    let mut proposals = ctx.stores.proposals.find(&open).await?;
    proposals.extend(ctx.stores.proposals.find(&mine).await?);
    proposals.sort_by(|a, b| a.metadata.created_at.cmp(&b.metadata.created_at));
    Ok(proposals)
}

pub async fn list(ctx: &Context, actor: &Actor, filter: ListFilter) -> Result<Vec<ProposalDoc>> {
    match actor.role {
        Role::Student => {
            ctx.stores
                .proposals
                .find(&Query::all().eq("student_id", actor.user_id.clone()))
                .await
        }
        Role::Admin => match filter.faculty_id {
            Some(faculty_id) => faculty_view(ctx, faculty_id.trim()).await,
            None => ctx.stores.proposals.find(&Query::all()).await,
        },
        _ => faculty_view(ctx, &actor.user_id).await,
    }
}

pub async fn get(ctx: &Context, id: &str) -> Result<ProposalDoc> {
    load(ctx, id).await
}

/// Owner edit, only while nobody has responded
pub async fn update(ctx: &Context, actor: &Actor, id: &str, req: ProposalRequest) -> Result<ProposalDoc> {
    let domain = require_text(&req.domain, "domain")?;
    let idea = require_text(&req.idea, "idea")?;

    let proposal = load(ctx, id).await?;
    if proposal.student_id != actor.user_id {
        return Err(QuireError::forbidden("Only the author can edit a proposal"));
    }
    check_editable(proposal.status)?;
    let domain = catalogue_domain(ctx, &domain).await?;

    let (saved, ()) = mutate(ctx.stores.proposals.as_ref(), &proposal.id, "Proposal", |p| {
        check_editable(p.status)?;
        p.domain = domain.clone();
        p.idea = idea.clone();
        Ok(())
    })
    .await?;
    Ok(saved)
}

pub async fn delete(ctx: &Context, actor: &Actor, id: &str) -> Result<()> {
    let proposal = remove_checked(ctx.stores.proposals.as_ref(), &id.to_string(), "Proposal", |p| {
        if actor.is_admin() {
            return Ok(());
        }
        if p.student_id != actor.user_id {
            return Err(QuireError::forbidden("Only the author can withdraw a proposal"));
        }
        check_withdrawable(p.status)
    })
    .await?;

    info!("Proposal {} deleted by {}", proposal.id, actor.user_id);
    Ok(())
}

/// Faculty triage. The reviewer is taken from the caller's own account.
pub async fn update_status(ctx: &Context, actor: &Actor, id: &str, req: StatusRequest) -> Result<ProposalDoc> {
    if !matches!(actor.role, Role::Faculty | Role::Admin) {
        return Err(QuireError::forbidden("Only faculty can review proposals"));
    }
    let status: ProposalStatus = req.status.parse()?;

    let reviewer = ctx
        .stores
        .users
        .get(&actor.user_id)
        .await?
        .map(|u| Reviewer {
            faculty_id: u.user_id,
            name: u.name,
            email: u.mail,
        })
        .ok_or_else(|| QuireError::Unauthorized("Account no longer exists".into()))?;

    let key = load(ctx, id).await?.id;
    let (saved, from) = mutate(ctx.stores.proposals.as_ref(), &key, "Proposal", |p| {
        check_status_change(p.status, p.reviewer_id(), &reviewer.faculty_id)?;
        let from = p.status;
        p.status = status;
        p.updated_by = Some(reviewer.clone());
        Ok(from)
    })
    .await?;

    ctx.audit
        .transition(actor, "proposal", &saved.id, "status", from, saved.status)
        .await;
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DomainEntryDoc;
    use crate::services::testing::*;

    async fn setup(ctx: &Context) {
        ctx.stores
            .domains
            .insert(DomainEntryDoc::new(1, "Machine Learning"))
            .await
            .unwrap();
        seed_students(ctx, &["s1", "s2"]).await;
        seed_user(ctx, "f1", Role::Faculty).await;
        seed_user(ctx, "f2", Role::Faculty).await;
    }

    fn pitch(domain: &str) -> ProposalRequest {
        ProposalRequest {
            domain: domain.into(),
            idea: "Detecting crop disease from drone imagery".into(),
        }
    }

    fn status(s: &str) -> StatusRequest {
        StatusRequest { status: s.into() }
    }

    #[tokio::test]
    async fn test_one_proposal_per_student() {
        let (ctx, _mailer, _dir) = test_context().await;
        setup(&ctx).await;

        let proposal = create(&ctx, &student("s1"), pitch("machine learning")).await.unwrap();
        assert_eq!(proposal.domain, "Machine Learning");
        assert_eq!(proposal.status, ProposalStatus::Pending);

        let err = create(&ctx, &student("s1"), pitch("Machine Learning")).await.unwrap_err();
        assert!(matches!(err, QuireError::Conflict(_)));

        let err = create(&ctx, &student("s2"), pitch("Astrology")).await.unwrap_err();
        assert!(matches!(err, QuireError::Validation(_)));

        let err = create(&ctx, &faculty("f1"), pitch("Machine Learning")).await.unwrap_err();
        assert!(matches!(err, QuireError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_approval_exclusivity() {
        let (ctx, _mailer, _dir) = test_context().await;
        setup(&ctx).await;
        let id = create(&ctx, &student("s1"), pitch("Machine Learning")).await.unwrap().id;

        let approved = update_status(&ctx, &faculty("f1"), &id, status("Approved")).await.unwrap();
        assert_eq!(approved.reviewer_id(), Some("f1"));
        assert_eq!(approved.updated_by.unwrap().email, "f1@uni.edu");

        let err = update_status(&ctx, &faculty("f2"), &id, status("Rejected")).await.unwrap_err();
        assert!(matches!(err, QuireError::Conflict(_)));

        let rejected = update_status(&ctx, &faculty("f1"), &id, status("Rejected")).await.unwrap();
        assert_eq!(rejected.status, ProposalStatus::Rejected);

        let err = update_status(&ctx, &faculty("f1"), &id, status("Pending")).await.unwrap_err();
        assert!(matches!(err, QuireError::Validation(_)));
        let err = update_status(&ctx, &student("s2"), &id, status("Approved")).await.unwrap_err();
        assert!(matches!(err, QuireError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_faculty_listing_hides_foreign_approvals() {
        let (ctx, _mailer, _dir) = test_context().await;
        setup(&ctx).await;
        let first = create(&ctx, &student("s1"), pitch("Machine Learning")).await.unwrap().id;
        create(&ctx, &student("s2"), pitch("Machine Learning")).await.unwrap();
        update_status(&ctx, &faculty("f1"), &first, status("Approved")).await.unwrap();

        assert_eq!(list(&ctx, &faculty("f1"), ListFilter::default()).await.unwrap().len(), 2);
        assert_eq!(list(&ctx, &faculty("f2"), ListFilter::default()).await.unwrap().len(), 1);
        assert_eq!(list(&ctx, &student("s1"), ListFilter::default()).await.unwrap().len(), 1);
        assert_eq!(list(&ctx, &admin(), ListFilter::default()).await.unwrap().len(), 2);

        let as_f2 = ListFilter { faculty_id: Some("f2".into()) };
        assert_eq!(list(&ctx, &admin(), as_f2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_owner_edits_and_withdrawals() {
        let (ctx, _mailer, _dir) = test_context().await;
        setup(&ctx).await;
        let id = create(&ctx, &student("s1"), pitch("Machine Learning")).await.unwrap().id;

        let err = update(&ctx, &student("s2"), &id, pitch("Machine Learning")).await.unwrap_err();
        assert!(matches!(err, QuireError::Forbidden(_)));

        let mut edit = pitch("Machine Learning");
        edit.idea = "Yield prediction".into();
        assert_eq!(update(&ctx, &student("s1"), &id, edit).await.unwrap().idea, "Yield prediction");

        update_status(&ctx, &faculty("f1"), &id, status("Interested")).await.unwrap();
        let err = update(&ctx, &student("s1"), &id, pitch("Machine Learning")).await.unwrap_err();
        assert!(matches!(err, QuireError::Workflow(_)));
        let err = delete(&ctx, &student("s1"), &id).await.unwrap_err();
        assert!(matches!(err, QuireError::Workflow(_)));

        delete(&ctx, &admin(), &id).await.unwrap();
        assert!(matches!(get(&ctx, &id).await.unwrap_err(), QuireError::NotFound(_)));
    }
}
