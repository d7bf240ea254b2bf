//! Group registry
//!
//! Groups hold 3-5 students and a student belongs to at most one group. The
//! roster freezes once the group's thesis is registered.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{Actor, Role};
use crate::db::{insert_with_next_id, mutate, remove_checked, GroupDoc, Query, UserProfile};
use crate::services::{ordered_profiles, profiles_by_id, Context};
use crate::types::{QuireError, Result};
use crate::workflow::membership;

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    #[serde(alias = "student_id", alias = "student_ids")]
    pub members: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct MemberRequest {
    pub student_id: String,
}

/// Group with its members' profiles
#[derive(Debug, Serialize)]
pub struct GroupView {
    pub id: i64,
    pub members: Vec<String>,
    pub registered: bool,
    pub students: Vec<UserProfile>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StudentGroup {
    pub group_id: i64,
    pub registered: bool,
}

fn authorize(actor: &Actor, group: &GroupDoc) -> Result<()> {
    if actor.is_admin() || group.has_member(&actor.user_id) {
        return Ok(());
    }
    Err(QuireError::forbidden("Only group members can change this group"))
}

async fn load(ctx: &Context, id: i64) -> Result<GroupDoc> {
    ctx.stores
        .groups
        .get(&id)
        .await?
        .ok_or_else(|| QuireError::not_found(format!("Group {} not found", id)))
}

/// Check that `student_id` names a student
async fn ensure_student(ctx: &Context, student_id: &str) -> Result<()> {
    let user = ctx
        .stores
        .users
        .get(&student_id.to_string())
        .await?
        .ok_or_else(|| QuireError::not_found(format!("Student {} not found", student_id)))?;

    if user.role != Role::Student {
        return Err(QuireError::validation(format!(
            "{} is not a student",
            student_id
        )));
    }
    Ok(())
}

pub async fn create(ctx: &Context, actor: &Actor, req: CreateGroupRequest) -> Result<GroupDoc> {
    let roster = membership::normalize_roster(&req.members)?;

    if !actor.is_admin() && !(actor.is_student() && roster.contains(&actor.user_id)) {
        return Err(QuireError::forbidden(
            "Students can only create groups they belong to",
        ));
    }

    for student_id in &roster {
        ensure_student(ctx, student_id).await?;
    }

    let taken = ctx
        .stores
        .groups
        .find(&Query::all().any_of("members", roster.iter().cloned()))
        .await?;
    if let Some(existing) = taken.first() {
        let student = roster
            .iter()
            .find(|id| existing.has_member(id))
            .map(String::as_str)
            .unwrap_or_default();
        return Err(QuireError::validation(format!(
            "Student {} is already in group {}",
            student, existing.id
        )));
    }

    let group = insert_with_next_id(ctx.stores.groups.as_ref(), |id| {
        GroupDoc::new(id, roster.clone())
    })
    .await?;

    info!("Group {} created by {} with {} members", group.id, actor.user_id, group.members.len());
    Ok(group)
}

pub async fn add_member(ctx: &Context, actor: &Actor, id: i64, req: MemberRequest) -> Result<GroupDoc> {
    let student_id = req.student_id.trim().to_string();
    let group = load(ctx, id).await?;
    authorize(actor, &group)?;

    membership::check_add(&group.members, group.registered, &student_id)?;
    ensure_student(ctx, &student_id).await?;

    if let Some(other) = ctx
        .stores
        .groups
        .find_one(&Query::all().eq("members", student_id.clone()))
        .await?
    {
        return Err(QuireError::validation(format!(
            "Student {} is already in group {}",
            student_id, other.id
        )));
    }

    let (group, ()) = mutate(ctx.stores.groups.as_ref(), &id, "Group", |group| {
        membership::check_add(&group.members, group.registered, &student_id)?;
        group.members.push(student_id.clone());
        Ok(())
    })
    .await?;

    ctx.audit
        .transition(actor, "group", id, "add_member", "-", &student_id)
        .await;
    Ok(group)
}

pub async fn remove_member(ctx: &Context, actor: &Actor, id: i64, student_id: &str) -> Result<GroupDoc> {
    let student_id = student_id.trim();
    let group = load(ctx, id).await?;
    authorize(actor, &group)?;

    let (group, ()) = mutate(ctx.stores.groups.as_ref(), &id, "Group", |group| {
        membership::check_remove(&group.members, group.registered, student_id)?;
        group.members.retain(|m| m != student_id);
        Ok(())
    })
    .await?;

    ctx.audit
        .transition(actor, "group", id, "remove_member", student_id, "-")
        .await;
    Ok(group)
}

pub async fn delete(ctx: &Context, actor: &Actor, id: i64) -> Result<()> {
    remove_checked(ctx.stores.groups.as_ref(), &id, &format!("Group {}", id), |group| {
        authorize(actor, group)?;
        membership::check_delete(group.registered)
    })
    .await?;

    ctx.audit
        .transition(actor, "group", id, "delete", "unregistered", "deleted")
        .await;
    Ok(())
}

pub async fn lookup_by_student(ctx: &Context, student_id: &str) -> Result<StudentGroup> {
    let student_id = student_id.trim();
    let group = ctx
        .stores
        .groups
        .find_one(&Query::all().eq("members", student_id))
        .await?
        .ok_or_else(|| QuireError::not_found(format!("No group found for student {}", student_id)))?;

    Ok(StudentGroup {
        group_id: group.id,
        registered: group.registered,
    })
}

pub async fn get(ctx: &Context, id: i64) -> Result<GroupView> {
    let group = load(ctx, id).await?;
    let profiles = profiles_by_id(ctx, &group.members).await?;
    Ok(GroupView {
        students: ordered_profiles(&group.members, &profiles),
        id: group.id,
        members: group.members,
        registered: group.registered,
    })
}

pub async fn list(ctx: &Context) -> Result<Vec<GroupView>> {
    let groups = ctx.stores.groups.find(&Query::all()).await?;
    let all_members: Vec<String> = groups.iter().flat_map(|g| g.members.iter().cloned()).collect();
    let profiles = profiles_by_id(ctx, &all_members).await?;

    Ok(groups
        .into_iter()
        .map(|group| GroupView {
            students: ordered_profiles(&group.members, &profiles),
            id: group.id,
            members: group.members,
            registered: group.registered,
        })
        .collect())
}
