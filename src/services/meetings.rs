//! Faculty meeting books
//!
//! One book per faculty member holding the booked events. Dates are
//! `YYYY-MM-DD`; anything else is stored as given and never expires.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;

use crate::auth::{Actor, PermissionLevel};
use crate::db::{mutate, MeetingBookDoc, MeetingEvent, Query};
use crate::services::{require_admin, Context};
use crate::types::{QuireError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
pub struct BookingRequest {
    pub faculty_id: String,
    #[serde(alias = "event")]
    pub events: Vec<MeetingEvent>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventUpdate {
    pub date: Option<String>,
    pub time: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub confirmed: Option<bool>,
}

fn validate_event(actor: &Actor, event: &MeetingEvent) -> Result<()> {
    let fields = [
        ("student_id", &event.student_id),
        ("date", &event.date),
        ("time", &event.time),
        ("type", &event.kind),
    ];
    if let Some((name, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(QuireError::validation(format!("Each event needs a {}", name)));
    }
    if actor.is_student() && event.student_id != actor.user_id {
        return Err(QuireError::forbidden("Students can only book meetings for themselves"));
    }
    Ok(())
}

pub async fn list(ctx: &Context) -> Result<Vec<MeetingBookDoc>> {
    ctx.stores.meetings.find(&Query::all()).await
}

pub async fn get(ctx: &Context, faculty_id: &str) -> Result<MeetingBookDoc> {
    ctx.stores
        .meetings
        .get(&faculty_id.to_string())
        .await?
        .ok_or_else(|| QuireError::not_found("Faculty meeting not found"))
}

/// Append events to a faculty member's book, creating it when absent.
/// Returns the book and whether it was created.
pub async fn book(ctx: &Context, actor: &Actor, req: BookingRequest) -> Result<(MeetingBookDoc, bool)> {
    let faculty_id = req.faculty_id.trim().to_string();
    if faculty_id.is_empty() || req.events.is_empty() {
        return Err(QuireError::validation("faculty_id and at least one event are required"));
    }
    for event in &req.events {
        validate_event(actor, event)?;
    }

    let faculty = ctx.stores.users.get(&faculty_id).await?;
    if !faculty.is_some_and(|f| f.role.level() >= PermissionLevel::Staff) {
        return Err(QuireError::not_found(format!("Faculty {} not found", faculty_id)));
    }

    if ctx.stores.meetings.get(&faculty_id).await?.is_none() {
        match ctx
            .stores
            .meetings
            .insert(MeetingBookDoc::new(&faculty_id, req.events.clone()))
            .await
        {
            Ok(created) => return Ok((created, true)),
            // Another booking created the book first; append below
            Err(QuireError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }
    }

    let (saved, ()) = mutate(ctx.stores.meetings.as_ref(), &faculty_id, "Faculty meeting", |b| {
        b.events.extend(req.events.iter().cloned());
        Ok(())
    })
    .await?;
    Ok((saved, false))
}

/// Partial update of a student's event in a faculty book
pub async fn update_event(
    ctx: &Context,
    actor: &Actor,
    faculty_id: &str,
    student_id: &str,
    update: EventUpdate,
) -> Result<MeetingBookDoc> {
    if !actor.is_self_or_admin(faculty_id) && actor.user_id != student_id {
        return Err(QuireError::forbidden("Not a participant of this meeting"));
    }

    let (saved, ()) = mutate(ctx.stores.meetings.as_ref(), &faculty_id.to_string(), "Faculty meeting", |b| {
        let event = b
            .events
            .iter_mut()
            .find(|e| e.student_id == student_id)
            .ok_or_else(|| QuireError::not_found("Event for student_id not found"))?;
        if let Some(ref date) = update.date {
            event.date = date.clone();
        }
        if let Some(ref time) = update.time {
            event.time = time.clone();
        }
        if let Some(ref kind) = update.kind {
            event.kind = kind.clone();
        }
        if let Some(confirmed) = update.confirmed {
            event.confirmed = confirmed;
        }
        Ok(())
    })
    .await?;
    Ok(saved)
}

fn is_expired(event: &MeetingEvent, today: NaiveDate) -> bool {
    NaiveDate::parse_from_str(event.date.trim(), DATE_FORMAT).is_ok_and(|date| date < today)
}

async fn purge_before(ctx: &Context, today: NaiveDate) -> Result<usize> {
    let mut removed = 0;
    for book in ctx.stores.meetings.find(&Query::all()).await? {
        if !book.events.iter().any(|e| is_expired(e, today)) {
            continue;
        }
        let (_, count) = mutate(ctx.stores.meetings.as_ref(), &book.faculty_id, "Faculty meeting", |b| {
            let before = b.events.len();
            b.events.retain(|e| !is_expired(e, today));
            Ok(before - b.events.len())
        })
        .await?;
        removed += count;
    }
    Ok(removed)
}

/// Drop events dated before today. Returns how many were removed.
pub async fn purge_expired(ctx: &Context, actor: &Actor) -> Result<usize> {
    require_admin(actor)?;
    let removed = purge_before(ctx, Utc::now().date_naive()).await?;
    info!("Purged {} expired meeting event(s)", removed);
    Ok(removed)
}
