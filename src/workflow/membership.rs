//! Group membership rules
//!
//! A group holds between three and five distinct students. Once its thesis is
//! registered the roster is frozen.

use crate::types::{QuireError, Result};

pub const MIN_GROUP_SIZE: usize = 3;
pub const MAX_GROUP_SIZE: usize = 5;

/// Trim and validate a proposed roster, preserving order
pub fn normalize_roster(ids: &[String]) -> Result<Vec<String>> {
    let mut roster: Vec<String> = Vec::with_capacity(ids.len());

    for id in ids {
        let id = id.trim();
        if id.is_empty() {
            return Err(QuireError::validation("Student IDs must not be empty"));
        }
        if roster.iter().any(|existing| existing == id) {
            return Err(QuireError::validation(format!(
                "Student {} is listed more than once",
                id
            )));
        }
        roster.push(id.to_string());
    }

    if !(MIN_GROUP_SIZE..=MAX_GROUP_SIZE).contains(&roster.len()) {
        return Err(QuireError::validation(format!(
            "A group must have between {} and {} students",
            MIN_GROUP_SIZE, MAX_GROUP_SIZE
        )));
    }

    Ok(roster)
}

fn ensure_open(registered: bool) -> Result<()> {
    if registered {
        return Err(QuireError::workflow(
            "Group membership is locked once the thesis is registered",
        ));
    }
    Ok(())
}

/// Roster-level checks for adding `student`
pub fn check_add(members: &[String], registered: bool, student: &str) -> Result<()> {
    ensure_open(registered)?;

    if members.iter().any(|m| m == student) {
        return Err(QuireError::validation(format!(
            "Student {} is already a member of this group",
            student
        )));
    }
    if members.len() >= MAX_GROUP_SIZE {
        return Err(QuireError::validation(format!(
            "Group already has the maximum of {} students",
            MAX_GROUP_SIZE
        )));
    }
    Ok(())
}

/// Roster-level checks for removing `student`
pub fn check_remove(members: &[String], registered: bool, student: &str) -> Result<()> {
    ensure_open(registered)?;

    if !members.iter().any(|m| m == student) {
        return Err(QuireError::not_found(format!(
            "Student {} is not a member of this group",
            student
        )));
    }
    if members.len() <= MIN_GROUP_SIZE {
        return Err(QuireError::validation(format!(
            "Group must keep at least {} students",
            MIN_GROUP_SIZE
        )));
    }
    Ok(())
}

pub fn check_delete(registered: bool) -> Result<()> {
    if registered {
        return Err(QuireError::workflow(
            "A group with a registered thesis cannot be deleted",
        ));
    }
    Ok(())
}
