//! Proposal triage rules
//!
//! Faculty triage student proposals. An approval is exclusive: once a faculty
//! member approves, nobody else can change the status until they do.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{QuireError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProposalStatus {
    #[default]
    Pending,
    Approved,
    Interested,
    Rejected,
}

impl ProposalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProposalStatus::Pending => "Pending",
            ProposalStatus::Approved => "Approved",
            ProposalStatus::Interested => "Interested",
            ProposalStatus::Rejected => "Rejected",
        }
    }

    /// Statuses every faculty member can see regardless of who set them
    pub const OPEN_TO_ALL: [ProposalStatus; 3] = [
        ProposalStatus::Pending,
        ProposalStatus::Interested,
        ProposalStatus::Rejected,
    ];
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = QuireError;

    /// Parses a triage decision. `Pending` is not a decision and is refused.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Approved" => Ok(ProposalStatus::Approved),
            "Interested" => Ok(ProposalStatus::Interested),
            "Rejected" => Ok(ProposalStatus::Rejected),
            other => Err(QuireError::validation(format!(
                "Invalid status '{}', expected Approved, Interested or Rejected",
                other
            ))),
        }
    }
}

/// Whether `faculty_id` may set a new status.
///
/// `approved_by` is the faculty recorded on the proposal, if any.
pub fn check_status_change(
    current: ProposalStatus,
    approved_by: Option<&str>,
    faculty_id: &str,
) -> Result<()> {
    match (current, approved_by) {
        (ProposalStatus::Approved, Some(owner)) if owner != faculty_id => Err(
            QuireError::conflict("Proposal has already been approved by another faculty member"),
        ),
        _ => Ok(()),
    }
}

/// Whether a faculty member sees a proposal in their listing
pub fn visible_to_faculty(status: ProposalStatus, approved_by: Option<&str>, faculty_id: &str) -> bool {
    match status {
        ProposalStatus::Approved => approved_by == Some(faculty_id),
        _ => true,
    }
}

/// Owners may edit content only while the proposal is untouched
pub fn check_editable(status: ProposalStatus) -> Result<()> {
    if status != ProposalStatus::Pending {
        return Err(QuireError::workflow(format!(
            "Proposal can no longer be edited (status: {})",
            status
        )));
    }
    Ok(())
}

/// Owners may withdraw a proposal unless someone has shown interest or approved it
pub fn check_withdrawable(status: ProposalStatus) -> Result<()> {
    match status {
        ProposalStatus::Pending | ProposalStatus::Rejected => Ok(()),
        other => Err(QuireError::workflow(format!(
            "Proposal cannot be withdrawn (status: {})",
            other
        ))),
    }
}
