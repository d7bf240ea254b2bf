//! Defer workflow
//!
//! ```text
//! none --request (progress < 3)--> pending --approve--> approved
//!                                          --reject---> rejected
//! any  --reset--> none
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{QuireError, Result};
use crate::workflow::progress::FINAL_PROGRESS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeferStatus {
    #[default]
    None,
    Pending,
    Approved,
    Rejected,
}

impl DeferStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeferStatus::None => "none",
            DeferStatus::Pending => "pending",
            DeferStatus::Approved => "approved",
            DeferStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for DeferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supervisor decision on a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferDecision {
    Approve,
    Reject,
}

impl FromStr for DeferDecision {
    type Err = QuireError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "approve" => Ok(DeferDecision::Approve),
            "reject" => Ok(DeferDecision::Reject),
            other => Err(QuireError::validation(format!(
                "Invalid decision '{}', expected 'approve' or 'reject'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferEvent {
    Request { progress: u8 },
    Decide(DeferDecision),
    Reset,
}

/// Transition table
pub fn transition(current: DeferStatus, event: DeferEvent) -> Result<DeferStatus> {
    use DeferStatus::*;

    match (current, event) {
        (_, DeferEvent::Reset) => Ok(None),

        (None, DeferEvent::Request { progress }) if progress < FINAL_PROGRESS => Ok(Pending),
        (None, DeferEvent::Request { .. }) => Err(QuireError::workflow(
            "Defer is not possible once all stages are submitted",
        )),
        (status, DeferEvent::Request { .. }) => Err(QuireError::workflow(format!(
            "A defer request already exists (status: {})",
            status
        ))),

        (Pending, DeferEvent::Decide(DeferDecision::Approve)) => Ok(Approved),
        (Pending, DeferEvent::Decide(DeferDecision::Reject)) => Ok(Rejected),
        (status, DeferEvent::Decide(_)) => Err(QuireError::workflow(format!(
            "No pending defer request to decide (status: {})",
            status
        ))),
    }
}
