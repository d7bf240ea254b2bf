//! Correction workflow
//!
//! One state per thesis instead of three independent flags:
//!
//! ```text
//! idle --request--> requested --approve--> approved --apply--> updated
//! any  --reset--> idle
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{QuireError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionState {
    #[default]
    Idle,
    Requested,
    Approved,
    /// Topic and abstract rewritten under the current approval
    Updated,
}

impl CorrectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            CorrectionState::Idle => "idle",
            CorrectionState::Requested => "requested",
            CorrectionState::Approved => "approved",
            CorrectionState::Updated => "updated",
        }
    }

    /// Legacy `correction_request` flag
    pub fn requested(self) -> bool {
        self != CorrectionState::Idle
    }

    /// Legacy `correction_approved` flag: an approval not yet used by an edit.
    /// True exactly when `Apply` is allowed.
    pub fn approved(self) -> bool {
        self == CorrectionState::Approved
    }

    /// Legacy `updated_topic` flag
    pub fn topic_updated(self) -> bool {
        self == CorrectionState::Updated
    }
}

impl fmt::Display for CorrectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionEvent {
    Request,
    Approve,
    Apply,
    Reset,
}

/// Transition table
pub fn transition(current: CorrectionState, event: CorrectionEvent) -> Result<CorrectionState> {
    use CorrectionState::*;

    match (current, event) {
        (_, CorrectionEvent::Reset) => Ok(Idle),

        (Idle, CorrectionEvent::Request) => Ok(Requested),
        (_, CorrectionEvent::Request) => Err(QuireError::workflow(
            "Correction has already been requested",
        )),

        (Requested, CorrectionEvent::Approve) => Ok(Approved),
        (Idle, CorrectionEvent::Approve) => Err(QuireError::workflow(
            "No correction request to approve",
        )),
        (_, CorrectionEvent::Approve) => Err(QuireError::workflow(
            "Correction has already been approved",
        )),

        (Approved, CorrectionEvent::Apply) => Ok(Updated),
        (Updated, CorrectionEvent::Apply) => Err(QuireError::Forbidden(
            "Correction has already been applied".into(),
        )),
        (_, CorrectionEvent::Apply) => Err(QuireError::Forbidden(
            "Correction has not been approved".into(),
        )),
    }
}
