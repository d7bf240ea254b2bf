//! Lifecycle rules for groups, theses and proposals
//!
//! Everything here is pure: functions take the current state and either return
//! the next one or a `Workflow`/`Validation` error. Services load records,
//! apply these rules inside `db::store::mutate`, and persist the result.

pub mod correction;
pub mod defer;
pub mod membership;
pub mod progress;
pub mod proposal;

pub use correction::{CorrectionEvent, CorrectionState};
pub use defer::{DeferDecision, DeferEvent, DeferStatus};
pub use progress::{Stage, StageSlots, FINAL_PROGRESS};
pub use proposal::ProposalStatus;
