//! Database schemas for Quire
//!
//! Defines the document structures for every collection.

mod approval;
mod domain;
mod group;
mod meeting;
mod metadata;
mod proposal;
mod resource;
mod synopsis;
mod thesis;
mod user;

pub use approval::{ApprovalDoc, APPROVAL_COLLECTION, REGISTRATION_KIND};
pub use domain::{DomainEntryDoc, ExpertiseDoc, DOMAIN_LIST_COLLECTION, EXPERTISE_COLLECTION};
pub use group::{GroupDoc, GROUP_COLLECTION};
pub use meeting::{MeetingBookDoc, MeetingEvent, MEETING_COLLECTION};
pub use metadata::Metadata;
pub use proposal::{ProposalDoc, Reviewer, PROPOSAL_COLLECTION};
pub use resource::{ResourceDoc, RESOURCE_COLLECTION};
pub use synopsis::{SynopsisDoc, SYNOPSIS_COLLECTION};
pub use thesis::{ThesisDoc, THESIS_COLLECTION};
pub use user::{AccountStatus, UserDoc, UserProfile, USER_COLLECTION};
