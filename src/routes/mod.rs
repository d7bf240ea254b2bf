//! HTTP routes for Quire
//!
//! Each module handles one top-level path family and returns `None` when the
//! method and path are not one of its routes.

pub mod accounts;
pub mod approvals;
pub mod catalogue;
pub mod common;
pub mod groups;
pub mod health;
pub mod mail;
pub mod meetings;
pub mod proposals;
pub mod resources;
pub mod synopsis;
pub mod thesis;

pub use accounts::{handle_auth_request, handle_users_request};
pub use approvals::handle_approvals_request;
pub use catalogue::handle_catalogue_request;
pub use common::{error_response, json_response, not_found_response, preflight_response, BoxBody, HttpResponse};
pub use groups::handle_groups_request;
pub use health::{health_check, version_info};
pub use mail::handle_mail_request;
pub use meetings::handle_meeting_request;
pub use proposals::handle_proposals_request;
pub use resources::{handle_files_request, handle_resources_request};
pub use synopsis::handle_synopsis_request;
pub use thesis::handle_thesis_request;
