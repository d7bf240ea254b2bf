//! Quire - thesis management service
//!
//! Backend for a university thesis office: student groups, thesis
//! registration, staged progress reports with supervisor feedback, defer and
//! correction workflows, and pre-thesis topic proposals.
//!
//! ## Layers
//!
//! - **Routes**: hyper handlers, one module per path family
//! - **Services**: business operations over the shared [`services::Context`]
//! - **Workflow**: pure lifecycle rules (progress, defer, correction, membership, proposals)
//! - **Db**: MongoDB or in-memory stores behind one `Store` trait

pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;
pub mod workflow;

pub use config::Args;
pub use server::{dispatch, run, AppState};
pub use types::{QuireError, Result};
