//! HTTP server for Quire

pub mod http;

pub use http::{dispatch, run, AppState};
