//! Shared types for Quire

pub mod error;

pub use error::{QuireError, Result};
