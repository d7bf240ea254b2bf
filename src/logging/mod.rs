//! Logging infrastructure for Quire
//!
//! Request and service logs go through `tracing`; decisions that change a
//! thesis, group, proposal or account also go to the audit trail.

pub mod audit;

pub use audit::{AuditEvent, AuditKind, AuditLogger};
