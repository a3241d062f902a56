//! Logging infrastructure
//!
//! Request tracing goes through `tracing`; privileged actions additionally
//! produce structured audit events.

pub mod audit;

pub use audit::{AuditEvent, AuditKind, AuditLogger};
