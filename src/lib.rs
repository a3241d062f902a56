//! Bailiff - authorization gateway for a multi-tenant law-practice API
//!
//! Every protected request passes an ordered chain of gates before it
//! reaches a handler:
//!
//! - **Token**: bearer credential decoded and checked for expiry
//! - **Principal**: account re-read from storage, must exist and be active
//! - **Role**: route-level role requirement, matched exactly
//! - **Ownership**: per-record check against the owning principal
//! - **Entitlement**: a current subscription is attached to the request
//! - **Feature**: the attached plan grants a named capability
//! - **Quota**: plan limit per resource class on create
//!
//! Admins skip the ownership, entitlement, feature and quota gates, and each
//! skip is audited. They do not satisfy a STANDARD-only role gate.
//! The first failing gate decides the response; later gates never run.

pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod routes;
pub mod server;
pub mod store;
pub mod types;

pub use auth::{AuthContext, AuthError, Authorizer, Policy};
pub use config::Args;
pub use server::{run, AppState};
pub use types::{BailiffError, Result};
