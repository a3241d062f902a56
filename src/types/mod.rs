//! Shared types for Bailiff

pub mod error;

pub use error::{BailiffError, Result};
