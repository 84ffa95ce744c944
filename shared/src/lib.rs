//! Shared types and models for the Resto Back Office Platform
//!
//! This crate contains types shared between the backend, reporting jobs,
//! and other components of the system.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
