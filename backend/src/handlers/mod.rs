//! HTTP request handlers
//!
//! Handlers stay thin: extract and validate request input, delegate to the
//! service layer, serialize the response.

pub mod health;
pub mod reconciliation;
pub mod warehouse;

pub use health::*;
pub use reconciliation::*;
pub use warehouse::*;
