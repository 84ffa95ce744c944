//! Domain models for the Resto Back Office Platform

mod catalog;
mod purchase;
mod reconciliation;
mod stock;
mod warehouse;

pub use catalog::*;
pub use purchase::*;
pub use reconciliation::*;
pub use stock::*;
pub use warehouse::*;
