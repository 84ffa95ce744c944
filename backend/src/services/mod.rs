//! Business logic services for the Resto Back Office Platform

pub mod lookup;
pub mod posting;
pub mod reconciliation;
pub mod warehouse;

pub use lookup::LookupIndex;
pub use posting::PostingService;
pub use reconciliation::ReconciliationService;
pub use warehouse::WarehouseService;
