//! Loyalty program engine
//!
//! - [`accumulator`] - pure punch arithmetic and the overflow policy
//! - [`ledger`] - history entries written alongside each balance change
//! - [`service`] - transactional operations over the store
//! - [`stats`] / [`reconcile`] - read-only derivations

pub mod accumulator;
pub mod ledger;
pub mod reconcile;
pub mod service;
pub mod stats;

pub use accumulator::OverflowPolicy;
pub use reconcile::Reconciliation;
pub use service::LoyaltyService;
pub use stats::LoyaltyStats;
