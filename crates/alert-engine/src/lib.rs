//! Alert generation and the risk ledger.
//!
//! Converts triggered rules into alert records and applies the resulting
//! risk-score increments to the sender account, appending one audit entry
//! per alert so every score change stays explainable.

pub mod generator;
pub mod ledger;

pub use generator::AlertGenerator;
pub use ledger::RiskLedger;
