//! Controller Module - drives one reconciliation run
//!
//! 1. Fetch source records and target items
//! 2. Compute the plan (`reconcile::plan`)
//! 3. Execute the plan against the target
//! 4. Report

pub mod executor;
pub mod reconciler;

pub use executor::{execute, ExecutorOptions};
pub use reconciler::{Reconciler, ReconcilerOptions};
