//! State Module - snapshots and run state
//!
//! - **IdentityIndex**: what the target store currently holds, keyed by the
//!   source record each item was built from
//! - **RunState**: which phase a reconciliation run is in

mod index;
mod run;

pub use index::{DuplicateLink, IdentityIndex};
pub use run::{RunPhase, RunState};
