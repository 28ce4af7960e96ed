//! First blood awards: bonus points for the first solvers of a challenge,
//! kept in step with solves, challenge settings and account moderation.

pub mod eligibility;
pub mod error;
pub mod generator;
pub mod ordinal;
pub mod reconciler;
pub mod triggers;

#[cfg(test)]
mod test_utils;

pub use eligibility::is_eligible;
pub use error::{FirstBloodError, Result};
pub use generator::{RankedSolve, rank_and_award};
pub use ordinal::ordinalize;
pub use reconciler::{ReconcileReport, desired_awards, on_solve_recorded, reconcile};
pub use triggers::{PendingReconciliations, UnitOfWork};
