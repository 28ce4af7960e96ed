use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{AccountId, ChallengeId, SolveId};

/// An accepted submission. `solve_id` grows monotonically, so ordering by it
/// is ordering by submission, with insertion order breaking timestamp ties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Solve {
    pub solve_id: SolveId,
    pub challenge_id: ChallengeId,
    /// The user in user mode, the team in team mode.
    pub account_id: AccountId,
    pub user_id: Option<i32>,
    pub team_id: Option<i32>,
    pub solved_at: NaiveDateTime,
}
