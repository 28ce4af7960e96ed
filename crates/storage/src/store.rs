use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    AccountId, Award, AwardId, Challenge, ChallengeId, NewAward, Solve, SolveId,
    Solver,
};

/// Data access used by the award reconciler.
///
/// An implementation is one open unit of work: every read sees the writes made
/// earlier through the same value, and nothing becomes visible to other units
/// until [`LedgerStore::commit`] succeeds. Dropping it uncommitted rolls back.
///
/// Production: [`crate::postgres::PgLedger`]
/// Testing: [`crate::memory::MemoryLedger`]
#[async_trait]
pub trait LedgerStore: Send {
    async fn find_challenge(&mut self, challenge_id: ChallengeId) -> Result<Option<Challenge>>;

    /// Ids of every challenge of the bonus schedule type, ascending.
    async fn list_first_blood_challenge_ids(&mut self) -> Result<Vec<ChallengeId>>;

    /// Solves of a challenge ordered by `solve_id` ascending.
    async fn list_solves_by_challenge(&mut self, challenge_id: ChallengeId) -> Result<Vec<Solve>>;

    async fn find_solve(&mut self, solve_id: SolveId) -> Result<Option<Solve>>;

    /// The user or team behind `account_id`, depending on the account mode.
    async fn find_solver(&mut self, account_id: AccountId) -> Result<Option<Solver>>;

    /// Solves on the challenge with `solve_id <= through` whose account is
    /// neither hidden nor banned.
    async fn count_eligible_solves_through(
        &mut self,
        challenge_id: ChallengeId,
        through: SolveId,
    ) -> Result<i64>;

    async fn has_solves_after(&mut self, challenge_id: ChallengeId, after: SolveId)
    -> Result<bool>;

    /// Bonus schedule challenges on which the account holds at least one solve.
    async fn list_challenges_solved_by(&mut self, account_id: AccountId)
    -> Result<Vec<ChallengeId>>;

    async fn list_awards_by_challenge(&mut self, challenge_id: ChallengeId) -> Result<Vec<Award>>;

    async fn list_awards_by_solve(&mut self, solve_id: SolveId) -> Result<Vec<Award>>;

    async fn list_awards_by_account(&mut self, account_id: AccountId) -> Result<Vec<Award>>;

    async fn insert_award(&mut self, award: &NewAward) -> Result<Award>;

    async fn update_award(&mut self, award_id: AwardId, award: &NewAward) -> Result<()>;

    async fn delete_award(&mut self, award_id: AwardId) -> Result<()>;

    async fn commit(self) -> Result<()>;
}
