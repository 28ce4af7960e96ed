use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::error::{Result, StorageError};
use crate::models::{
    AccountId, AccountMode, Award, AwardId, Challenge, ChallengeId, NewAward, Solve, SolveId,
    Solver,
};
use crate::repository::{
    AccountRepository, AwardRepository, ChallengeRepository, SolveRepository,
};
use crate::store::LedgerStore;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Open a unit of work at serializable isolation. Two units that rank solves
    /// of the same challenge read each other's solve rows, so Postgres aborts
    /// one of them with 40001 instead of letting both commit the same rank.
    pub async fn begin(&self, mode: AccountMode) -> Result<PgLedger> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        Ok(PgLedger { tx, mode })
    }
}

/// A Postgres transaction viewed as a [`LedgerStore`].
pub struct PgLedger {
    tx: Transaction<'static, Postgres>,
    mode: AccountMode,
}

impl PgLedger {
    fn conn(&mut self) -> &mut PgConnection {
        &mut *self.tx
    }

    pub fn challenges(&mut self) -> ChallengeRepository<'_> {
        ChallengeRepository::new(self.conn())
    }

    pub fn solves(&mut self) -> SolveRepository<'_> {
        SolveRepository::new(self.conn())
    }

    pub fn accounts(&mut self) -> AccountRepository<'_> {
        AccountRepository::new(self.conn())
    }

    pub fn awards(&mut self) -> AwardRepository<'_> {
        AwardRepository::new(self.conn())
    }

    /// Insert a solve for the account, filling in the user/team columns
    /// according to the account mode.
    pub async fn record_solve(
        &mut self,
        challenge_id: ChallengeId,
        account_id: AccountId,
    ) -> Result<Solve> {
        let (user_id, team_id) = match self.mode {
            AccountMode::Users => {
                let user = self
                    .accounts()
                    .find_user(account_id)
                    .await?
                    .ok_or(StorageError::NotFound)?;
                (Some(user.user_id), user.team_id)
            }
            AccountMode::Teams => {
                self.accounts()
                    .find_team(account_id)
                    .await?
                    .ok_or(StorageError::NotFound)?;
                (None, Some(account_id))
            }
        };

        self.solves()
            .create(challenge_id, account_id, user_id, team_id)
            .await
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgLedger {
    async fn find_challenge(&mut self, challenge_id: ChallengeId) -> Result<Option<Challenge>> {
        self.challenges().find_by_id(challenge_id).await
    }

    async fn list_first_blood_challenge_ids(&mut self) -> Result<Vec<ChallengeId>> {
        self.challenges().list_first_blood_ids().await
    }

    async fn list_solves_by_challenge(&mut self, challenge_id: ChallengeId) -> Result<Vec<Solve>> {
        self.solves().list_by_challenge(challenge_id).await
    }

    async fn find_solve(&mut self, solve_id: SolveId) -> Result<Option<Solve>> {
        self.solves().find_by_id(solve_id).await
    }

    async fn find_solver(&mut self, account_id: AccountId) -> Result<Option<Solver>> {
        let mode = self.mode;
        self.accounts().find_solver(mode, account_id).await
    }

    async fn count_eligible_solves_through(
        &mut self,
        challenge_id: ChallengeId,
        through: SolveId,
    ) -> Result<i64> {
        let mode = self.mode;
        self.solves()
            .count_eligible_through(mode, challenge_id, through)
            .await
    }

    async fn has_solves_after(
        &mut self,
        challenge_id: ChallengeId,
        after: SolveId,
    ) -> Result<bool> {
        self.solves().has_after(challenge_id, after).await
    }

    async fn list_challenges_solved_by(
        &mut self,
        account_id: AccountId,
    ) -> Result<Vec<ChallengeId>> {
        self.solves().challenges_solved_by(account_id).await
    }

    async fn list_awards_by_challenge(&mut self, challenge_id: ChallengeId) -> Result<Vec<Award>> {
        self.awards().list_by_challenge(challenge_id).await
    }

    async fn list_awards_by_solve(&mut self, solve_id: SolveId) -> Result<Vec<Award>> {
        self.awards().list_by_solve(solve_id).await
    }

    async fn list_awards_by_account(&mut self, account_id: AccountId) -> Result<Vec<Award>> {
        self.awards().list_by_account(account_id).await
    }

    async fn insert_award(&mut self, award: &NewAward) -> Result<Award> {
        self.awards().insert(award).await
    }

    async fn update_award(&mut self, award_id: AwardId, award: &NewAward) -> Result<()> {
        self.awards().update(award_id, award).await
    }

    async fn delete_award(&mut self, award_id: AwardId) -> Result<()> {
        self.awards().delete(award_id).await
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
