use sqlx::PgConnection;

use super::account_table;
use crate::error::{Result, StorageError};
use crate::models::{AccountId, AccountMode, ChallengeId, FIRST_BLOOD_TYPE, Solve, SolveId};

const SOLVE_COLUMNS: &str = "solve_id, challenge_id, account_id, user_id, team_id, solved_at";

pub struct SolveRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> SolveRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// All solves of a challenge in submission order
    pub async fn list_by_challenge(&mut self, challenge_id: ChallengeId) -> Result<Vec<Solve>> {
        let solves = sqlx::query_as::<_, Solve>(&format!(
            "SELECT {} FROM solves WHERE challenge_id = $1 ORDER BY solve_id",
            SOLVE_COLUMNS
        ))
        .bind(challenge_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(solves)
    }

    pub async fn find_by_id(&mut self, solve_id: SolveId) -> Result<Option<Solve>> {
        let solve = sqlx::query_as::<_, Solve>(&format!(
            "SELECT {} FROM solves WHERE solve_id = $1",
            SOLVE_COLUMNS
        ))
        .bind(solve_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(solve)
    }

    pub async fn create(
        &mut self,
        challenge_id: ChallengeId,
        account_id: AccountId,
        user_id: Option<i32>,
        team_id: Option<i32>,
    ) -> Result<Solve> {
        let solve = sqlx::query_as::<_, Solve>(&format!(
            r#"
            INSERT INTO solves (challenge_id, account_id, user_id, team_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            SOLVE_COLUMNS
        ))
        .bind(challenge_id)
        .bind(account_id)
        .bind(user_id)
        .bind(team_id)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.code().as_deref() == Some("23503") {
                    return StorageError::ConstraintViolation(
                        "Challenge or account does not exist".to_string(),
                    );
                }
            }
            StorageError::from(e)
        })?;

        Ok(solve)
    }

    pub async fn delete(&mut self, solve_id: SolveId) -> Result<()> {
        let result = sqlx::query("DELETE FROM solves WHERE solve_id = $1")
            .bind(solve_id)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        Ok(())
    }

    /// Bulk delete; the removed rows are not reported back
    pub async fn delete_by_account(&mut self, account_id: AccountId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM solves WHERE account_id = $1")
            .bind(account_id)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn count_eligible_through(
        &mut self,
        mode: AccountMode,
        challenge_id: ChallengeId,
        through: SolveId,
    ) -> Result<i64> {
        let (table, key) = account_table(mode);
        let count = sqlx::query_scalar::<_, i64>(&format!(
            r#"
            SELECT COUNT(*)
            FROM solves s
            INNER JOIN {table} a ON s.account_id = a.{key}
            WHERE s.challenge_id = $1
              AND s.solve_id <= $2
              AND a.hidden = FALSE
              AND a.banned = FALSE
            "#
        ))
        .bind(challenge_id)
        .bind(through)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(count)
    }

    pub async fn has_after(&mut self, challenge_id: ChallengeId, after: SolveId) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM solves WHERE challenge_id = $1 AND solve_id > $2
            )
            "#,
        )
        .bind(challenge_id)
        .bind(after)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(exists)
    }

    /// First blood challenges the account has solved
    pub async fn challenges_solved_by(&mut self, account_id: AccountId) -> Result<Vec<ChallengeId>> {
        let ids = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT DISTINCT c.challenge_id
            FROM solves s
            INNER JOIN challenges c ON s.challenge_id = c.challenge_id
            WHERE s.account_id = $1
              AND c.challenge_type = $2
            ORDER BY c.challenge_id
            "#,
        )
        .bind(account_id)
        .bind(FIRST_BLOOD_TYPE)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(ids)
    }
}
