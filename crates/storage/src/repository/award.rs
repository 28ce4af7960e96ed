use sqlx::PgConnection;

use crate::error::{Result, StorageError};
use crate::models::{AccountId, Award, AwardId, ChallengeId, NewAward, SolveId};

const AWARD_COLUMNS: &str = "award_id, challenge_id, solve_id, account_id, user_id, team_id, \
                             name, description, category, icon, value, rank, awarded_at";

/// Repository for first blood award rows
pub struct AwardRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> AwardRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    pub async fn list_by_challenge(&mut self, challenge_id: ChallengeId) -> Result<Vec<Award>> {
        let awards = sqlx::query_as::<_, Award>(&format!(
            "SELECT {} FROM first_blood_awards WHERE challenge_id = $1 ORDER BY rank, award_id",
            AWARD_COLUMNS
        ))
        .bind(challenge_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(awards)
    }

    pub async fn list_by_solve(&mut self, solve_id: SolveId) -> Result<Vec<Award>> {
        let awards = sqlx::query_as::<_, Award>(&format!(
            "SELECT {} FROM first_blood_awards WHERE solve_id = $1",
            AWARD_COLUMNS
        ))
        .bind(solve_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(awards)
    }

    pub async fn list_by_account(&mut self, account_id: AccountId) -> Result<Vec<Award>> {
        let awards = sqlx::query_as::<_, Award>(&format!(
            "SELECT {} FROM first_blood_awards WHERE account_id = $1 ORDER BY award_id",
            AWARD_COLUMNS
        ))
        .bind(account_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(awards)
    }

    pub async fn insert(&mut self, award: &NewAward) -> Result<Award> {
        let inserted = sqlx::query_as::<_, Award>(&format!(
            r#"
            INSERT INTO first_blood_awards (
                challenge_id, solve_id, account_id, user_id, team_id,
                name, description, category, icon, value, rank, awarded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            AWARD_COLUMNS
        ))
        .bind(award.challenge_id)
        .bind(award.solve_id)
        .bind(award.account_id)
        .bind(award.user_id)
        .bind(award.team_id)
        .bind(&award.name)
        .bind(&award.description)
        .bind(&award.category)
        .bind(&award.icon)
        .bind(award.value)
        .bind(award.rank)
        .bind(award.awarded_at)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.code().as_deref() == Some("23505") {
                    return StorageError::ConstraintViolation(format!(
                        "Solve {} already has an award",
                        award.solve_id
                    ));
                }
            }
            StorageError::from(e)
        })?;

        Ok(inserted)
    }

    pub async fn update(&mut self, award_id: AwardId, award: &NewAward) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE first_blood_awards
            SET
                challenge_id = $2,
                solve_id = $3,
                account_id = $4,
                user_id = $5,
                team_id = $6,
                name = $7,
                description = $8,
                category = $9,
                icon = $10,
                value = $11,
                rank = $12,
                awarded_at = $13
            WHERE award_id = $1
            "#,
        )
        .bind(award_id)
        .bind(award.challenge_id)
        .bind(award.solve_id)
        .bind(award.account_id)
        .bind(award.user_id)
        .bind(award.team_id)
        .bind(&award.name)
        .bind(&award.description)
        .bind(&award.category)
        .bind(&award.icon)
        .bind(award.value)
        .bind(award.rank)
        .bind(award.awarded_at)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        Ok(())
    }

    pub async fn delete(&mut self, award_id: AwardId) -> Result<()> {
        let result = sqlx::query("DELETE FROM first_blood_awards WHERE award_id = $1")
            .bind(award_id)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        Ok(())
    }
}
