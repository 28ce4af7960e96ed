use sqlx::types::Json;
use sqlx::{FromRow, PgConnection};

use crate::error::{Result, StorageError};
use crate::models::{
    BonusSchedule, Challenge, ChallengeId, ChallengeState, FIRST_BLOOD_TYPE, NewChallenge,
};

const CHALLENGE_COLUMNS: &str =
    "challenge_id, name, category, challenge_type, state, value, bonus_schedule";

#[derive(FromRow)]
struct ChallengeRow {
    challenge_id: i32,
    name: String,
    category: String,
    challenge_type: String,
    state: String,
    value: i32,
    bonus_schedule: Json<BonusSchedule>,
}

impl TryFrom<ChallengeRow> for Challenge {
    type Error = StorageError;

    fn try_from(row: ChallengeRow) -> Result<Self> {
        let state = row
            .state
            .parse::<ChallengeState>()
            .map_err(StorageError::ConstraintViolation)?;

        Ok(Challenge {
            challenge_id: row.challenge_id,
            name: row.name,
            category: row.category,
            challenge_type: row.challenge_type,
            state,
            value: row.value,
            bonus_schedule: row.bonus_schedule.0,
        })
    }
}

/// Challenge rows, read and written inside an open transaction
pub struct ChallengeRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> ChallengeRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Get a challenge by ID, or `None` if it was deleted
    pub async fn find_by_id(&mut self, id: ChallengeId) -> Result<Option<Challenge>> {
        let row = sqlx::query_as::<_, ChallengeRow>(&format!(
            "SELECT {} FROM challenges WHERE challenge_id = $1",
            CHALLENGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        row.map(Challenge::try_from).transpose()
    }

    /// List the ids of all first blood challenges
    pub async fn list_first_blood_ids(&mut self) -> Result<Vec<ChallengeId>> {
        let ids = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT challenge_id
            FROM challenges
            WHERE challenge_type = $1
            ORDER BY challenge_id
            "#,
        )
        .bind(FIRST_BLOOD_TYPE)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(ids)
    }

    /// Create a new first blood challenge
    pub async fn create(&mut self, req: &NewChallenge) -> Result<Challenge> {
        let row = sqlx::query_as::<_, ChallengeRow>(&format!(
            r#"
            INSERT INTO challenges (name, category, challenge_type, state, value, bonus_schedule)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            CHALLENGE_COLUMNS
        ))
        .bind(&req.name)
        .bind(&req.category)
        .bind(FIRST_BLOOD_TYPE)
        .bind(req.state.as_str())
        .bind(req.value)
        .bind(Json(req.bonus_schedule.clone()))
        .fetch_one(&mut *self.conn)
        .await?;

        Challenge::try_from(row)
    }

    /// Replace the bonus schedule of a challenge
    pub async fn update_bonus_schedule(
        &mut self,
        id: ChallengeId,
        schedule: &BonusSchedule,
    ) -> Result<Challenge> {
        let row = sqlx::query_as::<_, ChallengeRow>(&format!(
            r#"
            UPDATE challenges
            SET bonus_schedule = $2
            WHERE challenge_id = $1
            RETURNING {}
            "#,
            CHALLENGE_COLUMNS
        ))
        .bind(id)
        .bind(Json(schedule.clone()))
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or(StorageError::NotFound)?;

        Challenge::try_from(row)
    }

    /// Change the visibility state of a challenge
    pub async fn update_state(&mut self, id: ChallengeId, state: ChallengeState) -> Result<Challenge> {
        let row = sqlx::query_as::<_, ChallengeRow>(&format!(
            r#"
            UPDATE challenges
            SET state = $2
            WHERE challenge_id = $1
            RETURNING {}
            "#,
            CHALLENGE_COLUMNS
        ))
        .bind(id)
        .bind(state.as_str())
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or(StorageError::NotFound)?;

        Challenge::try_from(row)
    }

    /// Delete a challenge; solves and awards go with it
    pub async fn delete(&mut self, id: ChallengeId) -> Result<()> {
        let result = sqlx::query("DELETE FROM challenges WHERE challenge_id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        Ok(())
    }
}
