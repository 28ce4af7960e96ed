use sqlx::PgConnection;

use super::account_table;
use crate::error::{Result, StorageError};
use crate::models::{AccountFlags, AccountId, AccountMode, Solver, Team, User};

pub struct AccountRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> AccountRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    pub async fn find_user(&mut self, user_id: i32) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT user_id, name, team_id, hidden, banned FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(user)
    }

    pub async fn find_team(&mut self, team_id: i32) -> Result<Option<Team>> {
        let team = sqlx::query_as::<_, Team>(
            "SELECT team_id, name, hidden, banned FROM teams WHERE team_id = $1",
        )
        .bind(team_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(team)
    }

    /// Resolve the account behind a solve
    pub async fn find_solver(
        &mut self,
        mode: AccountMode,
        account_id: AccountId,
    ) -> Result<Option<Solver>> {
        let solver = match mode {
            AccountMode::Users => self.find_user(account_id).await?.map(Solver::User),
            AccountMode::Teams => self.find_team(account_id).await?.map(Solver::Team),
        };

        Ok(solver)
    }

    pub async fn create_user(&mut self, name: &str, team_id: Option<i32>) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, team_id)
            VALUES ($1, $2)
            RETURNING user_id, name, team_id, hidden, banned
            "#,
        )
        .bind(name)
        .bind(team_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(user)
    }

    pub async fn create_team(&mut self, name: &str) -> Result<Team> {
        let team = sqlx::query_as::<_, Team>(
            r#"
            INSERT INTO teams (name)
            VALUES ($1)
            RETURNING team_id, name, hidden, banned
            "#,
        )
        .bind(name)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(team)
    }

    /// Update the moderation flags and return the flags the account had before
    pub async fn set_flags(
        &mut self,
        mode: AccountMode,
        account_id: AccountId,
        flags: AccountFlags,
    ) -> Result<AccountFlags> {
        let (table, key) = account_table(mode);

        let (hidden, banned) = sqlx::query_as::<_, (bool, bool)>(&format!(
            "SELECT hidden, banned FROM {table} WHERE {key} = $1 FOR UPDATE"
        ))
        .bind(account_id)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or(StorageError::NotFound)?;

        sqlx::query(&format!(
            "UPDATE {table} SET hidden = $2, banned = $3 WHERE {key} = $1"
        ))
        .bind(account_id)
        .bind(flags.hidden)
        .bind(flags.banned)
        .execute(&mut *self.conn)
        .await?;

        Ok(AccountFlags { hidden, banned })
    }

    pub async fn delete(&mut self, mode: AccountMode, account_id: AccountId) -> Result<()> {
        let (table, key) = account_table(mode);
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE {key} = $1"))
            .bind(account_id)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        Ok(())
    }
}
