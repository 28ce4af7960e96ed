use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{AccountId, AwardId, ChallengeId, SolveId};

/// A first blood award as stored. Derived data: only the reconciler writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Award {
    pub award_id: AwardId,
    pub challenge_id: ChallengeId,
    pub solve_id: SolveId,
    pub account_id: AccountId,
    pub user_id: Option<i32>,
    pub team_id: Option<i32>,
    pub name: String,
    pub description: String,
    pub category: String,
    pub icon: String,
    pub value: i32,
    pub rank: i32,
    pub awarded_at: NaiveDateTime,
}

/// Every award column except the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAward {
    pub challenge_id: ChallengeId,
    pub solve_id: SolveId,
    pub account_id: AccountId,
    pub user_id: Option<i32>,
    pub team_id: Option<i32>,
    pub name: String,
    pub description: String,
    pub category: String,
    pub icon: String,
    pub value: i32,
    pub rank: i32,
    pub awarded_at: NaiveDateTime,
}

impl Award {
    pub fn from_new(award_id: AwardId, fields: &NewAward) -> Self {
        Self {
            award_id,
            challenge_id: fields.challenge_id,
            solve_id: fields.solve_id,
            account_id: fields.account_id,
            user_id: fields.user_id,
            team_id: fields.team_id,
            name: fields.name.clone(),
            description: fields.description.clone(),
            category: fields.category.clone(),
            icon: fields.icon.clone(),
            value: fields.value,
            rank: fields.rank,
            awarded_at: fields.awarded_at,
        }
    }

    /// True when every mutable column already has the desired value.
    pub fn matches(&self, fields: &NewAward) -> bool {
        self.challenge_id == fields.challenge_id
            && self.solve_id == fields.solve_id
            && self.account_id == fields.account_id
            && self.user_id == fields.user_id
            && self.team_id == fields.team_id
            && self.name == fields.name
            && self.description == fields.description
            && self.category == fields.category
            && self.icon == fields.icon
            && self.value == fields.value
            && self.rank == fields.rank
            && self.awarded_at == fields.awarded_at
    }

    pub fn apply(&mut self, fields: &NewAward) {
        *self = Self::from_new(self.award_id, fields);
    }
}
