use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::AccountId;

/// Which entity a solve's `account_id` refers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountMode {
    #[default]
    Users,
    Teams,
}

impl AccountMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountMode::Users => "users",
            AccountMode::Teams => "teams",
        }
    }
}

impl FromStr for AccountMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "users" | "user" => Ok(AccountMode::Users),
            "teams" | "team" => Ok(AccountMode::Teams),
            other => Err(format!("unknown account mode: {}", other)),
        }
    }
}

impl fmt::Display for AccountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The moderation flags that decide whether an account shows up publicly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFlags {
    pub hidden: bool,
    pub banned: bool,
}

impl AccountFlags {
    pub fn visible() -> Self {
        Self::default()
    }

    pub fn hidden() -> Self {
        Self {
            hidden: true,
            banned: false,
        }
    }

    pub fn banned() -> Self {
        Self {
            hidden: false,
            banned: true,
        }
    }
}

/// Anything that can hold a solve: a user or a team.
pub trait Account {
    fn account_id(&self) -> AccountId;
    fn is_hidden(&self) -> bool;
    fn is_banned(&self) -> bool;

    fn flags(&self) -> AccountFlags {
        AccountFlags {
            hidden: self.is_hidden(),
            banned: self.is_banned(),
        }
    }

    /// Hidden and banned accounts are left off public leaderboards.
    fn is_publicly_visible(&self) -> bool {
        !self.is_hidden() && !self.is_banned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: i32,
    pub name: String,
    pub team_id: Option<i32>,
    pub hidden: bool,
    pub banned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Team {
    pub team_id: i32,
    pub name: String,
    pub hidden: bool,
    pub banned: bool,
}

impl Account for User {
    fn account_id(&self) -> AccountId {
        self.user_id
    }

    fn is_hidden(&self) -> bool {
        self.hidden
    }

    fn is_banned(&self) -> bool {
        self.banned
    }
}

impl Account for Team {
    fn account_id(&self) -> AccountId {
        self.team_id
    }

    fn is_hidden(&self) -> bool {
        self.hidden
    }

    fn is_banned(&self) -> bool {
        self.banned
    }
}

/// The account behind a solve, resolved according to the [`AccountMode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Solver {
    User(User),
    Team(Team),
}

impl Solver {
    pub fn name(&self) -> &str {
        match self {
            Solver::User(user) => &user.name,
            Solver::Team(team) => &team.name,
        }
    }
}

impl Account for Solver {
    fn account_id(&self) -> AccountId {
        match self {
            Solver::User(user) => user.account_id(),
            Solver::Team(team) => team.account_id(),
        }
    }

    fn is_hidden(&self) -> bool {
        match self {
            Solver::User(user) => user.is_hidden(),
            Solver::Team(team) => team.is_hidden(),
        }
    }

    fn is_banned(&self) -> bool {
        match self {
            Solver::User(user) => user.is_banned(),
            Solver::Team(team) => team.is_banned(),
        }
    }
}
