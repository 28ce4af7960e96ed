use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{BonusSchedule, ChallengeId};

/// Challenge type that carries a bonus schedule.
pub const FIRST_BLOOD_TYPE: &str = "firstblood";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeState {
    Visible,
    Hidden,
    Locked,
}

impl ChallengeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeState::Visible => "visible",
            ChallengeState::Hidden => "hidden",
            ChallengeState::Locked => "locked",
        }
    }
}

impl FromStr for ChallengeState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "visible" => Ok(ChallengeState::Visible),
            "hidden" => Ok(ChallengeState::Hidden),
            "locked" => Ok(ChallengeState::Locked),
            other => Err(format!("unknown challenge state: {}", other)),
        }
    }
}

impl fmt::Display for ChallengeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub challenge_id: ChallengeId,
    pub name: String,
    pub category: String,
    pub challenge_type: String,
    pub state: ChallengeState,
    pub value: i32,
    pub bonus_schedule: BonusSchedule,
}

impl Challenge {
    pub fn is_first_blood(&self) -> bool {
        self.challenge_type == FIRST_BLOOD_TYPE
    }

    pub fn is_visible(&self) -> bool {
        self.state == ChallengeState::Visible
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChallenge {
    pub name: String,
    pub category: String,
    pub state: ChallengeState,
    pub value: i32,
    pub bonus_schedule: BonusSchedule,
}

impl NewChallenge {
    pub fn first_blood(name: impl Into<String>, bonus_schedule: BonusSchedule) -> Self {
        Self {
            name: name.into(),
            category: String::new(),
            state: ChallengeState::Visible,
            value: 100,
            bonus_schedule,
        }
    }

    pub fn with_state(mut self, state: ChallengeState) -> Self {
        self.state = state;
        self
    }
}
