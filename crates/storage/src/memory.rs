use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::{Result, StorageError};
use crate::models::{
    Account, AccountFlags, AccountId, AccountMode, Award, AwardId, BonusSchedule, Challenge,
    ChallengeId, ChallengeState, FIRST_BLOOD_TYPE, NewAward, NewChallenge, Solve, SolveId, Solver,
    Team, User,
};
use crate::store::LedgerStore;

#[derive(Debug, Clone, Default)]
struct LedgerState {
    version: u64,
    mode: AccountMode,
    challenges: BTreeMap<ChallengeId, Challenge>,
    users: BTreeMap<i32, User>,
    teams: BTreeMap<i32, Team>,
    solves: BTreeMap<SolveId, Solve>,
    awards: BTreeMap<AwardId, Award>,
    last_challenge_id: i32,
    last_user_id: i32,
    last_team_id: i32,
    last_solve_id: SolveId,
    last_award_id: AwardId,
}

impl LedgerState {
    fn solver(&self, account_id: AccountId) -> Option<Solver> {
        match self.mode {
            AccountMode::Users => self.users.get(&account_id).cloned().map(Solver::User),
            AccountMode::Teams => self.teams.get(&account_id).cloned().map(Solver::Team),
        }
    }
}

/// In-memory ledger for unit tests and local experiments.
///
/// Each [`MemoryLedger`] works on a private copy and publishes it on commit.
/// A commit fails with [`StorageError::Conflict`] if another unit committed
/// after this one began.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<LedgerState>>,
}

impl MemoryDatabase {
    pub fn new(mode: AccountMode) -> Self {
        let state = LedgerState {
            mode,
            ..LedgerState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn begin(&self) -> MemoryLedger {
        let working = self.lock().clone();
        MemoryLedger {
            shared: Arc::clone(&self.state),
            base_version: working.version,
            working,
        }
    }

    /// Committed awards of a challenge, ordered by rank.
    pub fn awards(&self, challenge_id: ChallengeId) -> Vec<Award> {
        let mut awards: Vec<Award> = self
            .lock()
            .awards
            .values()
            .filter(|award| award.challenge_id == challenge_id)
            .cloned()
            .collect();
        awards.sort_by_key(|award| (award.rank, award.award_id));
        awards
    }

    pub fn award_count(&self) -> usize {
        self.lock().awards.len()
    }

    pub fn solves(&self, challenge_id: ChallengeId) -> Vec<Solve> {
        self.lock()
            .solves
            .values()
            .filter(|solve| solve.challenge_id == challenge_id)
            .cloned()
            .collect()
    }
}

/// One unit of work against a [`MemoryDatabase`].
#[derive(Debug)]
pub struct MemoryLedger {
    shared: Arc<Mutex<LedgerState>>,
    base_version: u64,
    working: LedgerState,
}

impl MemoryLedger {
    pub fn create_challenge(&mut self, req: &NewChallenge) -> Challenge {
        self.working.last_challenge_id += 1;
        let challenge = Challenge {
            challenge_id: self.working.last_challenge_id,
            name: req.name.clone(),
            category: req.category.clone(),
            challenge_type: FIRST_BLOOD_TYPE.to_string(),
            state: req.state,
            value: req.value,
            bonus_schedule: req.bonus_schedule.clone(),
        };
        self.working
            .challenges
            .insert(challenge.challenge_id, challenge.clone());
        challenge
    }

    /// Insert a challenge of another type, e.g. a plain static challenge.
    pub fn create_standard_challenge(&mut self, name: &str) -> Challenge {
        let mut challenge = self.create_challenge(&NewChallenge::first_blood(
            name,
            BonusSchedule::empty(),
        ));
        challenge.challenge_type = "standard".to_string();
        self.working
            .challenges
            .insert(challenge.challenge_id, challenge.clone());
        challenge
    }

    fn challenge_mut(&mut self, challenge_id: ChallengeId) -> Result<&mut Challenge> {
        self.working
            .challenges
            .get_mut(&challenge_id)
            .ok_or(StorageError::NotFound)
    }

    pub fn update_bonus_schedule(
        &mut self,
        challenge_id: ChallengeId,
        schedule: BonusSchedule,
    ) -> Result<Challenge> {
        let challenge = self.challenge_mut(challenge_id)?;
        challenge.bonus_schedule = schedule;
        Ok(challenge.clone())
    }

    pub fn update_state(
        &mut self,
        challenge_id: ChallengeId,
        state: ChallengeState,
    ) -> Result<Challenge> {
        let challenge = self.challenge_mut(challenge_id)?;
        challenge.state = state;
        Ok(challenge.clone())
    }

    /// Removes the challenge with its solves and awards.
    pub fn delete_challenge(&mut self, challenge_id: ChallengeId) -> Result<()> {
        self.working
            .challenges
            .remove(&challenge_id)
            .ok_or(StorageError::NotFound)?;
        self.working
            .solves
            .retain(|_, solve| solve.challenge_id != challenge_id);
        self.working
            .awards
            .retain(|_, award| award.challenge_id != challenge_id);
        Ok(())
    }

    pub fn create_user(&mut self, name: &str, team_id: Option<i32>) -> User {
        self.working.last_user_id += 1;
        let user = User {
            user_id: self.working.last_user_id,
            name: name.to_string(),
            team_id,
            hidden: false,
            banned: false,
        };
        self.working.users.insert(user.user_id, user.clone());
        user
    }

    pub fn create_team(&mut self, name: &str) -> Team {
        self.working.last_team_id += 1;
        let team = Team {
            team_id: self.working.last_team_id,
            name: name.to_string(),
            hidden: false,
            banned: false,
        };
        self.working.teams.insert(team.team_id, team.clone());
        team
    }

    /// Update the moderation flags, returning the previous ones.
    pub fn set_account_flags(
        &mut self,
        account_id: AccountId,
        flags: AccountFlags,
    ) -> Result<AccountFlags> {
        let previous = match self.working.mode {
            AccountMode::Users => {
                let user = self
                    .working
                    .users
                    .get_mut(&account_id)
                    .ok_or(StorageError::NotFound)?;
                let previous = user.flags();
                user.hidden = flags.hidden;
                user.banned = flags.banned;
                previous
            }
            AccountMode::Teams => {
                let team = self
                    .working
                    .teams
                    .get_mut(&account_id)
                    .ok_or(StorageError::NotFound)?;
                let previous = team.flags();
                team.hidden = flags.hidden;
                team.banned = flags.banned;
                previous
            }
        };
        Ok(previous)
    }

    /// Removes the account row. Its solves disappear with it, the same way the
    /// Postgres cascade removes them; awards are left for the reconciler.
    pub fn delete_account(&mut self, account_id: AccountId) -> Result<u64> {
        let removed = match self.working.mode {
            AccountMode::Users => self.working.users.remove(&account_id).is_some(),
            AccountMode::Teams => self.working.teams.remove(&account_id).is_some(),
        };
        if !removed {
            return Err(StorageError::NotFound);
        }
        Ok(self.delete_solves_by_account(account_id))
    }

    pub fn record_solve(
        &mut self,
        challenge_id: ChallengeId,
        account_id: AccountId,
        solved_at: NaiveDateTime,
    ) -> Result<Solve> {
        if !self.working.challenges.contains_key(&challenge_id) {
            return Err(StorageError::ConstraintViolation(
                "Challenge or account does not exist".to_string(),
            ));
        }
        let (user_id, team_id) = match self.working.mode {
            AccountMode::Users => {
                let user = self.working.users.get(&account_id).ok_or_else(|| {
                    StorageError::ConstraintViolation(
                        "Challenge or account does not exist".to_string(),
                    )
                })?;
                (Some(user.user_id), user.team_id)
            }
            AccountMode::Teams => {
                if !self.working.teams.contains_key(&account_id) {
                    return Err(StorageError::ConstraintViolation(
                        "Challenge or account does not exist".to_string(),
                    ));
                }
                (None, Some(account_id))
            }
        };

        self.working.last_solve_id += 1;
        let solve = Solve {
            solve_id: self.working.last_solve_id,
            challenge_id,
            account_id,
            user_id,
            team_id,
            solved_at,
        };
        self.working.solves.insert(solve.solve_id, solve.clone());
        Ok(solve)
    }

    /// Deletes one solve row. Awards are not touched.
    pub fn delete_solve(&mut self, solve_id: SolveId) -> Result<Solve> {
        self.working
            .solves
            .remove(&solve_id)
            .ok_or(StorageError::NotFound)
    }

    /// Bulk delete; reports only how many rows went away.
    pub fn delete_solves_by_account(&mut self, account_id: AccountId) -> u64 {
        let before = self.working.solves.len();
        self.working
            .solves
            .retain(|_, solve| solve.account_id != account_id);
        (before - self.working.solves.len()) as u64
    }

    pub fn rollback(self) {}
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn find_challenge(&mut self, challenge_id: ChallengeId) -> Result<Option<Challenge>> {
        Ok(self.working.challenges.get(&challenge_id).cloned())
    }

    async fn list_first_blood_challenge_ids(&mut self) -> Result<Vec<ChallengeId>> {
        Ok(self
            .working
            .challenges
            .values()
            .filter(|challenge| challenge.is_first_blood())
            .map(|challenge| challenge.challenge_id)
            .collect())
    }

    async fn list_solves_by_challenge(&mut self, challenge_id: ChallengeId) -> Result<Vec<Solve>> {
        Ok(self
            .working
            .solves
            .values()
            .filter(|solve| solve.challenge_id == challenge_id)
            .cloned()
            .collect())
    }

    async fn find_solve(&mut self, solve_id: SolveId) -> Result<Option<Solve>> {
        Ok(self.working.solves.get(&solve_id).cloned())
    }

    async fn find_solver(&mut self, account_id: AccountId) -> Result<Option<Solver>> {
        Ok(self.working.solver(account_id))
    }

    async fn count_eligible_solves_through(
        &mut self,
        challenge_id: ChallengeId,
        through: SolveId,
    ) -> Result<i64> {
        let count = self
            .working
            .solves
            .range(..=through)
            .map(|(_, solve)| solve)
            .filter(|solve| solve.challenge_id == challenge_id)
            .filter(|solve| {
                self.working
                    .solver(solve.account_id)
                    .is_some_and(|solver| solver.is_publicly_visible())
            })
            .count();
        Ok(count as i64)
    }

    async fn has_solves_after(
        &mut self,
        challenge_id: ChallengeId,
        after: SolveId,
    ) -> Result<bool> {
        Ok(self
            .working
            .solves
            .range(after + 1..)
            .any(|(_, solve)| solve.challenge_id == challenge_id))
    }

    async fn list_challenges_solved_by(
        &mut self,
        account_id: AccountId,
    ) -> Result<Vec<ChallengeId>> {
        let ids: BTreeSet<ChallengeId> = self
            .working
            .solves
            .values()
            .filter(|solve| solve.account_id == account_id)
            .filter(|solve| {
                self.working
                    .challenges
                    .get(&solve.challenge_id)
                    .is_some_and(Challenge::is_first_blood)
            })
            .map(|solve| solve.challenge_id)
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn list_awards_by_challenge(&mut self, challenge_id: ChallengeId) -> Result<Vec<Award>> {
        Ok(self
            .working
            .awards
            .values()
            .filter(|award| award.challenge_id == challenge_id)
            .cloned()
            .collect())
    }

    async fn list_awards_by_solve(&mut self, solve_id: SolveId) -> Result<Vec<Award>> {
        Ok(self
            .working
            .awards
            .values()
            .filter(|award| award.solve_id == solve_id)
            .cloned()
            .collect())
    }

    async fn list_awards_by_account(&mut self, account_id: AccountId) -> Result<Vec<Award>> {
        Ok(self
            .working
            .awards
            .values()
            .filter(|award| award.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn insert_award(&mut self, award: &NewAward) -> Result<Award> {
        if !self.working.challenges.contains_key(&award.challenge_id) {
            return Err(StorageError::ConstraintViolation(format!(
                "Challenge {} does not exist",
                award.challenge_id
            )));
        }
        if self
            .working
            .awards
            .values()
            .any(|existing| existing.solve_id == award.solve_id)
        {
            return Err(StorageError::ConstraintViolation(format!(
                "Solve {} already has an award",
                award.solve_id
            )));
        }

        self.working.last_award_id += 1;
        let inserted = Award::from_new(self.working.last_award_id, award);
        self.working.awards.insert(inserted.award_id, inserted.clone());
        Ok(inserted)
    }

    async fn update_award(&mut self, award_id: AwardId, award: &NewAward) -> Result<()> {
        let existing = self
            .working
            .awards
            .get_mut(&award_id)
            .ok_or(StorageError::NotFound)?;
        existing.apply(award);
        Ok(())
    }

    async fn delete_award(&mut self, award_id: AwardId) -> Result<()> {
        self.working
            .awards
            .remove(&award_id)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    async fn commit(self) -> Result<()> {
        let MemoryLedger {
            shared,
            base_version,
            mut working,
        } = self;

        let mut current = shared.lock().unwrap_or_else(PoisonError::into_inner);
        if current.version != base_version {
            return Err(StorageError::Conflict(format!(
                "ledger moved from version {} to {} during this unit of work",
                base_version, current.version
            )));
        }
        working.version = base_version + 1;
        *current = working;
        Ok(())
    }
}
