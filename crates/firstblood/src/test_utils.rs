//! Fixtures for driving the reconciler against the in-memory ledger.

use chrono::{NaiveDate, NaiveDateTime};
use storage::models::{AccountId, AccountMode, BonusSchedule, ChallengeId, NewAward, NewChallenge, Solve};
use storage::{LedgerStore, MemoryDatabase};

use crate::reconciler::desired_awards;
use crate::triggers::UnitOfWork;

pub(crate) fn at(minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(12, minute, 0)
        .unwrap()
}

pub(crate) struct Arena {
    pub db: MemoryDatabase,
    pub challenge_id: ChallengeId,
    pub accounts: Vec<AccountId>,
}

/// One visible first blood challenge named "warmup" plus `accounts` users
/// (or teams) named user1, user2, ...
pub(crate) async fn arena(mode: AccountMode, schedule: Vec<Option<i32>>, accounts: usize) -> Arena {
    let db = MemoryDatabase::new(mode);
    let mut ledger = db.begin();
    let challenge = ledger.create_challenge(&NewChallenge::first_blood(
        "warmup",
        BonusSchedule::new(schedule),
    ));
    let accounts = (1..=accounts)
        .map(|n| match mode {
            AccountMode::Users => ledger.create_user(&format!("user{}", n), None).user_id,
            AccountMode::Teams => ledger.create_team(&format!("team{}", n)).team_id,
        })
        .collect();
    ledger.commit().await.unwrap();

    Arena {
        db,
        challenge_id: challenge.challenge_id,
        accounts,
    }
}

impl Arena {
    /// Each account submits in its own unit of work, in the given order.
    pub async fn solve_in_order(&self, accounts: &[AccountId]) -> Vec<Solve> {
        let mut solves = Vec::new();
        for (minute, account_id) in accounts.iter().enumerate() {
            let mut uow = UnitOfWork::new(self.db.begin());
            let solve = uow
                .store()
                .record_solve(self.challenge_id, *account_id, at(minute as u32))
                .unwrap();
            uow.solve_recorded(&solve).await.unwrap();
            uow.commit().await.unwrap();
            solves.push(solve);
        }
        solves
    }

    /// Committed awards as (account, rank, value), ordered by rank.
    pub fn award_table(&self) -> Vec<(AccountId, i32, i32)> {
        self.db
            .awards(self.challenge_id)
            .into_iter()
            .map(|award| (award.account_id, award.rank, award.value))
            .collect()
    }

    /// Awards as a from-scratch rebuild would produce them.
    pub async fn rebuilt_from_scratch(&self) -> Vec<NewAward> {
        let mut ledger = self.db.begin();
        desired_awards(&mut ledger, self.challenge_id)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|(_, award)| award)
            .collect()
    }

    /// Committed awards stripped of their ids, for comparison with a rebuild.
    pub fn stored_fields(&self) -> Vec<NewAward> {
        let mut awards = self.db.awards(self.challenge_id);
        awards.sort_by_key(|award| award.solve_id);
        awards
            .into_iter()
            .map(|award| NewAward {
                challenge_id: award.challenge_id,
                solve_id: award.solve_id,
                account_id: award.account_id,
                user_id: award.user_id,
                team_id: award.team_id,
                name: award.name,
                description: award.description,
                category: award.category,
                icon: award.icon,
                value: award.value,
                rank: award.rank,
                awarded_at: award.awarded_at,
            })
            .collect()
    }
}

/// Fails if the ledger lies about the store in any way a caller could see.
pub(crate) async fn assert_matches_rebuild(arena: &Arena) {
    assert_eq!(arena.stored_fields(), arena.rebuilt_from_scratch().await);
}

pub(crate) async fn find_solve_by_account(arena: &Arena, account_id: AccountId) -> Solve {
    let mut ledger = arena.db.begin();
    ledger
        .list_solves_by_challenge(arena.challenge_id)
        .await
        .unwrap()
        .into_iter()
        .find(|solve| solve.account_id == account_id)
        .unwrap()
}
