//! Rebuild-and-diff maintenance of the first blood award ledger.
//!
//! [`reconcile`] recomputes the complete desired award set for one challenge
//! from its current solves and writes only the difference. Every trigger path
//! relies on it instead of patching individual ranks.

use std::collections::HashMap;
use std::ops::AddAssign;

use storage::LedgerStore;
use storage::models::{AccountId, Award, ChallengeId, NewAward, Solve, SolveId, Solver};
use tracing::{debug, info, warn};

use crate::eligibility::{challenge_accepts_bonuses, is_eligible};
use crate::error::Result;
use crate::generator::{award_for, rank_and_award};

/// Writes performed by one or more reconciliations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

impl ReconcileReport {
    pub fn changes(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }

    pub fn is_noop(&self) -> bool {
        self.changes() == 0
    }
}

impl AddAssign for ReconcileReport {
    fn add_assign(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.unchanged += other.unchanged;
    }
}

/// The award every solve of the challenge should carry, in solve order.
///
/// Solves that are ineligible or fall on a rank without a bonus map to
/// `None`. A challenge that no longer exists has no solves and no awards.
pub async fn desired_awards<S: LedgerStore>(
    store: &mut S,
    challenge_id: ChallengeId,
) -> Result<Vec<(SolveId, Option<NewAward>)>> {
    let solves = store.list_solves_by_challenge(challenge_id).await?;

    let challenge = match store.find_challenge(challenge_id).await? {
        Some(challenge) if challenge_accepts_bonuses(&challenge) => challenge,
        _ => {
            return Ok(solves.iter().map(|solve| (solve.solve_id, None)).collect());
        }
    };

    let mut solvers: HashMap<AccountId, Option<Solver>> = HashMap::new();
    let mut eligible: Vec<&Solve> = Vec::with_capacity(solves.len());

    for solve in &solves {
        if !solvers.contains_key(&solve.account_id) {
            let solver = store.find_solver(solve.account_id).await?;
            solvers.insert(solve.account_id, solver);
        }

        // A solve whose account no longer exists is never eligible.
        let eligible_solver = solvers
            .get(&solve.account_id)
            .and_then(Option::as_ref)
            .is_some_and(|solver| is_eligible(&challenge, solver));

        if eligible_solver {
            eligible.push(solve);
        }
    }

    let mut awards: HashMap<SolveId, NewAward> = rank_and_award(&challenge, &eligible)
        .into_iter()
        .filter_map(|ranked| ranked.award.map(|award| (ranked.solve.solve_id, award)))
        .collect();

    Ok(solves
        .iter()
        .map(|solve| (solve.solve_id, awards.remove(&solve.solve_id)))
        .collect())
}

/// Make the stored awards of `challenge_id` exactly match [`desired_awards`].
///
/// Idempotent. Runs inside the caller's unit of work; the writes become
/// visible only when that unit commits.
pub async fn reconcile<S: LedgerStore>(
    store: &mut S,
    challenge_id: ChallengeId,
) -> Result<ReconcileReport> {
    let desired = desired_awards(store, challenge_id).await?;

    let mut report = ReconcileReport::default();
    let mut existing: HashMap<SolveId, Award> = store
        .list_awards_by_challenge(challenge_id)
        .await?
        .into_iter()
        .map(|award| (award.solve_id, award))
        .collect();

    for (solve_id, target) in desired {
        match (existing.remove(&solve_id), target) {
            (Some(award), Some(fields)) if award.matches(&fields) => {
                report.unchanged += 1;
            }
            (Some(award), Some(fields)) => {
                debug!(
                    challenge_id,
                    award_id = award.award_id,
                    solve_id,
                    rank = fields.rank,
                    value = fields.value,
                    "Updating first blood award"
                );
                store.update_award(award.award_id, &fields).await?;
                report.updated += 1;
            }
            (None, Some(fields)) => {
                debug!(
                    challenge_id,
                    solve_id,
                    rank = fields.rank,
                    value = fields.value,
                    "Inserting first blood award"
                );
                store.insert_award(&fields).await?;
                report.inserted += 1;
            }
            (Some(award), None) => {
                debug!(
                    challenge_id,
                    award_id = award.award_id,
                    solve_id,
                    "Retracting first blood award"
                );
                store.delete_award(award.award_id).await?;
                report.deleted += 1;
            }
            (None, None) => {}
        }
    }

    // Whatever is left points at solves that no longer exist.
    for (solve_id, orphan) in existing {
        warn!(
            challenge_id,
            award_id = orphan.award_id,
            solve_id,
            "Removing orphaned first blood award"
        );
        store.delete_award(orphan.award_id).await?;
        report.deleted += 1;
    }

    if !report.is_noop() {
        info!(
            challenge_id,
            inserted = report.inserted,
            updated = report.updated,
            deleted = report.deleted,
            "Reconciled first blood awards"
        );
    }

    Ok(report)
}

/// Fast path for a freshly recorded solve: rank it with a single count and
/// insert its award, without rebuilding the whole challenge.
///
/// Gives the same ledger as calling [`reconcile`] afterwards. When the solve
/// is not the newest one on its challenge, later ranks may shift, so it
/// falls back to a full reconciliation.
pub async fn on_solve_recorded<S: LedgerStore>(
    store: &mut S,
    solve: &Solve,
) -> Result<Option<Award>> {
    let challenge_id = solve.challenge_id;

    if store.has_solves_after(challenge_id, solve.solve_id).await? {
        debug!(
            challenge_id,
            solve_id = solve.solve_id,
            "Solve is not the latest, reconciling the whole challenge"
        );
        reconcile(store, challenge_id).await?;
        return Ok(store
            .list_awards_by_solve(solve.solve_id)
            .await?
            .into_iter()
            .next());
    }

    let Some(challenge) = store.find_challenge(challenge_id).await? else {
        return Ok(None);
    };
    if !challenge_accepts_bonuses(&challenge) {
        return Ok(None);
    }

    let eligible = store
        .find_solver(solve.account_id)
        .await?
        .is_some_and(|solver| is_eligible(&challenge, &solver));
    if !eligible {
        debug!(
            challenge_id,
            account_id = solve.account_id,
            "Solver is hidden or banned, no first blood award"
        );
        return Ok(None);
    }

    let rank = store
        .count_eligible_solves_through(challenge_id, solve.solve_id)
        .await?;
    let Some(fields) = award_for(&challenge, solve, u32::try_from(rank).unwrap_or(u32::MAX))
    else {
        return Ok(None);
    };

    let award = match store.list_awards_by_solve(solve.solve_id).await?.pop() {
        Some(mut existing) => {
            store.update_award(existing.award_id, &fields).await?;
            existing.apply(&fields);
            existing
        }
        None => store.insert_award(&fields).await?,
    };

    info!(
        challenge_id,
        solve_id = solve.solve_id,
        account_id = solve.account_id,
        rank = award.rank,
        value = award.value,
        "Granted first blood award"
    );

    Ok(Some(award))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{arena, assert_matches_rebuild, at};
    use storage::models::{AccountFlags, AccountMode, BonusSchedule};

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let arena = arena(AccountMode::Users, vec![Some(30), Some(20), Some(10)], 4).await;
        arena.solve_in_order(&arena.accounts).await;

        let mut ledger = arena.db.begin();
        let first = reconcile(&mut ledger, arena.challenge_id).await.unwrap();
        let second = reconcile(&mut ledger, arena.challenge_id).await.unwrap();

        assert!(first.is_noop());
        assert!(second.is_noop());
        assert_eq!(second.unchanged, 3);
    }

    #[tokio::test]
    async fn test_reconcile_repairs_arbitrary_prior_state() {
        let arena = arena(AccountMode::Users, vec![Some(30), Some(20), Some(10)], 4).await;
        let solves = arena.solve_in_order(&arena.accounts).await;

        let mut ledger = arena.db.begin();
        let awards = ledger
            .list_awards_by_challenge(arena.challenge_id)
            .await
            .unwrap();

        // Tamper with one award, drop another, and plant an orphan.
        let mut tampered = crate::generator::award_for(
            &ledger.find_challenge(arena.challenge_id).await.unwrap().unwrap(),
            &solves[0],
            1,
        )
        .unwrap();
        tampered.value = 999;
        ledger
            .update_award(awards[0].award_id, &tampered)
            .await
            .unwrap();
        ledger.delete_award(awards[1].award_id).await.unwrap();
        let mut orphan = tampered.clone();
        orphan.solve_id = 4242;
        ledger.insert_award(&orphan).await.unwrap();

        let report = reconcile(&mut ledger, arena.challenge_id).await.unwrap();
        ledger.commit().await.unwrap();

        assert_eq!(
            report,
            ReconcileReport {
                inserted: 1,
                updated: 1,
                deleted: 1,
                unchanged: 1,
            }
        );
        assert_matches_rebuild(&arena).await;
    }

    #[tokio::test]
    async fn test_ranks_are_contiguous_over_eligible_solves() {
        let arena = arena(
            AccountMode::Users,
            vec![Some(50), Some(40), Some(30), Some(20), Some(10)],
            8,
        )
        .await;
        arena.solve_in_order(&arena.accounts).await;

        let mut ledger = arena.db.begin();
        for account_id in [arena.accounts[0], arena.accounts[3], arena.accounts[4]] {
            ledger
                .set_account_flags(account_id, AccountFlags::banned())
                .unwrap();
        }
        reconcile(&mut ledger, arena.challenge_id).await.unwrap();
        ledger.commit().await.unwrap();

        let table = arena.award_table();
        let ranks: Vec<i32> = table.iter().map(|(_, rank, _)| *rank).collect();
        let holders: Vec<i32> = table.iter().map(|(account, _, _)| *account).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
        assert_eq!(
            holders,
            vec![
                arena.accounts[1],
                arena.accounts[2],
                arena.accounts[5],
                arena.accounts[6],
                arena.accounts[7],
            ]
        );
        assert_matches_rebuild(&arena).await;
    }

    #[tokio::test]
    async fn test_interior_gap_rank_gets_no_award() {
        let arena = arena(AccountMode::Users, vec![Some(30), None, Some(10)], 3).await;
        arena.solve_in_order(&arena.accounts).await;

        assert_eq!(
            arena.award_table(),
            vec![(arena.accounts[0], 1, 30), (arena.accounts[2], 3, 10)]
        );
    }

    #[tokio::test]
    async fn test_missing_challenge_has_no_desired_awards() {
        let arena = arena(AccountMode::Users, vec![Some(30)], 1).await;
        let mut ledger = arena.db.begin();

        let desired = desired_awards(&mut ledger, 777).await.unwrap();
        let report = reconcile(&mut ledger, 777).await.unwrap();

        assert!(desired.is_empty());
        assert_eq!(report, ReconcileReport::default());
    }

    #[tokio::test]
    async fn test_deleted_account_promotes_next_solver() {
        let arena = arena(AccountMode::Users, vec![Some(30), Some(20)], 2).await;
        let mut ledger = arena.db.begin();
        ledger
            .record_solve(arena.challenge_id, arena.accounts[0], at(0))
            .unwrap();
        ledger
            .record_solve(arena.challenge_id, arena.accounts[1], at(1))
            .unwrap();
        ledger.commit().await.unwrap();

        let mut ledger = arena.db.begin();
        ledger.delete_account(arena.accounts[0]).unwrap();
        reconcile(&mut ledger, arena.challenge_id).await.unwrap();
        ledger.commit().await.unwrap();

        assert_eq!(arena.award_table(), vec![(arena.accounts[1], 1, 30)]);
    }

    #[tokio::test]
    async fn test_fast_path_matches_full_reconcile() {
        let arena = arena(AccountMode::Users, vec![Some(30), Some(20), Some(10)], 4).await;
        let mut ledger = arena.db.begin();
        ledger
            .set_account_flags(arena.accounts[1], AccountFlags::hidden())
            .unwrap();
        ledger.commit().await.unwrap();

        arena.solve_in_order(&arena.accounts).await;

        let mut ledger = arena.db.begin();
        let report = reconcile(&mut ledger, arena.challenge_id).await.unwrap();
        assert!(report.is_noop());
        assert_matches_rebuild(&arena).await;
    }

    #[tokio::test]
    async fn test_fast_path_falls_back_when_solve_is_not_latest() {
        let arena = arena(AccountMode::Users, vec![Some(30), Some(20)], 2).await;
        let mut ledger = arena.db.begin();
        let first = ledger
            .record_solve(arena.challenge_id, arena.accounts[0], at(0))
            .unwrap();
        ledger
            .record_solve(arena.challenge_id, arena.accounts[1], at(1))
            .unwrap();

        let award = on_solve_recorded(&mut ledger, &first).await.unwrap().unwrap();
        ledger.commit().await.unwrap();

        assert_eq!(award.rank, 1);
        assert_eq!(
            arena.award_table(),
            vec![(arena.accounts[0], 1, 30), (arena.accounts[1], 2, 20)]
        );
    }

    #[tokio::test]
    async fn test_fast_path_skips_hidden_challenge() {
        let arena = arena(AccountMode::Users, vec![Some(30)], 1).await;
        let mut ledger = arena.db.begin();
        ledger
            .update_state(arena.challenge_id, storage::models::ChallengeState::Hidden)
            .unwrap();
        let solve = ledger
            .record_solve(arena.challenge_id, arena.accounts[0], at(0))
            .unwrap();

        let award = on_solve_recorded(&mut ledger, &solve).await.unwrap();
        assert!(award.is_none());
    }

    #[tokio::test]
    async fn test_schedule_shrink_retracts_tail() {
        let arena = arena(AccountMode::Users, vec![Some(30), Some(20), Some(10)], 3).await;
        arena.solve_in_order(&arena.accounts).await;

        let mut ledger = arena.db.begin();
        ledger
            .update_bonus_schedule(arena.challenge_id, BonusSchedule::new(vec![Some(5)]))
            .unwrap();
        let report = reconcile(&mut ledger, arena.challenge_id).await.unwrap();
        ledger.commit().await.unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(report.deleted, 2);
        assert_eq!(arena.award_table(), vec![(arena.accounts[0], 1, 5)]);
    }
}
