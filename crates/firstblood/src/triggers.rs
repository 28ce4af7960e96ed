//! Routing of upstream mutations to award reconciliations.
//!
//! A [`UnitOfWork`] wraps one open ledger transaction. Mutation hooks record
//! which challenges they affect; [`UnitOfWork::commit`] reconciles each of
//! them once, after every other write of the unit, and then commits.

use std::collections::BTreeSet;

use storage::LedgerStore;
use storage::models::{AccountFlags, AccountId, Award, ChallengeId, Solve, SolveId};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{FirstBloodError, Result};
use crate::reconciler::{ReconcileReport, on_solve_recorded, reconcile};

/// Challenges whose awards must be rebuilt before the unit of work commits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingReconciliations {
    challenges: BTreeSet<ChallengeId>,
    full_sweep: bool,
}

impl PendingReconciliations {
    pub fn mark(&mut self, challenge_id: ChallengeId) {
        self.challenges.insert(challenge_id);
    }

    /// Rebuild every first blood challenge, used when the affected rows are
    /// unknown.
    pub fn mark_all(&mut self) {
        self.full_sweep = true;
    }

    pub fn is_full_sweep(&self) -> bool {
        self.full_sweep
    }

    pub fn is_empty(&self) -> bool {
        !self.full_sweep && self.challenges.is_empty()
    }

    pub fn challenges(&self) -> impl Iterator<Item = ChallengeId> + '_ {
        self.challenges.iter().copied()
    }
}

pub struct UnitOfWork<S: LedgerStore> {
    id: Uuid,
    store: S,
    pending: PendingReconciliations,
}

impl<S: LedgerStore> UnitOfWork<S> {
    pub fn new(store: S) -> Self {
        Self {
            id: Uuid::new_v4(),
            store,
            pending: PendingReconciliations::default(),
        }
    }

    /// The open ledger, for the CRUD writes that make up this unit.
    pub fn store(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn pending(&self) -> &PendingReconciliations {
        &self.pending
    }

    pub async fn solve(&mut self, solve_id: SolveId) -> Result<Solve> {
        self.store
            .find_solve(solve_id)
            .await?
            .ok_or(FirstBloodError::SolveNotFound(solve_id))
    }

    /// A solve was just inserted. Grants its award right away.
    pub async fn solve_recorded(&mut self, solve: &Solve) -> Result<Option<Award>> {
        debug!(uow = %self.id, solve_id = solve.solve_id, "Solve recorded");
        on_solve_recorded(&mut self.store, solve).await
    }

    /// A single solve is being revoked. Call before or after the row goes
    /// away; its awards are dropped now and the challenge is re-ranked later.
    pub async fn solve_deleted(&mut self, solve: &Solve) -> Result<()> {
        for award in self.store.list_awards_by_solve(solve.solve_id).await? {
            self.store.delete_award(award.award_id).await?;
        }
        debug!(
            uow = %self.id,
            solve_id = solve.solve_id,
            challenge_id = solve.challenge_id,
            "Solve deleted"
        );
        self.pending.mark(solve.challenge_id);
        Ok(())
    }

    /// Solves were removed in bulk without telling which ones.
    //
    // TODO: have the bulk delete report the affected challenge ids so only
    // those get rebuilt.
    pub fn solves_bulk_deleted(&mut self) {
        debug!(uow = %self.id, "Solves bulk deleted, scheduling full sweep");
        self.pending.mark_all();
    }

    /// The hidden/banned flags of an account were written. Only an actual
    /// transition schedules work.
    pub async fn account_flags_changed(
        &mut self,
        account_id: AccountId,
        before: AccountFlags,
        after: AccountFlags,
    ) -> Result<()> {
        if before == after {
            return Ok(());
        }

        let affected = self.store.list_challenges_solved_by(account_id).await?;
        debug!(
            uow = %self.id,
            account_id,
            challenges = affected.len(),
            "Account visibility changed"
        );
        for challenge_id in affected {
            self.pending.mark(challenge_id);
        }
        Ok(())
    }

    /// An account is about to be deleted. Must run while its rows still
    /// exist: drops its awards and schedules every challenge it touched.
    pub async fn account_deleting(&mut self, account_id: AccountId) -> Result<()> {
        let awards = self.store.list_awards_by_account(account_id).await?;
        for award in &awards {
            self.pending.mark(award.challenge_id);
            self.store.delete_award(award.award_id).await?;
        }

        // Solves without an award can still shift later ranks over a gap.
        for challenge_id in self.store.list_challenges_solved_by(account_id).await? {
            self.pending.mark(challenge_id);
        }

        debug!(
            uow = %self.id,
            account_id,
            awards = awards.len(),
            "Account deleted"
        );
        Ok(())
    }

    /// The bonus schedule or visibility of a challenge was edited.
    pub fn challenge_edited(&mut self, challenge_id: ChallengeId) {
        debug!(uow = %self.id, challenge_id, "Challenge edited");
        self.pending.mark(challenge_id);
    }

    /// Reconcile every pending challenge once.
    pub async fn flush(&mut self) -> Result<ReconcileReport> {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return Ok(ReconcileReport::default());
        }

        let mut targets: BTreeSet<ChallengeId> = pending.challenges;
        if pending.full_sweep {
            targets.extend(self.store.list_first_blood_challenge_ids().await?);
        }

        let mut report = ReconcileReport::default();
        for challenge_id in &targets {
            report += reconcile(&mut self.store, *challenge_id).await?;
        }

        info!(
            uow = %self.id,
            challenges = targets.len(),
            full_sweep = pending.full_sweep,
            inserted = report.inserted,
            updated = report.updated,
            deleted = report.deleted,
            "Flushed pending award reconciliations"
        );

        Ok(report)
    }

    /// Flush, then commit the ledger transaction.
    pub async fn commit(mut self) -> Result<ReconcileReport> {
        let report = self.flush().await?;
        self.store.commit().await?;
        Ok(report)
    }
}
