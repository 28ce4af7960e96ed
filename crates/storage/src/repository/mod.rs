pub mod account;
pub mod award;
pub mod challenge;
pub mod solve;

pub use account::AccountRepository;
pub use award::AwardRepository;
pub use challenge::ChallengeRepository;
pub use solve::SolveRepository;

use crate::models::AccountMode;

/// Table and key column that back a solve's `account_id`.
pub(crate) fn account_table(mode: AccountMode) -> (&'static str, &'static str) {
    match mode {
        AccountMode::Users => ("users", "user_id"),
        AccountMode::Teams => ("teams", "team_id"),
    }
}
