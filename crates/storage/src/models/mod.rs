pub mod account;
pub mod award;
pub mod bonus_schedule;
pub mod challenge;
pub mod solve;

pub use account::{Account, AccountFlags, AccountMode, Solver, Team, User};
pub use award::{Award, NewAward};
pub use bonus_schedule::{BonusSchedule, ScheduleParseError};
pub use challenge::{Challenge, ChallengeState, FIRST_BLOOD_TYPE, NewChallenge};
pub use solve::Solve;

pub type ChallengeId = i32;
pub type SolveId = i64;
pub type AccountId = i32;
pub type AwardId = i32;
