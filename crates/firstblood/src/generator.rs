use storage::models::{Challenge, NewAward, Solve};

use crate::ordinal::ordinalize;

pub const AWARD_CATEGORY: &str = "First Blood";

/// Ranks 1..=3 get their own medal icon.
const MEDAL_RANKS: u32 = 3;

/// An eligible solve with its 1-based rank and the award it should carry, if
/// the bonus schedule has an entry for that rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedSolve<'a> {
    pub solve: &'a Solve,
    pub rank: u32,
    pub award: Option<NewAward>,
}

/// Assign ranks to `eligible` (already filtered and ordered by solve id) and
/// derive the award fields for each rank.
pub fn rank_and_award<'a>(challenge: &Challenge, eligible: &[&'a Solve]) -> Vec<RankedSolve<'a>> {
    eligible
        .iter()
        .zip(1u32..)
        .map(|(&solve, rank)| RankedSolve {
            solve,
            rank,
            award: award_for(challenge, solve, rank),
        })
        .collect()
}

/// Award fields for `solve` finishing at `rank`, or `None` when the schedule
/// has a gap there or ends before it.
pub fn award_for(challenge: &Challenge, solve: &Solve, rank: u32) -> Option<NewAward> {
    let value = challenge.bonus_schedule.bonus_for_rank(rank)?;
    let ordinal = ordinalize(rank);

    let icon = if rank <= MEDAL_RANKS {
        format!("medal-{}", ordinal)
    } else {
        "medal".to_string()
    };

    Some(NewAward {
        challenge_id: challenge.challenge_id,
        solve_id: solve.solve_id,
        account_id: solve.account_id,
        user_id: solve.user_id,
        team_id: solve.team_id,
        name: format!("{} blood for {}", ordinal, challenge.name),
        description: format!(
            "Bonus points for being the {} to solve the challenge",
            ordinal
        ),
        category: AWARD_CATEGORY.to_string(),
        icon,
        value,
        rank: i32::try_from(rank).unwrap_or(i32::MAX),
        awarded_at: solve.solved_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use storage::models::{BonusSchedule, ChallengeState, FIRST_BLOOD_TYPE};

    fn challenge(schedule: Vec<Option<i32>>) -> Challenge {
        Challenge {
            challenge_id: 9,
            name: "warmup".to_string(),
            category: "misc".to_string(),
            challenge_type: FIRST_BLOOD_TYPE.to_string(),
            state: ChallengeState::Visible,
            value: 100,
            bonus_schedule: BonusSchedule::new(schedule),
        }
    }

    fn solves(count: i64) -> Vec<Solve> {
        let base = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        (1..=count)
            .map(|id| Solve {
                solve_id: id,
                challenge_id: 9,
                account_id: id as i32 + 100,
                user_id: Some(id as i32 + 100),
                team_id: None,
                solved_at: base,
            })
            .collect()
    }

    #[test]
    fn test_schedule_shorter_than_solves() {
        let challenge = challenge(vec![Some(30), Some(20), Some(10)]);
        let solves = solves(4);
        let eligible: Vec<&Solve> = solves.iter().collect();

        let ranked = rank_and_award(&challenge, &eligible);

        let values: Vec<Option<i32>> = ranked
            .iter()
            .map(|r| r.award.as_ref().map(|a| a.value))
            .collect();
        assert_eq!(values, vec![Some(30), Some(20), Some(10), None]);
        assert_eq!(ranked[3].rank, 4);
    }

    #[test]
    fn test_interior_gap_skips_rank_only() {
        let challenge = challenge(vec![Some(30), None, Some(10)]);
        let solves = solves(3);
        let eligible: Vec<&Solve> = solves.iter().collect();

        let ranked = rank_and_award(&challenge, &eligible);

        assert!(ranked[1].award.is_none());
        let third = ranked[2].award.as_ref().unwrap();
        assert_eq!(third.rank, 3);
        assert_eq!(third.value, 10);
    }

    #[test]
    fn test_award_text_and_icon() {
        let challenge = challenge(vec![Some(30), Some(20), Some(10), Some(5)]);
        let solves = solves(4);

        let first = award_for(&challenge, &solves[0], 1).unwrap();
        assert_eq!(first.name, "1st blood for warmup");
        assert_eq!(
            first.description,
            "Bonus points for being the 1st to solve the challenge"
        );
        assert_eq!(first.category, AWARD_CATEGORY);
        assert_eq!(first.icon, "medal-1st");
        assert_eq!(first.awarded_at, solves[0].solved_at);
        assert_eq!(first.user_id, Some(101));

        let fourth = award_for(&challenge, &solves[3], 4).unwrap();
        assert_eq!(fourth.name, "4th blood for warmup");
        assert_eq!(fourth.icon, "medal");
    }

    #[test]
    fn test_ranks_follow_input_order_not_ids() {
        let challenge = challenge(vec![Some(30), Some(20)]);
        let solves = solves(5);
        let eligible = vec![&solves[1], &solves[4]];

        let ranked = rank_and_award(&challenge, &eligible);

        assert_eq!(ranked[0].solve.solve_id, 2);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].solve.solve_id, 5);
        assert_eq!(ranked[1].award.as_ref().unwrap().value, 20);
    }
}
