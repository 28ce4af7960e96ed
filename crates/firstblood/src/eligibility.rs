use storage::models::{Account, Challenge};

/// Hidden challenges accrue no bonuses; their awards are retracted.
pub fn challenge_accepts_bonuses(challenge: &Challenge) -> bool {
    challenge.is_first_blood() && challenge.is_visible()
}

/// Whether a solve by `solver` on `challenge` may earn a bonus at all.
pub fn is_eligible<A: Account + ?Sized>(challenge: &Challenge, solver: &A) -> bool {
    challenge_accepts_bonuses(challenge) && solver.is_publicly_visible()
}
