//! Structural invariants of a match record.
//!
//! Checked after every transition; a violation means the engine produced
//! (or loaded) corrupted state and the move is rejected as internal.

use crate::{Match, MatchStatus, WIN_THRESHOLD};

/// A logical property that must hold for a given state.
pub trait Invariant<S> {
    /// Checks if the invariant holds for the given state.
    fn holds(state: &S) -> bool;

    /// Human-readable description of the invariant.
    fn description() -> &'static str;
}

/// Violation of an invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    /// Description of the violated invariant.
    pub description: String,
}

impl InvariantViolation {
    /// Creates a new invariant violation.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// A set of invariants that can be checked together.
pub trait InvariantSet<S> {
    /// Checks all invariants in the set, collecting every violation.
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>>;
}

impl<S, I1, I2, I3, I4, I5> InvariantSet<S> for (I1, I2, I3, I4, I5)
where
    I1: Invariant<S>,
    I2: Invariant<S>,
    I3: Invariant<S>,
    I4: Invariant<S>,
    I5: Invariant<S>,
{
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>> {
        let checks: [(bool, &'static str); 5] = [
            (I1::holds(state), I1::description()),
            (I2::holds(state), I2::description()),
            (I3::holds(state), I3::description()),
            (I4::holds(state), I4::description()),
            (I5::holds(state), I5::description()),
        ];
        let violations: Vec<_> = checks
            .into_iter()
            .filter(|(holds, _)| !holds)
            .map(|(_, description)| InvariantViolation::new(description))
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

/// Player A and player B are different players.
pub struct DistinctPlayers;

impl Invariant<Match> for DistinctPlayers {
    fn holds(state: &Match) -> bool {
        state.player_a() != state.player_b()
    }

    fn description() -> &'static str {
        "Match sides are distinct players"
    }
}

/// Rounds are numbered 1..=n without gaps and only the last may be open.
pub struct ContiguousRounds;

impl Invariant<Match> for ContiguousRounds {
    fn holds(state: &Match) -> bool {
        let rounds = state.rounds();
        let numbered = rounds
            .iter()
            .enumerate()
            .all(|(i, r)| *r.round_number() as usize == i + 1);
        let closed_prefix = rounds
            .iter()
            .rev()
            .skip(1)
            .all(|r| r.is_complete());
        numbered && closed_prefix
    }

    fn description() -> &'static str {
        "Rounds are numbered from 1 without gaps and only the last is open"
    }
}

/// Each round holds at most one move per match player.
pub struct OneMovePerPlayer;

impl Invariant<Match> for OneMovePerPlayer {
    fn holds(state: &Match) -> bool {
        state.rounds().iter().all(|round| {
            let moves = round.moves();
            moves.len() <= 2
                && moves.iter().all(|m| state.involves(*m.player_id()))
                && !(moves.len() == 2 && moves[0].player_id() == moves[1].player_id())
        })
    }

    fn description() -> &'static str {
        "Each round holds at most one move per match player"
    }
}

/// The score equals the number of rounds each side has won.
pub struct ScoreMatchesRounds;

impl Invariant<Match> for ScoreMatchesRounds {
    fn holds(state: &Match) -> bool {
        let won_by = |player| {
            state
                .rounds()
                .iter()
                .filter(|r| *r.winner() == Some(player))
                .count() as u32
        };
        let score = state.score();
        let bounded = score.total() as usize + state.draw_count() <= state.rounds().len();
        bounded
            && score.player_a == won_by(*state.player_a())
            && score.player_b == won_by(*state.player_b())
    }

    fn description() -> &'static str {
        "Score counts round wins and never exceeds the number of rounds"
    }
}

/// A finished match has a winner at the threshold; an ongoing one has neither.
pub struct TerminalConsistency;

impl Invariant<Match> for TerminalConsistency {
    fn holds(state: &Match) -> bool {
        let score = state.score();
        let leader_reached = score.player_a >= WIN_THRESHOLD || score.player_b >= WIN_THRESHOLD;
        match state.status() {
            MatchStatus::Finished => match state.winner() {
                Some(w) if w == state.player_a() => score.player_a >= WIN_THRESHOLD,
                Some(w) if w == state.player_b() => score.player_b >= WIN_THRESHOLD,
                _ => false,
            },
            MatchStatus::Ongoing | MatchStatus::Waiting => {
                state.winner().is_none() && !leader_reached
            }
        }
    }

    fn description() -> &'static str {
        "Finished matches have a winner at the threshold; active ones have none"
    }
}

/// Every invariant a match record must satisfy.
pub type MatchInvariants = (
    DistinctPlayers,
    ContiguousRounds,
    OneMovePerPlayer,
    ScoreMatchesRounds,
    TerminalConsistency,
);
