//! Pure move transition for a match.
//!
//! Computes the complete next state of a match from its current state and
//! one submitted move. Nothing here performs I/O; persisting the result,
//! updating player counters and announcing events is the caller's job.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use tracing::{debug, instrument, warn};

use crate::invariants::{InvariantSet, MatchInvariants};
use crate::{
    Match, MatchError, MatchStatus, Move, Outcome, PlayedMove, PlayerId, Round, WIN_THRESHOLD,
    resolve,
};

/// Players whose counters change when a match finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters)]
pub struct Finish {
    winner: PlayerId,
    loser: PlayerId,
}

/// Next state of a match together with what happened to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Transition {
    /// The full next match state.
    next: Match,
    /// Index into `next.rounds()` of the round resolved by this move.
    resolved_round: Option<usize>,
    /// Set when this move ended the match.
    finish: Option<Finish>,
}

impl Transition {
    /// Consumes the transition, returning the next match state.
    pub fn into_next(self) -> Match {
        self.next
    }
}

/// Applies `played` by `player` to `current`.
///
/// # Errors
///
/// - [`MatchError::Conflict`] if the match is finished, it is not the
///   player's turn, or the player already moved this round.
/// - [`MatchError::InvalidArgument`] if the player is not in the match.
/// - [`MatchError::Internal`] if the stored rounds are corrupted.
#[instrument(skip(current), fields(match_id = current.id()))]
pub fn apply_move(
    current: &Match,
    player: PlayerId,
    played: Move,
    at: DateTime<Utc>,
) -> Result<Transition, MatchError> {
    if *current.status() == MatchStatus::Finished {
        return Err(MatchError::conflict("Match already finished"));
    }

    let opponent = current
        .opponent_of(player)
        .ok_or_else(|| MatchError::invalid_argument("Player not in match"))?;

    let mut next = current.clone();

    let turn = match *current.current_turn() {
        Some(turn) => turn,
        None => {
            warn!(
                player_a = current.player_a(),
                "Match has no current turn, defaulting to player A"
            );
            *current.player_a()
        }
    };
    next.set_current_turn(Some(turn));

    if turn != player {
        return Err(MatchError::conflict("Not your turn"));
    }

    let needs_new_round = next.rounds().last().is_none_or(Round::is_complete);
    if needs_new_round {
        let number = next.rounds().len() as u32 + 1;
        debug!(round_number = number, "Opening round");
        next.rounds_mut().push(Round::open(number));
    }

    let round_index = next.rounds().len() - 1;
    let round = &mut next.rounds_mut()[round_index];

    if round.move_of(player).is_some() {
        return Err(MatchError::conflict("Player already moved this round"));
    }

    round.push(PlayedMove::new(player, played, at));

    if !round.is_complete() {
        debug!(next_turn = opponent, "First move of round recorded");
        next.set_current_turn(Some(opponent));
        return checked(Transition {
            next,
            resolved_round: None,
            finish: None,
        });
    }

    let round_winner = resolve_round(&next, round_index)?;
    next.rounds_mut()[round_index].set_winner(round_winner);
    match round_winner {
        Some(w) if w == *next.player_a() => next.score_mut().player_a += 1,
        Some(_) => next.score_mut().player_b += 1,
        None => {}
    }

    let score = *next.score();
    debug!(
        round = round_index + 1,
        winner = ?round_winner,
        score_a = score.player_a,
        score_b = score.player_b,
        "Round resolved"
    );

    let finish = if score.player_a >= WIN_THRESHOLD || score.player_b >= WIN_THRESHOLD {
        let (winner, loser) = if score.player_a >= WIN_THRESHOLD {
            (*next.player_a(), *next.player_b())
        } else {
            (*next.player_b(), *next.player_a())
        };
        next.finish(winner);
        Some(Finish { winner, loser })
    } else {
        let next_turn = match round_winner {
            Some(w) => w,
            None => {
                // The round opener held the turn before the first move.
                let opener = *next.rounds()[round_index].moves()[0].player_id();
                next.opponent_of(opener)
                    .ok_or_else(|| MatchError::internal("Round opener not in match"))?
            }
        };
        next.set_current_turn(Some(next_turn));
        None
    };

    checked(Transition {
        next,
        resolved_round: Some(round_index),
        finish,
    })
}

/// Maps the round's moves to sides by identity and resolves them.
fn resolve_round(state: &Match, round_index: usize) -> Result<Option<PlayerId>, MatchError> {
    let round = &state.rounds()[round_index];
    let (Some(a), Some(b)) = (
        round.move_of(*state.player_a()),
        round.move_of(*state.player_b()),
    ) else {
        return Err(MatchError::internal("Incomplete move data in round"));
    };

    Ok(match resolve(*a.played(), *b.played()) {
        Outcome::Draw => None,
        Outcome::AWins => Some(*state.player_a()),
        Outcome::BWins => Some(*state.player_b()),
    })
}

fn checked(transition: Transition) -> Result<Transition, MatchError> {
    MatchInvariants::check_all(&transition.next).map_err(|violations| {
        let described: Vec<_> = violations.into_iter().map(|v| v.description).collect();
        MatchError::internal(format!("Invariant violation: {}", described.join("; ")))
    })?;
    Ok(transition)
}
