//! Match lifecycle: creation, lookup and move submission.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, instrument, warn};

use crate::events::{MatchEnd, MatchUpdate, RoundResult};
use crate::transition::{Transition, apply_move};
use crate::{
    EventPublisher, Match, MatchError, MatchEvent, MatchId, MatchLocks, MatchStore, Move,
    NewMatch, NoopPublisher, PlayerId, PlayerStore, SectionKey,
};

/// Service owning every mutation of match state.
///
/// Move submissions for one match are serialized through [`MatchLocks`];
/// reads go straight to the store.
#[derive(Clone)]
pub struct MatchService {
    matches: Arc<dyn MatchStore>,
    players: Arc<dyn PlayerStore>,
    publisher: Arc<dyn EventPublisher>,
    locks: MatchLocks,
    rng: Arc<Mutex<StdRng>>,
}

impl std::fmt::Debug for MatchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchService")
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl MatchService {
    /// Creates a service with no event transport and default lock timeout.
    #[instrument(skip_all)]
    pub fn new(matches: Arc<dyn MatchStore>, players: Arc<dyn PlayerStore>) -> Self {
        info!("Creating MatchService");
        Self {
            matches,
            players,
            publisher: Arc::new(NoopPublisher),
            locks: MatchLocks::default(),
            rng: Arc::new(Mutex::new(StdRng::from_entropy())),
        }
    }

    /// Routes events to `publisher`.
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Uses `locks` for per-match serialization.
    pub fn with_locks(mut self, locks: MatchLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Seeds starting-player selection, making it reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Arc::new(Mutex::new(StdRng::seed_from_u64(seed)));
        self
    }

    /// Creates a match between two registered players.
    ///
    /// The starting player is chosen uniformly at random.
    ///
    /// # Errors
    ///
    /// - [`MatchError::InvalidArgument`] if both ids are the same player.
    /// - [`MatchError::NotFound`] if either player does not exist.
    /// - [`MatchError::Conflict`] if the pair already has an active match.
    #[instrument(skip(self))]
    pub async fn create_match(
        &self,
        player_a: PlayerId,
        player_b: PlayerId,
    ) -> Result<Match, MatchError> {
        if player_a == player_b {
            warn!("Rejected self-match");
            return Err(MatchError::invalid_argument("Players must be different"));
        }

        let a = self.players.find_by_id(player_a).await?;
        let b = self.players.find_by_id(player_b).await?;
        if a.is_none() || b.is_none() {
            warn!(found_a = a.is_some(), found_b = b.is_some(), "Unknown player");
            return Err(MatchError::not_found("Both players must exist"));
        }

        let _section = self.locks.acquire(SectionKey::pair(player_a, player_b)).await?;

        if let Some(existing) = self.matches.find_active_between(player_a, player_b).await? {
            warn!(existing_id = existing.id(), "Pair already has an active match");
            return Err(MatchError::conflict(
                "An active match already exists between these players",
            ));
        }

        let starter = self.pick_starter(player_a, player_b)?;
        let created = self
            .matches
            .create(NewMatch::new(player_a, player_b, starter))
            .await?;

        info!(match_id = created.id(), starter, "Match created");
        Ok(created)
    }

    fn pick_starter(&self, a: PlayerId, b: PlayerId) -> Result<PlayerId, MatchError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| MatchError::internal("Starter RNG poisoned"))?;
        Ok(if rng.gen_bool(0.5) { a } else { b })
    }

    /// Returns the stored match.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::NotFound`] if no match has this id.
    #[instrument(skip(self))]
    pub async fn get_match(&self, id: MatchId) -> Result<Match, MatchError> {
        self.matches
            .find_by_id(id)
            .await?
            .ok_or_else(|| MatchError::not_found("Match not found"))
    }

    /// Lists every match.
    #[instrument(skip(self))]
    pub async fn list_matches(&self) -> Result<Vec<Match>, MatchError> {
        let all = self.matches.find_all().await?;
        debug!(count = all.len(), "Listed matches");
        Ok(all)
    }

    /// Lists the matches a player took part in.
    #[instrument(skip(self))]
    pub async fn list_matches_by_player(&self, player: PlayerId) -> Result<Vec<Match>, MatchError> {
        let found = self.matches.find_by_player(player).await?;
        debug!(count = found.len(), "Listed player matches");
        Ok(found)
    }

    /// Records `played` for `player` in match `id`.
    ///
    /// Runs inside the match's critical section: the record is loaded,
    /// the transition computed and persisted, finished matches update
    /// player counters, and the derived events are published from the
    /// persisted snapshot in the order round result, match end, match
    /// update.
    ///
    /// # Errors
    ///
    /// - [`MatchError::NotFound`] if the match does not exist.
    /// - [`MatchError::Conflict`] if the match is finished, it is not the
    ///   player's turn, or the player already moved this round.
    /// - [`MatchError::InvalidArgument`] if the player is not in the match.
    /// - [`MatchError::Busy`] if another submission holds the match too long.
    /// - [`MatchError::Internal`] on corrupted state or persistence failure.
    ///   If the move finished the match and only the win/loss counters failed
    ///   to update, the move is already persisted and its events published:
    ///   the error does not mean the move was rejected, and a retry is
    ///   answered with [`MatchError::Conflict`]. Reload the match to see the
    ///   outcome.
    #[instrument(skip(self), fields(match_id = id, player_id = player))]
    pub async fn submit_move(
        &self,
        id: MatchId,
        player: PlayerId,
        played: Move,
    ) -> Result<Match, MatchError> {
        let _section = self.locks.acquire(SectionKey::Match(id)).await?;

        let current = self.get_match(id).await?;
        let transition = apply_move(&current, player, played, Utc::now()).inspect_err(|e| {
            warn!(error = %e, "Move rejected");
        })?;

        let persisted = self
            .matches
            .update(id, transition.next())
            .await?
            .ok_or_else(|| MatchError::internal("Match vanished during update"))?;

        info!(
            round = persisted.rounds().len(),
            status = %persisted.status(),
            current_turn = ?persisted.current_turn(),
            "Move applied"
        );

        let counters = self.settle(&transition).await;

        for event in derive_events(&persisted, &transition) {
            let name = event.name();
            if let Err(e) = self.publisher.publish(id, event) {
                warn!(error = %e, event = name, "Event publish failed");
            }
        }

        counters?;
        Ok(persisted)
    }

    /// Applies win/loss counters for a finishing transition.
    async fn settle(&self, transition: &Transition) -> Result<(), MatchError> {
        let Some(finish) = transition.finish() else {
            return Ok(());
        };

        info!(winner = finish.winner(), loser = finish.loser(), "Match finished");

        let wins = self.players.increment_wins(*finish.winner()).await;
        let losses = self.players.increment_losses(*finish.loser()).await;
        for (which, result) in [("wins", &wins), ("losses", &losses)] {
            if let Err(e) = result {
                error!(counter = which, error = %e, "Counter update failed after match persisted");
            }
        }
        wins.and(losses)
            .map_err(|e| MatchError::internal(format!("Match finished but stats not updated: {}", e.message())))
    }
}

/// Events announced for a persisted transition, in delivery order.
fn derive_events(persisted: &Match, transition: &Transition) -> Vec<MatchEvent> {
    let mut events = Vec::with_capacity(3);

    if let Some(round) = transition
        .resolved_round()
        .and_then(|index| persisted.rounds().get(index))
    {
        events.push(MatchEvent::RoundResult(RoundResult::from(round)));
    }

    if transition.finish().is_some()
        && let Some(winner) = *persisted.winner()
    {
        events.push(MatchEvent::MatchEnd(MatchEnd {
            winner,
            score: *persisted.score(),
        }));
    }

    events.push(MatchEvent::MatchUpdate(MatchUpdate {
        snapshot: persisted.clone(),
    }));
    events
}
