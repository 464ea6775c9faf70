//! Tests for match creation and move submission.

mod common;

use std::sync::Arc;

use chrono::Utc;
use common::{FailingPublisher, FrozenCounters, RecordingPublisher, arena};
use drones_game::{
    InMemoryMatchStore, InMemoryPlayerStore, Match, MatchError, MatchEvent, MatchService,
    MatchStatus, Move, NewMatch, PlayerId, PlayerService, Score,
};

/// Stores a fresh match with a known starter, bypassing random selection.
fn seed_match(store: &InMemoryMatchStore, a: PlayerId, b: PlayerId, starter: PlayerId) -> Match {
    let record = Match::from_new(100, &NewMatch::new(a, b, starter), Utc::now());
    store.insert(record.clone()).expect("seed match");
    record
}

async fn play_round(
    service: &MatchService,
    id: i32,
    first: (PlayerId, Move),
    second: (PlayerId, Move),
) -> Match {
    service
        .submit_move(id, first.0, first.1)
        .await
        .expect("first move");
    service
        .submit_move(id, second.0, second.1)
        .await
        .expect("second move")
}

#[tokio::test]
async fn test_create_match_with_same_player_is_invalid() {
    let a = arena().await;
    let err = a
        .service
        .create_match(*a.alice.id(), *a.alice.id())
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_create_match_with_unknown_player_is_not_found() {
    let a = arena().await;
    let err = a.service.create_match(*a.alice.id(), 999).await.unwrap_err();
    assert!(matches!(err, MatchError::NotFound(_)));
}

#[tokio::test]
async fn test_create_match_starts_ongoing_with_random_starter() {
    let a = arena().await;
    let m = a
        .service
        .create_match(*a.alice.id(), *a.bob.id())
        .await
        .expect("create");

    assert_eq!(*m.status(), MatchStatus::Ongoing);
    assert!(m.rounds().is_empty());
    assert_eq!(*m.score(), Score::default());
    assert_eq!(*m.winner(), None);
    let starter = m.current_turn().expect("starter set");
    assert!(m.involves(starter));
}

#[tokio::test]
async fn test_starter_selection_covers_both_players() {
    let mut starters = std::collections::HashSet::new();
    for seed in 0..32 {
        let players = Arc::new(InMemoryPlayerStore::new());
        let registry = PlayerService::new(players.clone());
        let alice = registry.register("Alice").await.unwrap();
        let bob = registry.register("Bob").await.unwrap();
        let service =
            MatchService::new(Arc::new(InMemoryMatchStore::new()), players).with_seed(seed);
        let m = service.create_match(*alice.id(), *bob.id()).await.unwrap();
        starters.insert(m.current_turn().unwrap());
    }
    assert_eq!(starters.len(), 2, "both players should sometimes start");
}

#[tokio::test]
async fn test_second_active_match_for_pair_conflicts() {
    let a = arena().await;
    a.service
        .create_match(*a.alice.id(), *a.bob.id())
        .await
        .expect("first create");

    let same_order = a.service.create_match(*a.alice.id(), *a.bob.id()).await;
    let reversed = a.service.create_match(*a.bob.id(), *a.alice.id()).await;
    assert!(matches!(same_order, Err(MatchError::Conflict(_))));
    assert!(matches!(reversed, Err(MatchError::Conflict(_))));
}

#[tokio::test]
async fn test_new_match_allowed_after_previous_finished() {
    let a = arena().await;
    let (alice, bob) = (*a.alice.id(), *a.bob.id());
    let m = seed_match(&a.matches, alice, bob, alice);
    for _ in 0..3 {
        play_round(&a.service, *m.id(), (alice, Move::Rock), (bob, Move::Scissors)).await;
    }

    let next = a.service.create_match(bob, alice).await;
    assert!(next.is_ok(), "finished match must not block a rematch");
}

#[tokio::test]
async fn test_get_unknown_match_is_not_found() {
    let a = arena().await;
    let err = a.service.get_match(42).await.unwrap_err();
    assert_eq!(err, MatchError::not_found("Match not found"));
}

#[tokio::test]
async fn test_move_on_unknown_match_is_not_found() {
    let a = arena().await;
    let err = a
        .service
        .submit_move(42, *a.alice.id(), Move::Rock)
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::NotFound(_)));
}

#[tokio::test]
async fn test_move_by_outsider_is_invalid() {
    let a = arena().await;
    let carol = a.registry.register("Carol").await.unwrap();
    let m = seed_match(&a.matches, *a.alice.id(), *a.bob.id(), *a.alice.id());

    let err = a
        .service
        .submit_move(*m.id(), *carol.id(), Move::Rock)
        .await
        .unwrap_err();
    assert_eq!(err, MatchError::invalid_argument("Player not in match"));
}

#[tokio::test]
async fn test_move_out_of_turn_conflicts() {
    let a = arena().await;
    let m = seed_match(&a.matches, *a.alice.id(), *a.bob.id(), *a.alice.id());

    let err = a
        .service
        .submit_move(*m.id(), *a.bob.id(), Move::Rock)
        .await
        .unwrap_err();
    assert_eq!(err, MatchError::conflict("Not your turn"));

    a.service
        .submit_move(*m.id(), *a.alice.id(), Move::Rock)
        .await
        .expect("Alice's move");
    let again = a
        .service
        .submit_move(*m.id(), *a.alice.id(), Move::Paper)
        .await
        .unwrap_err();
    assert!(matches!(again, MatchError::Conflict(_)));
}

#[tokio::test]
async fn test_single_move_only_announces_update() {
    let a = arena().await;
    let m = seed_match(&a.matches, *a.alice.id(), *a.bob.id(), *a.alice.id());

    let after = a
        .service
        .submit_move(*m.id(), *a.alice.id(), Move::Rock)
        .await
        .unwrap();

    assert_eq!(*after.current_turn(), Some(*a.bob.id()));
    assert_eq!(after.rounds().len(), 1);
    assert_eq!(after.rounds()[0].moves().len(), 1);
    assert_eq!(a.publisher.names(), vec!["matchUpdate"]);
}

#[tokio::test]
async fn test_alice_sweeps_three_rounds() {
    let a = arena().await;
    let (alice, bob) = (*a.alice.id(), *a.bob.id());
    let m = seed_match(&a.matches, alice, bob, alice);

    let after_one = play_round(&a.service, *m.id(), (alice, Move::Rock), (bob, Move::Scissors)).await;
    assert_eq!(*after_one.score(), Score::new(1, 0));
    assert_eq!(*after_one.current_turn(), Some(alice));
    assert_eq!(*after_one.rounds()[0].winner(), Some(alice));

    play_round(&a.service, *m.id(), (alice, Move::Rock), (bob, Move::Scissors)).await;
    let done = play_round(&a.service, *m.id(), (alice, Move::Rock), (bob, Move::Scissors)).await;

    assert_eq!(*done.score(), Score::new(3, 0));
    assert_eq!(*done.status(), MatchStatus::Finished);
    assert_eq!(*done.winner(), Some(alice));
    assert_eq!(done.rounds().len(), 3);

    let alice_after = a.registry.stats(alice).await.unwrap();
    let bob_after = a.registry.stats(bob).await.unwrap();
    assert_eq!((*alice_after.wins(), *alice_after.losses()), (1, 0));
    assert_eq!((*bob_after.wins(), *bob_after.losses()), (0, 1));
    assert_eq!(*alice_after.draws(), 0);

    let stored = a.service.get_match(*m.id()).await.unwrap();
    assert_eq!(stored, done);
}

#[tokio::test]
async fn test_finished_match_rejects_moves() {
    let a = arena().await;
    let (alice, bob) = (*a.alice.id(), *a.bob.id());
    let m = seed_match(&a.matches, alice, bob, bob);
    for _ in 0..3 {
        play_round(&a.service, *m.id(), (bob, Move::Paper), (alice, Move::Rock)).await;
    }

    for player in [alice, bob] {
        let err = a
            .service
            .submit_move(*m.id(), player, Move::Rock)
            .await
            .unwrap_err();
        assert_eq!(err, MatchError::conflict("Match already finished"));
    }
    let stats = a.registry.stats(bob).await.unwrap();
    assert_eq!(*stats.wins(), 1, "win is counted exactly once");
}

#[tokio::test]
async fn test_drawn_round_keeps_score_and_alternates_turn() {
    let a = arena().await;
    let (alice, bob) = (*a.alice.id(), *a.bob.id());
    let m = seed_match(&a.matches, alice, bob, alice);

    let drawn = play_round(&a.service, *m.id(), (alice, Move::Paper), (bob, Move::Paper)).await;
    assert_eq!(*drawn.score(), Score::default());
    assert_eq!(*drawn.rounds()[0].winner(), None);
    assert_eq!(*drawn.current_turn(), Some(bob));

    let drawn_again = play_round(&a.service, *m.id(), (bob, Move::Rock), (alice, Move::Rock)).await;
    assert_eq!(*drawn_again.current_turn(), Some(alice));
    assert_eq!(drawn_again.rounds().len(), 2);

    let players = a.registry.list().await.unwrap();
    assert!(players.iter().all(|p| *p.draws() == 0), "draws never touch counters");
}

#[tokio::test]
async fn test_round_winner_starts_next_round() {
    let a = arena().await;
    let (alice, bob) = (*a.alice.id(), *a.bob.id());
    let m = seed_match(&a.matches, alice, bob, alice);

    let after = play_round(&a.service, *m.id(), (alice, Move::Rock), (bob, Move::Paper)).await;
    assert_eq!(*after.score(), Score::new(0, 1));
    assert_eq!(*after.current_turn(), Some(bob));
}

#[tokio::test]
async fn test_events_follow_round_end_update_order() {
    let a = arena().await;
    let (alice, bob) = (*a.alice.id(), *a.bob.id());
    let m = seed_match(&a.matches, alice, bob, alice);

    play_round(&a.service, *m.id(), (alice, Move::Scissors), (bob, Move::Paper)).await;
    assert_eq!(a.publisher.names(), vec!["matchUpdate", "roundResult", "matchUpdate"]);

    let events = a.publisher.events();
    let MatchEvent::RoundResult(result) = &events[1].1 else {
        panic!("expected round result");
    };
    assert_eq!(events[1].0, *m.id());
    assert_eq!(result.round_number, 1);
    assert_eq!(result.winner, Some(alice));
    assert_eq!(result.moves.len(), 2);
    assert_eq!(result.moves[0].player_id, alice);
    assert_eq!(result.moves[0].played, Move::Scissors);

    play_round(&a.service, *m.id(), (alice, Move::Scissors), (bob, Move::Paper)).await;
    a.publisher.clear();
    let done = play_round(&a.service, *m.id(), (alice, Move::Scissors), (bob, Move::Paper)).await;

    assert_eq!(
        a.publisher.names(),
        vec!["matchUpdate", "roundResult", "matchEnd", "matchUpdate"]
    );
    let events = a.publisher.events();
    let MatchEvent::MatchEnd(end) = &events[2].1 else {
        panic!("expected match end");
    };
    assert_eq!(end.winner, alice);
    assert_eq!(end.score, Score::new(3, 0));
    let MatchEvent::MatchUpdate(update) = &events[3].1 else {
        panic!("expected match update");
    };
    assert_eq!(update.snapshot, done, "last event carries the persisted snapshot");
}

#[tokio::test]
async fn test_publish_failure_does_not_affect_move() {
    let a = arena().await;
    let (alice, bob) = (*a.alice.id(), *a.bob.id());
    let service = MatchService::new(a.matches.clone(), a.players.clone())
        .with_publisher(Arc::new(FailingPublisher));
    let m = seed_match(&a.matches, alice, bob, alice);

    let after = play_round(&service, *m.id(), (alice, Move::Rock), (bob, Move::Scissors)).await;
    assert_eq!(*after.score(), Score::new(1, 0));
    assert_eq!(service.get_match(*m.id()).await.unwrap(), after);
}

#[tokio::test]
async fn test_counter_failure_keeps_finished_match() {
    let a = arena().await;
    let (alice, bob) = (*a.alice.id(), *a.bob.id());
    let publisher = Arc::new(RecordingPublisher::default());
    let service = MatchService::new(a.matches.clone(), Arc::new(FrozenCounters(a.players.clone())))
        .with_publisher(publisher.clone());
    let m = seed_match(&a.matches, alice, bob, alice);
    let id = *m.id();

    for _ in 0..2 {
        play_round(&service, id, (alice, Move::Paper), (bob, Move::Rock)).await;
    }
    service.submit_move(id, alice, Move::Paper).await.unwrap();
    let err = service.submit_move(id, bob, Move::Rock).await.unwrap_err();
    assert!(matches!(err, MatchError::Internal(_)), "unexpected {err}");

    let stored = service.get_match(id).await.unwrap();
    assert_eq!(*stored.status(), MatchStatus::Finished);
    assert_eq!(*stored.winner(), Some(alice));
    assert_eq!(*stored.score(), Score::new(3, 0));
    assert!(publisher.names().contains(&"matchEnd"), "events still go out");

    let retry = service.submit_move(id, bob, Move::Rock).await.unwrap_err();
    assert_eq!(retry, MatchError::conflict("Match already finished"));
}

#[tokio::test]
async fn test_missing_turn_recovers_to_player_a() {
    let a = arena().await;
    let (alice, bob) = (*a.alice.id(), *a.bob.id());
    let now = Utc::now();
    let broken = Match::new(
        5,
        bob,
        alice,
        vec![],
        Score::default(),
        MatchStatus::Ongoing,
        None,
        None,
        now,
        now,
    );
    a.matches.insert(broken).unwrap();

    let err = a.service.submit_move(5, alice, Move::Rock).await.unwrap_err();
    assert_eq!(err, MatchError::conflict("Not your turn"));

    let after = a.service.submit_move(5, bob, Move::Rock).await.unwrap();
    assert_eq!(*after.current_turn(), Some(alice));
}

#[tokio::test]
async fn test_list_matches_by_player() {
    let a = arena().await;
    let carol = a.registry.register("Carol").await.unwrap();
    let (alice, bob, carol) = (*a.alice.id(), *a.bob.id(), *carol.id());

    a.service.create_match(alice, bob).await.unwrap();
    a.service.create_match(bob, carol).await.unwrap();

    assert_eq!(a.service.list_matches().await.unwrap().len(), 2);
    assert_eq!(a.service.list_matches_by_player(bob).await.unwrap().len(), 2);
    let carols = a.service.list_matches_by_player(carol).await.unwrap();
    assert_eq!(carols.len(), 1);
    assert!(carols[0].involves(carol));
    assert!(a.service.list_matches_by_player(999).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_register_rules() {
    let a = arena().await;

    let dave = a.registry.register("  Dave ").await.unwrap();
    assert_eq!(dave.name(), "Dave");
    assert_eq!((*dave.wins(), *dave.losses(), *dave.draws()), (0, 0, 0));

    let blank = a.registry.register("   ").await.unwrap_err();
    assert!(matches!(blank, MatchError::InvalidArgument(_)));

    let taken = a.registry.register("Alice").await.unwrap_err();
    assert!(matches!(taken, MatchError::Conflict(_)));

    let missing = a.registry.stats(999).await.unwrap_err();
    assert!(matches!(missing, MatchError::NotFound(_)));

    assert_eq!(a.registry.list().await.unwrap().len(), 3);
}
