//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use crate::arbitration::{Duel, Vote};
use crate::models::CanvasEvent;

/// Validate that a duel's parties are distinct and non-empty
pub fn assert_duel_invariants(duel: &Duel) {
    debug_assert!(
        duel.challenger != duel.defender,
        "Duel {} has the same participant on both sides",
        duel.id
    );

    debug_assert!(
        !duel.challenger.is_empty() && !duel.defender.is_empty(),
        "Duel {} has an empty participant id",
        duel.id
    );

    debug_assert!(duel.round >= 1, "Duel {} has round 0", duel.id);
}

/// Validate that a vote's bookkeeping is internally consistent
pub fn assert_vote_invariants(vote: &Vote) {
    debug_assert!(
        vote.quorum >= 1,
        "Vote {} opened with an empty room",
        vote.id
    );

    debug_assert!(
        vote.ballot_count() <= vote.quorum,
        "Vote {} has {} ballots but quorum is {}",
        vote.id,
        vote.ballot_count(),
        vote.quorum
    );
}

/// Validate that a replay slice is in order and contains no undone events
pub fn assert_replay_invariants(events: &[CanvasEvent]) {
    debug_assert!(
        events.iter().all(|e| !e.is_undone),
        "Replay slice contains undone events"
    );

    debug_assert!(
        events.windows(2).all(|w| w[0].created_at <= w[1].created_at),
        "Replay slice is not ordered by created_at"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Point, StrokeKind, StrokePayload, StrokeStyle};
    use uuid::Uuid;

    fn stroke(room: &str) -> CanvasEvent {
        CanvasEvent::new(
            room,
            "alice",
            StrokeKind::Stroke,
            StrokePayload {
                points: vec![Point { x: 0.0, y: 0.0 }],
                style: StrokeStyle::default(),
            },
        )
    }

    #[test]
    fn valid_duel_passes() {
        let duel = Duel::new(Uuid::new_v4(), "alice", "bob");
        assert_duel_invariants(&duel);
    }

    #[test]
    #[should_panic(expected = "same participant")]
    fn self_duel_panics() {
        let duel = Duel::new(Uuid::new_v4(), "alice", "alice");
        assert_duel_invariants(&duel);
    }

    #[test]
    fn valid_vote_passes() {
        let mut vote = Vote::new(Uuid::new_v4(), 2, "alice", 3);
        vote.cast("alice", true);
        assert_vote_invariants(&vote);
    }

    #[test]
    fn ordered_replay_passes() {
        let events = vec![stroke("room-1"), stroke("room-1")];
        assert_replay_invariants(&events);
    }

    #[test]
    #[should_panic(expected = "undone")]
    fn undone_event_in_replay_panics() {
        let mut event = stroke("room-1");
        event.is_undone = true;
        assert_replay_invariants(&[event]);
    }
}
