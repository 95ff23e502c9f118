//! Time-boxed room vote on a proposed pin day change

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Final tally of a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub passed: bool,
    pub agree: usize,
    pub disagree: usize,
}

/// An open ballot window for moving a pin to `target_day`.
///
/// `quorum` is the room membership size snapshotted when the vote opened.
/// It caps the expected ballot count but is not a participation requirement:
/// the decision is a majority of ballots actually cast, with ties failing
/// (status quo wins).
#[derive(Debug, Clone)]
pub struct Vote {
    pub id: Uuid,
    pub pin_id: Uuid,
    pub target_day: u32,
    pub initiator: String,
    pub quorum: usize,
    ballots: HashMap<String, bool>,
}

impl Vote {
    pub fn new(
        pin_id: Uuid,
        target_day: u32,
        initiator: impl Into<String>,
        quorum: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            pin_id,
            target_day,
            initiator: initiator.into(),
            quorum,
            ballots: HashMap::new(),
        }
    }

    /// Record a ballot. Resubmission overwrites: the last ballot counts.
    pub fn cast(&mut self, participant_id: &str, agree: bool) {
        self.ballots.insert(participant_id.to_string(), agree);
    }

    pub fn ballot_count(&self) -> usize {
        self.ballots.len()
    }

    /// True once every expected voter has a ballot in
    pub fn is_complete(&self) -> bool {
        self.ballots.len() >= self.quorum
    }

    pub fn tally(&self) -> VoteOutcome {
        let agree = self.ballots.values().filter(|v| **v).count();
        let disagree = self.ballots.len() - agree;
        VoteOutcome {
            passed: agree > disagree,
            agree,
            disagree,
        }
    }
}
