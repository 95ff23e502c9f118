//! Rock-paper-scissors duel between two participants contesting a pin

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A duelist's throw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    Rock,
    Paper,
    Scissors,
}

impl Choice {
    /// Standard relation: rock beats scissors, scissors beats paper,
    /// paper beats rock.
    pub fn beats(self, other: Choice) -> bool {
        matches!(
            (self, other),
            (Choice::Rock, Choice::Scissors)
                | (Choice::Scissors, Choice::Paper)
                | (Choice::Paper, Choice::Rock)
        )
    }
}

/// Result of feeding a choice into a duel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuelProgress {
    /// Waiting for the other duelist
    Waiting,
    /// Both threw the same choice; the duel restarts with a fresh deadline
    Tie,
    /// Decisive outcome
    Won { winner: String, loser: String },
}

/// An active duel over a contested pin
#[derive(Debug, Clone)]
pub struct Duel {
    pub id: Uuid,
    pub pin_id: Uuid,
    pub challenger: String,
    pub defender: String,
    /// Incremented on every tie restart; stale deadline timers check this
    pub round: u32,
    choices: HashMap<String, Choice>,
}

impl Duel {
    pub fn new(pin_id: Uuid, challenger: impl Into<String>, defender: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            pin_id,
            challenger: challenger.into(),
            defender: defender.into(),
            round: 1,
            choices: HashMap::new(),
        }
    }

    pub fn is_party(&self, participant_id: &str) -> bool {
        participant_id == self.challenger || participant_id == self.defender
    }

    pub fn has_chosen(&self, participant_id: &str) -> bool {
        self.choices.contains_key(participant_id)
    }

    /// Submit a duelist's choice. The first choice per round is final; a
    /// repeat submission is rejected. Once both choices are in, the duel
    /// either resolves or (on a tie) resets for a new round.
    pub fn submit(&mut self, participant_id: &str, choice: Choice) -> Result<DuelProgress> {
        if !self.is_party(participant_id) {
            return Err(Error::Arbitration(format!(
                "{} is not a party to duel {}",
                participant_id, self.id
            )));
        }
        if self.choices.contains_key(participant_id) {
            return Err(Error::Arbitration(format!(
                "{} already chose in duel {}",
                participant_id, self.id
            )));
        }

        self.choices.insert(participant_id.to_string(), choice);

        let (a, b) = match (
            self.choices.get(&self.challenger),
            self.choices.get(&self.defender),
        ) {
            (Some(a), Some(b)) => (*a, *b),
            _ => return Ok(DuelProgress::Waiting),
        };

        if a == b {
            // Ties are never silently broken; rethrow
            self.choices.clear();
            self.round += 1;
            return Ok(DuelProgress::Tie);
        }

        let (winner, loser) = if a.beats(b) {
            (self.challenger.clone(), self.defender.clone())
        } else {
            (self.defender.clone(), self.challenger.clone())
        };
        Ok(DuelProgress::Won { winner, loser })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duel() -> Duel {
        Duel::new(Uuid::new_v4(), "alice", "bob")
    }

    #[test]
    fn beats_relation_is_standard() {
        assert!(Choice::Rock.beats(Choice::Scissors));
        assert!(Choice::Scissors.beats(Choice::Paper));
        assert!(Choice::Paper.beats(Choice::Rock));
        assert!(!Choice::Rock.beats(Choice::Paper));
        assert!(!Choice::Rock.beats(Choice::Rock));
    }

    #[test]
    fn first_choice_waits_for_opponent() {
        let mut d = duel();
        assert_eq!(d.submit("alice", Choice::Rock).unwrap(), DuelProgress::Waiting);
    }

    #[test]
    fn decisive_pair_produces_winner() {
        let mut d = duel();
        d.submit("alice", Choice::Rock).unwrap();
        let progress = d.submit("bob", Choice::Scissors).unwrap();
        assert_eq!(
            progress,
            DuelProgress::Won {
                winner: "alice".to_string(),
                loser: "bob".to_string(),
            }
        );
    }

    #[test]
    fn all_decisive_pairs_match_relation() {
        let pairs = [
            (Choice::Rock, Choice::Scissors, true),
            (Choice::Rock, Choice::Paper, false),
            (Choice::Paper, Choice::Rock, true),
            (Choice::Paper, Choice::Scissors, false),
            (Choice::Scissors, Choice::Paper, true),
            (Choice::Scissors, Choice::Rock, false),
        ];
        for (a, b, challenger_wins) in pairs {
            let mut d = duel();
            d.submit("alice", a).unwrap();
            match d.submit("bob", b).unwrap() {
                DuelProgress::Won { winner, .. } => {
                    let expected = if challenger_wins { "alice" } else { "bob" };
                    assert_eq!(winner, expected, "pair {:?} vs {:?}", a, b);
                }
                other => panic!("expected a winner, got {:?}", other),
            }
        }
    }

    #[test]
    fn tie_restarts_with_cleared_choices() {
        let mut d = duel();
        d.submit("alice", Choice::Paper).unwrap();
        assert_eq!(d.submit("bob", Choice::Paper).unwrap(), DuelProgress::Tie);
        assert_eq!(d.round, 2);
        assert!(!d.has_chosen("alice"));
        assert!(!d.has_chosen("bob"));

        // Fresh round resolves normally
        d.submit("alice", Choice::Rock).unwrap();
        assert!(matches!(
            d.submit("bob", Choice::Scissors).unwrap(),
            DuelProgress::Won { .. }
        ));
    }

    #[test]
    fn non_party_is_rejected() {
        let mut d = duel();
        assert!(d.submit("mallory", Choice::Rock).is_err());
    }

    #[test]
    fn second_choice_from_same_party_is_rejected() {
        let mut d = duel();
        d.submit("alice", Choice::Rock).unwrap();
        assert!(d.submit("alice", Choice::Paper).is_err());
        // Original choice still stands
        assert!(matches!(
            d.submit("bob", Choice::Scissors).unwrap(),
            DuelProgress::Won { winner, .. } if winner == "alice"
        ));
    }
}
