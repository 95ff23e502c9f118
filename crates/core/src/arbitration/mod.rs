//! Arbitration protocols for contested pin actions
//!
//! Two protocols gate changes to contested pin schedules: a rock-paper-
//! scissors duel between the two participants who grabbed the same pin, and
//! a time-boxed room vote on a proposed day change. Both are pure state
//! machines here; the coordinator owns the clocks and deadlines.

mod duel;
mod vote;

use std::time::Duration;

pub use duel::{Choice, Duel, DuelProgress};
pub use vote::{Vote, VoteOutcome};

/// How long both duelists have to submit a choice
pub const DUEL_DEADLINE: Duration = Duration::from_secs(7);

/// How long the ballot window for a schedule vote stays open
pub const VOTE_DEADLINE: Duration = Duration::from_secs(15);

/// Two drag-starts on the same pin within this window count as a collision
pub const DRAG_COLLISION_WINDOW: Duration = Duration::from_secs(3);
