//! Waypoint Core Library
//!
//! Core models, arbitration state machines, and storage for the Waypoint
//! collaborative trip-planning coordinator.

pub mod arbitration;
pub mod error;
pub mod invariants;
pub mod models;
pub mod storage;

pub use arbitration::{
    Choice, Duel, DuelProgress, Vote, VoteOutcome, DRAG_COLLISION_WINDOW, DUEL_DEADLINE,
    VOTE_DEADLINE,
};
pub use error::{Error, Result};
pub use models::*;
pub use storage::{
    Database, EventLog, EventStore, ParticipantRepository, ParticipantStore, PinRepository,
    PinStore, TripRepository, TripStore,
};
