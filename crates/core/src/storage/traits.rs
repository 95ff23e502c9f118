//! Storage repository traits
//!
//! These traits define the storage interface the coordinator programs
//! against, allowing for different implementations (SQLite, mock, future
//! network backend). The coordinator treats persistence as an abstract
//! append/query service.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{CanvasEvent, Participant, Pin, Trip};

/// Append-only canvas event log
pub trait EventLog {
    /// Append an event
    fn append_event(&self, event: &CanvasEvent) -> Result<()>;

    /// List a room's non-undone events in replay order
    fn active_events(&self, room_id: &str) -> Result<Vec<CanvasEvent>>;

    /// Most recent non-undone event in a room
    fn latest_active_event(&self, room_id: &str) -> Result<Option<CanvasEvent>>;

    /// Flag an event undone
    fn mark_event_undone(&self, event_id: Uuid) -> Result<()>;
}

/// Pin repository operations
pub trait PinRepository {
    /// Create a new pin
    fn create_pin(&self, pin: &Pin) -> Result<()>;

    /// Find pin by ID
    fn find_pin_by_id(&self, id: Uuid) -> Result<Option<Pin>>;

    /// List pins for a trip
    fn list_pins_for_trip(&self, trip_id: Uuid) -> Result<Vec<Pin>>;

    /// Persist a finalized schedule assignment
    fn set_pin_schedule(&self, pin_id: Uuid, day: u32, time_slot: Option<&str>) -> Result<()>;

    /// Record or clear the advisory soft lock
    fn set_pin_soft_lock(
        &self,
        pin_id: Uuid,
        locked_by: Option<&str>,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<()>;
}

/// Trip repository operations
pub trait TripRepository {
    /// Create a new trip
    fn create_trip(&self, trip: &Trip) -> Result<()>;

    /// Find trip by ID
    fn find_trip_by_id(&self, id: Uuid) -> Result<Option<Trip>>;

    /// List trips for a room
    fn list_trips_for_room(&self, room_id: &str) -> Result<Vec<Trip>>;
}

/// Participant profile repository operations
pub trait ParticipantRepository {
    /// Insert or update a participant's profile
    fn upsert_participant(&self, participant: &Participant) -> Result<()>;

    /// Find a stored profile
    fn find_participant_by_id(&self, id: &str) -> Result<Option<Participant>>;
}
