//! SQLite storage layer for Waypoint

mod events;
mod migrations;
mod parse;
mod participants;
mod pins;
mod traits;
mod trips;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use tracing::instrument;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{CanvasEvent, Participant, Pin, Trip};

pub use events::EventStore;
pub use participants::ParticipantStore;
pub use pins::PinStore;
pub use traits::{EventLog, ParticipantRepository, PinRepository, TripRepository};
pub use trips::TripStore;

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    /// Get canvas event store
    pub fn events(&self) -> EventStore<'_> {
        EventStore::new(&self.conn)
    }

    /// Get pin store
    pub fn pins(&self) -> PinStore<'_> {
        PinStore::new(&self.conn)
    }

    /// Get trip store
    pub fn trips(&self) -> TripStore<'_> {
        TripStore::new(&self.conn)
    }

    /// Get participant profile store
    pub fn participants(&self) -> ParticipantStore<'_> {
        ParticipantStore::new(&self.conn)
    }
}

// Implement repository traits for Database
// This enables using Database through the trait interface

impl EventLog for Database {
    fn append_event(&self, event: &CanvasEvent) -> Result<()> {
        self.events().append(event)
    }

    fn active_events(&self, room_id: &str) -> Result<Vec<CanvasEvent>> {
        self.events().active_for_room(room_id)
    }

    fn latest_active_event(&self, room_id: &str) -> Result<Option<CanvasEvent>> {
        self.events().latest_active(room_id)
    }

    fn mark_event_undone(&self, event_id: Uuid) -> Result<()> {
        self.events().mark_undone(event_id)
    }
}

impl PinRepository for Database {
    fn create_pin(&self, pin: &Pin) -> Result<()> {
        self.pins().create(pin)
    }

    fn find_pin_by_id(&self, id: Uuid) -> Result<Option<Pin>> {
        self.pins().find_by_id(id)
    }

    fn list_pins_for_trip(&self, trip_id: Uuid) -> Result<Vec<Pin>> {
        self.pins().list_for_trip(trip_id)
    }

    fn set_pin_schedule(&self, pin_id: Uuid, day: u32, time_slot: Option<&str>) -> Result<()> {
        self.pins().set_schedule(pin_id, day, time_slot)
    }

    fn set_pin_soft_lock(
        &self,
        pin_id: Uuid,
        locked_by: Option<&str>,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.pins().set_soft_lock(pin_id, locked_by, locked_until)
    }
}

impl TripRepository for Database {
    fn create_trip(&self, trip: &Trip) -> Result<()> {
        self.trips().create(trip)
    }

    fn find_trip_by_id(&self, id: Uuid) -> Result<Option<Trip>> {
        self.trips().find_by_id(id)
    }

    fn list_trips_for_room(&self, room_id: &str) -> Result<Vec<Trip>> {
        self.trips().list_for_room(room_id)
    }
}

impl ParticipantRepository for Database {
    fn upsert_participant(&self, participant: &Participant) -> Result<()> {
        self.participants().upsert_profile(participant)
    }

    fn find_participant_by_id(&self, id: &str) -> Result<Option<Participant>> {
        self.participants().find_by_id(id)
    }
}
