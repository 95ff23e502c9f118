//! Pin storage operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::error::Result;
use crate::models::Pin;
use crate::storage::parse::{parse_datetime, parse_datetime_opt, parse_uuid, OptionalExt};

pub struct PinStore<'a> {
    conn: &'a Connection,
}

impl<'a> PinStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new pin
    pub fn create(&self, pin: &Pin) -> Result<()> {
        self.conn.execute(
            "INSERT INTO pins (id, trip_id, room_id, name, lat, lng, assigned_day,
                               time_slot, locked_by, locked_until, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                pin.id.to_string(),
                pin.trip_id.to_string(),
                pin.room_id,
                pin.name,
                pin.lat,
                pin.lng,
                pin.assigned_day,
                pin.time_slot,
                pin.locked_by,
                pin.locked_until.map(|t| t.to_rfc3339()),
                pin.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get pin by ID
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Pin>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, trip_id, room_id, name, lat, lng, assigned_day,
                    time_slot, locked_by, locked_until, created_at
             FROM pins WHERE id = ?1",
        )?;

        let pin = stmt
            .query_row(params![id.to_string()], Self::map_pin)
            .optional()?;
        Ok(pin)
    }

    /// List pins for a trip in creation order
    pub fn list_for_trip(&self, trip_id: Uuid) -> Result<Vec<Pin>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, trip_id, room_id, name, lat, lng, assigned_day,
                    time_slot, locked_by, locked_until, created_at
             FROM pins WHERE trip_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let pins = stmt
            .query_map(params![trip_id.to_string()], Self::map_pin)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pins)
    }

    /// Persist a finalized schedule assignment
    pub fn set_schedule(&self, pin_id: Uuid, day: u32, time_slot: Option<&str>) -> Result<()> {
        self.conn.execute(
            "UPDATE pins SET assigned_day = ?1, time_slot = ?2 WHERE id = ?3",
            params![day, time_slot, pin_id.to_string()],
        )?;
        Ok(())
    }

    /// Record or clear the advisory soft lock
    pub fn set_soft_lock(
        &self,
        pin_id: Uuid,
        locked_by: Option<&str>,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE pins SET locked_by = ?1, locked_until = ?2 WHERE id = ?3",
            params![
                locked_by,
                locked_until.map(|t| t.to_rfc3339()),
                pin_id.to_string()
            ],
        )?;
        Ok(())
    }

    fn map_pin(row: &rusqlite::Row<'_>) -> rusqlite::Result<Pin> {
        Ok(Pin {
            id: parse_uuid(&row.get::<_, String>(0)?)?,
            trip_id: parse_uuid(&row.get::<_, String>(1)?)?,
            room_id: row.get(2)?,
            name: row.get(3)?,
            lat: row.get(4)?,
            lng: row.get(5)?,
            assigned_day: row.get(6)?,
            time_slot: row.get(7)?,
            locked_by: row.get(8)?,
            locked_until: parse_datetime_opt(row.get::<_, Option<String>>(9)?)?,
            created_at: parse_datetime(&row.get::<_, String>(10)?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Trip;
    use crate::storage::Database;

    fn seed_pin(db: &Database) -> Pin {
        let trip = Trip::new("room-1", "Paris");
        db.trips().create(&trip).unwrap();
        let pin = Pin::new(trip.id, "room-1", "Louvre", 48.8606, 2.3376);
        db.pins().create(&pin).unwrap();
        pin
    }

    #[test]
    fn create_and_find() {
        let db = Database::open_in_memory().unwrap();
        let pin = seed_pin(&db);

        let found = db.pins().find_by_id(pin.id).unwrap().unwrap();
        assert_eq!(found.name, "Louvre");
        assert_eq!(found.assigned_day, 0);
        assert!(db.pins().find_by_id(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn set_schedule_persists() {
        let db = Database::open_in_memory().unwrap();
        let pin = seed_pin(&db);

        db.pins().set_schedule(pin.id, 2, Some("morning")).unwrap();
        let found = db.pins().find_by_id(pin.id).unwrap().unwrap();
        assert_eq!(found.assigned_day, 2);
        assert_eq!(found.time_slot.as_deref(), Some("morning"));
    }

    #[test]
    fn soft_lock_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let pin = seed_pin(&db);

        let until = Utc::now();
        db.pins()
            .set_soft_lock(pin.id, Some("alice"), Some(until))
            .unwrap();
        let found = db.pins().find_by_id(pin.id).unwrap().unwrap();
        assert_eq!(found.locked_by.as_deref(), Some("alice"));

        db.pins().set_soft_lock(pin.id, None, None).unwrap();
        let found = db.pins().find_by_id(pin.id).unwrap().unwrap();
        assert!(found.locked_by.is_none());
        assert!(found.locked_until.is_none());
    }
}
