//! Trip storage operations

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::error::Result;
use crate::models::Trip;
use crate::storage::parse::{parse_datetime, parse_uuid, OptionalExt};

pub struct TripStore<'a> {
    conn: &'a Connection,
}

impl<'a> TripStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new trip
    pub fn create(&self, trip: &Trip) -> Result<()> {
        self.conn.execute(
            "INSERT INTO trips (id, room_id, title, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                trip.id.to_string(),
                trip.room_id,
                trip.title,
                trip.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get trip by ID
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Trip>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, room_id, title, created_at FROM trips WHERE id = ?1",
        )?;

        let trip = stmt
            .query_row(params![id.to_string()], Self::map_trip)
            .optional()?;
        Ok(trip)
    }

    /// List trips for a room in creation order
    pub fn list_for_room(&self, room_id: &str) -> Result<Vec<Trip>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, room_id, title, created_at FROM trips
             WHERE room_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let trips = stmt
            .query_map(params![room_id], Self::map_trip)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(trips)
    }

    fn map_trip(row: &rusqlite::Row<'_>) -> rusqlite::Result<Trip> {
        Ok(Trip {
            id: parse_uuid(&row.get::<_, String>(0)?)?,
            room_id: row.get(1)?,
            title: row.get(2)?,
            created_at: parse_datetime(&row.get::<_, String>(3)?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    #[test]
    fn create_and_list_for_room() {
        let db = Database::open_in_memory().unwrap();
        let store = db.trips();

        let a = Trip::new("room-1", "Paris");
        let b = Trip::new("room-1", "Kyoto");
        let other = Trip::new("room-2", "Lima");
        store.create(&a).unwrap();
        store.create(&b).unwrap();
        store.create(&other).unwrap();

        let trips = store.list_for_room("room-1").unwrap();
        assert_eq!(trips.len(), 2);
        assert_eq!(store.find_by_id(a.id).unwrap().unwrap().title, "Paris");
        assert!(store.list_for_room("room-3").unwrap().is_empty());
    }
}
