//! Canvas event log storage
//!
//! Append-only: events are inserted once and only the `is_undone` flag ever
//! changes. Replay order is `created_at` ascending with insertion (rowid)
//! order breaking ties.

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::error::Result;
use crate::models::CanvasEvent;
use crate::storage::parse::{
    kind_from_str, kind_to_str, parse_datetime, parse_payload, parse_uuid, OptionalExt,
};

pub struct EventStore<'a> {
    conn: &'a Connection,
}

impl<'a> EventStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Append a canvas event to the log
    pub fn append(&self, event: &CanvasEvent) -> Result<()> {
        self.conn.execute(
            "INSERT INTO canvas_events (id, room_id, author_id, kind, payload, created_at, is_undone)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.id.to_string(),
                event.room_id,
                event.author_id,
                kind_to_str(event.kind),
                serde_json::to_string(&event.payload)?,
                event.created_at.to_rfc3339(),
                event.is_undone as i32,
            ],
        )?;
        Ok(())
    }

    /// List a room's non-undone events in replay order
    pub fn active_for_room(&self, room_id: &str) -> Result<Vec<CanvasEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, room_id, author_id, kind, payload, created_at, is_undone
             FROM canvas_events
             WHERE room_id = ?1 AND is_undone = 0
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let events = stmt
            .query_map(params![room_id], Self::map_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// Most recent non-undone event in the room, if any
    pub fn latest_active(&self, room_id: &str) -> Result<Option<CanvasEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, room_id, author_id, kind, payload, created_at, is_undone
             FROM canvas_events
             WHERE room_id = ?1 AND is_undone = 0
             ORDER BY created_at DESC, rowid DESC
             LIMIT 1",
        )?;

        let event = stmt.query_row(params![room_id], Self::map_event).optional()?;
        Ok(event)
    }

    /// Flag an event as undone
    pub fn mark_undone(&self, event_id: Uuid) -> Result<()> {
        self.conn.execute(
            "UPDATE canvas_events SET is_undone = 1 WHERE id = ?1",
            params![event_id.to_string()],
        )?;
        Ok(())
    }

    /// Count of non-undone events in a room
    pub fn active_count(&self, room_id: &str) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM canvas_events WHERE room_id = ?1 AND is_undone = 0",
            params![room_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn map_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<CanvasEvent> {
        Ok(CanvasEvent {
            id: parse_uuid(&row.get::<_, String>(0)?)?,
            room_id: row.get(1)?,
            author_id: row.get(2)?,
            kind: kind_from_str(&row.get::<_, String>(3)?),
            payload: parse_payload(&row.get::<_, String>(4)?)?,
            created_at: parse_datetime(&row.get::<_, String>(5)?)?,
            is_undone: row.get::<_, i32>(6)? != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Point, StrokeKind, StrokePayload, StrokeStyle};
    use crate::storage::Database;
    use chrono::{Duration, Utc};

    fn event_at(room: &str, author: &str, offset_ms: i64) -> CanvasEvent {
        let mut event = CanvasEvent::new(
            room,
            author,
            StrokeKind::Stroke,
            StrokePayload {
                points: vec![Point { x: 0.0, y: 0.0 }],
                style: StrokeStyle::default(),
            },
        );
        event.created_at = Utc::now() + Duration::milliseconds(offset_ms);
        event
    }

    #[test]
    fn append_and_replay_in_order() {
        let db = Database::open_in_memory().unwrap();
        let store = db.events();

        let a = event_at("room-1", "alice", 0);
        let b = event_at("room-1", "bob", 10);
        let other = event_at("room-2", "carol", 5);
        store.append(&b).unwrap();
        store.append(&a).unwrap();
        store.append(&other).unwrap();

        let events = store.active_for_room("room-1").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, a.id);
        assert_eq!(events[1].id, b.id);

        // Replay is idempotent: repeating the query yields the same set
        let again = store.active_for_room("room-1").unwrap();
        assert_eq!(
            events.iter().map(|e| e.id).collect::<Vec<_>>(),
            again.iter().map(|e| e.id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn equal_timestamps_fall_back_to_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        let store = db.events();

        let ts = Utc::now();
        let mut first = event_at("room-1", "alice", 0);
        let mut second = event_at("room-1", "bob", 0);
        first.created_at = ts;
        second.created_at = ts;
        store.append(&first).unwrap();
        store.append(&second).unwrap();

        let events = store.active_for_room("room-1").unwrap();
        assert_eq!(events[0].id, first.id);
        assert_eq!(events[1].id, second.id);
        assert_eq!(store.latest_active("room-1").unwrap().unwrap().id, second.id);
    }

    #[test]
    fn undo_walks_back_through_distinct_events() {
        let db = Database::open_in_memory().unwrap();
        let store = db.events();

        let a = event_at("room-1", "alice", 0);
        let b = event_at("room-1", "bob", 10);
        store.append(&a).unwrap();
        store.append(&b).unwrap();

        let latest = store.latest_active("room-1").unwrap().unwrap();
        assert_eq!(latest.id, b.id);
        store.mark_undone(latest.id).unwrap();

        let latest = store.latest_active("room-1").unwrap().unwrap();
        assert_eq!(latest.id, a.id);
        store.mark_undone(latest.id).unwrap();

        assert!(store.latest_active("room-1").unwrap().is_none());
        assert_eq!(store.active_count("room-1").unwrap(), 0);
    }

    #[test]
    fn latest_active_on_empty_room_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.events().latest_active("empty-room").unwrap().is_none());
    }
}
