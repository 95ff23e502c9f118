//! Database migration system
//!
//! Tracks schema versions and applies migrations in order.

use rusqlite::Connection;
use tracing::{info, instrument};

use crate::error::Result;

/// A database migration
pub struct Migration {
    /// Version number (must be sequential starting from 1)
    pub version: u32,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to run for this migration
    pub sql: &'static str,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema",
        sql: r#"
            -- Trips table
            CREATE TABLE IF NOT EXISTS trips (
                id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            -- Pins table
            CREATE TABLE IF NOT EXISTS pins (
                id TEXT PRIMARY KEY,
                trip_id TEXT NOT NULL,
                room_id TEXT NOT NULL,
                name TEXT NOT NULL,
                lat REAL NOT NULL,
                lng REAL NOT NULL,
                assigned_day INTEGER NOT NULL DEFAULT 0,
                time_slot TEXT,
                locked_by TEXT,
                locked_until TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (trip_id) REFERENCES trips(id) ON DELETE CASCADE
            );

            -- Canvas events table (append-only; is_undone is the only mutable column)
            CREATE TABLE IF NOT EXISTS canvas_events (
                id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL,
                author_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                is_undone INTEGER NOT NULL DEFAULT 0
            );

            -- Participant profiles (presence is never persisted)
            CREATE TABLE IF NOT EXISTS participants (
                id TEXT PRIMARY KEY,
                nickname TEXT NOT NULL,
                avatar_url TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Add indexes for query performance",
        sql: r#"
            -- Trip indexes
            CREATE INDEX IF NOT EXISTS idx_trips_room ON trips(room_id);

            -- Pin indexes
            CREATE INDEX IF NOT EXISTS idx_pins_trip ON pins(trip_id);
            CREATE INDEX IF NOT EXISTS idx_pins_room ON pins(room_id);

            -- Canvas event indexes
            CREATE INDEX IF NOT EXISTS idx_events_room ON canvas_events(room_id);
            CREATE INDEX IF NOT EXISTS idx_events_room_created
                ON canvas_events(room_id, created_at);
        "#,
    },
];

/// Run all pending migrations
#[instrument(skip(conn))]
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
    )?;

    let current: u32 = conn
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get::<_, Option<u32>>(0)
        })?
        .unwrap_or(0);

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        info!(
            version = migration.version,
            description = migration.description,
            "Applying migration"
        );
        conn.execute_batch(migration.sql)?;
        conn.execute(
            "INSERT INTO schema_migrations (version, description, applied_at)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![
                migration.version,
                migration.description,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_sequential() {
        for (i, m) in MIGRATIONS.iter().enumerate() {
            assert_eq!(m.version, i as u32 + 1);
        }
    }

    #[test]
    fn migrations_apply_and_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, MIGRATIONS.len() as u32);
    }
}
