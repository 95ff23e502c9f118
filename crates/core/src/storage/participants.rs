//! Participant profile storage
//!
//! Only profile fields are persisted. Presence (cursor, connection) is
//! broadcast-only and never hits the database.

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::Participant;
use crate::storage::parse::OptionalExt;

pub struct ParticipantStore<'a> {
    conn: &'a Connection,
}

impl<'a> ParticipantStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert or update a participant's profile
    pub fn upsert_profile(&self, participant: &Participant) -> Result<()> {
        self.conn.execute(
            "INSERT INTO participants (id, nickname, avatar_url, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 nickname = excluded.nickname,
                 avatar_url = excluded.avatar_url,
                 updated_at = excluded.updated_at",
            params![
                participant.id,
                participant.nickname,
                participant.avatar_url,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a participant's stored profile
    pub fn find_by_id(&self, id: &str) -> Result<Option<Participant>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, nickname, avatar_url FROM participants WHERE id = ?1")?;

        let participant = stmt
            .query_row(params![id], |row| {
                Ok(Participant {
                    id: row.get(0)?,
                    nickname: row.get(1)?,
                    avatar_url: row.get(2)?,
                })
            })
            .optional()?;
        Ok(participant)
    }
}
