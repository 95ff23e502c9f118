//! Trip model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A trip being planned in a room. Simple container for pins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub room_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Trip {
    pub fn new(room_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_id: room_id.into(),
            title: title.into(),
            created_at: Utc::now(),
        }
    }
}
