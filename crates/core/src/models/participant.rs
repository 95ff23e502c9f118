//! Participant model
//!
//! Identity is an opaque, client-supplied token. Profile fields arrive after
//! the connection via a separate profile update, so both start empty.

use serde::{Deserialize, Serialize};

/// A participant in a room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Opaque client-supplied identity token
    pub id: String,
    pub nickname: String,
    pub avatar_url: String,
}

impl Participant {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nickname: String::new(),
            avatar_url: String::new(),
        }
    }

    pub fn has_profile(&self) -> bool {
        !self.nickname.is_empty()
    }
}

/// A cursor position on the shared map, in canvas coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}
