//! Canvas event model
//!
//! Drawing is an append-only log: strokes and erases are both additive
//! events, so replaying the non-undone events in `created_at` order rebuilds
//! the same canvas on every client. Events are immutable once recorded except
//! for the `is_undone` flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of drawing action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeKind {
    /// Pen stroke
    Stroke,
    /// Composite "remove" stroke; additive, does not mutate prior events
    Erase,
}

/// A point on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Visual style of a stroke
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    pub color: String,
    pub width: f64,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: "#000000".to_string(),
            width: 2.0,
        }
    }
}

/// Payload of a canvas event: the ordered point list plus stroke style
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokePayload {
    pub points: Vec<Point>,
    pub style: StrokeStyle,
}

/// A single recorded drawing action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasEvent {
    pub id: Uuid,
    pub room_id: String,
    pub author_id: String,
    pub kind: StrokeKind,
    pub payload: StrokePayload,
    pub created_at: DateTime<Utc>,
    pub is_undone: bool,
}

impl CanvasEvent {
    pub fn new(
        room_id: impl Into<String>,
        author_id: impl Into<String>,
        kind: StrokeKind,
        payload: StrokePayload,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_id: room_id.into(),
            author_id: author_id.into(),
            kind,
            payload,
            created_at: Utc::now(),
            is_undone: false,
        }
    }
}
