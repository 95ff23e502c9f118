//! Location pin model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Day value meaning "not scheduled yet"
pub const UNSCHEDULED: u32 = 0;

/// A location pin on the trip map, optionally assigned to a day/time slot.
///
/// Schedule fields change only through a finalized arbitration or an
/// uncontested direct set. The lock fields are advisory: they mark who is
/// currently dragging the pin but are never enforced server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pin {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub room_id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    /// 0 = unscheduled
    pub assigned_day: u32,
    pub time_slot: Option<String>,
    pub locked_by: Option<String>,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Pin {
    pub fn new(
        trip_id: Uuid,
        room_id: impl Into<String>,
        name: impl Into<String>,
        lat: f64,
        lng: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            trip_id,
            room_id: room_id.into(),
            name: name.into(),
            lat,
            lng,
            assigned_day: UNSCHEDULED,
            time_slot: None,
            locked_by: None,
            locked_until: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.assigned_day != UNSCHEDULED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_pin_is_unscheduled() {
        let pin = Pin::new(Uuid::new_v4(), "room-1", "Louvre", 48.8606, 2.3376);
        assert!(!pin.is_scheduled());
        assert_eq!(pin.assigned_day, UNSCHEDULED);
        assert!(pin.time_slot.is_none());
        assert!(pin.locked_by.is_none());
    }
}
