//! Room registry
//!
//! Maps room ids to live room tasks. Rooms are created lazily on first join
//! and pruned once their task has stopped (last member left), so a re-join
//! under the same id gets a fresh task over the same persisted state.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::room::{Room, RoomConfig, RoomHandle, SharedDb};

pub struct RoomRegistry {
    db: SharedDb,
    config: RoomConfig,
    rooms: Mutex<HashMap<String, RoomHandle>>,
}

impl RoomRegistry {
    pub fn new(db: SharedDb, config: RoomConfig) -> Self {
        Self {
            db,
            config,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Get the live handle for a room, spawning its task if needed
    pub async fn get_or_create(&self, room_id: &str) -> RoomHandle {
        let mut rooms = self.rooms.lock().await;

        if let Some(handle) = rooms.get(room_id) {
            if !handle.is_closed() {
                return handle.clone();
            }
            debug!(room_id, "Pruning stopped room task");
            rooms.remove(room_id);
        }

        info!(room_id, "Creating room");
        let handle = Room::spawn(room_id, self.db.clone(), self.config.clone());
        rooms.insert(room_id.to_string(), handle.clone());
        handle
    }

    /// Handle for a room only if its task is still running
    pub async fn get(&self, room_id: &str) -> Option<RoomHandle> {
        let rooms = self.rooms.lock().await;
        rooms.get(room_id).filter(|h| !h.is_closed()).cloned()
    }

    /// Number of rooms with a live task
    pub async fn live_count(&self) -> usize {
        let rooms = self.rooms.lock().await;
        rooms.values().filter(|h| !h.is_closed()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ServerMessage;
    use crate::room::RoomCommand;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use waypoint_core::Database;

    fn test_db() -> SharedDb {
        Arc::new(Mutex::new(Database::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn same_id_returns_same_handle() {
        let registry = RoomRegistry::new(test_db(), RoomConfig::default());

        let a = registry.get_or_create("room-1").await;
        let b = registry.get_or_create("room-1").await;
        assert_eq!(a.room_id(), b.room_id());
        assert_eq!(registry.live_count().await, 1);

        registry.get_or_create("room-2").await;
        assert_eq!(registry.live_count().await, 2);
    }

    #[tokio::test]
    async fn stopped_room_is_replaced() {
        let registry = RoomRegistry::new(test_db(), RoomConfig::default());
        let handle = registry.get_or_create("room-1").await;

        // One member joins and leaves, so the task stops
        let (tx, mut rx) = mpsc::channel(16);
        handle
            .send(RoomCommand::Join {
                conn_id: 1,
                participant_id: "alice".to_string(),
                tx,
            })
            .await;
        assert!(matches!(
            rx.recv().await.unwrap(),
            ServerMessage::RoomSnapshot(_)
        ));
        handle.send(RoomCommand::Leave { conn_id: 1 }).await;
        while !handle.is_closed() {
            tokio::task::yield_now().await;
        }

        let fresh = registry.get_or_create("room-1").await;
        assert!(!fresh.is_closed());
        assert_eq!(registry.live_count().await, 1);
    }

    #[tokio::test]
    async fn get_misses_unknown_and_stopped_rooms() {
        let registry = RoomRegistry::new(test_db(), RoomConfig::default());
        assert!(registry.get("room-1").await.is_none());

        registry.get_or_create("room-1").await;
        assert!(registry.get("room-1").await.is_some());
    }
}
