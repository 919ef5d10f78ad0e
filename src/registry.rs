use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::config::GameRules;
use crate::room::Room;

pub type SharedRoom = Arc<Mutex<Room>>;
pub type SharedRegistry = Arc<Mutex<RoomRegistry>>;

/// Process-wide map from room id to room. Rooms are created on first use;
/// every room except the default one may be removed again.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: BTreeMap<String, SharedRoom>,
    default_room_id: String,
    rules: GameRules,
}

impl RoomRegistry {
    pub fn new(default_room_id: impl Into<String>, rules: GameRules) -> Self {
        Self {
            rooms: BTreeMap::new(),
            default_room_id: default_room_id.into(),
            rules,
        }
    }

    pub fn shared(self) -> SharedRegistry {
        Arc::new(Mutex::new(self))
    }

    pub fn is_default(&self, room_id: &str) -> bool {
        self.default_room_id == room_id
    }

    pub fn get(&self, room_id: &str) -> Option<SharedRoom> {
        self.rooms.get(room_id).cloned()
    }

    pub fn get_or_create(&mut self, room_id: &str) -> SharedRoom {
        if let Some(room) = self.rooms.get(room_id) {
            return Arc::clone(room);
        }
        let room = Arc::new(Mutex::new(Room::new(room_id, self.rules.clone())));
        self.rooms.insert(room_id.to_string(), Arc::clone(&room));
        info!("room {} created", room_id);
        room
    }

    /// Unregisters a room. The default room is never removed.
    pub fn remove(&mut self, room_id: &str) -> Option<SharedRoom> {
        if self.is_default(room_id) {
            return None;
        }
        let removed = self.rooms.remove(room_id);
        if removed.is_some() {
            info!("room {} removed", room_id);
        }
        removed
    }

    pub fn handles(&self) -> Vec<(String, SharedRoom)> {
        self.rooms
            .iter()
            .map(|(id, room)| (id.clone(), Arc::clone(room)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn rooms_are_created_lazily_and_reused() {
        let mut registry = RoomRegistry::new("default", GameRules::seeded(1));
        assert!(registry.is_empty());
        assert!(registry.get("sala").is_none());

        let first = registry.get_or_create("sala");
        let second = registry.get_or_create("sala");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        assert_eq!(first.lock().await.id(), "sala");
    }

    #[tokio::test]
    async fn default_room_survives_removal() {
        let mut registry = RoomRegistry::new("default", GameRules::seeded(1));
        registry.get_or_create("default");
        registry.get_or_create("other");

        assert!(registry.remove("default").is_none());
        assert!(registry.remove("other").is_some());
        assert!(registry.remove("other").is_none());
        let ids: Vec<String> = registry.handles().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["default".to_string()]);
    }
}
