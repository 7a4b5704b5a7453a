//! Lookup of rooms by name.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::coordinator::Room;

/// All rooms managed by this process, keyed by room name.
#[derive(Debug, Default, Clone)]
pub struct RoomRegistry {
    rooms: BTreeMap<String, Arc<Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a room, replacing any room with the same name.
    pub fn insert(&mut self, room: Room) -> Arc<Room> {
        let room = Arc::new(room);
        self.rooms.insert(room.name().to_string(), Arc::clone(&room));
        room
    }

    /// Looks up a room by exact name.
    pub fn get(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rooms.keys().map(String::as_str)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Arc<Room>> {
        self.rooms.values()
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
    use super::*;
    use crate::room::mock::MockDevice;
    use crate::sonos::traits::SonosDevice;

    #[test]
    fn rooms_are_found_by_exact_name() {
        let mut registry = RoomRegistry::new();
        let device: Arc<dyn SonosDevice> = Arc::new(MockDevice::new("d"));
        registry.insert(Room::new("Living Room", vec![device]));

        assert!(registry.get("Living Room").is_some());
        assert!(registry.get("living room").is_none());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["Living Room"]);
    }
}
