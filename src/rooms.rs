use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Directory {
    /// room name -> member handles
    rooms: HashMap<String, HashSet<String>>,
    /// handle -> room it currently occupies
    occupant: HashMap<String, String>,
}

/// Room name -> member set, plus the reverse handle -> room mapping.
/// Both maps change together under one lock, so a join/leave/switch is
/// a single atomic step and a handle is never in two rooms at once.
/// Rooms exist only while occupied: created on first join, dropped when
/// the last member leaves.
#[derive(Clone, Default)]
pub struct RoomDirectory {
    inner: Arc<Mutex<Directory>>,
}

impl RoomDirectory {
    /// Moves `handle` into `room`, leaving its previous room first.
    /// Rejoining the current room is equivalent to leave + rejoin.
    pub fn join(&self, handle: &str, room: &str) {
        let mut dir = self.inner.lock().expect("room directory poisoned");
        Self::remove_membership(&mut dir, handle);
        dir.rooms
            .entry(room.to_string())
            .or_default()
            .insert(handle.to_string());
        dir.occupant.insert(handle.to_string(), room.to_string());
    }

    /// Removes `handle` from whatever room it occupies; no-op otherwise.
    pub fn leave(&self, handle: &str) {
        let mut dir = self.inner.lock().expect("room directory poisoned");
        Self::remove_membership(&mut dir, handle);
        dir.occupant.remove(handle);
    }

    /// Snapshot of a room's members, taken under the lock so the caller
    /// can fan out without holding it. An unknown room is just empty.
    pub fn members_of(&self, room: &str) -> Vec<String> {
        let dir = self.inner.lock().expect("room directory poisoned");
        dir.rooms
            .get(room)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn room_of(&self, handle: &str) -> Option<String> {
        let dir = self.inner.lock().expect("room directory poisoned");
        dir.occupant.get(handle).cloned()
    }

    pub fn contains_room(&self, room: &str) -> bool {
        let dir = self.inner.lock().expect("room directory poisoned");
        dir.rooms.contains_key(room)
    }

    fn remove_membership(dir: &mut Directory, handle: &str) {
        if let Some(old) = dir.occupant.get(handle).cloned() {
            if let Some(members) = dir.rooms.get_mut(&old) {
                members.remove(handle);
                if members.is_empty() {
                    dir.rooms.remove(&old);
                }
            }
        }
    }
}
