use crate::registry::Registry;
use crate::rooms::RoomDirectory;

/// Shared state handed to every connection task.
#[derive(Clone, Default)]
pub struct ServerState {
    pub registry: Registry,
    pub rooms: RoomDirectory,
}

impl ServerState {
    /// Room-cast: sends `msg` to every current member of `room`. The
    /// member list is a snapshot; a member whose registry entry is
    /// already gone is skipped rather than treated as an error.
    pub fn send_to_room(&self, room: &str, msg: &str) {
        for member in self.rooms.members_of(room) {
            if let Some(sink) = self.registry.lookup(&member) {
                let _ = sink.send(msg.to_string());
            }
        }
    }
}
