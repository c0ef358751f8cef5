use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

/// Outbound sink for one connected client. The connection's writer task
/// drains the other end and appends the newline.
pub type Sink = UnboundedSender<String>;

#[derive(Debug, Error)]
#[error("nickname already in use: {0}")]
pub struct DuplicateHandle(pub String);

/// Handle -> outbound sink for every connected client.
#[derive(Clone, Default)]
pub struct Registry {
    clients: Arc<DashMap<String, Sink>>,
}

impl Registry {
    /// Claims `handle` for a session. The entry API makes the
    /// check-and-insert atomic, so two sessions racing on the same
    /// handle cannot both win.
    pub fn register(&self, handle: &str, sink: Sink) -> Result<(), DuplicateHandle> {
        match self.clients.entry(handle.to_string()) {
            Entry::Occupied(_) => Err(DuplicateHandle(handle.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(sink);
                Ok(())
            }
        }
    }

    /// Idempotent; removing an absent handle is a no-op.
    pub fn unregister(&self, handle: &str) {
        self.clients.remove(handle);
    }

    pub fn lookup(&self, handle: &str) -> Option<Sink> {
        self.clients.get(handle).map(|guard| guard.clone())
    }

    /// Sends `msg` to every currently registered client. The sink list is
    /// snapshotted first so sends happen without holding any map shard.
    /// A sink whose receiver is gone is skipped.
    pub fn broadcast_all(&self, msg: &str) {
        let sinks: Vec<Sink> = self.clients.iter().map(|e| e.value().clone()).collect();
        for sink in sinks {
            let _ = sink.send(msg.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
