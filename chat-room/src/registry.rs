//! Bookkeeping of open connections and the display name each one claims.
//!
//! The registry is a plain owned map. It is never shared between tasks: the
//! dispatch task in [`crate::hub`] owns it (through the router) and applies
//! every mutation in sequence, so no locking is needed around it.

use std::{collections::HashMap, fmt};

use tokio::sync::mpsc;

use crate::message::ServerEvent;

/// Display name used until a connection joins with a usable name.
pub const ANONYMOUS: &str = "Anonymous";

/// Outbound queue of one connection. A writer task drains it onto the socket.
pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug)]
pub struct Connection {
    display_name: String,
    outbox: Outbox,
}

impl Connection {
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly accepted connection under the anonymous name.
    ///
    /// # Panics
    /// If `id` is already registered. Ids come from a monotonic counter in the
    /// accept loop, so a repeat means the transport handed out an id twice.
    pub fn accept(&mut self, id: ConnectionId, outbox: Outbox) {
        let previous = self.connections.insert(
            id,
            Connection {
                display_name: ANONYMOUS.to_string(),
                outbox,
            },
        );
        assert!(previous.is_none(), "connection {id} accepted twice");
    }

    /// Overwrites the display name of `id` and returns the name now in effect.
    ///
    /// Blank names fall back to [`ANONYMOUS`]. Returns `None` when `id` is not
    /// registered.
    pub fn join(&mut self, id: ConnectionId, name: &str) -> Option<&str> {
        let connection = self.connections.get_mut(&id)?;
        let name = name.trim();
        connection.display_name = if name.is_empty() {
            ANONYMOUS.to_string()
        } else {
            name.to_string()
        };
        Some(connection.display_name.as_str())
    }

    /// Removes `id`. Removing an unknown id is a no-op and returns `None`.
    pub fn disconnect(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Ids of every registered connection, in no particular order.
    pub fn list_all(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.connections.keys().copied()
    }

    /// Ids of every registered connection except `exclude`.
    pub fn list_others(&self, exclude: ConnectionId) -> impl Iterator<Item = ConnectionId> + '_ {
        self.list_all().filter(move |id| *id != exclude)
    }
}
