//! The single dispatch task that owns the [`FanoutRouter`].
//!
//! Connection tasks never touch the registry directly. They enqueue commands
//! through a [`HubHandle`]; the hub applies them one at a time in arrival
//! order, so every join, message and disconnect runs to completion before the
//! next one starts.

use anyhow::{Context, Result};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::{
    message::ClientEvent,
    registry::{ConnectionId, Outbox},
    router::{ChatPolicy, FanoutRouter},
};

enum Command {
    Accept {
        id: ConnectionId,
        outbox: Outbox,
    },
    Event {
        from: ConnectionId,
        event: ClientEvent,
    },
    Disconnect {
        id: ConnectionId,
    },
    ConnectionCount {
        respond_to: oneshot::Sender<usize>,
    },
    Shutdown,
}

/// Cloneable front door to the hub task.
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl HubHandle {
    pub fn accept(&self, id: ConnectionId, outbox: Outbox) {
        self.submit(Command::Accept { id, outbox });
    }

    pub fn event(&self, from: ConnectionId, event: ClientEvent) {
        self.submit(Command::Event { from, event });
    }

    pub fn disconnect(&self, id: ConnectionId) {
        self.submit(Command::Disconnect { id });
    }

    /// Number of registered connections once every command queued before
    /// this call has been applied.
    pub async fn connection_count(&self) -> Result<usize> {
        let (respond_to, response) = oneshot::channel();
        self.commands
            .send(Command::ConnectionCount { respond_to })
            .ok()
            .context("hub is not running")?;
        response.await.context("hub dropped the count request")
    }

    /// Stops the hub. Every outbox is dropped with the router, which closes
    /// the writer side of each connection.
    pub fn shutdown(&self) {
        self.submit(Command::Shutdown);
    }

    fn submit(&self, command: Command) {
        // The hub only stops on shutdown; late commands from connections that
        // are still winding down have nowhere to go.
        if self.commands.send(command).is_err() {
            debug!("hub stopped; command discarded");
        }
    }
}

pub struct Hub {
    router: FanoutRouter,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl Hub {
    pub fn new(policy: ChatPolicy) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Self {
            router: FanoutRouter::new(policy),
            commands: rx,
        };
        (hub, HubHandle { commands: tx })
    }

    /// Spawns the hub on the current runtime.
    pub fn spawn(policy: ChatPolicy) -> (JoinHandle<()>, HubHandle) {
        let (hub, handle) = Self::new(policy);
        (tokio::spawn(hub.run()), handle)
    }

    pub async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Accept { id, outbox } => self.router.accept(id, outbox),
                Command::Event { from, event } => {
                    self.router.dispatch(from, event);
                }
                Command::Disconnect { id } => self.router.disconnect(id),
                Command::ConnectionCount { respond_to } => {
                    let _ = respond_to.send(self.router.registry().len());
                }
                Command::Shutdown => break,
            }
        }
        info!(open = self.router.registry().len(), "hub stopped");
    }
}
