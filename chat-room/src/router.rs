//! Decides who receives each inbound event and hands them a copy.
//!
//! Delivery is a non-blocking enqueue onto each recipient's [`Outbox`]. A
//! recipient whose queue is closed is skipped and logged; the remaining
//! recipients are still served. Nothing is ever reported back to the sender.
//!
//! Chat messages go to every connection *including* the sender
//! ([`ChatPolicy::IncludeSender`]). The sender's client then renders the
//! server's copy instead of a local echo, so every participant observes the
//! same order of messages.
//!
//! [`Outbox`]: crate::registry::Outbox

use tracing::{debug, info, warn};

use crate::{
    message::{ChatMessage, ClientEvent, ServerEvent},
    registry::{ConnectionId, ConnectionRegistry, Outbox},
};

/// Recipient set for chat messages. Fixed for the lifetime of a router.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChatPolicy {
    #[default]
    IncludeSender,
    ExcludeSender,
}

/// Outcome of one fanout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Recipients selected by the policy.
    pub attempted: usize,
    /// Recipients whose queue accepted the event.
    pub delivered: usize,
}

impl Delivery {
    pub fn failed(&self) -> usize {
        self.attempted - self.delivered
    }
}

#[derive(Debug, Default)]
pub struct FanoutRouter {
    registry: ConnectionRegistry,
    policy: ChatPolicy,
}

impl FanoutRouter {
    pub fn new(policy: ChatPolicy) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            policy,
        }
    }

    pub fn policy(&self) -> ChatPolicy {
        self.policy
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn accept(&mut self, id: ConnectionId, outbox: Outbox) {
        self.registry.accept(id, outbox);
        info!(connection = %id, online = self.registry.len(), "connection accepted");
    }

    /// Routes one client event. Events from ids that are not registered
    /// (already closed) are dropped and yield `None`.
    pub fn dispatch(&mut self, from: ConnectionId, event: ClientEvent) -> Option<Delivery> {
        match event {
            ClientEvent::Join { name } => self.join(from, &name),
            ClientEvent::Message(message) => self.chat(from, message),
        }
    }

    /// Records the sender's display name and tells everyone else it arrived.
    pub fn join(&mut self, from: ConnectionId, name: &str) -> Option<Delivery> {
        let Some(name) = self.registry.join(from, name) else {
            debug!(connection = %from, "dropping join from closed connection");
            return None;
        };
        let notice = ServerEvent::entered(name);
        info!(connection = %from, name, "participant joined");

        let delivery = self.deliver(self.registry.list_others(from), &notice);
        Some(delivery)
    }

    /// Relays a chat message verbatim according to the router's policy.
    pub fn chat(&mut self, from: ConnectionId, message: ChatMessage) -> Option<Delivery> {
        if !self.registry.contains(from) {
            debug!(connection = %from, "dropping message from closed connection");
            return None;
        }

        let event = ServerEvent::Message(message);
        let delivery = match self.policy {
            ChatPolicy::IncludeSender => self.deliver(self.registry.list_all(), &event),
            ChatPolicy::ExcludeSender => self.deliver(self.registry.list_others(from), &event),
        };
        debug!(
            connection = %from,
            attempted = delivery.attempted,
            delivered = delivery.delivered,
            "message relayed"
        );
        Some(delivery)
    }

    /// Forgets `id`. Peers are not notified. Safe to repeat.
    pub fn disconnect(&mut self, id: ConnectionId) {
        if let Some(connection) = self.registry.disconnect(id) {
            info!(
                connection = %id,
                name = connection.display_name(),
                online = self.registry.len(),
                "connection closed"
            );
        }
    }

    fn deliver<I>(&self, recipients: I, event: &ServerEvent) -> Delivery
    where
        I: Iterator<Item = ConnectionId>,
    {
        let mut delivery = Delivery::default();
        for id in recipients {
            let Some(connection) = self.registry.get(id) else {
                continue;
            };
            delivery.attempted += 1;
            match connection.outbox().send(event.clone()) {
                Ok(()) => delivery.delivered += 1,
                Err(_) => warn!(connection = %id, "outbound queue closed; skipping recipient"),
            }
        }
        delivery
    }
}
