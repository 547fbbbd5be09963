//! A shared chat room with an account API, served from one process.
//!
//! - [`cli`] parses the command line for server and client modes.
//! - [`message`] defines the JSON line protocol and async read/write helpers.
//! - [`registry`] tracks open connections and the name each one claims.
//! - [`router`] picks the recipients of joins and chat messages and enqueues
//!   a copy for each.
//! - [`hub`] runs the router on a single task so every event is applied in
//!   sequence.
//! - [`server`] accepts TCP connections and pumps bytes between sockets and
//!   the hub.
//! - [`client`] is the terminal client.
//! - [`accounts`] and [`http`] provide registration and login over HTTP.

pub mod accounts;
pub mod cli;
pub mod client;
pub mod http;
pub mod hub;
pub mod message;
pub mod registry;
pub mod router;
pub mod server;
