use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the chat room and the account API.
    Serve(ServeArgs),
    /// Connect to a chat room and participate from the terminal.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address for chat connections. Use port 0 for an ephemeral port.
    #[arg(long, env = "CHAT_ROOM_CHAT_ADDR", default_value = "127.0.0.1:5000")]
    pub chat_listen: SocketAddr,

    /// Address for the HTTP account API. Use port 0 for an ephemeral port.
    #[arg(long, env = "CHAT_ROOM_HTTP_ADDR", default_value = "127.0.0.1:3000")]
    pub http_listen: SocketAddr,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Display name announced to the room.
    #[arg(long)]
    pub name: String,

    /// Address of the chat room to connect to.
    #[arg(long, env = "CHAT_ROOM_SERVER", default_value = "127.0.0.1:5000")]
    pub server: SocketAddr,
}
