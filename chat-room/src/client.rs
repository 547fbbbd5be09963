//! Terminal client for the chat room.
//!
//! Socket and stdin are each read by their own long-lived reader, which hands
//! whole events or lines to the session loop over a channel. The loop only
//! ever waits on channel receives, so picking one source never abandons a
//! half-read line from the other.

use std::io::BufRead;

use anyhow::{Context, Result};
use tokio::{
    io::{self, AsyncBufRead, AsyncWriteExt, BufReader},
    net::{TcpStream, tcp::OwnedWriteHalf},
    select,
    sync::mpsc,
};
use tracing::{info, warn};

use crate::{
    cli::ClientArgs,
    message::{ChatMessage, ClientEvent, ServerEvent, read_message, write_message},
};

/// What a line typed at the prompt asks for.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Say(&'a str),
    Quit,
    Blank,
}

fn parse_input(line: &str) -> Input<'_> {
    let text = line.trim_end_matches(['\r', '\n']);
    if text.trim().is_empty() {
        Input::Blank
    } else if text.trim().eq_ignore_ascii_case("/quit") {
        Input::Quit
    } else {
        Input::Say(text)
    }
}

fn render(event: &ServerEvent) -> String {
    match event {
        ServerEvent::Message(ChatMessage { author, text }) => format!("<{author}> {text}"),
        ServerEvent::SystemNotice { text } => format!("*** {text}"),
    }
}

pub async fn run(args: ClientArgs) -> Result<()> {
    let stream = TcpStream::connect(args.server)
        .await
        .with_context(|| format!("failed to connect to {}", args.server))?;
    info!(server = %args.server, "connected");

    let (reader, writer) = stream.into_split();
    let mut session = Session {
        name: args.name.clone(),
        writer,
    };
    session.send(ClientEvent::Join { name: args.name }).await?;
    print_line(&format!("*** connected as {}", session.name)).await?;

    let events = spawn_event_reader(BufReader::new(reader));
    let lines = spawn_line_reader(std::io::BufReader::new(std::io::stdin()));
    session.run(events, lines).await?;

    if let Err(err) = session.writer.shutdown().await {
        warn!(error = ?err, "failed to shut down connection cleanly");
    }
    Ok(())
}

struct Session {
    name: String,
    writer: OwnedWriteHalf,
}

impl Session {
    async fn run(
        &mut self,
        mut events: mpsc::UnboundedReceiver<io::Result<ServerEvent>>,
        mut lines: mpsc::UnboundedReceiver<io::Result<String>>,
    ) -> Result<()> {
        loop {
            select! {
                event = events.recv() => match event {
                    Some(Ok(event)) => print_line(&render(&event)).await?,
                    Some(Err(err)) => return Err(err).context("lost connection to the chat room"),
                    None => {
                        print_line("*** server closed the connection").await?;
                        return Ok(());
                    }
                },
                line = lines.recv() => match line {
                    Some(Ok(line)) => {
                        if !self.handle_input(&line).await? {
                            return Ok(());
                        }
                    }
                    Some(Err(err)) => return Err(err).context("failed to read stdin"),
                    None => return Ok(()),
                },
                ctrl_c = tokio::signal::ctrl_c() => {
                    if let Err(err) = ctrl_c {
                        warn!(error = ?err, "ctrl-c handler failed");
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Returns `false` once the user asked to leave.
    async fn handle_input(&mut self, line: &str) -> Result<bool> {
        match parse_input(line) {
            Input::Blank => Ok(true),
            Input::Quit => {
                print_line("*** leaving chat").await?;
                Ok(false)
            }
            Input::Say(text) => {
                let message = ChatMessage::new(self.name.as_str(), text);
                self.send(ClientEvent::Message(message)).await?;
                Ok(true)
            }
        }
    }

    async fn send(&mut self, event: ClientEvent) -> Result<()> {
        write_message(&mut self.writer, &event)
            .await
            .context("failed to send to the chat room")
    }
}

/// Decodes server events on a dedicated task. The channel closes when the
/// server does; an I/O error is forwarded once before closing.
fn spawn_event_reader<R>(mut reader: R) -> mpsc::UnboundedReceiver<io::Result<ServerEvent>>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            match read_message::<_, ServerEvent>(&mut reader).await {
                Ok(Some(event)) => {
                    if tx.send(Ok(event)).is_err() {
                        return;
                    }
                }
                Ok(None) => return,
                Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                    warn!(error = %err, "ignoring unreadable server event");
                }
                Err(err) => {
                    let _ = tx.send(Err(err));
                    return;
                }
            }
        }
    });
    rx
}

/// Reads lines on a plain OS thread. A blocking stdin read cannot be
/// cancelled, and a runtime blocking task would hold up process exit until
/// the user pressed enter.
fn spawn_line_reader<R>(input: R) -> mpsc::UnboundedReceiver<io::Result<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in input.lines() {
            let failed = line.is_err();
            if tx.send(line).is_err() || failed {
                return;
            }
        }
    });
    rx
}

async fn print_line(line: &str) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[test]
    fn input_parsing() {
        assert_eq!(parse_input("hello there\n"), Input::Say("hello there"));
        assert_eq!(parse_input("  indented"), Input::Say("  indented"));
        assert_eq!(parse_input("/QUIT\r\n"), Input::Quit);
        assert_eq!(parse_input("   \n"), Input::Blank);
    }

    #[test]
    fn rendering() {
        let chat = ServerEvent::Message(ChatMessage::new("alice", "hi"));
        assert_eq!(render(&chat), "<alice> hi");
        assert_eq!(render(&ServerEvent::entered("bob")), "*** bob entered the room");
    }

    #[tokio::test]
    async fn split_server_line_survives_a_competing_wakeup() {
        let (mut server, socket) = tokio::io::duplex(1024);
        let mut events = spawn_event_reader(BufReader::new(socket));

        let encoded = serde_json::to_string(&ServerEvent::Message(ChatMessage::new(
            "alice",
            "a message long enough to arrive in pieces",
        )))
        .expect("encode");
        let (head, tail) = encoded.split_at(20);

        server.write_all(head.as_bytes()).await.expect("write head");
        // The session loop would service stdin here and come back later.
        assert!(
            timeout(Duration::from_millis(50), events.recv())
                .await
                .is_err(),
            "no event before the line is complete"
        );

        server.write_all(tail.as_bytes()).await.expect("write tail");
        server.write_all(b"\n").await.expect("write newline");

        let event = timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("event arrives")
            .expect("reader still open")
            .expect("line decodes");
        assert_eq!(
            event,
            ServerEvent::Message(ChatMessage::new(
                "alice",
                "a message long enough to arrive in pieces"
            ))
        );
    }

    #[tokio::test]
    async fn event_reader_closes_on_eof() {
        let (server, socket) = tokio::io::duplex(64);
        let mut events = spawn_event_reader(BufReader::new(socket));
        drop(server);

        let next = timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("reader finishes");
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn line_reader_forwards_every_line() {
        let input = std::io::Cursor::new(b"first\nsecond\n".to_vec());
        let mut lines = spawn_line_reader(input);

        assert_eq!(lines.recv().await.map(Result::ok), Some(Some("first".into())));
        assert_eq!(lines.recv().await.map(Result::ok), Some(Some("second".into())));
        assert!(lines.recv().await.is_none());
    }
}
