use std::io;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

const LINE_ENDINGS: &[char] = &['\n', '\r'];

/// A chat line as typed by a client. The author is whatever the client
/// claims; the server relays it untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub text: String,
}

impl ChatMessage {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Join {
        #[serde(default)]
        name: String,
    },
    Message(ChatMessage),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Message(ChatMessage),
    SystemNotice { text: String },
}

impl ServerEvent {
    pub fn entered(name: &str) -> Self {
        ServerEvent::SystemNotice {
            text: format!("{name} entered the room"),
        }
    }
}

/// Reads the next non-blank line and decodes it.
///
/// Returns `Ok(None)` on EOF. A line that fails to decode surfaces as
/// `io::ErrorKind::InvalidData`; the line has already been consumed, so the
/// caller may keep reading.
pub async fn read_message<R, T>(reader: &mut R) -> io::Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    // Simple line-oriented framing keeps interoperability with netcat-style tools.
    let mut line = String::new();
    loop {
        line.clear();
        let bytes = reader.read_line(&mut line).await?;
        if bytes == 0 {
            return Ok(None);
        }

        let trimmed = line.trim_end_matches(LINE_ENDINGS);
        if trimmed.is_empty() {
            continue;
        }

        let parsed = serde_json::from_str(trimmed).map_err(to_io_error)?;
        return Ok(Some(parsed));
    }
}

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut encoded = serde_json::to_vec(message).map_err(to_io_error)?;
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

fn to_io_error(err: serde_json::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}
