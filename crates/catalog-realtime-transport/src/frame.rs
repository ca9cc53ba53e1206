//! STOMP 1.2 frame encoding and decoding.
//!
//! Frames travel as WebSocket text messages. A single message may carry
//! several NUL-terminated frames and any number of bare end-of-line
//! heart-beats, all of which [`StompFrame::decode_all`] understands.

use std::fmt;

use crate::error::{TransportError, TransportResult};

/// STOMP commands used by the notification client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StompCommand {
    /// Client handshake.
    Connect,
    /// Broker handshake answer.
    Connected,
    /// Client publish.
    Send,
    /// Client subscription request.
    Subscribe,
    /// Client subscription removal.
    Unsubscribe,
    /// Graceful client shutdown.
    Disconnect,
    /// Broker delivery on a subscription.
    Message,
    /// Broker acknowledgement of a `receipt` header.
    Receipt,
    /// Broker error; the broker closes the connection afterwards.
    Error,
}

impl StompCommand {
    /// Wire spelling of the command.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    fn parse(line: &str) -> TransportResult<Self> {
        Ok(match line {
            "CONNECT" | "STOMP" => Self::Connect,
            "CONNECTED" => Self::Connected,
            "SEND" => Self::Send,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "DISCONNECT" => Self::Disconnect,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            other => {
                return Err(TransportError::InvalidFrame(format!(
                    "unknown command '{other}'"
                )));
            }
        })
    }

    /// CONNECT and CONNECTED headers are never escaped.
    const fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Connected)
    }
}

impl fmt::Display for StompCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StompFrame {
    /// Frame command.
    pub command: StompCommand,
    /// Headers in wire order. Repeated names are allowed; the first one wins.
    pub headers: Vec<(String, String)>,
    /// Frame body, empty for control frames.
    pub body: String,
}

impl StompFrame {
    /// Create a frame without headers or body.
    pub fn new(command: StompCommand) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Append a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Value of the first header with the given name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Build a CONNECT frame.
    pub fn connect<'a>(
        host: &str,
        heartbeat: &str,
        extra: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Self {
        let mut frame = Self::new(StompCommand::Connect)
            .header("accept-version", crate::config::ACCEPT_VERSIONS)
            .header("host", host)
            .header("heart-beat", heartbeat);
        for (name, value) in extra {
            frame = frame.header(name.clone(), value.clone());
        }
        frame
    }

    /// Build a SUBSCRIBE frame with automatic acknowledgement.
    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(StompCommand::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    /// Build a DISCONNECT frame asking for a receipt.
    pub fn disconnect(receipt: &str) -> Self {
        Self::new(StompCommand::Disconnect).header("receipt", receipt)
    }

    /// Encode the frame including the trailing NUL octet.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        let escape = self.command.escapes_headers();
        for (name, value) in &self.headers {
            if escape {
                push_escaped(&mut out, name);
                out.push(':');
                push_escaped(&mut out, value);
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.push_str("content-length:");
            out.push_str(&self.body.len().to_string());
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Decode every frame in a WebSocket text message.
    ///
    /// Bare EOLs between frames are heart-beats and produce no frame, so a
    /// heart-beat-only message decodes to an empty vector.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidFrame`] for unknown commands,
    /// malformed headers, bad escapes, missing NUL terminators or a
    /// `content-length` that does not fit the message.
    pub fn decode_all(input: &str) -> TransportResult<Vec<Self>> {
        let mut frames = Vec::new();
        let mut rest = input;
        loop {
            rest = rest.trim_start_matches(['\r', '\n']);
            if rest.is_empty() {
                return Ok(frames);
            }
            let (frame, remaining) = Self::decode_one(rest)?;
            frames.push(frame);
            rest = remaining;
        }
    }

    fn decode_one(input: &str) -> TransportResult<(Self, &str)> {
        let (command_line, mut rest) = split_line(input)
            .ok_or_else(|| TransportError::InvalidFrame("missing command line".to_string()))?;
        let command = StompCommand::parse(command_line)?;

        let mut headers = Vec::new();
        loop {
            let (line, remaining) = split_line(rest).ok_or_else(|| {
                TransportError::InvalidFrame("unterminated header block".to_string())
            })?;
            rest = remaining;
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':').ok_or_else(|| {
                TransportError::InvalidFrame(format!("header without ':' in '{line}'"))
            })?;
            if command.escapes_headers() {
                headers.push((unescape(name)?, unescape(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let content_length = headers
            .iter()
            .find(|(key, _)| key == "content-length")
            .map(|(_, value)| {
                value.trim().parse::<usize>().map_err(|_| {
                    TransportError::InvalidFrame(format!("bad content-length '{value}'"))
                })
            })
            .transpose()?;

        let body_end = match content_length {
            Some(len) => {
                if rest.len() < len || !rest.is_char_boundary(len) {
                    return Err(TransportError::InvalidFrame(format!(
                        "content-length {len} exceeds remaining {} bytes",
                        rest.len()
                    )));
                }
                if rest.as_bytes().get(len) != Some(&0) {
                    return Err(TransportError::InvalidFrame(
                        "body not followed by NUL".to_string(),
                    ));
                }
                len
            }
            None => rest.find('\0').ok_or_else(|| {
                TransportError::InvalidFrame("frame missing NUL terminator".to_string())
            })?,
        };

        let frame = Self {
            command,
            headers,
            body: rest[..body_end].to_string(),
        };
        Ok((frame, &rest[body_end + 1..]))
    }
}

fn split_line(input: &str) -> Option<(&str, &str)> {
    let (line, rest) = input.split_once('\n')?;
    Some((line.strip_suffix('\r').unwrap_or(line), rest))
}

fn push_escaped(out: &mut String, raw: &str) {
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
}

fn unescape(raw: &str) -> TransportResult<String> {
    if !raw.contains('\\') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(TransportError::InvalidFrame(format!(
                    "undefined header escape '\\{}'",
                    other.map(String::from).unwrap_or_default()
                )));
            }
        }
    }
    Ok(out)
}
