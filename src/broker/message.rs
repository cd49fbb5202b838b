//! Wire message codec
//!
//! `Message` is the command exchanged between clients and the server. Every
//! frame on the wire is one line of text terminated by [`DELIMITER`]:
//!
//! | Command     | Line                        |
//! |-------------|-----------------------------|
//! | CONNECT     | `CONNECT <client_name>`     |
//! | DISCONNECT  | `DISCONNECT`                |
//! | SUBSCRIBE   | `SUBSCRIBE <topic>`         |
//! | UNSUBSCRIBE | `UNSUBSCRIBE <topic>`       |
//! | PUBLISH     | `PUBLISH <topic> <data>`    |
//!
//! PUBLISH data runs to the end of the line. Decoding strips exactly one
//! separator after the topic and keeps everything else verbatim, so leading,
//! trailing and repeated spaces inside the data survive a round trip.
//!
//! Decoding is total: anything that is not a well-formed command becomes
//! [`Message::Unknown`]. Encoding is not checked; senders call
//! [`Message::validate`] first so that one message is always one frame.

use std::fmt;

use bytes::Bytes;

use crate::utils::{Error, Result};

/// Frame terminator. Payloads must not contain it.
pub const DELIMITER: u8 = b'\n';

pub const CONNECT: &str = "CONNECT";
pub const DISCONNECT: &str = "DISCONNECT";
pub const PUBLISH: &str = "PUBLISH";
pub const SUBSCRIBE: &str = "SUBSCRIBE";
pub const UNSUBSCRIBE: &str = "UNSUBSCRIBE";
pub const UNKNOWN: &str = "UNKNOWN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Connect { client_name: String },
    Disconnect,
    Publish { topic: String, data: String },
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    Unknown,
}

impl Message {
    pub fn connect(client_name: impl Into<String>) -> Self {
        Message::Connect {
            client_name: client_name.into(),
        }
    }

    pub fn publish(topic: impl Into<String>, data: impl Into<String>) -> Self {
        Message::Publish {
            topic: topic.into(),
            data: data.into(),
        }
    }

    pub fn subscribe(topic: impl Into<String>) -> Self {
        Message::Subscribe {
            topic: topic.into(),
        }
    }

    pub fn unsubscribe(topic: impl Into<String>) -> Self {
        Message::Unsubscribe {
            topic: topic.into(),
        }
    }

    /// The command keyword this message is sent as.
    pub fn command(&self) -> &'static str {
        match self {
            Message::Connect { .. } => CONNECT,
            Message::Disconnect => DISCONNECT,
            Message::Publish { .. } => PUBLISH,
            Message::Subscribe { .. } => SUBSCRIBE,
            Message::Unsubscribe { .. } => UNSUBSCRIBE,
            Message::Unknown => UNKNOWN,
        }
    }

    /// Check that the message encodes to a single frame that decodes back to
    /// the same message: names and topics are one non-empty token and data
    /// holds no delimiter.
    pub fn validate(&self) -> Result<()> {
        match self {
            Message::Connect { client_name } => check_token(CONNECT, "client name", client_name),
            Message::Disconnect => Ok(()),
            Message::Publish { topic, data } => {
                check_token(PUBLISH, "topic", topic)?;
                if data.contains(DELIMITER as char) {
                    return Err(invalid(PUBLISH, "data contains a line break"));
                }
                Ok(())
            }
            Message::Subscribe { topic } => check_token(SUBSCRIBE, "topic", topic),
            Message::Unsubscribe { topic } => check_token(UNSUBSCRIBE, "topic", topic),
            Message::Unknown => Err(invalid(UNKNOWN, "not a sendable command")),
        }
    }

    /// Render the message as one delimiter-terminated frame.
    pub fn encode(&self) -> Bytes {
        let mut line = self.to_string();
        line.push(DELIMITER as char);
        Bytes::from(line)
    }

    /// Decode one frame (with or without its trailing delimiter).
    pub fn decode(frame: &[u8]) -> Message {
        let frame = frame.strip_suffix(&[DELIMITER]).unwrap_or(frame);
        Self::decode_line(&String::from_utf8_lossy(frame))
    }

    /// Decode one line of text. Never fails; malformed input is `Unknown`.
    pub fn decode_line(line: &str) -> Message {
        let Some((command, rest)) = next_token(line) else {
            return Message::Unknown;
        };

        match command {
            CONNECT => match next_token(rest) {
                Some((client_name, _)) => Message::connect(client_name),
                None => Message::Unknown,
            },
            DISCONNECT => Message::Disconnect,
            PUBLISH => match next_token(rest) {
                Some((topic, data)) => Message::publish(topic, strip_separator(data)),
                None => Message::Unknown,
            },
            SUBSCRIBE => match next_token(rest) {
                Some((topic, _)) => Message::subscribe(topic),
                None => Message::Unknown,
            },
            UNSUBSCRIBE => match next_token(rest) {
                Some((topic, _)) => Message::unsubscribe(topic),
                None => Message::Unknown,
            },
            _ => Message::Unknown,
        }
    }
}

impl fmt::Display for Message {
    /// The frame text without its delimiter.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Connect { client_name } => write!(f, "{CONNECT} {client_name}"),
            Message::Disconnect => f.write_str(DISCONNECT),
            Message::Publish { topic, data } => write!(f, "{PUBLISH} {topic} {data}"),
            Message::Subscribe { topic } => write!(f, "{SUBSCRIBE} {topic}"),
            Message::Unsubscribe { topic } => write!(f, "{UNSUBSCRIBE} {topic}"),
            Message::Unknown => f.write_str(UNKNOWN),
        }
    }
}

/// Split off the next whitespace-delimited token, returning it and the
/// unconsumed remainder (which starts at the whitespace following the token).
fn next_token(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    let end = input.find(char::is_whitespace).unwrap_or(input.len());
    Some(input.split_at(end))
}

/// Drop exactly one leading separator character, if present.
fn strip_separator(input: &str) -> &str {
    let mut chars = input.chars();
    match chars.next() {
        Some(c) if c.is_whitespace() => chars.as_str(),
        _ => input,
    }
}

fn check_token(command: &'static str, what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        Err(invalid(command, format!("{what} is empty")))
    } else if value.contains(char::is_whitespace) {
        Err(invalid(command, format!("{what} contains whitespace")))
    } else {
        Ok(())
    }
}

fn invalid(command: &'static str, reason: impl Into<String>) -> Error {
    Error::InvalidMessage {
        command,
        reason: reason.into(),
    }
}
