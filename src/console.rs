//! Interactive console commands
//!
//! Parses one line typed by a human into a [`ConsoleCommand`] for the client
//! binary to execute against a [`crate::client::PubSubClient`]. The console
//! does no protocol framing of its own.

use thiserror::Error;

pub const HELP: &str = "\
Available commands:
  CONNECT [[host] port [name]]
                          - Connect to the server (configured address and name by default)
  DISCONNECT              - Disconnect from the server
  PUBLISH <topic> <data>  - Publish a message to a topic
  SUBSCRIBE <topic>       - Subscribe to a topic
  UNSUBSCRIBE <topic>     - Unsubscribe from a topic
  HELP                    - Display this help message
  QUIT                    - Disconnect and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Connect {
        host: Option<String>,
        port: Option<u16>,
        name: Option<String>,
    },
    Disconnect,
    Publish { topic: String, data: String },
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    Help,
    Quit,
    Empty,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("invalid {command} command. Usage: {usage}")]
    Usage {
        command: &'static str,
        usage: &'static str,
    },
    #[error("unknown command '{0}'. Type 'HELP' for a list of commands.")]
    Unknown(String),
}

impl ConsoleCommand {
    /// Parse one console line. Command keywords are case-insensitive.
    pub fn parse(line: &str) -> Result<Self, ConsoleError> {
        let line = line.trim();
        let (keyword, rest) = match line.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim_start()),
            None => (line, ""),
        };

        match keyword.to_uppercase().as_str() {
            "" => Ok(ConsoleCommand::Empty),
            "CONNECT" => parse_connect(rest),
            "DISCONNECT" => Ok(ConsoleCommand::Disconnect),
            "PUBLISH" => match rest.split_once(char::is_whitespace) {
                Some((topic, data)) => Ok(ConsoleCommand::Publish {
                    topic: topic.to_string(),
                    data: data.to_string(),
                }),
                None if !rest.is_empty() => Ok(ConsoleCommand::Publish {
                    topic: rest.to_string(),
                    data: String::new(),
                }),
                None => Err(usage("PUBLISH", "PUBLISH <topic> <data>")),
            },
            "SUBSCRIBE" => single_topic(rest, "SUBSCRIBE", "SUBSCRIBE <topic>")
                .map(|topic| ConsoleCommand::Subscribe { topic }),
            "UNSUBSCRIBE" => single_topic(rest, "UNSUBSCRIBE", "UNSUBSCRIBE <topic>")
                .map(|topic| ConsoleCommand::Unsubscribe { topic }),
            "HELP" => Ok(ConsoleCommand::Help),
            "QUIT" | "EXIT" => Ok(ConsoleCommand::Quit),
            _ => Err(ConsoleError::Unknown(keyword.to_string())),
        }
    }
}

/// `CONNECT`, `CONNECT port [name]` or `CONNECT host port [name]`. A first
/// argument that parses as a port is a port, never a host.
fn parse_connect(rest: &str) -> Result<ConsoleCommand, ConsoleError> {
    let err = || usage("CONNECT", "CONNECT [[host] port [name]]");
    let args: Vec<&str> = rest.split_whitespace().collect();
    let (host, port, name) = match args.as_slice() {
        [] => return Ok(connect(None, None, None)),
        [port] => (None, *port, None),
        [first, second] => match first.parse::<u16>() {
            Ok(port) => return Ok(connect(None, Some(port), Some(*second))),
            Err(_) => (Some(*first), *second, None),
        },
        [host, port, name] => (Some(*host), *port, Some(*name)),
        _ => return Err(err()),
    };
    let port = port.parse().map_err(|_| err())?;
    Ok(connect(host, Some(port), name))
}

fn connect(host: Option<&str>, port: Option<u16>, name: Option<&str>) -> ConsoleCommand {
    ConsoleCommand::Connect {
        host: host.map(str::to_string),
        port,
        name: name.map(str::to_string),
    }
}

fn single_topic(
    rest: &str,
    command: &'static str,
    usage_line: &'static str,
) -> Result<String, ConsoleError> {
    let mut args = rest.split_whitespace();
    match (args.next(), args.next()) {
        (Some(topic), None) => Ok(topic.to_string()),
        _ => Err(usage(command, usage_line)),
    }
}

fn usage(command: &'static str, usage: &'static str) -> ConsoleError {
    ConsoleError::Usage { command, usage }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_connect_with_and_without_host() {
        assert_eq!(
            ConsoleCommand::parse("CONNECT 7878"),
            Ok(connect(None, Some(7878), None))
        );
        assert_eq!(
            ConsoleCommand::parse("connect example.org 9000"),
            Ok(connect(Some("example.org"), Some(9000), None))
        );
        assert_eq!(ConsoleCommand::parse("CONNECT"), Ok(connect(None, None, None)));
        assert!(matches!(
            ConsoleCommand::parse("CONNECT a b c d"),
            Err(ConsoleError::Usage { command: "CONNECT", .. })
        ));
        assert!(ConsoleCommand::parse("CONNECT host notaport").is_err());
        assert!(ConsoleCommand::parse("CONNECT host notaport name").is_err());
    }

    #[test]
    fn parses_connect_with_client_name() {
        assert_eq!(
            ConsoleCommand::parse("CONNECT 7878 sensor1"),
            Ok(connect(None, Some(7878), Some("sensor1")))
        );
        assert_eq!(
            ConsoleCommand::parse("CONNECT localhost 7878 sensor1"),
            Ok(connect(Some("localhost"), Some(7878), Some("sensor1")))
        );
    }

    #[test]
    fn publish_keeps_data_verbatim() {
        assert_eq!(
            ConsoleCommand::parse("PUBLISH news hello   world"),
            Ok(ConsoleCommand::Publish {
                topic: "news".to_string(),
                data: "hello   world".to_string()
            })
        );
        assert_eq!(
            ConsoleCommand::parse("PUBLISH news"),
            Ok(ConsoleCommand::Publish {
                topic: "news".to_string(),
                data: String::new()
            })
        );
        assert!(ConsoleCommand::parse("PUBLISH").is_err());
    }

    #[test]
    fn subscribe_requires_exactly_one_topic() {
        assert_eq!(
            ConsoleCommand::parse("SUBSCRIBE t"),
            Ok(ConsoleCommand::Subscribe {
                topic: "t".to_string()
            })
        );
        assert!(ConsoleCommand::parse("SUBSCRIBE").is_err());
        assert!(ConsoleCommand::parse("UNSUBSCRIBE a b").is_err());
    }

    #[test]
    fn other_commands() {
        assert_eq!(ConsoleCommand::parse("  "), Ok(ConsoleCommand::Empty));
        assert_eq!(ConsoleCommand::parse("help"), Ok(ConsoleCommand::Help));
        assert_eq!(ConsoleCommand::parse("DISCONNECT"), Ok(ConsoleCommand::Disconnect));
        assert_eq!(ConsoleCommand::parse("quit"), Ok(ConsoleCommand::Quit));
        assert_eq!(
            ConsoleCommand::parse("NOPE a"),
            Err(ConsoleError::Unknown("NOPE".to_string()))
        );
    }
}
