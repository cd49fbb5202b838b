use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the server listener, the per-connection broker
/// limits, the interactive client and logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub client: ClientSettings,
    pub log: LogSettings,
}

/// Address the server binds to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Per-connection framing limits, shared by server sessions and clients.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    /// Longest partial frame tolerated in a receive accumulator.
    pub max_frame_bytes: usize,
    /// Size of the scratch buffer handed to each socket read.
    pub read_buffer_bytes: usize,
}

/// Defaults for the interactive client.
#[derive(Debug, Deserialize, Clone)]
pub struct ClientSettings {
    pub host: String,
    pub port: u16,
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub client: Option<PartialClientSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialBrokerSettings {
    pub max_frame_bytes: Option<usize>,
    pub read_buffer_bytes: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialClientSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            max_frame_bytes: 64 * 1024,
            read_buffer_bytes: 1024,
        }
    }
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 7878,
            },
            broker: BrokerSettings::default(),
            client: ClientSettings {
                host: "127.0.0.1".to_string(),
                port: 7878,
                name: "client".to_string(),
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Fill every missing value from `default`.
    pub fn merge_over(self, default: Settings) -> Settings {
        let server = self.server.unwrap_or_default();
        let broker = self.broker.unwrap_or_default();
        let client = self.client.unwrap_or_default();
        let log = self.log.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(default.server.host),
                port: server.port.unwrap_or(default.server.port),
            },
            broker: BrokerSettings {
                max_frame_bytes: broker
                    .max_frame_bytes
                    .unwrap_or(default.broker.max_frame_bytes),
                read_buffer_bytes: broker
                    .read_buffer_bytes
                    .unwrap_or(default.broker.read_buffer_bytes),
            },
            client: ClientSettings {
                host: client.host.unwrap_or(default.client.host),
                port: client.port.unwrap_or(default.client.port),
                name: client.name.unwrap_or(default.client.name),
            },
            log: LogSettings {
                level: log.level.unwrap_or(default.log.level),
            },
        }
    }
}
