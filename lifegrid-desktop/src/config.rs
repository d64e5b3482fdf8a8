//! Process configuration from the environment.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `LIFEGRID_SERVICE_URL` | `localhost:5000` | server `host:port` (a `ws://`/`wss://` prefix is kept) |
//! | `LIFEGRID_RETRY_MS` | `250` | initial reconnect delay |
//! | `LIFEGRID_MAX_RETRY_MS` | `10000` | reconnect delay cap |
//! | `LIFEGRID_CONNECT_TIMEOUT_MS` | `5000` | connect plus handshake limit per attempt |
//! | `LIFEGRID_WATCHDOG_MS` | `1000` | missing-transport check interval |
//! | `LIFEGRID_NAME` | unset | register automatically with this name |
//! | `LIFEGRID_COLOR` | `FFFFFF` | colour for automatic registration |

use std::time::Duration;

use lifegrid_collab::ClientConfig;
use lifegrid_core::Rgb;
use thiserror::Error;

pub const DEFAULT_SERVICE_URL: &str = "localhost:5000";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} must be a whole number of milliseconds, got {value:?}")]
    InvalidMillis { var: &'static str, value: String },
    #[error("{var} must be a RRGGBB colour, got {value:?}")]
    InvalidColor { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service_url: String,
    pub client: ClientConfig,
    /// Name and colour to register with on every (re)connect.
    pub player: Option<(String, Rgb)>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.into(),
            client: ClientConfig {
                url: ws_url(DEFAULT_SERVICE_URL),
                ..ClientConfig::default()
            },
            player: None,
        }
    }
}

/// `ws://{service}/ws`, keeping an explicit scheme if one is given.
pub fn ws_url(service: &str) -> String {
    let service = service.trim().trim_end_matches('/');
    if service.starts_with("ws://") || service.starts_with("wss://") {
        format!("{service}/ws")
    } else {
        format!("ws://{service}/ws")
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::InvalidMillis { var, value }),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let lookup = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let defaults = ClientConfig::default();

        let service_url = match lookup("LIFEGRID_SERVICE_URL") {
            Some(url) => url,
            None => {
                log::info!("LIFEGRID_SERVICE_URL not set, defaulting to {DEFAULT_SERVICE_URL}");
                DEFAULT_SERVICE_URL.into()
            }
        };

        let client = ClientConfig {
            url: ws_url(&service_url),
            initial_retry: millis(&lookup, "LIFEGRID_RETRY_MS", defaults.initial_retry)?,
            max_retry: millis(&lookup, "LIFEGRID_MAX_RETRY_MS", defaults.max_retry)?,
            connect_timeout: millis(&lookup, "LIFEGRID_CONNECT_TIMEOUT_MS", defaults.connect_timeout)?,
            watchdog_interval: millis(&lookup, "LIFEGRID_WATCHDOG_MS", defaults.watchdog_interval)?,
            ..defaults
        };

        let player = match lookup("LIFEGRID_NAME") {
            None => None,
            Some(name) => {
                let color = match lookup("LIFEGRID_COLOR") {
                    None => Rgb::new(0xFF, 0xFF, 0xFF),
                    Some(value) => Rgb::parse_hex(&value).ok_or(ConfigError::InvalidColor {
                        var: "LIFEGRID_COLOR",
                        value,
                    })?,
                };
                Some((name, color))
            }
        };

        Ok(Self {
            service_url,
            client,
            player,
        })
    }
}
