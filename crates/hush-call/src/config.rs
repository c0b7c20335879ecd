use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// STUN servers used when nothing else is configured.
pub const DEFAULT_STUN_SERVERS: [&str; 2] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
];

pub const DEFAULT_RING_TIMEOUT: Duration = Duration::from_secs(45);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// One ICE server entry. `urls` accepts a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    #[serde(deserialize_with = "one_or_many")]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Urls {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Urls::deserialize(deserializer)? {
        Urls::One(url) => vec![url],
        Urls::Many(urls) => urls,
    })
}

fn default_ice_servers() -> Vec<IceServer> {
    DEFAULT_STUN_SERVERS.iter().map(|url| IceServer::stun(*url)).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallConfig {
    pub ice_servers: Vec<IceServer>,
    /// How long a call may ring unanswered
    pub ring_timeout: Duration,
    /// How long `Connecting` may last before giving up
    pub connect_timeout: Duration,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            ice_servers: default_ice_servers(),
            ring_timeout: DEFAULT_RING_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl CallConfig {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to resolve variables.
    ///
    /// - `HUSH_ICE_SERVERS`: JSON list of ICE servers; unparseable input
    ///   falls back to the default STUN servers
    /// - `HUSH_TURN_SERVER_URL` / `_USERNAME` / `_CREDENTIAL`: extra TURN entry
    /// - `HUSH_RING_TIMEOUT_SECS`, `HUSH_CONNECT_TIMEOUT_SECS`
    ///
    /// The resulting ICE list is never empty.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut ice_servers = match lookup("HUSH_ICE_SERVERS") {
            Some(raw) => match serde_json::from_str::<Vec<IceServer>>(&raw) {
                Ok(servers) => servers,
                Err(e) => {
                    warn!("Invalid HUSH_ICE_SERVERS ({}), using default STUN servers", e);
                    default_ice_servers()
                }
            },
            None => Vec::new(),
        };

        if let Some(url) = lookup("HUSH_TURN_SERVER_URL").filter(|u| !u.trim().is_empty()) {
            ice_servers.push(IceServer {
                urls: vec![url],
                username: lookup("HUSH_TURN_SERVER_USERNAME"),
                credential: lookup("HUSH_TURN_SERVER_CREDENTIAL"),
            });
        }

        if ice_servers.is_empty() {
            ice_servers = default_ice_servers();
        }

        Self {
            ice_servers,
            ring_timeout: secs(&lookup, "HUSH_RING_TIMEOUT_SECS", DEFAULT_RING_TIMEOUT),
            connect_timeout: secs(&lookup, "HUSH_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT),
        }
    }
}

fn secs<F>(lookup: &F, name: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                warn!("Invalid {}={:?}, using {}s", name, raw, default.as_secs());
                default
            }
        },
        None => default,
    }
}
