//! Runtime configuration, read from the process environment (and `.env`).

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Which Bybit deployment orders go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BybitEnvironment {
    Mainnet,
    Testnet,
    /// Demo trading on mainnet infrastructure with paper funds.
    #[default]
    Demo,
}

impl BybitEnvironment {
    pub fn rest_base_url(&self) -> &'static str {
        match self {
            Self::Mainnet => "https://api.bybit.com",
            Self::Testnet => "https://api-testnet.bybit.com",
            Self::Demo => "https://api-demo.bybit.com",
        }
    }
}

impl fmt::Display for BybitEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
            Self::Demo => write!(f, "demo"),
        }
    }
}

impl FromStr for BybitEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" | "production" | "prod" => Ok(Self::Mainnet),
            "testnet" | "test" => Ok(Self::Testnet),
            "demo" | "paper" => Ok(Self::Demo),
            _ => Err("expected 'mainnet', 'testnet' or 'demo'".to_string()),
        }
    }
}

/// The Telegram chat or account whose messages carry signals.
///
/// The relay logs in as a bot, and the Bot API never delivers messages that
/// another bot sends to it directly or posts in a group. A signal bot can only
/// be relayed through a channel in which the relay bot is an administrator,
/// so for a bot source this must name that channel (`@channel` or its
/// `-100...` id). Human senders may be matched directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalSource {
    Id(i64),
    /// Stored lowercase without the leading `@`.
    Username(String),
}

impl SignalSource {
    /// Positive ids belong to users and bots; groups and channels are negative.
    pub fn is_account_id(&self) -> bool {
        matches!(self, Self::Id(id) if *id > 0)
    }

    /// True when any of the given identities (sender or chat) is this source.
    pub fn matches(&self, ids: &[i64], usernames: &[&str]) -> bool {
        match self {
            Self::Id(id) => ids.contains(id),
            Self::Username(name) => usernames
                .iter()
                .any(|u| u.trim_start_matches('@').eq_ignore_ascii_case(name)),
        }
    }
}

impl FromStr for SignalSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<i64>() {
            return Ok(Self::Id(id));
        }
        let name = s.trim_start_matches('@');
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err("expected a numeric id or an @username".to_string());
        }
        Ok(Self::Username(name.to_lowercase()))
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Username(name) => write!(f, "@{}", name),
        }
    }
}

#[derive(Clone)]
pub struct BybitConfig {
    pub api_key: String,
    pub api_secret: String,
    pub environment: BybitEnvironment,
    pub base_url: String,
    pub recv_window_ms: u64,
    pub timeout: Duration,
}

impl fmt::Debug for BybitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BybitConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("environment", &self.environment)
            .field("base_url", &self.base_url)
            .field("recv_window_ms", &self.recv_window_ms)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub signal_source: SignalSource,
    pub report_chat_id: Option<i64>,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("signal_source", &self.signal_source)
            .field("report_chat_id", &self.report_chat_id)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bybit: BybitConfig,
    pub telegram: TelegramConfig,
    /// Run one signal at a time instead of one task per message.
    pub serialize_orders: bool,
    /// Debug-level log file, in addition to the console.
    pub log_file: Option<PathBuf>,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let environment: BybitEnvironment = parse_or(&get, "BYBIT_ENV", BybitEnvironment::Demo)?;
        let base_url = get("BYBIT_BASE_URL")
            .unwrap_or_else(|| environment.rest_base_url().to_string())
            .trim_end_matches('/')
            .to_string();

        let bybit = BybitConfig {
            api_key: require("BYBIT_API_KEY")?,
            api_secret: require("BYBIT_API_SECRET")?,
            environment,
            base_url,
            recv_window_ms: parse_or(&get, "BYBIT_RECV_WINDOW", 5000u64)?,
            timeout: Duration::from_secs(parse_or(&get, "BYBIT_TIMEOUT_SECS", 10u64)?),
        };

        let signal_source_raw = require("TELEGRAM_SIGNAL_SOURCE")?;
        let signal_source =
            signal_source_raw
                .parse::<SignalSource>()
                .map_err(|reason| ConfigError::Invalid {
                    key: "TELEGRAM_SIGNAL_SOURCE",
                    value: signal_source_raw.clone(),
                    reason,
                })?;

        let report_chat_id = match get("TELEGRAM_REPORT_CHAT_ID") {
            Some(raw) => Some(raw.parse::<i64>().map_err(|e| ConfigError::Invalid {
                key: "TELEGRAM_REPORT_CHAT_ID",
                value: raw.clone(),
                reason: e.to_string(),
            })?),
            None => None,
        };

        let telegram = TelegramConfig {
            bot_token: require("TELEGRAM_BOT_TOKEN")?,
            signal_source,
            report_chat_id,
        };

        Ok(Self {
            bybit,
            telegram,
            serialize_orders: parse_or(&get, "SERIALIZE_ORDERS", false)?,
            log_file: get("LOG_FILE").map(PathBuf::from),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
