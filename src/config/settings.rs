//! Environment-driven settings for the userbot.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use super::session_string::{SessionString, SessionStringError};
use super::{DEFAULT_COMMAND_PREFIX, DEFAULT_TG_PORT, REQUIRED_ENV_VARS};

/// Telegram application credentials and session token.
#[derive(Clone)]
pub struct Credentials {
    /// Telegram API ID (obtain from <https://my.telegram.org>).
    pub api_id: i32,

    /// Telegram API hash.
    pub api_hash: String,

    /// Pre-authenticated string session.
    pub session_string: String,

    /// Token of the optional assistant bot.
    pub bot_token: Option<String>,
}

impl Credentials {
    /// Decodes the session string into its data center and auth key parts.
    ///
    /// # Errors
    ///
    /// Returns an error if the session string is malformed.
    pub fn session(&self) -> Result<SessionString, SessionStringError> {
        SessionString::decode(&self.session_string)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .field("session_string", &"<redacted>")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Owner and admin IDs allowed to trigger commands from other accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminList {
    /// Account owner, if configured.
    pub owner: Option<i64>,

    /// Additional admins.
    pub admins: Vec<i64>,
}

impl AdminList {
    /// Parses `OWNER_ID` and `ADMIN_IDS` values.
    ///
    /// An owner of `0` means "not configured". Blank entries in the admin
    /// list are skipped.
    pub fn parse(owner: Option<&str>, admins: Option<&str>) -> Result<Self, ConfigError> {
        let owner = match owner.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => {
                let id: i64 = raw
                    .parse()
                    .map_err(|_| ConfigError::InvalidId("OWNER_ID", raw.to_owned()))?;
                (id != 0).then_some(id)
            }
            None => None,
        };

        let admins = admins
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse()
                    .map_err(|_| ConfigError::InvalidId("ADMIN_IDS", s.to_owned()))
            })
            .collect::<Result<Vec<i64>, _>>()?;

        Ok(Self { owner, admins })
    }

    /// Returns whether the given user may trigger commands.
    pub fn permits(&self, user_id: i64) -> bool {
        self.owner == Some(user_id) || self.admins.contains(&user_id)
    }

    /// Number of configured IDs, owner included.
    pub fn len(&self) -> usize {
        self.admins.len() + usize::from(self.owner.is_some())
    }

    /// Returns true if nobody besides the account itself is allowed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// MTProto transport framing reported by `.conn`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportMode {
    #[default]
    TcpFull,
    TcpAbridged,
}

impl TransportMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TcpFull => "TcpFull",
            Self::TcpAbridged => "TcpAbridged",
        }
    }
}

impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "TcpFull" => Ok(Self::TcpFull),
            "TcpAbridged" => Ok(Self::TcpAbridged),
            other => Err(other.to_owned()),
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport mode and port used to reach the home data center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub mode: TransportMode,
    pub port: u16,
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self {
            mode: TransportMode::default(),
            port: DEFAULT_TG_PORT,
        }
    }
}

impl ConnectionProfile {
    /// Resolves the profile from `CONNECTION_MODE` and `TG_PORT`.
    ///
    /// Never fails: unknown modes and unparsable ports fall back to the
    /// defaults with a warning.
    pub fn resolve(mode: Option<&str>, port: Option<&str>) -> Self {
        let mode = match mode.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => raw.parse().unwrap_or_else(|invalid: String| {
                warn!(
                    "Invalid CONNECTION_MODE '{}', falling back to {}",
                    invalid,
                    TransportMode::default()
                );
                TransportMode::default()
            }),
            None => TransportMode::default(),
        };

        let port = match port.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => match raw.parse::<u16>() {
                Ok(port) if port != 0 => port,
                _ => {
                    warn!("Invalid TG_PORT '{}', falling back to {}", raw, DEFAULT_TG_PORT);
                    DEFAULT_TG_PORT
                }
            },
            None => DEFAULT_TG_PORT,
        };

        Self { mode, port }
    }
}

/// Chat-completion settings for `.ask`.
#[derive(Clone)]
pub struct AiSettings {
    /// Bearer token; `.ask` refuses to run without it.
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,

    pub model: String,

    pub temperature: f32,

    /// Wall-clock ceiling for the completion request.
    pub timeout: Duration,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_owned()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_owned()
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: 0.7,
            timeout: Duration::from_secs(60),
        }
    }
}

impl fmt::Debug for AiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Complete runtime configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub credentials: Credentials,

    pub admins: AdminList,

    /// Chat receiving the startup notification; `0` disables it.
    pub log_channel: i64,

    pub connection: ConnectionProfile,

    pub ai: AiSettings,

    /// Prefix in front of every command keyword.
    pub command_prefix: String,

    /// Path to the grammers session storage.
    pub session_path: PathBuf,
}

fn default_session_path() -> PathBuf {
    PathBuf::from("prince_x.session")
}

impl BotConfig {
    /// Creates configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary key lookup.
    ///
    /// Empty values count as missing. All missing required keys are
    /// reported at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<&'static str> = REQUIRED_ENV_VARS
            .iter()
            .copied()
            .filter(|key| get(*key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingEnvVars(missing));
        }

        let api_id_raw = get("API_ID").unwrap_or_default();
        let api_id: i32 = api_id_raw
            .trim()
            .parse()
            .ok()
            .filter(|id| *id > 0)
            .ok_or(ConfigError::InvalidApiId)?;

        let credentials = Credentials {
            api_id,
            api_hash: get("API_HASH").unwrap_or_default(),
            session_string: get("SESSION_STRING").unwrap_or_default().trim().to_owned(),
            bot_token: get("BOT_TOKEN"),
        };
        credentials.session()?;

        let log_channel: i64 = match get("LOG_CHANNEL") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidId("LOG_CHANNEL", raw.clone()))?,
            None => 0,
        };

        let admins = AdminList::parse(get("OWNER_ID").as_deref(), get("ADMIN_IDS").as_deref())?;

        let connection =
            ConnectionProfile::resolve(get("CONNECTION_MODE").as_deref(), get("TG_PORT").as_deref());

        let ai = AiSettings {
            api_key: get("OPENAI_KEY"),
            base_url: get("OPENAI_BASE_URL")
                .map_or_else(default_base_url, |url| url.trim_end_matches('/').to_owned()),
            model: get("OPENAI_MODEL").unwrap_or_else(default_model),
            ..AiSettings::default()
        };

        Ok(Self {
            credentials,
            admins,
            log_channel,
            connection,
            ai,
            command_prefix: get("COMMAND_PREFIX")
                .unwrap_or_else(|| DEFAULT_COMMAND_PREFIX.to_owned()),
            session_path: get("TG_SESSION_PATH").map_or_else(default_session_path, PathBuf::from),
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingEnvVars(Vec<&'static str>),

    #[error("Invalid API ID format (must be a positive integer)")]
    InvalidApiId,

    #[error("Invalid {0} value: '{1}' (must be a numeric ID)")]
    InvalidId(&'static str, String),

    #[error("Invalid SESSION_STRING: {0}")]
    InvalidSession(#[from] SessionStringError),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::config::session_string::tests::sample_session_string;

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Runs `f` with a scoped subscriber and returns what it logged.
    fn captured_logs(f: impl FnOnce()) -> String {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("API_ID", "12345".to_owned()),
            ("API_HASH", "abc123".to_owned()),
            ("SESSION_STRING", sample_session_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<BotConfig, ConfigError> {
        BotConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.credentials.api_id, 12345);
        assert_eq!(config.credentials.api_hash, "abc123");
        assert!(config.credentials.bot_token.is_none());
        assert_eq!(config.log_channel, 0);
        assert!(config.admins.is_empty());
        assert_eq!(config.connection, ConnectionProfile::default());
        assert_eq!(config.command_prefix, ".");
        assert_eq!(config.ai.model, "gpt-3.5-turbo");
        assert_eq!(config.ai.base_url, "https://api.openai.com/v1");
        assert_eq!(config.session_path, PathBuf::from("prince_x.session"));
    }

    #[test]
    fn test_each_required_key_is_reported() {
        for key in REQUIRED_ENV_VARS {
            let mut env = base_env();
            env.remove(key);
            match load(&env) {
                Err(ConfigError::MissingEnvVars(missing)) => assert_eq!(missing, vec![*key]),
                other => panic!("expected missing {key}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let mut env = base_env();
        env.insert("API_HASH", "   ".to_owned());
        assert!(matches!(
            load(&env),
            Err(ConfigError::MissingEnvVars(missing)) if missing == vec!["API_HASH"]
        ));
    }

    #[test]
    fn test_all_missing_reported_together() {
        let err = load(&HashMap::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required environment variables: API_ID, API_HASH, SESSION_STRING"
        );
    }

    #[test]
    fn test_invalid_api_id() {
        let mut env = base_env();
        env.insert("API_ID", "not-a-number".to_owned());
        assert!(matches!(load(&env), Err(ConfigError::InvalidApiId)));
    }

    #[test]
    fn test_invalid_session_string() {
        let mut env = base_env();
        env.insert("SESSION_STRING", "garbage".to_owned());
        assert!(matches!(load(&env), Err(ConfigError::InvalidSession(_))));
    }

    #[test]
    fn test_optional_values() {
        let mut env = base_env();
        env.insert("BOT_TOKEN", "123:abc".to_owned());
        env.insert("LOG_CHANNEL", "-1001234567890".to_owned());
        env.insert("OWNER_ID", "42".to_owned());
        env.insert("ADMIN_IDS", "1, 2,,3 ".to_owned());
        env.insert("OPENAI_KEY", "sk-test".to_owned());
        env.insert("OPENAI_BASE_URL", "http://127.0.0.1:9000/v1/".to_owned());
        env.insert("COMMAND_PREFIX", "!".to_owned());

        let config = load(&env).unwrap();
        assert_eq!(config.credentials.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(config.log_channel, -1_001_234_567_890);
        assert_eq!(config.admins.owner, Some(42));
        assert_eq!(config.admins.admins, vec![1, 2, 3]);
        assert_eq!(config.ai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.ai.base_url, "http://127.0.0.1:9000/v1");
        assert_eq!(config.command_prefix, "!");
    }

    #[test]
    fn test_admin_list_permits() {
        let admins = AdminList::parse(Some("7"), Some("8,9")).unwrap();
        assert!(admins.permits(7));
        assert!(admins.permits(9));
        assert!(!admins.permits(10));
        assert_eq!(admins.len(), 3);
    }

    #[test]
    fn test_admin_list_zero_owner_is_unset() {
        let admins = AdminList::parse(Some("0"), None).unwrap();
        assert_eq!(admins.owner, None);
        assert!(!admins.permits(0));
    }

    #[test]
    fn test_admin_list_rejects_garbage() {
        assert!(matches!(
            AdminList::parse(None, Some("1,abc")),
            Err(ConfigError::InvalidId("ADMIN_IDS", value)) if value == "abc"
        ));
    }

    #[test]
    fn test_connection_profile_valid() {
        let profile = ConnectionProfile::resolve(Some("TcpAbridged"), Some("80"));
        assert_eq!(profile.mode, TransportMode::TcpAbridged);
        assert_eq!(profile.port, 80);
    }

    #[test]
    fn test_connection_profile_invalid_mode_falls_back() {
        let mut profile = ConnectionProfile::default();
        let logs = captured_logs(|| {
            profile = ConnectionProfile::resolve(Some("TcpObfuscated"), None);
        });
        assert_eq!(profile.mode, TransportMode::TcpFull);
        assert_eq!(profile.port, DEFAULT_TG_PORT);
        assert!(logs.contains("WARN"));
        assert!(logs.contains("Invalid CONNECTION_MODE 'TcpObfuscated', falling back to TcpFull"));
    }

    #[test]
    fn test_connection_profile_invalid_port_falls_back() {
        assert_eq!(ConnectionProfile::resolve(None, Some("0")).port, DEFAULT_TG_PORT);
        let logs = captured_logs(|| {
            assert_eq!(ConnectionProfile::resolve(None, Some("70000")).port, DEFAULT_TG_PORT);
        });
        assert!(logs.contains("Invalid TG_PORT '70000'"));
    }

    #[test]
    fn test_connection_profile_valid_input_logs_nothing() {
        let logs = captured_logs(|| {
            ConnectionProfile::resolve(Some("TcpFull"), Some("443"));
        });
        assert!(logs.is_empty());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = load(&base_env()).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("abc123"));
        assert!(debug.contains("<redacted>"));
    }
}
