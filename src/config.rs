use crate::error::{config_error, env_error, DashResult};
use chrono_tz::Tz;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Default location of the display settings file
pub const DISPLAY_SETTINGS_PATH: &str = "config/dashboard.toml";

/// Which calendar integration serves event data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarBackend {
    /// Google Calendar REST API with our own OAuth tokens
    Google,
    /// Third-party integration broker holding the Google connection
    Composio,
}

impl CalendarBackend {
    fn parse(value: &str) -> DashResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "composio" => Ok(Self::Composio),
            other => Err(config_error(&format!("Unknown CALENDAR_BACKEND '{}'", other))),
        }
    }
}

/// Display and fetch tuning, overridable from `config/dashboard.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// How many upcoming and past meetings the board shows
    pub display_limit: usize,
    /// Per-calendar fetch size handed to the provider
    pub fetch_max_results: u32,
    /// How far back the meeting board looks
    pub lookback_days: i64,
    /// How far ahead the meeting board looks
    pub lookahead_days: i64,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            display_limit: 5,
            fetch_max_results: 20,
            lookback_days: 7,
            lookahead_days: 30,
        }
    }
}

/// Longest look-back or look-ahead the board accepts
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Google Calendar caps `maxResults` at 2500
pub const MAX_FETCH_RESULTS: u32 = 2500;

impl DisplaySettings {
    /// Reject values the fetch window arithmetic or the providers cannot take
    pub fn validate(&self) -> DashResult<()> {
        if !(0..=MAX_WINDOW_DAYS).contains(&self.lookback_days) {
            return Err(config_error(&format!(
                "lookback_days must be between 0 and {}, got {}",
                MAX_WINDOW_DAYS, self.lookback_days
            )));
        }
        if !(0..=MAX_WINDOW_DAYS).contains(&self.lookahead_days) {
            return Err(config_error(&format!(
                "lookahead_days must be between 0 and {}, got {}",
                MAX_WINDOW_DAYS, self.lookahead_days
            )));
        }
        if !(1..=MAX_FETCH_RESULTS).contains(&self.fetch_max_results) {
            return Err(config_error(&format!(
                "fetch_max_results must be between 1 and {}, got {}",
                MAX_FETCH_RESULTS, self.fetch_max_results
            )));
        }
        Ok(())
    }

    /// Read settings from a TOML file, falling back to defaults when absent
    pub fn load_from(path: impl AsRef<Path>) -> DashResult<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str::<DisplaySettings>(&content)?),
            Err(_) => Ok(Self::default()),
        }
    }
}

/// Google OAuth client credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Integration broker credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposioSettings {
    pub api_key: String,
    pub auth_config_id: Option<String>,
    pub callback_url: Option<String>,
    pub base_url: String,
}

/// Main configuration structure for the dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Port the HTTP server listens on
    pub port: u16,
    /// Secret used to sign session JWTs
    pub jwt_secret: String,
    /// Session lifetime in minutes
    pub token_expiration_minutes: i64,
    /// Redis connection string for the session store
    pub redis_url: String,
    /// Timezone for all-day events and display labels
    pub timezone: String,
    /// Calendar integration in use
    pub calendar_backend: CalendarBackend,
    /// Direct Google OAuth credentials, if configured
    pub google: Option<GoogleSettings>,
    /// Broker credentials, if configured
    pub composio: Option<ComposioSettings>,
    /// LLM API key for the assistant
    pub assistant_api_key: Option<String>,
    /// LLM model name
    pub assistant_model: String,
    /// Optional LLM endpoint override
    pub assistant_base_url: Option<String>,
    /// Board display settings
    pub display: DisplaySettings,
}

impl Config {
    /// Load configuration from environment and config file
    pub fn load() -> DashResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| env_error("JWT_SECRET"))?;

        let port = match env::var("PORT") {
            Ok(p) => p
                .parse::<u16>()
                .map_err(|_| env_error("Invalid PORT format"))?,
            Err(_) => 3000,
        };

        let token_expiration_minutes = env::var("SESSION_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(60 * 24);

        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        let timezone = env::var("TIMEZONE").unwrap_or_else(|_| String::from("UTC"));

        let google = match (
            env::var("GOOGLE_CLIENT_ID"),
            env::var("GOOGLE_CLIENT_SECRET"),
        ) {
            (Ok(client_id), Ok(client_secret)) => Some(GoogleSettings {
                client_id,
                client_secret,
                redirect_uri: env::var("GOOGLE_REDIRECT_URI").unwrap_or_else(|_| {
                    format!("http://localhost:{}/api/auth/google/callback", port)
                }),
            }),
            _ => None,
        };

        let composio = env::var("COMPOSIO_API_KEY").ok().map(|api_key| ComposioSettings {
            api_key,
            auth_config_id: env::var("COMPOSIO_AUTH_CONFIG_ID").ok(),
            callback_url: env::var("COMPOSIO_CALLBACK_URL").ok(),
            base_url: env::var("COMPOSIO_BASE_URL")
                .unwrap_or_else(|_| "https://backend.composio.dev".to_string()),
        });

        // Prefer the broker when it is configured and nothing else was asked for
        let calendar_backend = match env::var("CALENDAR_BACKEND") {
            Ok(value) => CalendarBackend::parse(&value)?,
            Err(_) if composio.is_some() => CalendarBackend::Composio,
            Err(_) => CalendarBackend::Google,
        };

        let display = DisplaySettings::load_from(DISPLAY_SETTINGS_PATH)?;

        let config = Config {
            port,
            jwt_secret,
            token_expiration_minutes,
            redis_url,
            timezone,
            calendar_backend,
            google,
            composio,
            assistant_api_key: env::var("OPENAI_API_KEY").ok(),
            assistant_model: env::var("ASSISTANT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            assistant_base_url: env::var("OPENAI_BASE_URL").ok(),
            display,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check settings before the server starts
    pub fn validate(&self) -> DashResult<()> {
        self.tz()?;
        self.display.validate()?;

        match self.calendar_backend {
            CalendarBackend::Google if self.google.is_none() => Err(config_error(
                "CALENDAR_BACKEND=google requires GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET",
            )),
            CalendarBackend::Composio if self.composio.is_none() => Err(config_error(
                "CALENDAR_BACKEND=composio requires COMPOSIO_API_KEY",
            )),
            _ => Ok(()),
        }
    }

    /// Parsed dashboard timezone
    pub fn tz(&self) -> DashResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| config_error(&format!("Invalid TIMEZONE '{}'", self.timezone)))
    }
}
