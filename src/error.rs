use miette::{Diagnostic, Result};
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Environment error: {0}")]
    #[diagnostic(code(calendash::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(calendash::config))]
    Config(String),

    #[error("Google Calendar API error: {0}")]
    #[diagnostic(code(calendash::google_calendar))]
    GoogleCalendar(String),

    #[error("Integration broker error: {0}")]
    #[diagnostic(code(calendash::composio))]
    Composio(String),

    #[error("Assistant error: {0}")]
    #[diagnostic(code(calendash::assistant))]
    Assistant(String),

    #[error("Session store error: {0}")]
    #[diagnostic(code(calendash::store))]
    Store(String),

    #[error("Authentication error: {0}")]
    #[diagnostic(code(calendash::auth))]
    Auth(String),

    #[error("Invalid input: {0}")]
    #[diagnostic(code(calendash::invalid_input))]
    InvalidInput(String),

    #[error("Google Calendar not connected. Please authenticate first.")]
    #[diagnostic(code(calendash::not_connected))]
    NotConnected,

    #[error("No calendars available for this account")]
    #[diagnostic(code(calendash::no_calendars))]
    NoCalendars,

    #[error(transparent)]
    #[diagnostic(code(calendash::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(calendash::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(calendash::other))]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Store(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type DashResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Missing environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create Google Calendar errors
pub fn google_calendar_error(message: &str) -> Error {
    Error::GoogleCalendar(message.to_string())
}

/// Helper to create integration broker errors
pub fn composio_error(message: &str) -> Error {
    Error::Composio(message.to_string())
}

/// Helper to create assistant errors
pub fn assistant_error(message: &str) -> Error {
    Error::Assistant(message.to_string())
}

/// Helper to create session store errors
pub fn store_error(message: &str) -> Error {
    Error::Store(message.to_string())
}

/// Helper to create authentication errors
pub fn auth_error(message: &str) -> Error {
    Error::Auth(message.to_string())
}

/// Helper to create invalid input errors
pub fn invalid_input_error(message: &str) -> Error {
    Error::InvalidInput(message.to_string())
}

/// Helper to create other errors
pub fn other_error(message: &str) -> Error {
    Error::Other(message.to_string())
}
