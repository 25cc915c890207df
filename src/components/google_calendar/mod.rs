//! Direct Google Calendar integration: OAuth tokens and the REST client.

mod client;
pub mod models;
pub mod token;

pub use client::{GoogleCalendarClient, GOOGLE_CALENDAR_API};
pub use models::GoogleTokens;
pub use token::{GoogleOAuth, TokenHandle};
