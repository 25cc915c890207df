use crate::pipeline::models::{AccessRole, CalendarRef, RawEvent};
use serde::{Deserialize, Serialize};

/// OAuth tokens stored per user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
    /// Unix timestamp (seconds) when the access token stops working
    pub expires_at: i64,
}

/// Token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
}

/// One entry of `users/me/calendarList`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CalendarListEntry {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub summary_override: Option<String>,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub access_role: AccessRole,
    #[serde(default)]
    pub primary: Option<bool>,
}

impl From<CalendarListEntry> for CalendarRef {
    fn from(entry: CalendarListEntry) -> Self {
        let label = entry
            .summary_override
            .or(entry.summary)
            .unwrap_or_else(|| entry.id.clone());
        CalendarRef {
            id: entry.id,
            label,
            color: entry.background_color,
            access_role: entry.access_role,
            primary: entry.primary.unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CalendarListResponse {
    #[serde(default)]
    pub items: Vec<CalendarListEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct EventsResponse {
    #[serde(default)]
    pub items: Vec<RawEvent>,
}
