use crate::error::DashResult;
use crate::pipeline::{CalendarDetails, CalendarRef, ChatRequest, Meeting, RawEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Export components
pub mod assistant;
pub mod composio;
pub mod google_calendar;
pub mod session_store;

#[cfg(feature = "assistant")]
pub use assistant::AssistantSummarizer;
pub use assistant::UnconfiguredSummarizer;
pub use composio::{ComposioClient, ConnectionLink};
pub use google_calendar::{GoogleCalendarClient, GoogleOAuth, TokenHandle};
pub use session_store::{InMemoryStore, RedisStore, SessionStore};

/// Identity of the caller, passed explicitly into every calendar operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub user_id: String,
    pub connected_account_id: Option<String>,
}

impl SessionContext {
    pub fn new(user_id: impl Into<String>, connected_account_id: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            connected_account_id,
        }
    }
}

/// Time window and size for one calendar's event fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub time_min: DateTime<Utc>,
    pub time_max: DateTime<Utc>,
    pub max_results: u32,
}

/// Source of calendars and their events
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &'static str;

    /// Whether the user has a usable calendar connection
    async fn is_connected(&self, ctx: &SessionContext) -> DashResult<bool>;

    /// Calendars the user can read
    async fn list_calendars(&self, ctx: &SessionContext) -> DashResult<Vec<CalendarRef>>;

    /// Metadata of one calendar
    async fn get_calendar(
        &self,
        ctx: &SessionContext,
        calendar_id: &str,
    ) -> DashResult<CalendarDetails>;

    /// Raw events of one calendar inside the query window
    async fn list_events(
        &self,
        ctx: &SessionContext,
        calendar_id: &str,
        query: &EventQuery,
    ) -> DashResult<Vec<RawEvent>>;
}

/// Turns calendar data into a natural-language answer
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, request: &ChatRequest, meetings: &[Meeting]) -> DashResult<String>;
}
