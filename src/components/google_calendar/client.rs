use super::models::{CalendarListResponse, EventsResponse};
use super::token::TokenHandle;
use crate::components::{CalendarProvider, EventQuery, SessionContext, SessionStore};
use crate::error::{google_calendar_error, DashResult};
use crate::pipeline::{CalendarDetails, CalendarRef, RawEvent};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;
use url::Url;

pub const GOOGLE_CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

/// Calendar provider talking to the Google Calendar REST API directly
pub struct GoogleCalendarClient {
    http: Client,
    base_url: String,
    tokens: TokenHandle,
    store: Arc<dyn SessionStore>,
}

impl GoogleCalendarClient {
    pub fn new(tokens: TokenHandle, store: Arc<dyn SessionStore>) -> Self {
        Self::with_base_url(tokens, store, GOOGLE_CALENDAR_API)
    }

    pub fn with_base_url(
        tokens: TokenHandle,
        store: Arc<dyn SessionStore>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            tokens,
            store,
        }
    }

    /// Handle to the token actor, used for shutdown
    pub fn tokens(&self) -> &TokenHandle {
        &self.tokens
    }

    fn endpoint(&self, segments: &[&str]) -> DashResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| google_calendar_error(&format!("Failed to parse URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| google_calendar_error("Base URL cannot have path segments"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, ctx: &SessionContext, url: Url) -> DashResult<T> {
        let access_token = self.tokens.get_access_token(&ctx.user_id).await?;

        debug!("GET {}", url);
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(google_calendar_error(&format!(
                "API request failed: HTTP {} - {}",
                status, error_body
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarClient {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn is_connected(&self, ctx: &SessionContext) -> DashResult<bool> {
        Ok(self.store.get_google_tokens(&ctx.user_id).await?.is_some())
    }

    async fn list_calendars(&self, ctx: &SessionContext) -> DashResult<Vec<CalendarRef>> {
        let url = self.endpoint(&["users", "me", "calendarList"])?;
        let response: CalendarListResponse = self.get_json(ctx, url).await?;
        Ok(response.items.into_iter().map(CalendarRef::from).collect())
    }

    async fn get_calendar(
        &self,
        ctx: &SessionContext,
        calendar_id: &str,
    ) -> DashResult<CalendarDetails> {
        let url = self.endpoint(&["calendars", calendar_id])?;
        self.get_json(ctx, url).await
    }

    async fn list_events(
        &self,
        ctx: &SessionContext,
        calendar_id: &str,
        query: &EventQuery,
    ) -> DashResult<Vec<RawEvent>> {
        let mut url = self.endpoint(&["calendars", calendar_id, "events"])?;
        url.query_pairs_mut()
            .append_pair(
                "timeMin",
                &query.time_min.to_rfc3339_opts(SecondsFormat::Secs, true),
            )
            .append_pair(
                "timeMax",
                &query.time_max.to_rfc3339_opts(SecondsFormat::Secs, true),
            )
            .append_pair("maxResults", &query.max_results.to_string())
            .append_pair("singleEvents", "true")
            .append_pair("orderBy", "startTime");

        let response: EventsResponse = self.get_json(ctx, url).await?;
        Ok(response.items)
    }
}
