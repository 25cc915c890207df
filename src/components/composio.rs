//! Integration broker client. The broker holds the user's Google connection
//! and executes calendar tools on their behalf.

use super::google_calendar::models::CalendarListEntry;
use crate::components::{CalendarProvider, EventQuery, SessionContext};
use crate::config::ComposioSettings;
use crate::error::{composio_error, DashResult, Error};
use crate::pipeline::{CalendarDetails, CalendarRef, RawEvent};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Tool slugs executed through the broker
pub mod tools {
    pub const LIST_CALENDARS: &str = "GOOGLECALENDAR_LIST_CALENDARS";
    pub const GET_CALENDAR: &str = "GOOGLECALENDAR_GET_CALENDAR";
    pub const EVENTS_LIST: &str = "GOOGLECALENDAR_EVENTS_LIST";
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    user_id: &'a str,
    connected_account_id: &'a str,
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    #[serde(default)]
    data: Value,
    #[serde(default = "default_successful")]
    successful: bool,
    #[serde(default)]
    error: Option<String>,
}

fn default_successful() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct LinkRequest<'a> {
    user_id: &'a str,
    auth_config_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
}

/// Pending connection returned by the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionLink {
    #[serde(alias = "redirect_url")]
    pub redirect_url: String,
    #[serde(default, alias = "connected_account_id")]
    pub connected_account_id: Option<String>,
}

/// Calendar provider backed by the integration broker
pub struct ComposioClient {
    http: Client,
    settings: ComposioSettings,
}

impl ComposioClient {
    pub fn new(settings: ComposioSettings) -> Self {
        Self {
            http: Client::new(),
            settings,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    /// Start linking the user's Google account; returns where to send them
    pub async fn link(&self, user_id: &str) -> DashResult<ConnectionLink> {
        let auth_config_id = self
            .settings
            .auth_config_id
            .as_deref()
            .ok_or_else(|| composio_error("COMPOSIO_AUTH_CONFIG_ID is not configured"))?;

        let body = LinkRequest {
            user_id,
            auth_config_id,
            callback_url: self.settings.callback_url.as_deref(),
        };

        let response = self
            .http
            .post(self.url("api/v3/connected_accounts/link"))
            .header("x-api-key", &self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| composio_error(&format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(composio_error(&format!(
                "Link request failed: HTTP {} - {}",
                status, error_body
            )));
        }

        let link = response
            .json::<ConnectionLink>()
            .await
            .map_err(|e| composio_error(&format!("Failed to parse link response: {}", e)))?;

        info!("Started broker connection for user {}", user_id);
        Ok(link)
    }

    /// Run one tool for the user and return its `data` payload
    async fn execute(&self, ctx: &SessionContext, tool: &str, arguments: Value) -> DashResult<Value> {
        let connected_account_id = ctx
            .connected_account_id
            .as_deref()
            .ok_or(Error::NotConnected)?;

        let body = ExecuteRequest {
            user_id: &ctx.user_id,
            connected_account_id,
            arguments,
        };

        debug!("Executing {} for user {}", tool, ctx.user_id);
        let response = self
            .http
            .post(self.url(&format!("api/v3/tools/execute/{}", tool)))
            .header("x-api-key", &self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| composio_error(&format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(composio_error(&format!(
                "{} failed: HTTP {} - {}",
                tool, status, error_body
            )));
        }

        let result = response
            .json::<ExecuteResponse>()
            .await
            .map_err(|e| composio_error(&format!("Failed to parse {} response: {}", tool, e)))?;

        if !result.successful {
            return Err(composio_error(&format!(
                "{} failed: {}",
                tool,
                result.error.unwrap_or_else(|| "unknown error".to_string())
            )));
        }

        Ok(result.data)
    }
}

/// Tool payloads nest the item list differently across toolkit versions
fn extract_items(data: Value) -> Value {
    let items = data
        .get("items")
        .or_else(|| data.get("calendars"))
        .or_else(|| data.get("event_data").and_then(|d| d.get("event_data")))
        .or_else(|| data.get("response_data").and_then(|d| d.get("items")))
        .cloned();

    match (items, data) {
        (Some(items), _) => items,
        (None, Value::Array(items)) => Value::Array(items),
        (None, _) => Value::Array(Vec::new()),
    }
}

/// Single-object payloads may come wrapped like list payloads
fn extract_object(data: Value) -> Value {
    match data {
        Value::Object(mut map) => match map
            .remove("response_data")
            .or_else(|| map.remove("calendar"))
        {
            Some(inner) => inner,
            None => Value::Object(map),
        },
        other => other,
    }
}

#[async_trait]
impl CalendarProvider for ComposioClient {
    fn name(&self) -> &'static str {
        "composio"
    }

    async fn is_connected(&self, ctx: &SessionContext) -> DashResult<bool> {
        Ok(ctx.connected_account_id.is_some())
    }

    async fn list_calendars(&self, ctx: &SessionContext) -> DashResult<Vec<CalendarRef>> {
        let data = self.execute(ctx, tools::LIST_CALENDARS, json!({})).await?;
        let entries: Vec<CalendarListEntry> = serde_json::from_value(extract_items(data))
            .map_err(|e| composio_error(&format!("Unexpected calendar list shape: {}", e)))?;
        Ok(entries.into_iter().map(CalendarRef::from).collect())
    }

    async fn get_calendar(
        &self,
        ctx: &SessionContext,
        calendar_id: &str,
    ) -> DashResult<CalendarDetails> {
        let arguments = json!({ "calendarId": calendar_id });
        let data = self.execute(ctx, tools::GET_CALENDAR, arguments).await?;
        serde_json::from_value(extract_object(data))
            .map_err(|e| composio_error(&format!("Unexpected calendar shape: {}", e)))
    }

    async fn list_events(
        &self,
        ctx: &SessionContext,
        calendar_id: &str,
        query: &EventQuery,
    ) -> DashResult<Vec<RawEvent>> {
        let arguments = json!({
            "calendarId": calendar_id,
            "timeMin": query.time_min.to_rfc3339_opts(SecondsFormat::Secs, true),
            "timeMax": query.time_max.to_rfc3339_opts(SecondsFormat::Secs, true),
            "maxResults": query.max_results,
            "singleEvents": true,
            "orderBy": "startTime",
        });
        let data = self.execute(ctx, tools::EVENTS_LIST, arguments).await?;
        serde_json::from_value(extract_items(data))
            .map_err(|e| composio_error(&format!("Unexpected event list shape: {}", e)))
    }
}
