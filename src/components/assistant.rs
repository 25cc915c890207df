use crate::components::Summarizer;
use crate::error::{assistant_error, DashResult};
use crate::pipeline::{ChatRequest, Meeting};
use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::Serialize;

#[cfg(feature = "assistant")]
use rig::completion::{Chat, Message};
#[cfg(feature = "assistant")]
use rig::providers::openai::Client as OpenAiClient;
#[cfg(feature = "assistant")]
use tracing::info;

const SYSTEM_PROMPT: &str = "You are a smart assistant that helps users manage, analyze and summarize their Google Calendar events. \
You receive the user's request together with the events of their calendars as JSON. \
Answer only from those events, refer to meetings by title and time, and respond clearly and concisely to help them be more productive.";

const USER_PROMPT_TEMPLATE: &str = "{prompt}

Calendar window: {window_start} to {window_end}

Events (JSON):
{events}";

/// Compact view of a meeting handed to the model
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventDigest<'a> {
    title: &'a str,
    when: &'a str,
    start: String,
    all_day: bool,
    calendar: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    upcoming: bool,
}

impl<'a> From<&'a Meeting> for EventDigest<'a> {
    fn from(meeting: &'a Meeting) -> Self {
        let event = &meeting.event;
        Self {
            title: &event.title,
            when: &meeting.when,
            start: event.effective_start.to_rfc3339_opts(SecondsFormat::Secs, true),
            all_day: event.start.is_all_day(),
            calendar: &event.source.label,
            location: event.location.as_deref(),
            description: event.description.as_deref(),
            upcoming: meeting.is_upcoming,
        }
    }
}

/// Render the user message sent to the model
pub fn render_prompt(request: &ChatRequest, meetings: &[Meeting]) -> DashResult<String> {
    let digest: Vec<EventDigest> = meetings.iter().map(EventDigest::from).collect();
    let events = serde_json::to_string_pretty(&digest)?;

    Ok(USER_PROMPT_TEMPLATE
        .replace("{prompt}", &request.prompt)
        .replace(
            "{window_start}",
            &request.window_start.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
        .replace(
            "{window_end}",
            &request.window_end.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
        .replace("{events}", &events))
}

/// LLM-backed summarizer
#[cfg(feature = "assistant")]
pub struct AssistantSummarizer {
    client: OpenAiClient,
    model: String,
}

#[cfg(feature = "assistant")]
impl AssistantSummarizer {
    pub fn new(api_key: &str, model: &str, base_url: Option<&str>) -> Self {
        let client = match base_url {
            Some(url) => OpenAiClient::from_url(api_key, url),
            None => OpenAiClient::new(api_key),
        };
        Self {
            client,
            model: model.to_string(),
        }
    }
}

#[cfg(feature = "assistant")]
#[async_trait]
impl Summarizer for AssistantSummarizer {
    async fn summarize(&self, request: &ChatRequest, meetings: &[Meeting]) -> DashResult<String> {
        info!(
            "Summarizing {} events with model {}",
            meetings.len(),
            self.model
        );

        let user_prompt = render_prompt(request, meetings)?;

        let agent = self
            .client
            .agent(&self.model)
            .preamble(SYSTEM_PROMPT)
            .temperature(0.3)
            .build();

        let response = agent
            .chat(user_prompt, Vec::<Message>::new())
            .await
            .map_err(|e| assistant_error(&format!("Completion request failed: {}", e)))?;

        info!("Received assistant response");
        Ok(response)
    }
}

/// Stand-in used when no model is configured
#[derive(Debug, Default)]
pub struct UnconfiguredSummarizer;

#[async_trait]
impl Summarizer for UnconfiguredSummarizer {
    async fn summarize(&self, _request: &ChatRequest, _meetings: &[Meeting]) -> DashResult<String> {
        Err(assistant_error(
            "Assistant is not configured. Set OPENAI_API_KEY to enable it.",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::build_chat_request;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_render_prompt_with_no_events() {
        let now = Utc.with_ymd_and_hms(2030, 1, 10, 9, 0, 0).unwrap();
        let request = build_chat_request(Some("What is on Friday?"), now);
        let prompt = render_prompt(&request, &[]).unwrap();

        assert!(prompt.starts_with("What is on Friday?"));
        assert!(prompt.contains("2030-01-03T09:00:00Z to 2030-02-09T09:00:00Z"));
        assert!(prompt.ends_with("[]"));
    }

    #[tokio::test]
    async fn test_unconfigured_summarizer_errors() {
        let now = Utc.with_ymd_and_hms(2030, 1, 10, 9, 0, 0).unwrap();
        let request = build_chat_request(None, now);
        assert!(UnconfiguredSummarizer.summarize(&request, &[]).await.is_err());
    }
}
