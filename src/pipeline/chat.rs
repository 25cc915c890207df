use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Prompt used when the user asks nothing specific
pub const DEFAULT_PROMPT: &str = "Analyze my upcoming 30 days of meetings and events. \
Summarize key themes, recurring commitments, busy days and any conflicts, \
and point out anything I should prepare for.";

/// Days of history the assistant sees
pub const CHAT_LOOKBACK_DAYS: i64 = 7;
/// Days ahead the assistant sees
pub const CHAT_LOOKAHEAD_DAYS: i64 = 30;

/// Payload handed to the summarization collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub prompt: String,
}

/// Build the chat payload; the window never depends on the prompt text
pub fn build_chat_request(message: Option<&str>, now: DateTime<Utc>) -> ChatRequest {
    let prompt = message
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_PROMPT)
        .to_string();

    ChatRequest {
        window_start: now - Duration::days(CHAT_LOOKBACK_DAYS),
        window_end: now + Duration::days(CHAT_LOOKAHEAD_DAYS),
        prompt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_prompt_and_window() {
        let now = Utc.with_ymd_and_hms(2030, 3, 10, 12, 0, 0).unwrap();
        let request = build_chat_request(None, now);
        assert_eq!(request.prompt, DEFAULT_PROMPT);
        assert_eq!(request.window_start, Utc.with_ymd_and_hms(2030, 3, 3, 12, 0, 0).unwrap());
        assert_eq!(request.window_end, Utc.with_ymd_and_hms(2030, 4, 9, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_blank_message_uses_default() {
        let now = Utc::now();
        assert_eq!(build_chat_request(Some("   "), now).prompt, DEFAULT_PROMPT);
    }

    #[test]
    fn test_window_ignores_prompt_dates() {
        let now = Utc.with_ymd_and_hms(2030, 3, 10, 12, 0, 0).unwrap();
        let request = build_chat_request(Some("What did I do in 2019?"), now);
        assert_eq!(request.prompt, "What did I do in 2019?");
        assert_eq!(request.window_end - request.window_start, Duration::days(37));
    }
}
