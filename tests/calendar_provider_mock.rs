use async_trait::async_trait;
use calendash::components::{CalendarProvider, EventQuery, SessionContext, Summarizer};
use calendash::config::DisplaySettings;
use calendash::error::{google_calendar_error, DashResult, Error};
use calendash::pipeline::models::{AccessRole, RawEventTime};
use calendash::pipeline::{
    CalendarDetails, CalendarRef, ChatRequest, FetchStatus, Meeting, RawEvent, DEFAULT_PROMPT,
};
use calendash::service::{BoardIssue, DashboardService};
use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Mock calendar provider with canned events per calendar
#[derive(Default)]
pub struct MockCalendarProvider {
    connected: bool,
    calendars: Vec<CalendarRef>,
    events: HashMap<String, Vec<RawEvent>>,
    failing: Vec<String>,
    /// Per-calendar delay, used to finish fetches out of input order
    delays: HashMap<String, u64>,
    queries: Mutex<Vec<EventQuery>>,
}

impl MockCalendarProvider {
    /// Create a connected provider without calendars
    pub fn new() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Add a calendar with its events
    pub fn with_calendar(mut self, id: &str, events: Vec<RawEvent>) -> Self {
        self.calendars.push(calendar(id));
        self.events.insert(id.to_string(), events);
        self
    }

    /// Add a calendar whose event fetch fails
    pub fn with_failing_calendar(mut self, id: &str) -> Self {
        self.calendars.push(calendar(id));
        self.failing.push(id.to_string());
        self
    }

    pub fn with_delay(mut self, id: &str, millis: u64) -> Self {
        self.delays.insert(id.to_string(), millis);
        self
    }

    pub fn calendars(&self) -> Vec<CalendarRef> {
        self.calendars.clone()
    }
}

#[async_trait]
impl CalendarProvider for MockCalendarProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn is_connected(&self, _ctx: &SessionContext) -> DashResult<bool> {
        Ok(self.connected)
    }

    async fn list_calendars(&self, _ctx: &SessionContext) -> DashResult<Vec<CalendarRef>> {
        Ok(self.calendars.clone())
    }

    async fn get_calendar(
        &self,
        _ctx: &SessionContext,
        calendar_id: &str,
    ) -> DashResult<CalendarDetails> {
        if self.failing.iter().any(|id| id == calendar_id) {
            return Err(google_calendar_error("API request failed: HTTP 404 Not Found"));
        }
        let calendar = self
            .calendars
            .iter()
            .find(|c| c.id == calendar_id)
            .ok_or_else(|| google_calendar_error("API request failed: HTTP 404 Not Found"))?;

        Ok(CalendarDetails {
            id: calendar.id.clone(),
            summary: Some(calendar.label.clone()),
            time_zone: Some("Europe/Helsinki".to_string()),
            ..Default::default()
        })
    }

    async fn list_events(
        &self,
        _ctx: &SessionContext,
        calendar_id: &str,
        query: &EventQuery,
    ) -> DashResult<Vec<RawEvent>> {
        self.queries.lock().await.push(query.clone());

        if let Some(millis) = self.delays.get(calendar_id) {
            tokio::time::sleep(std::time::Duration::from_millis(*millis)).await;
        }

        if self.failing.iter().any(|id| id == calendar_id) {
            return Err(google_calendar_error("API request failed: HTTP 403 Forbidden"));
        }

        Ok(self.events.get(calendar_id).cloned().unwrap_or_default())
    }
}

/// Summarizer that records what it was asked
#[derive(Default)]
pub struct RecordingSummarizer {
    requests: Mutex<Vec<(ChatRequest, usize)>>,
}

#[async_trait]
impl Summarizer for RecordingSummarizer {
    async fn summarize(&self, request: &ChatRequest, meetings: &[Meeting]) -> DashResult<String> {
        self.requests
            .lock()
            .await
            .push((request.clone(), meetings.len()));
        Ok(format!("You have {} events.", meetings.len()))
    }
}

fn calendar(id: &str) -> CalendarRef {
    CalendarRef {
        id: id.to_string(),
        label: format!("{} calendar", id),
        color: None,
        access_role: AccessRole::Owner,
        primary: id == "primary",
    }
}

fn timed(id: &str, start: DateTime<Utc>) -> RawEvent {
    RawEvent {
        id: Some(id.to_string()),
        summary: Some(format!("Meeting {}", id)),
        start: Some(RawEventTime {
            date_time: Some(start.to_rfc3339()),
            ..Default::default()
        }),
        end: Some(RawEventTime {
            date_time: Some((start + Duration::hours(1)).to_rfc3339()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 3, 10, 12, 0, 0).unwrap()
}

fn ctx() -> SessionContext {
    SessionContext::new("user-1", None)
}

fn service(provider: MockCalendarProvider) -> (DashboardService, Arc<RecordingSummarizer>) {
    let summarizer = Arc::new(RecordingSummarizer::default());
    let service = DashboardService::new(
        Arc::new(provider),
        summarizer.clone(),
        DisplaySettings::default(),
        Tz::UTC,
    );
    (service, summarizer)
}

/// A future timed event lands at the head of the upcoming list
#[tokio::test]
async fn test_future_event_is_upcoming() {
    let provider = MockCalendarProvider::new()
        .with_calendar("primary", vec![timed("standup", now() + Duration::minutes(90))]);
    let calendars = provider.calendars();
    let (service, _) = service(provider);

    let board = service
        .fetch_all_events_at(&ctx(), &calendars, None, now())
        .await;

    assert!(board.error.is_none());
    assert_eq!(board.upcoming.len(), 1);
    assert_eq!(board.upcoming[0].event.id, "standup");
    assert_eq!(board.upcoming[0].relative_label, "in 1h 30m");
    assert!(board.past.is_empty());
}

/// One failing calendar does not hide the events of the others
#[tokio::test]
async fn test_failing_calendar_is_isolated() {
    let provider = MockCalendarProvider::new()
        .with_failing_calendar("shared")
        .with_calendar("primary", vec![timed("review", now() + Duration::hours(3))]);
    let calendars = provider.calendars();
    let (service, _) = service(provider);

    let board = service
        .fetch_all_events_at(&ctx(), &calendars, None, now())
        .await;

    assert!(board.error.is_none());
    assert_eq!(board.meetings.len(), 1);
    assert_eq!(board.meetings[0].event.source.calendar_id, "primary");
    assert_eq!(board.meetings[0].event.source.color, "#1967d2");

    assert_eq!(board.calendars.len(), 2);
    assert_eq!(board.calendars[0].calendar_id, "shared");
    assert!(matches!(board.calendars[0].status, FetchStatus::Failed { .. }));
    assert_eq!(
        board.calendars[1].status,
        FetchStatus::Ok { event_count: 1 }
    );
}

/// Events without a usable start are dropped, the rest survive
#[tokio::test]
async fn test_event_without_start_dropped() {
    let no_start = RawEvent {
        id: Some("ghost".to_string()),
        summary: Some("Ghost".to_string()),
        ..Default::default()
    };
    let provider = MockCalendarProvider::new().with_calendar(
        "primary",
        vec![no_start, timed("real", now() - Duration::hours(2))],
    );
    let calendars = provider.calendars();
    let (service, _) = service(provider);

    let board = service
        .fetch_all_events_at(&ctx(), &calendars, None, now())
        .await;

    assert_eq!(board.meetings.len(), 1);
    assert_eq!(board.past[0].event.id, "real");
    assert_eq!(board.past[0].relative_label, "2h ago");
}

/// The display limit keeps the soonest meetings
#[tokio::test]
async fn test_limit_keeps_soonest() {
    let events = [8i64, 3, 6, 1, 7, 2, 5, 4]
        .iter()
        .map(|h| timed(&format!("h{}", h), now() + Duration::hours(*h)))
        .collect();
    let provider = MockCalendarProvider::new().with_calendar("primary", events);
    let calendars = provider.calendars();
    let (service, _) = service(provider);

    let board = service
        .fetch_all_events_at(&ctx(), &calendars, Some(5), now())
        .await;

    let ids: Vec<&str> = board.upcoming.iter().map(|m| m.event.id.as_str()).collect();
    assert_eq!(ids, vec!["h1", "h2", "h3", "h4", "h5"]);
    assert_eq!(board.meetings.len(), 8);
}

/// Past meetings come most recent first
#[tokio::test]
async fn test_past_most_recent_first() {
    let events = (1..=7)
        .map(|d| timed(&format!("d{}", d), now() - Duration::days(d)))
        .collect();
    let provider = MockCalendarProvider::new().with_calendar("primary", events);
    let calendars = provider.calendars();
    let (service, _) = service(provider);

    let board = service
        .fetch_all_events_at(&ctx(), &calendars, Some(3), now())
        .await;

    let ids: Vec<&str> = board.past.iter().map(|m| m.event.id.as_str()).collect();
    assert_eq!(ids, vec!["d1", "d2", "d3"]);
}

/// Ties keep calendar order even when the later calendar answers first
#[tokio::test]
async fn test_ties_keep_calendar_order() {
    let at = now() + Duration::hours(2);
    let provider = MockCalendarProvider::new()
        .with_calendar("slow", vec![timed("from-slow", at)])
        .with_calendar("fast", vec![timed("from-fast", at)])
        .with_delay("slow", 50);
    let calendars = provider.calendars();
    let (service, _) = service(provider);

    let board = service
        .fetch_all_events_at(&ctx(), &calendars, None, now())
        .await;

    let ids: Vec<&str> = board.meetings.iter().map(|m| m.event.id.as_str()).collect();
    assert_eq!(ids, vec!["from-slow", "from-fast"]);
}

#[tokio::test]
async fn test_no_calendars_reports_error() {
    let (service, _) = service(MockCalendarProvider::new());

    let board = service.fetch_all_events_at(&ctx(), &[], None, now()).await;

    assert!(board.meetings.is_empty());
    assert_eq!(board.issue, Some(BoardIssue::NoCalendars));
    assert_eq!(
        board.error.as_deref(),
        Some("No calendars available for this account")
    );
}

#[tokio::test]
async fn test_all_calendars_failing_reports_error() {
    let provider = MockCalendarProvider::new()
        .with_failing_calendar("a")
        .with_failing_calendar("b");
    let calendars = provider.calendars();
    let (service, _) = service(provider);

    let board = service
        .fetch_all_events_at(&ctx(), &calendars, None, now())
        .await;

    assert_eq!(board.issue, Some(BoardIssue::AllCalendarsFailed));
    assert!(board.error.is_some());
    assert_eq!(board.calendars.len(), 2);
}

#[tokio::test]
async fn test_refresh_not_connected() {
    let (service, _) = service(MockCalendarProvider::disconnected());

    let board = service.refresh_at(&ctx(), None, now()).await;

    assert_eq!(board.issue, Some(BoardIssue::NotConnected));
    assert!(board.upcoming.is_empty());
    assert!(board.past.is_empty());
}

#[tokio::test]
async fn test_refresh_uses_configured_window() {
    let provider = Arc::new(
        MockCalendarProvider::new().with_calendar("primary", Vec::new()),
    );
    let service = DashboardService::new(
        provider.clone(),
        Arc::new(RecordingSummarizer::default()),
        DisplaySettings::default(),
        Tz::UTC,
    );

    service.refresh_at(&ctx(), None, now()).await;

    let queries = provider.queries.lock().await;
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].time_min, now() - Duration::days(7));
    assert_eq!(queries[0].time_max, now() + Duration::days(30));
    assert_eq!(queries[0].max_results, 20);
}

/// Chat with no message uses the default prompt and the fixed window
#[tokio::test]
async fn test_chat_default_prompt() {
    let provider = MockCalendarProvider::new().with_calendar(
        "primary",
        vec![
            timed("a", now() + Duration::days(1)),
            timed("b", now() - Duration::days(2)),
        ],
    );
    let (service, summarizer) = service(provider);

    let response = service.get_chat_at(&ctx(), None, now()).await.unwrap();

    assert_eq!(response.prompt, DEFAULT_PROMPT);
    assert_eq!(response.window_start, now() - Duration::days(7));
    assert_eq!(response.window_end, now() + Duration::days(30));
    assert_eq!(response.summary, "You have 2 events.");
    assert_eq!(response.raw_events.len(), 2);

    let requests = summarizer.requests.lock().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0.prompt, DEFAULT_PROMPT);
}

/// With every calendar failing the assistant is not asked
#[tokio::test]
async fn test_chat_all_calendars_failing() {
    let provider = MockCalendarProvider::new()
        .with_failing_calendar("a")
        .with_failing_calendar("b");
    let (service, summarizer) = service(provider);

    let response = service.get_chat_at(&ctx(), None, now()).await.unwrap();

    assert_eq!(
        response.error.as_deref(),
        Some("Failed to fetch events from every calendar")
    );
    assert!(response.summary.is_empty());
    assert!(response.raw_events.is_empty());
    assert_eq!(response.calendars.len(), 2);
    assert!(response.calendars.iter().all(|c| c.is_failed()));
    assert!(summarizer.requests.lock().await.is_empty());
}

#[tokio::test]
async fn test_chat_partial_failure_still_summarizes() {
    let provider = MockCalendarProvider::new()
        .with_failing_calendar("shared")
        .with_calendar("primary", vec![timed("a", now() + Duration::days(1))]);
    let (service, summarizer) = service(provider);

    let response = service.get_chat_at(&ctx(), None, now()).await.unwrap();

    assert!(response.error.is_none());
    assert_eq!(response.summary, "You have 1 events.");
    assert_eq!(response.calendars.len(), 2);
    assert!(response.calendars[0].is_failed());
    assert_eq!(summarizer.requests.lock().await.len(), 1);
}

#[tokio::test]
async fn test_chat_without_calendars() {
    let (service, summarizer) = service(MockCalendarProvider::new());

    let response = service.get_chat_at(&ctx(), None, now()).await.unwrap();

    assert_eq!(
        response.error.as_deref(),
        Some("No calendars available for this account")
    );
    assert!(summarizer.requests.lock().await.is_empty());
}

#[tokio::test]
async fn test_chat_requires_connection() {
    let (service, _) = service(MockCalendarProvider::disconnected());

    let result = service.get_chat_at(&ctx(), Some("Anything today?"), now()).await;

    assert!(matches!(result, Err(Error::NotConnected)));
}

#[tokio::test]
async fn test_overview_counts() {
    let provider = MockCalendarProvider::new()
        .with_calendar(
            "primary",
            vec![
                timed("later-today", now() + Duration::hours(3)),
                timed("earlier-today", now() - Duration::hours(3)),
                timed("tomorrow", now() + Duration::days(1)),
            ],
        )
        .with_failing_calendar("team");
    let (service, _) = service(provider);

    let overview = service.overview_at(&ctx(), now()).await;

    assert_eq!(overview.greeting, "Good afternoon");
    assert_eq!(overview.stats.total_meetings, 3);
    assert_eq!(overview.stats.upcoming_count, 2);
    assert_eq!(overview.stats.past_count, 1);
    assert_eq!(overview.stats.today_count, 2);
    assert_eq!(overview.stats.calendar_count, 2);
    assert_eq!(overview.stats.failed_calendars, 1);
    assert_eq!(
        overview.next_meeting.map(|m| m.event.id),
        Some("later-today".to_string())
    );
}

/// A failing calendar id is reported without hiding the others
#[tokio::test]
async fn test_calendar_details_isolates_failures() {
    let provider = MockCalendarProvider::new()
        .with_calendar("primary", Vec::new())
        .with_failing_calendar("shared")
        .with_calendar("team", Vec::new());
    let (service, _) = service(provider);
    let ids: Vec<String> = ["primary", "shared", "team", "unknown"]
        .iter()
        .map(|id| id.to_string())
        .collect();

    let report = service.calendar_details(&ctx(), &ids).await.unwrap();

    assert_eq!(report.summary.total, 4);
    assert_eq!(report.summary.successful, 2);
    assert_eq!(report.summary.failed, 2);

    let ok: Vec<&str> = report
        .successful
        .iter()
        .map(|d| d.calendar_id.as_str())
        .collect();
    assert_eq!(ok, vec!["primary", "team"]);
    assert_eq!(report.successful[1].details.summary.as_deref(), Some("team calendar"));

    let failed: Vec<&str> = report.failed.iter().map(|f| f.calendar_id.as_str()).collect();
    assert_eq!(failed, vec!["shared", "unknown"]);
    assert!(report.failed[0].reason.contains("404"));
}

#[tokio::test]
async fn test_calendar_details_requires_ids() {
    let (service, _) = service(MockCalendarProvider::new());

    let result = service
        .calendar_details(&ctx(), &["  ".to_string()])
        .await;

    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn test_calendar_details_requires_connection() {
    let (service, _) = service(MockCalendarProvider::disconnected());

    let result = service
        .calendar_details(&ctx(), &["primary".to_string()])
        .await;

    assert!(matches!(result, Err(Error::NotConnected)));
}
