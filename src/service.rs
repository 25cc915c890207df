//! Dashboard orchestration: one aggregation run per request, chat, and the
//! overview numbers shown on the landing page.

use crate::components::{CalendarProvider, EventQuery, SessionContext, Summarizer};
use crate::config::DisplaySettings;
use crate::error::{invalid_input_error, DashResult, Error};
use crate::pipeline::window::{select_past, select_upcoming};
use crate::pipeline::{
    aggregate, build_chat_request, build_meetings, fetch_details, CalendarRef, CalendarStatus,
    DetailsReport, Meeting,
};
use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

const ALL_CALENDARS_FAILED: &str = "Failed to fetch events from every calendar";

/// Why a board came back without meetings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardIssue {
    /// The user has no calendar connection
    NotConnected,
    /// Listing the user's calendars failed
    ListingFailed,
    /// The account has no calendars
    NoCalendars,
    /// Every calendar fetch failed
    AllCalendarsFailed,
}

/// Result of one aggregation run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingBoard {
    /// Every meeting, ascending by start
    pub meetings: Vec<Meeting>,
    /// Soonest upcoming meetings first
    pub upcoming: Vec<Meeting>,
    /// Most recent past meetings first
    pub past: Vec<Meeting>,
    /// Per-calendar fetch outcome
    pub calendars: Vec<CalendarStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub issue: Option<BoardIssue>,
}

impl MeetingBoard {
    fn failed(issue: BoardIssue, message: String) -> Self {
        Self {
            meetings: Vec::new(),
            upcoming: Vec::new(),
            past: Vec::new(),
            calendars: Vec::new(),
            error: Some(message),
            issue: Some(issue),
        }
    }
}

/// Assistant answer plus the events it was given
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// Empty when the assistant was not asked
    pub summary: String,
    pub raw_events: Vec<Meeting>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub prompt: String,
    /// Per-calendar fetch outcome for the chat window
    pub calendars: Vec<CalendarStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Numbers shown on the dashboard landing page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingStats {
    pub total_meetings: usize,
    pub upcoming_count: usize,
    pub past_count: usize,
    pub today_count: usize,
    pub calendar_count: usize,
    pub failed_calendars: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub greeting: String,
    pub stats: MeetingStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_meeting: Option<Meeting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Greeting for the local hour
pub fn greeting_for(now: DateTime<Utc>, tz: Tz) -> &'static str {
    match now.with_timezone(&tz).hour() {
        0..=11 => "Good morning",
        12..=17 => "Good afternoon",
        _ => "Good evening",
    }
}

/// Orchestrates providers, the pipeline and the summarizer for one user request
#[derive(Clone)]
pub struct DashboardService {
    provider: Arc<dyn CalendarProvider>,
    summarizer: Arc<dyn Summarizer>,
    settings: DisplaySettings,
    tz: Tz,
}

impl DashboardService {
    pub fn new(
        provider: Arc<dyn CalendarProvider>,
        summarizer: Arc<dyn Summarizer>,
        settings: DisplaySettings,
        tz: Tz,
    ) -> Self {
        Self {
            provider,
            summarizer,
            settings,
            tz,
        }
    }

    pub fn provider(&self) -> &Arc<dyn CalendarProvider> {
        &self.provider
    }

    pub fn settings(&self) -> &DisplaySettings {
        &self.settings
    }

    /// Calendars of the connected account
    pub async fn list_calendars(&self, ctx: &SessionContext) -> DashResult<Vec<CalendarRef>> {
        if !self.provider.is_connected(ctx).await? {
            return Err(Error::NotConnected);
        }
        self.provider.list_calendars(ctx).await
    }

    /// Details of the requested calendars; one failing id does not hide the others
    pub async fn calendar_details(
        &self,
        ctx: &SessionContext,
        calendar_ids: &[String],
    ) -> DashResult<DetailsReport> {
        let calendar_ids: Vec<String> = calendar_ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if calendar_ids.is_empty() {
            return Err(invalid_input_error("calendarIds is required"));
        }
        if !self.provider.is_connected(ctx).await? {
            return Err(Error::NotConnected);
        }

        Ok(fetch_details(self.provider.as_ref(), ctx, &calendar_ids).await)
    }

    /// Aggregate the given calendars into a board
    pub async fn fetch_all_events(
        &self,
        ctx: &SessionContext,
        calendars: &[CalendarRef],
        limit: Option<usize>,
    ) -> MeetingBoard {
        self.fetch_all_events_at(ctx, calendars, limit, Utc::now())
            .await
    }

    /// Same as [`Self::fetch_all_events`] with an explicit observation instant
    pub async fn fetch_all_events_at(
        &self,
        ctx: &SessionContext,
        calendars: &[CalendarRef],
        limit: Option<usize>,
        now: DateTime<Utc>,
    ) -> MeetingBoard {
        if calendars.is_empty() {
            return MeetingBoard::failed(BoardIssue::NoCalendars, Error::NoCalendars.to_string());
        }

        let query = EventQuery {
            time_min: now - Duration::days(self.settings.lookback_days),
            time_max: now + Duration::days(self.settings.lookahead_days),
            max_results: self.settings.fetch_max_results,
        };

        let aggregation = aggregate(self.provider.as_ref(), ctx, calendars, &query).await;
        let all_failed = aggregation.failed_count() == calendars.len();

        let meetings = build_meetings(aggregation.events, now, self.tz);
        let limit = limit.unwrap_or(self.settings.display_limit);

        let (error, issue) = if all_failed {
            (
                Some(ALL_CALENDARS_FAILED.to_string()),
                Some(BoardIssue::AllCalendarsFailed),
            )
        } else {
            (None, None)
        };

        MeetingBoard {
            upcoming: select_upcoming(&meetings, limit),
            past: select_past(&meetings, limit),
            meetings,
            calendars: aggregation.statuses,
            error,
            issue,
        }
    }

    /// List the user's calendars and aggregate all of them
    pub async fn refresh(&self, ctx: &SessionContext, limit: Option<usize>) -> MeetingBoard {
        self.refresh_at(ctx, limit, Utc::now()).await
    }

    pub async fn refresh_at(
        &self,
        ctx: &SessionContext,
        limit: Option<usize>,
        now: DateTime<Utc>,
    ) -> MeetingBoard {
        match self.list_calendars(ctx).await {
            Ok(calendars) => self.fetch_all_events_at(ctx, &calendars, limit, now).await,
            Err(Error::NotConnected) => {
                MeetingBoard::failed(BoardIssue::NotConnected, Error::NotConnected.to_string())
            }
            Err(e) => {
                error!("Failed to list calendars via {}: {}", self.provider.name(), e);
                MeetingBoard::failed(BoardIssue::ListingFailed, e.to_string())
            }
        }
    }

    /// Ask the assistant about the chat window
    pub async fn get_chat(
        &self,
        ctx: &SessionContext,
        message: Option<&str>,
    ) -> DashResult<ChatResponse> {
        self.get_chat_at(ctx, message, Utc::now()).await
    }

    pub async fn get_chat_at(
        &self,
        ctx: &SessionContext,
        message: Option<&str>,
        now: DateTime<Utc>,
    ) -> DashResult<ChatResponse> {
        let request = build_chat_request(message, now);

        let calendars = self.list_calendars(ctx).await?;
        let query = EventQuery {
            time_min: request.window_start,
            time_max: request.window_end,
            max_results: self.settings.fetch_max_results,
        };
        let aggregation = aggregate(self.provider.as_ref(), ctx, &calendars, &query).await;

        // The assistant is only asked when some calendar answered
        let error = if calendars.is_empty() {
            Some(Error::NoCalendars.to_string())
        } else if aggregation.failed_count() == calendars.len() {
            Some(ALL_CALENDARS_FAILED.to_string())
        } else {
            None
        };

        let meetings = build_meetings(aggregation.events, now, self.tz);
        let summary = match &error {
            Some(reason) => {
                warn!("Skipping chat for user {}: {}", ctx.user_id, reason);
                String::new()
            }
            None => {
                info!("Chat over {} events for user {}", meetings.len(), ctx.user_id);
                self.summarizer.summarize(&request, &meetings).await?
            }
        };

        Ok(ChatResponse {
            summary,
            raw_events: meetings,
            window_start: request.window_start,
            window_end: request.window_end,
            prompt: request.prompt,
            calendars: aggregation.statuses,
            error,
        })
    }

    /// Greeting and meeting statistics
    pub async fn overview(&self, ctx: &SessionContext) -> DashboardOverview {
        self.overview_at(ctx, Utc::now()).await
    }

    pub async fn overview_at(&self, ctx: &SessionContext, now: DateTime<Utc>) -> DashboardOverview {
        let board = self.refresh_at(ctx, None, now).await;

        let today = now.with_timezone(&self.tz).date_naive();
        let today_count = board
            .meetings
            .iter()
            .filter(|m| m.event.effective_start.with_timezone(&self.tz).date_naive() == today)
            .count();
        let upcoming_count = board.meetings.iter().filter(|m| m.is_upcoming).count();

        let stats = MeetingStats {
            total_meetings: board.meetings.len(),
            upcoming_count,
            past_count: board.meetings.len() - upcoming_count,
            today_count,
            calendar_count: board.calendars.len(),
            failed_calendars: board.calendars.iter().filter(|c| c.is_failed()).count(),
        };

        DashboardOverview {
            greeting: greeting_for(now, self.tz).to_string(),
            stats,
            next_meeting: board.upcoming.first().cloned(),
            error: board.error,
        }
    }
}
