use super::models::{CalendarDetails, CalendarRef, EventSource, SourcedEvent};
use crate::components::{CalendarProvider, EventQuery, SessionContext};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Outcome of one calendar's fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum FetchStatus {
    Ok { event_count: usize },
    Failed { reason: String },
}

/// Per-calendar status reported alongside the aggregated events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarStatus {
    pub calendar_id: String,
    pub label: String,
    #[serde(flatten)]
    pub status: FetchStatus,
}

impl CalendarStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, FetchStatus::Failed { .. })
    }
}

/// Flattened pool plus the per-calendar outcome that produced it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub statuses: Vec<CalendarStatus>,
    pub events: Vec<SourcedEvent>,
}

impl Aggregation {
    pub fn failed_count(&self) -> usize {
        self.statuses.iter().filter(|s| s.is_failed()).count()
    }
}

/// Fetch every calendar concurrently; a failing calendar only marks its own status
pub async fn aggregate(
    provider: &dyn CalendarProvider,
    ctx: &SessionContext,
    calendars: &[CalendarRef],
    query: &EventQuery,
) -> Aggregation {
    let fetches = calendars.iter().map(|calendar| async move {
        let result = provider.list_events(ctx, &calendar.id, query).await;
        (calendar, result)
    });

    // join_all yields results in input order, whatever order the fetches finish in
    let results = join_all(fetches).await;

    let mut aggregation = Aggregation::default();
    for (calendar, result) in results {
        match result {
            Ok(raw_events) => {
                let source = EventSource::from(calendar);
                aggregation.statuses.push(CalendarStatus {
                    calendar_id: calendar.id.clone(),
                    label: calendar.label.clone(),
                    status: FetchStatus::Ok {
                        event_count: raw_events.len(),
                    },
                });
                aggregation
                    .events
                    .extend(raw_events.into_iter().map(|raw| SourcedEvent {
                        source: source.clone(),
                        raw,
                    }));
            }
            Err(e) => {
                warn!(
                    calendar_id = %calendar.id,
                    calendar = %calendar.label,
                    "Failed to fetch events: {}",
                    e
                );
                aggregation.statuses.push(CalendarStatus {
                    calendar_id: calendar.id.clone(),
                    label: calendar.label.clone(),
                    status: FetchStatus::Failed {
                        reason: e.to_string(),
                    },
                });
            }
        }
    }

    info!(
        "Fetched {} events from {} calendars ({} failed)",
        aggregation.events.len(),
        calendars.len(),
        aggregation.failed_count()
    );

    aggregation
}

/// Details fetched for one calendar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDetailsEntry {
    pub calendar_id: String,
    pub details: CalendarDetails,
}

/// A calendar whose details could not be fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedCalendar {
    pub calendar_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailsSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Outcome of a details fan-out, in requested order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailsReport {
    pub successful: Vec<CalendarDetailsEntry>,
    pub failed: Vec<FailedCalendar>,
    pub summary: DetailsSummary,
}

/// Fetch details of every calendar concurrently; failures are reported per id
pub async fn fetch_details(
    provider: &dyn CalendarProvider,
    ctx: &SessionContext,
    calendar_ids: &[String],
) -> DetailsReport {
    let fetches = calendar_ids.iter().map(|calendar_id| async move {
        let result = provider.get_calendar(ctx, calendar_id).await;
        (calendar_id, result)
    });
    let results = join_all(fetches).await;

    let mut report = DetailsReport::default();
    for (calendar_id, result) in results {
        match result {
            Ok(mut details) => {
                if details.id.is_empty() {
                    details.id = calendar_id.clone();
                }
                report.successful.push(CalendarDetailsEntry {
                    calendar_id: calendar_id.clone(),
                    details,
                });
            }
            Err(e) => {
                warn!(calendar_id = %calendar_id, "Failed to fetch calendar details: {}", e);
                report.failed.push(FailedCalendar {
                    calendar_id: calendar_id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    report.summary = DetailsSummary {
        total: calendar_ids.len(),
        successful: report.successful.len(),
        failed: report.failed.len(),
    };
    info!(
        "Calendar details: {} successful, {} failed",
        report.summary.successful, report.summary.failed
    );

    report
}
