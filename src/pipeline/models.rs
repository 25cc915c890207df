use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Color used when a calendar does not report one
pub const DEFAULT_CALENDAR_COLOR: &str = "#1967d2";

/// Title shown for events without a summary
pub const NO_TITLE: &str = "No Title";

/// Start or end of an event exactly as the provider sent it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEventTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

/// Person organizing an event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organizer {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPoint {
    #[serde(default)]
    pub entry_point_type: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceData {
    #[serde(default)]
    pub entry_points: Vec<EntryPoint>,
}

/// Calendar event record as returned by a provider, every field optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hangout_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference_data: Option<ConferenceData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<RawEventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<RawEventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer: Option<Organizer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Access level the user has on a calendar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessRole {
    Owner,
    Writer,
    Reader,
    FreeBusyReader,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A calendar the user can pick from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarRef {
    pub id: String,
    pub label: String,
    pub color: Option<String>,
    pub access_role: AccessRole,
    #[serde(default)]
    pub primary: bool,
}

/// Metadata of a single calendar
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDetails {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

/// Which calendar an event was aggregated from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    pub calendar_id: String,
    pub label: String,
    pub color: String,
}

impl From<&CalendarRef> for EventSource {
    fn from(calendar: &CalendarRef) -> Self {
        Self {
            calendar_id: calendar.id.clone(),
            label: calendar.label.clone(),
            color: calendar
                .color
                .clone()
                .unwrap_or_else(|| DEFAULT_CALENDAR_COLOR.to_string()),
        }
    }
}

/// Raw event decorated with its source calendar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcedEvent {
    pub source: EventSource,
    pub raw: RawEvent,
}

/// Timed or all-day point of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventTime {
    DateTime(DateTime<FixedOffset>),
    Date(NaiveDate),
}

impl EventTime {
    pub fn is_all_day(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }
}

/// Canonical event produced by the normalizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub start: EventTime,
    pub end: Option<EventTime>,
    pub location: Option<String>,
    pub conference_link: Option<String>,
    pub html_link: Option<String>,
    pub organizer: Option<Organizer>,
    pub source: EventSource,
    /// Comparable start instant, resolved in the dashboard timezone
    pub effective_start: DateTime<Utc>,
}

/// Event classified against a shared observation instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    #[serde(flatten)]
    pub event: Event,
    pub is_upcoming: bool,
    pub relative_label: String,
    pub when: String,
}
