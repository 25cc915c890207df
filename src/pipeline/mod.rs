//! Meeting pipeline: fan-out fetch, normalization, classification, sort and windowing.
//!
//! Every stage except [`aggregate::aggregate`] is a pure transform. The
//! observation instant `now` is captured once by the caller and threaded
//! through so that one batch never mixes two notions of "now".

pub mod aggregate;
pub mod chat;
pub mod classify;
pub mod models;
pub mod normalize;
pub mod window;

pub use aggregate::{
    aggregate, fetch_details, Aggregation, CalendarStatus, DetailsReport, FetchStatus,
};
pub use chat::{build_chat_request, ChatRequest, DEFAULT_PROMPT};
pub use models::{
    CalendarDetails, CalendarRef, Event, EventTime, Meeting, RawEvent, SourcedEvent,
};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Normalize, classify and sort a decorated pool
pub fn build_meetings(pool: Vec<SourcedEvent>, now: DateTime<Utc>, tz: Tz) -> Vec<Meeting> {
    let events = normalize::normalize_all(pool, tz);
    let mut meetings = classify::classify_all(events, now, tz);
    window::sort_meetings(&mut meetings);
    meetings
}
