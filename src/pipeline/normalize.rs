use super::models::{Event, EventTime, RawEvent, RawEventTime, SourcedEvent, NO_TITLE};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::debug;

/// Parse a provider time, preferring `dateTime` over `date`.
///
/// A `dateTime` without an offset is local to the record's `timeZone`, or to
/// `tz` when the record names none.
pub fn parse_event_time(time: &RawEventTime, tz: Tz) -> Option<EventTime> {
    let timed = time.date_time.as_deref().map(str::trim).and_then(|dt| {
        DateTime::parse_from_rfc3339(dt)
            .ok()
            .or_else(|| parse_local_date_time(dt, time.time_zone.as_deref(), tz))
    });
    if let Some(dt) = timed {
        return Some(EventTime::DateTime(dt));
    }

    // An unusable dateTime falls through to the all-day date
    time.date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
        .map(EventTime::Date)
}

fn parse_local_date_time(
    value: &str,
    time_zone: Option<&str>,
    tz: Tz,
) -> Option<DateTime<FixedOffset>> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    let zone = time_zone
        .and_then(|name| name.trim().parse::<Tz>().ok())
        .unwrap_or(tz);
    zone.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}

/// Instant an event time refers to; all-day dates start at midnight in `tz`
pub fn effective_instant(time: &EventTime, tz: Tz) -> DateTime<Utc> {
    match time {
        EventTime::DateTime(dt) => dt.with_timezone(&Utc),
        EventTime::Date(date) => {
            let midnight = date.and_time(NaiveTime::MIN);
            tz.from_local_datetime(&midnight)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn conference_link(raw: &RawEvent) -> Option<String> {
    non_blank(raw.hangout_link.clone()).or_else(|| {
        raw.conference_data.as_ref().and_then(|data| {
            data.entry_points
                .iter()
                .find(|ep| ep.entry_point_type.as_deref() == Some("video"))
                .and_then(|ep| non_blank(ep.uri.clone()))
        })
    })
}

/// Turn a decorated raw record into a canonical event, or drop it
pub fn normalize(sourced: SourcedEvent, tz: Tz) -> Option<Event> {
    let SourcedEvent { source, raw } = sourced;

    let start = match raw.start.as_ref().and_then(|t| parse_event_time(t, tz)) {
        Some(start) => start,
        None => {
            debug!(
                calendar_id = %source.calendar_id,
                event_id = raw.id.as_deref().unwrap_or(""),
                "Dropping event without a usable start"
            );
            return None;
        }
    };

    let end = raw.end.as_ref().and_then(|t| parse_event_time(t, tz));
    let conference_link = conference_link(&raw);

    Some(Event {
        id: raw.id.unwrap_or_default(),
        title: non_blank(raw.summary).unwrap_or_else(|| NO_TITLE.to_string()),
        description: non_blank(raw.description),
        start,
        end,
        location: non_blank(raw.location),
        conference_link,
        html_link: non_blank(raw.html_link),
        organizer: raw.organizer,
        source,
        effective_start: effective_instant(&start, tz),
    })
}

/// Normalize a pool, keeping input order for the survivors
pub fn normalize_all(pool: Vec<SourcedEvent>, tz: Tz) -> Vec<Event> {
    pool.into_iter().filter_map(|e| normalize(e, tz)).collect()
}
