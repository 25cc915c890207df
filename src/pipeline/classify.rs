use super::models::{Event, EventTime, Meeting};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;

const MINUTES_PER_HOUR: i64 = 60;
const MINUTES_PER_DAY: i64 = 24 * MINUTES_PER_HOUR;

/// Split a non-negative gap into whole days, hours and minutes
fn split_gap(start: DateTime<Utc>, end: DateTime<Utc>) -> (i64, i64, i64) {
    let minutes = (end - start).num_minutes().max(0);
    (
        minutes / MINUTES_PER_DAY,
        (minutes % MINUTES_PER_DAY) / MINUTES_PER_HOUR,
        minutes % MINUTES_PER_HOUR,
    )
}

/// Label for an event that has not started yet
pub fn time_until(start: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let (days, hours, minutes) = split_gap(now, start);
    if days > 0 {
        format!("in {}d {}h", days, hours)
    } else if hours > 0 {
        format!("in {}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("in {}m", minutes)
    } else {
        "now".to_string()
    }
}

/// Label for an event that already started
pub fn time_since(start: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let (days, hours, _) = split_gap(start, now);
    if days > 0 {
        format!("{}d ago", days)
    } else if hours > 0 {
        format!("{}h ago", hours)
    } else {
        "recently".to_string()
    }
}

fn format_day(date: NaiveDate, current_year: i32) -> String {
    if date.year() != current_year {
        date.format("%b %-d, %Y").to_string()
    } else {
        date.format("%b %-d").to_string()
    }
}

/// Human readable span such as "Jan 5 10:00 AM - 11:00 AM" or "Jan 5 (All day)"
pub fn format_when(event: &Event, now: DateTime<Utc>, tz: Tz) -> String {
    let current_year = now.with_timezone(&tz).year();

    match event.start {
        EventTime::Date(date) => format!("{} (All day)", format_day(date, current_year)),
        EventTime::DateTime(start) => {
            let local_start = start.with_timezone(&tz);
            let day = format_day(local_start.date_naive(), current_year);
            let start_time = local_start.format("%-I:%M %p");
            match event.end {
                Some(EventTime::DateTime(end)) => format!(
                    "{} {} - {}",
                    day,
                    start_time,
                    end.with_timezone(&tz).format("%-I:%M %p")
                ),
                _ => format!("{} {}", day, start_time),
            }
        }
    }
}

/// Decorate an event against the batch-wide `now`
pub fn classify(event: Event, now: DateTime<Utc>, tz: Tz) -> Meeting {
    let is_upcoming = event.effective_start > now;
    let relative_label = if is_upcoming {
        time_until(event.effective_start, now)
    } else {
        time_since(event.effective_start, now)
    };
    let when = format_when(&event, now, tz);

    Meeting {
        event,
        is_upcoming,
        relative_label,
        when,
    }
}

/// Classify a batch with one shared observation instant
pub fn classify_all(events: Vec<Event>, now: DateTime<Utc>, tz: Tz) -> Vec<Meeting> {
    events.into_iter().map(|e| classify(e, now, tz)).collect()
}
