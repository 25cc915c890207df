use super::models::Meeting;

/// Stable ascending sort by effective start; ties keep fetch order
pub fn sort_meetings(meetings: &mut [Meeting]) {
    meetings.sort_by_key(|m| m.event.effective_start);
}

/// Soonest `limit` upcoming meetings, soonest first
pub fn select_upcoming(sorted: &[Meeting], limit: usize) -> Vec<Meeting> {
    sorted
        .iter()
        .filter(|m| m.is_upcoming)
        .take(limit)
        .cloned()
        .collect()
}

/// Latest `limit` past meetings, most recent first
pub fn select_past(sorted: &[Meeting], limit: usize) -> Vec<Meeting> {
    let past: Vec<&Meeting> = sorted.iter().filter(|m| !m.is_upcoming).collect();
    let skip = past.len().saturating_sub(limit);
    past.into_iter().skip(skip).rev().cloned().collect()
}
