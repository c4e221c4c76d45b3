//! Human-readable rendering of an observation for chat replies.

use chrono::{DateTime, TimeDelta, Utc};

use wallcount::OccupancyRecord;

const LONG_AGO: &str = "a long time ago";

/// Render a record as `"<when> there've been <N> <person|people> on the wall"`.
pub fn describe(record: &OccupancyRecord, now: DateTime<Utc>) -> String {
    let when = match record.last_update {
        Some(at) => humanize(now - at),
        None => LONG_AGO.to_string(),
    };
    format!("{when} there've been {} on the wall", headcount(record.count))
}

fn headcount(count: u32) -> String {
    match count {
        0 => "zero people".to_string(),
        1 => "one person".to_string(),
        n => format!("{n} people"),
    }
}

/// Humanized distance into the past. Timestamps ahead of `now` count as zero.
fn humanize(elapsed: TimeDelta) -> String {
    let secs = elapsed.num_seconds().max(0);
    let mins = secs / 60;
    let hours = mins / 60;
    let days = hours / 24;

    if days > 365 * 100 {
        return LONG_AGO.to_string();
    }

    if secs < 45 {
        "a few seconds ago".to_string()
    } else if secs < 90 {
        "a minute ago".to_string()
    } else if mins < 45 {
        format!("{} minutes ago", rounded(secs, 60).max(2))
    } else if mins < 90 {
        "an hour ago".to_string()
    } else if hours < 22 {
        format!("{} hours ago", rounded(mins, 60).max(2))
    } else if hours < 36 {
        "a day ago".to_string()
    } else if days < 26 {
        format!("{} days ago", rounded(hours, 24).max(2))
    } else if days < 45 {
        "a month ago".to_string()
    } else if days < 320 {
        format!("{} months ago", rounded(days, 30).max(2))
    } else if days < 548 {
        "a year ago".to_string()
    } else {
        format!("{} years ago", rounded(days, 365).max(2))
    }
}

fn rounded(value: i64, unit: i64) -> i64 {
    (value + unit / 2) / unit
}
