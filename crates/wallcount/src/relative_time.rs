//! Relative time normalizer.
//!
//! The source page reports freshness as a phrase such as
//! `Last updated:&nbsp12 mins ago (10:42 AM)`, usually with its whitespace
//! already stripped by the sanitizer. This module anchors that phrase to a
//! supplied "now" and produces an absolute timestamp at minute resolution.

use std::sync::LazyLock;

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use regex::Regex;

use crate::types::{WallError, WallResult};

static RE_NOW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)now").expect("valid regex"));

static RE_RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)?\s*(days?|hours?|mins?)ago").expect("valid regex")
});

/// Drop seconds and sub-second components.
pub fn truncate_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}

/// Convert a relative-time field into an absolute timestamp anchored at `now`.
///
/// Returns `Ok(None)` for an empty field or the literal `null`. The unit word
/// must run straight into `ago` (`5minsago`, `5 minsago`); `5 mins ago` is
/// unrecognized.
pub fn normalize(raw: &str, now: DateTime<Utc>) -> WallResult<Option<DateTime<Utc>>> {
    if raw.is_empty() || raw == "null" {
        return Ok(None);
    }

    if RE_NOW.is_match(raw) {
        return Ok(Some(truncate_to_minute(now)));
    }

    let unrecognized = || WallError::UnrecognizedTimeFormat(raw.to_string());

    let caps = RE_RELATIVE.captures(raw).ok_or_else(unrecognized)?;
    let n: i64 = match caps.get(1) {
        Some(m) => m.as_str().parse().map_err(|_| unrecognized())?,
        None => 1,
    };

    let unit = caps[2].to_ascii_lowercase();
    let delta = match unit.trim_end_matches('s') {
        "day" => n.checked_mul(24).and_then(TimeDelta::try_hours),
        "hour" => TimeDelta::try_hours(n),
        "min" => TimeDelta::try_minutes(n),
        _ => None,
    }
    .ok_or_else(unrecognized)?;

    let at = now.checked_sub_signed(delta).ok_or_else(unrecognized)?;
    Ok(Some(truncate_to_minute(at)))
}
