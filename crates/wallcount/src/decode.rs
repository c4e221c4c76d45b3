//! Occupancy decoder: sanitized JSON → [`OccupancyRegistry`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::relative_time::normalize;
use crate::sanitize::sanitize_literal;
use crate::scanner::scan_html;
use crate::types::{LiteralFault, OccupancyRecord, OccupancyRegistry, WallError, WallResult};

/// One location as it appears in the page literal. `subLabel` is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    #[serde(default)]
    capacity: u32,
    #[serde(default)]
    count: u32,
    #[serde(default)]
    last_update: Option<String>,
}

/// Decode sanitized JSON, normalizing every `lastUpdate` against `now`.
///
/// Any record with an unrecognized time phrase fails the whole decode.
pub fn decode_registry(json: &str, now: DateTime<Utc>) -> WallResult<OccupancyRegistry> {
    if json.is_empty() {
        return Err(WallError::MalformedLiteral(LiteralFault::Empty));
    }

    let raw: HashMap<String, RawRecord> =
        serde_json::from_str(json)
            .map_err(|e| WallError::MalformedLiteral(LiteralFault::Json(e.to_string())))?;

    raw.into_iter()
        .map(|(key, rec)| -> WallResult<(String, OccupancyRecord)> {
            let last_update = normalize(rec.last_update.as_deref().unwrap_or(""), now)?;
            Ok((key, OccupancyRecord::new(rec.count, rec.capacity, last_update)))
        })
        .collect()
}

/// Run the full extraction pipeline over raw page HTML.
pub fn extract_registry(html: &str, now: DateTime<Utc>) -> WallResult<OccupancyRegistry> {
    let text = scan_html(html).ok_or(WallError::MarkerNotFound)?;
    let json = sanitize_literal(&text);
    tracing::debug!(bytes = json.len(), "sanitized occupancy literal");
    decode_registry(&json, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relative_time::truncate_to_minute;
    use chrono::{TimeDelta, TimeZone};

    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 30, 10, 16, 42).unwrap()
    }

    #[test]
    fn test_decode_two_locations() {
        let json = r#"{"SBG":{"capacity":60,"count":8,"subLabel":"Currentclimbercount","lastUpdate":"Lastupdated:&nbspnow(10:16AM)"},"SBL":{"capacity":100,"count":3,"subLabel":"Currentclimbercount","lastUpdate":"Lastupdated:&nbsp8minsago(10:09AM)"}}"#;
        let registry = decode_registry(json, anchor()).unwrap();

        assert_eq!(registry.len(), 2);
        let sbg = registry.record("SBG");
        assert_eq!(sbg.count, 8);
        assert_eq!(sbg.capacity, 60);
        assert_eq!(sbg.last_update, Some(truncate_to_minute(anchor())));

        let sbl = registry.record("SBL");
        assert_eq!(
            sbl.last_update,
            Some(truncate_to_minute(anchor() - TimeDelta::minutes(8)))
        );
    }

    #[test]
    fn test_decode_is_idempotent() {
        let json = r#"{"A":{"capacity":1,"count":1,"lastUpdate":"now"}}"#;
        assert_eq!(
            decode_registry(json, anchor()).unwrap(),
            decode_registry(json, anchor()).unwrap()
        );
    }

    #[test]
    fn test_null_and_missing_last_update() {
        let json = r#"{"A":{"capacity":5,"count":2,"lastUpdate":null},"B":{"count":4},"C":{"count":1,"lastUpdate":"null"}}"#;
        let registry = decode_registry(json, anchor()).unwrap();
        assert_eq!(registry.record("A"), OccupancyRecord::new(2, 5, None));
        assert_eq!(registry.record("B"), OccupancyRecord::new(4, 0, None));
        assert_eq!(registry.record("C").last_update, None);
    }

    #[test]
    fn test_bad_time_fails_whole_decode() {
        let json = r#"{"A":{"count":1,"lastUpdate":"now"},"B":{"count":2,"lastUpdate":"soon"}}"#;
        assert!(matches!(
            decode_registry(json, anchor()),
            Err(WallError::UnrecognizedTimeFormat(_))
        ));
    }

    #[test]
    fn test_empty_is_malformed_no_data() {
        let err = decode_registry("", anchor()).unwrap_err();
        assert!(matches!(err, WallError::MalformedLiteral(LiteralFault::Empty)));
        assert!(err.is_no_data());
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = decode_registry(r#"{"A":{"count":1},}"#, anchor()).unwrap_err();
        assert!(matches!(err, WallError::MalformedLiteral(LiteralFault::Json(_))));
        assert!(!err.is_no_data());

        let err = decode_registry(r#"{"A":{"count":-1}}"#, anchor()).unwrap_err();
        assert!(matches!(err, WallError::MalformedLiteral(_)));
    }

    #[test]
    fn test_extract_without_marker() {
        let err = extract_registry("<html><body>closed</body></html>", anchor()).unwrap_err();
        assert!(matches!(err, WallError::MarkerNotFound));
    }
}
