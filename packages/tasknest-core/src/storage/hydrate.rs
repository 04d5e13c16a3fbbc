/// Lenient date re-hydration for persisted snapshots.
///
/// Timestamps are written as RFC 3339 strings. On the way back in we also
/// accept bare `YYYY-MM-DD` dates and epoch milliseconds. A value that does
/// not parse never survives as-is: required fields fall back to the current
/// time, optional fields become absent.
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parse one persisted date representation.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => {
            let raw = raw.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
                return Some(dt.with_timezone(&Utc));
            }
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// Deserializer for required timestamps: invalid or null becomes now.
pub fn timestamp_or_now<'de, D>(d: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(d)?;
    Ok(parse_timestamp(&value).unwrap_or_else(|| {
        log::warn!(
            "[tasknest.storage.hydrate] Unparseable timestamp {}, using current time",
            value
        );
        Utc::now()
    }))
}

/// Deserializer for optional timestamps: invalid or null becomes `None`.
pub fn optional_timestamp<'de, D>(d: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(d)?;
    if value.is_null() {
        return Ok(None);
    }
    let parsed = parse_timestamp(&value);
    if parsed.is_none() {
        log::warn!(
            "[tasknest.storage.hydrate] Unparseable optional date {}, dropping it",
            value
        );
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use serde_json::json;

    #[test]
    fn test_parse_rfc3339() {
        let dt = parse_timestamp(&json!("2026-05-04T10:30:00+02:00")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-05-04T08:30:00+00:00");
    }

    #[test]
    fn test_parse_plain_date() {
        let dt = parse_timestamp(&json!("2026-05-04")).unwrap();
        assert_eq!(dt.day(), 4);
    }

    #[test]
    fn test_parse_epoch_millis() {
        let dt = parse_timestamp(&json!(0)).unwrap();
        assert_eq!(dt.year(), 1970);
    }

    #[test]
    fn test_timestamp_or_now_falls_back_to_now() {
        let started = Utc::now();
        for bad in [json!("Invalid Date"), json!(null), json!(true), json!("")] {
            let dt = timestamp_or_now(bad).unwrap();
            assert!(dt >= started);
            assert!(dt <= Utc::now());
        }
        let kept = timestamp_or_now(json!("2026-01-01T00:00:00Z")).unwrap();
        assert_eq!(kept, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_optional_timestamp_drops_garbage() {
        assert_eq!(optional_timestamp(json!("someday")).unwrap(), None);
        assert_eq!(optional_timestamp(json!(null)).unwrap(), None);
        assert!(optional_timestamp(json!("2026-03-01")).unwrap().is_some());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(parse_timestamp(&json!("Invalid Date")).is_none());
        assert!(parse_timestamp(&json!({})).is_none());
        assert!(parse_timestamp(&Value::Null).is_none());
    }
}
