//! Lenient decoding for snapshot payloads
//!
//! Snapshot rows are stored as JSON. Depending on how a row was serialized,
//! integer columns can show up as numbers, as whole floats (`12.0`) or as
//! numeric text (`"12"`), and dates either as `YYYY-MM-DD` or as a full
//! RFC 3339 timestamp. These helpers normalize all of them at the boundary.

use chrono::{DateTime, NaiveDate};
use serde::{de, Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Int(i64),
    Float(f64),
    Text(String),
}

fn whole_number<E: de::Error>(value: NumberOrText) -> Result<i32, E> {
    let n = match value {
        NumberOrText::Int(n) => n,
        NumberOrText::Float(f) => float_to_whole(f)?,
        NumberOrText::Text(s) => {
            let trimmed = s.trim();
            match trimmed.parse::<i64>() {
                Ok(n) => n,
                Err(_) => {
                    let f = trimmed
                        .parse::<f64>()
                        .map_err(|_| E::custom(format!("expected a number, got {:?}", s)))?;
                    float_to_whole(f)?
                }
            }
        }
    };
    i32::try_from(n).map_err(|_| E::custom(format!("number {} out of range", n)))
}

fn float_to_whole<E: de::Error>(f: f64) -> Result<i64, E> {
    if f.is_finite() && f.fract() == 0.0 {
        Ok(f as i64)
    } else {
        Err(E::custom(format!("expected a whole number, got {}", f)))
    }
}

/// Deserialize an `i32` from a JSON number or numeric string
pub fn i32_lenient<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    whole_number(NumberOrText::deserialize(deserializer)?)
}

/// Like [`i32_lenient`], with `null` and blank strings mapping to `None`
pub fn option_i32_lenient<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(value) => whole_number(value).map(Some),
    }
}

/// Deserialize a calendar date from `YYYY-MM-DD` or an RFC 3339 timestamp
pub fn date_lenient<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.date_naive())
        .map_err(|_| de::Error::custom(format!("expected a date, got {:?}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(deserialize_with = "i32_lenient")]
        stock: i32,
        #[serde(default, deserialize_with = "option_i32_lenient")]
        threshold: Option<i32>,
        #[serde(deserialize_with = "date_lenient")]
        expiry: NaiveDate,
    }

    #[test]
    fn test_accepts_numbers_and_text() {
        let probe: Probe = serde_json::from_value(json!({
            "stock": "120",
            "threshold": 15,
            "expiry": "2025-06-30"
        }))
        .unwrap();
        assert_eq!(probe.stock, 120);
        assert_eq!(probe.threshold, Some(15));
        assert_eq!(probe.expiry, NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());
    }

    #[test]
    fn test_accepts_whole_floats_and_timestamps() {
        let probe: Probe = serde_json::from_value(json!({
            "stock": 40.0,
            "threshold": "7.0",
            "expiry": "2025-06-30T00:00:00.000Z"
        }))
        .unwrap();
        assert_eq!(probe.stock, 40);
        assert_eq!(probe.threshold, Some(7));
        assert_eq!(probe.expiry, NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());
    }

    #[test]
    fn test_missing_or_blank_option_is_none() {
        let probe: Probe =
            serde_json::from_value(json!({"stock": 1, "expiry": "2025-01-01"})).unwrap();
        assert_eq!(probe.threshold, None);

        let probe: Probe = serde_json::from_value(
            json!({"stock": 1, "threshold": " ", "expiry": "2025-01-01"}),
        )
        .unwrap();
        assert_eq!(probe.threshold, None);
    }

    #[test]
    fn test_rejects_fractions_and_garbage() {
        let fractional = serde_json::from_value::<Probe>(json!({
            "stock": 12.5,
            "expiry": "2025-01-01"
        }));
        assert!(fractional.is_err());

        let garbage = serde_json::from_value::<Probe>(json!({
            "stock": "twelve",
            "expiry": "2025-01-01"
        }));
        assert!(garbage.is_err());

        let bad_date = serde_json::from_value::<Probe>(json!({
            "stock": 1,
            "expiry": "30/06/2025"
        }));
        assert!(bad_date.is_err());
    }
}
