//! Identity and time types for FieldOps records

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Record identifier as assigned by the backend.
///
/// Tables keyed by `uuid` hand back text ids, tables keyed by a serial column
/// hand back integers. Equality and hashing go through the textual form, so
/// `Number(7)` and `Text("7")` name the same record; that is how the id
/// travels in `id=eq.7` filters anyway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl RecordId {
    /// Textual form used in filters and for comparisons.
    pub fn as_key(&self) -> String {
        match self {
            RecordId::Number(n) => n.to_string(),
            RecordId::Text(s) => s.clone(),
        }
    }
}

impl PartialEq for RecordId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RecordId::Number(a), RecordId::Number(b)) => a == b,
            (RecordId::Text(a), RecordId::Text(b)) => a == b,
            (RecordId::Number(n), RecordId::Text(s)) | (RecordId::Text(s), RecordId::Number(n)) => {
                *s == n.to_string()
            }
        }
    }
}

impl Eq for RecordId {}

impl Hash for RecordId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_key().hash(state);
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Number(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Text(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        RecordId::Text(value)
    }
}

/// Error when parsing an empty record id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordIdParseError;

impl fmt::Display for RecordIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record id must not be empty")
    }
}

impl std::error::Error for RecordIdParseError {}

impl FromStr for RecordId {
    type Err = RecordIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(RecordIdParseError);
        }
        Ok(match trimmed.parse::<i64>() {
            Ok(n) => RecordId::Number(n),
            Err(_) => RecordId::Text(trimmed.to_string()),
        })
    }
}

/// Parse a timestamp the way Postgres-backed APIs emit them.
///
/// Accepts RFC 3339, Postgres text output (`2024-01-02 10:00:00.5+00`),
/// naive date-times (taken as UTC) and bare dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"] {
        if let Ok(ts) = DateTime::parse_from_str(raw, format) {
            return Some(ts.with_timezone(&Utc));
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Serde adapter for required timestamps decoded with [`parse_timestamp`].
pub mod lenient_timestamp {
    use super::{parse_timestamp, Timestamp};
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", raw)))
    }
}

/// Serde adapter for optional timestamps decoded with [`parse_timestamp`].
pub mod lenient_timestamp_opt {
    use super::{parse_timestamp, Timestamp};
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Timestamp>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Timestamp>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) => parse_timestamp(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", raw))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};
    use proptest::prelude::*;
    use std::collections::hash_map::DefaultHasher;
    use std::collections::HashSet;

    fn hash_of(id: &RecordId) -> u64 {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_record_id_numeric_and_text_forms_are_equal() {
        assert_eq!(RecordId::Number(7), RecordId::Text("7".to_string()));
        assert_ne!(RecordId::Number(7), RecordId::Text("07".to_string()));

        let mut ids = HashSet::new();
        ids.insert(RecordId::Number(7));
        assert!(ids.contains(&RecordId::from("7")));
    }

    #[test]
    fn test_record_id_from_str() {
        assert_eq!("42".parse::<RecordId>(), Ok(RecordId::Number(42)));
        assert!(matches!("abc".parse::<RecordId>(), Ok(RecordId::Text(ref s)) if s == "abc"));
        assert_eq!("  ".parse::<RecordId>(), Err(RecordIdParseError));
    }

    #[test]
    fn test_record_id_untagged_serde() {
        let number: RecordId = serde_json::from_str("12").expect("number id");
        assert!(matches!(number, RecordId::Number(12)));
        let text: RecordId = serde_json::from_str("\"a\"").expect("text id");
        assert!(matches!(text, RecordId::Text(ref s) if s == "a"));
        assert_eq!(serde_json::to_string(&RecordId::Number(3)).expect("serialize"), "3");
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp("2024-01-02T10:30:00+02:00").expect("rfc3339");
        assert_eq!(rfc.hour(), 8);

        let pg = parse_timestamp("2024-01-02 10:30:00.25+00").expect("postgres text");
        assert_eq!(pg.minute(), 30);

        let naive = parse_timestamp("2024-01-02T10:30:00").expect("naive");
        assert_eq!(naive.hour(), 10);

        let date = parse_timestamp("2024-01-02").expect("date only");
        assert_eq!((date.year(), date.month(), date.day(), date.hour()), (2024, 1, 2, 0));

        assert!(parse_timestamp("yesterday").is_none());
    }

    proptest! {
        #[test]
        fn numeric_and_text_ids_agree_on_eq_and_hash(n in any::<i64>()) {
            let number = RecordId::Number(n);
            let text = RecordId::Text(n.to_string());
            prop_assert_eq!(&number, &text);
            prop_assert_eq!(hash_of(&number), hash_of(&text));
        }

        #[test]
        fn record_id_display_parses_back(id in prop_oneof![
            any::<i64>().prop_map(RecordId::Number),
            "[a-z][a-z0-9-]{0,20}".prop_map(RecordId::Text),
        ]) {
            let parsed: RecordId = id.to_string().parse().expect("non-empty id");
            prop_assert_eq!(parsed, id);
        }

        #[test]
        fn rfc3339_and_postgres_text_parse_to_same_instant(
            secs in 0i64..4_102_444_800,
            micros in 0u32..1_000_000,
        ) {
            let ts = Utc
                .timestamp_opt(secs, micros * 1_000)
                .single()
                .expect("in range");
            prop_assert_eq!(parse_timestamp(&ts.to_rfc3339()), Some(ts));
            let pg = ts.format("%Y-%m-%d %H:%M:%S%.6f+00").to_string();
            prop_assert_eq!(parse_timestamp(&pg), Some(ts));
        }
    }
}
