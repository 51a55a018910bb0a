//! FILENAME: core/model/src/date.rs
//! PURPOSE: Lenient birth-date parsing for fetched records.
//! CONTEXT: The backing store hands dates over in several shapes (plain ISO
//! dates, full timestamps, French day-first dates, epoch milliseconds).
//! Anything we cannot read becomes `None`: the record stays valid and only
//! drops out of age-based groupings.

use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};

pub use chrono::NaiveDate;

/// Parses a birth date from its textual form.
///
/// Accepted forms, tried in order:
/// - `YYYY-MM-DD`
/// - RFC 3339 timestamps (`2019-06-15T00:00:00.000Z`)
/// - naive timestamps (`2019-06-15T08:30:00`, `2019-06-15 08:30:00`)
/// - `DD/MM/YYYY`
pub fn parse_birth_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts.date());
        }
    }
    NaiveDate::parse_from_str(raw, "%d/%m/%Y").ok()
}

/// Serde adapter: reads any supported date shape, mapping unreadable input to `None`.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_option(LenientDateVisitor)
}

struct LenientDateVisitor;

impl<'de> Visitor<'de> for LenientDateVisitor {
    type Value = Option<NaiveDate>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a date string, epoch milliseconds or null")
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(LenientDateVisitor)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(parse_birth_date(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(DateTime::from_timestamp_millis(v).map(|ts| ts.date_naive()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(i64::try_from(v)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .map(|ts| ts.date_naive()))
    }

    fn visit_f64<E: de::Error>(self, _v: f64) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_bool<E: de::Error>(self, _v: bool) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(None)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(None)
    }
}
