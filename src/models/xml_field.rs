//! Serde helpers for exported scalar elements.
//!
//! Exporters write a null as an empty element (`<userId/>`,
//! `<createdOnDate></createdOnDate>`). Such elements read as `None` rather
//! than failing the enclosing record.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

/// A scalar parsed from element text.
pub trait XmlScalar: Sized {
    fn parse_text(text: &str) -> Result<Self, String>;
}

impl XmlScalar for i64 {
    fn parse_text(text: &str) -> Result<Self, String> {
        text.parse().map_err(|e| format!("'{text}' is not an integer: {e}"))
    }
}

impl XmlScalar for i32 {
    fn parse_text(text: &str) -> Result<Self, String> {
        text.parse().map_err(|e| format!("'{text}' is not an integer: {e}"))
    }
}

impl XmlScalar for bool {
    fn parse_text(text: &str) -> Result<Self, String> {
        match text.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(format!("'{text}' is not a boolean")),
        }
    }
}

impl XmlScalar for DateTime<Utc> {
    /// RFC 3339, or a timestamp without offset taken as UTC.
    fn parse_text(text: &str) -> Result<Self, String> {
        if let Ok(dt) = text.parse::<DateTime<Utc>>() {
            return Ok(dt);
        }
        NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| format!("'{text}' is not a timestamp: {e}"))
    }
}

/// Empty or whitespace-only element text reads as `None`.
pub fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: XmlScalar,
{
    let text = Option::<String>::deserialize(deserializer)?;
    match text.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(t) => T::parse_text(t).map(Some).map_err(D::Error::custom),
    }
}
