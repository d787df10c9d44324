//! Values and quality flags as delivered by a data source.

use std::fmt;

/// A sampled tag value. Booleans arrive as `Number(1.0)` / `Number(0.0)`.
#[derive(Debug, Clone)]
pub enum TagValue {
    Number(f64),
    Text(String),
}

impl TagValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            TagValue::Number(n) => Some(*n),
            TagValue::Text(_) => None,
        }
    }

    /// True when the value is numerically equal to `level` (edge triggers, events).
    pub fn is_level(&self, level: f64) -> bool {
        self.as_number() == Some(level)
    }

    /// Text form written to the store: integral numbers have no fractional part.
    pub fn render(&self) -> String {
        match self {
            // -0.0 would render as "-0"
            TagValue::Number(n) if *n == 0.0 => "0".to_string(),
            TagValue::Number(n) => n.to_string(),
            TagValue::Text(s) => s.clone(),
        }
    }
}

impl PartialEq for TagValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TagValue::Number(a), TagValue::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (TagValue::Text(a), TagValue::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<f64> for TagValue {
    fn from(n: f64) -> Self {
        TagValue::Number(n)
    }
}

impl From<i64> for TagValue {
    fn from(n: i64) -> Self {
        TagValue::Number(n as f64)
    }
}

impl From<bool> for TagValue {
    fn from(b: bool) -> Self {
        TagValue::Number(if b { 1.0 } else { 0.0 })
    }
}

impl From<&str> for TagValue {
    fn from(s: &str) -> Self {
        TagValue::Text(s.to_string())
    }
}

/// Source-reported trust flag for a reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Quality {
    Good,
    NotGood(String),
}

impl Quality {
    pub fn is_good(&self) -> bool {
        matches!(self, Quality::Good)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Good => f.write_str("Good"),
            Quality::NotGood(label) => f.write_str(label),
        }
    }
}

/// One element of a batch read, aligned with the requested address.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub value: TagValue,
    pub quality: Quality,
}

impl Reading {
    pub fn good(value: impl Into<TagValue>) -> Self {
        Self {
            value: value.into(),
            quality: Quality::Good,
        }
    }

    pub fn bad(value: impl Into<TagValue>, label: &str) -> Self {
        Self {
            value: value.into(),
            quality: Quality::NotGood(label.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_integral_without_fraction() {
        assert_eq!(TagValue::from(1.0).render(), "1");
        assert_eq!(TagValue::from(-0.0).render(), "0");
        assert_eq!(TagValue::from(true).render(), "1");
        assert_eq!(TagValue::from(34.232143).render(), "34.232143");
        assert_eq!(TagValue::from("RUNNING").render(), "RUNNING");
    }

    #[test]
    fn test_mixed_kinds_are_never_equal() {
        assert_ne!(TagValue::from(1.0), TagValue::from("1"));
        assert_eq!(TagValue::from(f64::NAN), TagValue::from(f64::NAN));
    }

    #[test]
    fn test_level_only_matches_numbers() {
        assert!(TagValue::from(1i64).is_level(1.0));
        assert!(!TagValue::from("1").is_level(1.0));
    }
}
