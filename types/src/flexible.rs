//! Values the wire transmits as either a native integer or a string.
//!
//! The consent service is loose about numeric fields: an id or metadata value
//! may arrive as `42` or `"42"`. Normalization is deterministic: an integer
//! token, or a string that parses as one, becomes [`FlexibleValue::Int`] and
//! re-serializes as a JSON integer; everything else stays text.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FlexibleValue {
    Int(i64),
    Text(String),
}

impl FlexibleValue {
    /// Normalizing constructor for string input.
    #[must_use]
    pub fn from_text(value: impl Into<String>) -> Self {
        let value = value.into();
        match value.parse::<i64>() {
            Ok(n) => FlexibleValue::Int(n),
            Err(_) => FlexibleValue::Text(value),
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FlexibleValue::Int(n) => Some(*n),
            FlexibleValue::Text(_) => None,
        }
    }

    /// String rendering of the value, whatever its wire type.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            FlexibleValue::Int(n) => n.to_string(),
            FlexibleValue::Text(s) => s.clone(),
        }
    }
}

impl From<i64> for FlexibleValue {
    fn from(value: i64) -> Self {
        FlexibleValue::Int(value)
    }
}

impl Serialize for FlexibleValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FlexibleValue::Int(n) => serializer.serialize_i64(*n),
            FlexibleValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

struct FlexibleValueVisitor;

impl Visitor<'_> for FlexibleValueVisitor {
    type Value = FlexibleValue;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("an integer or a string")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Ok(FlexibleValue::Int(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        i64::try_from(value)
            .map(FlexibleValue::Int)
            .map_err(|_| E::custom("integer out of range"))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(FlexibleValue::from_text(value))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Self::Value, E> {
        Ok(FlexibleValue::from_text(value))
    }
}

impl<'de> Deserialize<'de> for FlexibleValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FlexibleValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_token_round_trips_as_integer() {
        let value: FlexibleValue = serde_json::from_str("42").unwrap();
        assert_eq!(value, FlexibleValue::Int(42));
        assert_eq!(serde_json::to_string(&value).unwrap(), "42");
    }

    #[test]
    fn text_token_round_trips_as_text() {
        let value: FlexibleValue = serde_json::from_str("\"c53\"").unwrap();
        assert_eq!(value, FlexibleValue::Text("c53".into()));
        assert_eq!(serde_json::to_string(&value).unwrap(), "\"c53\"");
    }

    #[test]
    fn numeric_string_normalizes_to_integer() {
        let value: FlexibleValue = serde_json::from_str("\"1337\"").unwrap();
        assert_eq!(value, FlexibleValue::Int(1337));
        assert_eq!(serde_json::to_string(&value).unwrap(), "1337");
    }

    #[test]
    fn text_rendering_is_uniform() {
        assert_eq!(FlexibleValue::Int(7).to_text(), "7");
        assert_eq!(FlexibleValue::Text("s905".into()).to_text(), "s905");
        assert_eq!(FlexibleValue::Int(7).as_int(), Some(7));
        assert_eq!(FlexibleValue::Text("s905".into()).as_int(), None);
    }
}
