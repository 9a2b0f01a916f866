//! Cache Values and Type Coercion
//!
//! Redis and Memcached only ever store text. Values travel through the cache as
//! [`CacheValue`] and are encoded to text on write and re-typed on read with
//! [`CacheValue::typecast`], so that a number written to any backend comes back
//! as a number.
//!
//! ```rust
//! use membrane::CacheValue;
//!
//! assert_eq!(CacheValue::typecast("42"), CacheValue::Integer(42));
//! assert_eq!(CacheValue::typecast("4.5"), CacheValue::Float(4.5));
//! assert_eq!(CacheValue::typecast("true"), CacheValue::Bool(true));
//! assert_eq!(CacheValue::typecast("frosting"), CacheValue::from("frosting"));
//!
//! let list = CacheValue::from(vec![1, 2, 3]);
//! assert_eq!(list.encode(), "1,2,3");
//! assert_eq!(CacheValue::decode_delimited("1,2,3"), list);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator used when a list has to be flattened into a single string
pub const LIST_DELIMITER: char = ',';

/// A typed value held by a cache backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<CacheValue>),
}

impl CacheValue {
    /// Re-derive the runtime type of a stored string
    ///
    /// `"true"`/`"false"` become booleans, integer text becomes
    /// [`CacheValue::Integer`], finite float text becomes [`CacheValue::Float`],
    /// anything else stays text. Lists are never produced here; see
    /// [`CacheValue::decode_delimited`].
    #[must_use]
    pub fn typecast(raw: &str) -> Self {
        match raw {
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => {}
        }

        if let Ok(n) = raw.parse::<i64>() {
            return Self::Integer(n);
        }

        // f64 parsing accepts "inf" and "NaN"; those stay text
        match raw.parse::<f64>() {
            Ok(f) if f.is_finite() => Self::Float(f),
            _ => Self::Text(raw.to_string()),
        }
    }

    /// Decode a string that may hold a delimiter-joined list
    ///
    /// Text containing [`LIST_DELIMITER`] becomes a list of typecast elements,
    /// anything else is typecast as a scalar.
    #[must_use]
    pub fn decode_delimited(raw: &str) -> Self {
        if raw.contains(LIST_DELIMITER) {
            Self::List(split_list(raw))
        } else {
            Self::typecast(raw)
        }
    }

    /// Text form written to string-only stores
    ///
    /// Lists are joined with [`LIST_DELIMITER`]; nested lists are flattened.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Integer(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
            Self::List(items) => items
                .iter()
                .map(Self::encode)
                .collect::<Vec<_>>()
                .join(&LIST_DELIMITER.to_string()),
        }
    }

    /// Coerce into a list: lists are returned as-is, scalars are wrapped
    #[must_use]
    pub fn into_list(self) -> Vec<CacheValue> {
        match self {
            Self::List(items) => items,
            scalar => vec![scalar],
        }
    }

    /// Numeric view used by counters; floats are truncated
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            Self::Float(f) => Some(f.trunc() as i64),
            _ => None,
        }
    }

    /// Borrow the elements if this is a list
    #[must_use]
    pub fn as_list(&self) -> Option<&[CacheValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Short type name used in error messages
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "string",
            Self::List(_) => "list",
        }
    }
}

/// Split a delimiter-joined string into typecast elements
///
/// The empty string is the empty list.
#[must_use]
pub fn split_list(raw: &str) -> Vec<CacheValue> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(LIST_DELIMITER).map(CacheValue::typecast).collect()
}

impl fmt::Display for CacheValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl From<bool> for CacheValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for CacheValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for CacheValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for CacheValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for CacheValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for CacheValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CacheValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<CacheValue>> From<Vec<T>> for CacheValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typecast_scalars() {
        assert_eq!(CacheValue::typecast("5"), CacheValue::Integer(5));
        assert_eq!(CacheValue::typecast("-12"), CacheValue::Integer(-12));
        assert_eq!(CacheValue::typecast("1.5"), CacheValue::Float(1.5));
        assert_eq!(CacheValue::typecast("false"), CacheValue::Bool(false));
        assert_eq!(CacheValue::typecast("inf"), CacheValue::from("inf"));
        assert_eq!(CacheValue::typecast("NaN"), CacheValue::from("NaN"));
        assert_eq!(CacheValue::typecast(""), CacheValue::from(""));
        assert_eq!(CacheValue::typecast("cake"), CacheValue::from("cake"));
    }

    #[test]
    fn test_encode_and_decode_lists() {
        let list = CacheValue::List(vec![
            CacheValue::Integer(5),
            CacheValue::from("x"),
            CacheValue::Float(2.5),
        ]);
        assert_eq!(list.encode(), "5,x,2.5");
        assert_eq!(CacheValue::decode_delimited("5,x,2.5"), list);

        // a scalar never turns into a list on its own
        assert_eq!(CacheValue::decode_delimited("5"), CacheValue::Integer(5));
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_into_list_wraps_scalars() {
        assert_eq!(
            CacheValue::Integer(5).into_list(),
            vec![CacheValue::Integer(5)]
        );
        assert_eq!(CacheValue::from(vec![1, 2]).into_list().len(), 2);
    }

    #[test]
    fn test_counter_view() {
        assert_eq!(CacheValue::Integer(4).as_i64(), Some(4));
        assert_eq!(CacheValue::Float(4.9).as_i64(), Some(4));
        assert_eq!(CacheValue::from("4").as_i64(), None);
    }

    #[test]
    fn test_json_shape() {
        let value: CacheValue = serde_json::from_str(r#"[1, "two", 3.5, true]"#).unwrap();
        assert_eq!(
            value,
            CacheValue::List(vec![
                CacheValue::Integer(1),
                CacheValue::from("two"),
                CacheValue::Float(3.5),
                CacheValue::Bool(true),
            ])
        );
        assert_eq!(serde_json::to_string(&CacheValue::Integer(7)).unwrap(), "7");
    }
}
