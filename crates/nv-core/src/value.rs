use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A string-keyed map of values. Ordered, so serialized output is stable.
pub type Map = BTreeMap<String, Value>;

/// A JSON-shaped value stored in the state tree.
///
/// `Float` may hold non-finite numbers. JSON cannot represent those, which is
/// why saves are checked with [`Value::non_finite_path`] before they are
/// written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Null,
    /// A boolean value.
    Bool(bool),
    /// A 64-bit signed integer value.
    Int(i64),
    /// A 64-bit floating-point value.
    Float(f64),
    /// A text value.
    String(String),
    /// An ordered list of values.
    List(Vec<Value>),
    /// A string-keyed map of values.
    Map(Map),
}

/// Largest magnitude at which every integer is exactly representable as `f64`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

impl Value {
    /// Create an empty map value.
    pub fn map() -> Self {
        Self::Map(Map::new())
    }

    /// Store an arithmetic result, preferring `Int` when it is integral.
    pub fn from_number(n: f64) -> Self {
        if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
            Self::Int(n as i64)
        } else {
            Self::Float(n)
        }
    }

    /// Numeric view for numbers only.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Lenient numeric coercion used by compound assignments.
    ///
    /// Booleans count as 0/1, `Null` and blank text as 0, numeric text is
    /// parsed. Anything else (including NaN) has no numeric value.
    pub fn coerce_number(&self) -> Option<f64> {
        let n = match self {
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Int(n) => *n as f64,
            Self::Float(n) => *n,
            Self::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    parse_finite(trimmed)?
                }
            }
            Self::List(_) | Self::Map(_) => return None,
        };
        (!n.is_nan()).then_some(n)
    }

    /// Borrow the text of a `String` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the entries of a `Map` value.
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Mutably borrow the entries of a `Map` value.
    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow the items of a `List` value.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a key when this value is a map.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Whether this value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this value is "empty": null, false, zero, NaN, or an empty
    /// string, list or map.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(b) => !b,
            Self::Int(n) => *n == 0,
            Self::Float(n) => *n == 0.0 || n.is_nan(),
            Self::String(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Map(m) => m.is_empty(),
        }
    }

    /// Equality that treats `Int(1)` and `Float(1.0)` as the same number.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    /// Identifier of a list element, used by `[id]` path selectors and by
    /// equipment-slot sanitising. Looks at `id`, `itemId` and `item_id`.
    pub fn discriminator(&self) -> Option<String> {
        let map = self.as_map()?;
        ["id", "itemId", "item_id"]
            .iter()
            .filter_map(|k| map.get(*k))
            .find_map(|v| match v {
                Self::String(s) => Some(s.clone()),
                Self::Int(n) => Some(n.to_string()),
                _ => None,
            })
    }

    /// Dotted path of the first non-finite float inside this value, prefixed
    /// with `prefix`. `None` when the value serializes losslessly.
    pub fn non_finite_path(&self, prefix: &str) -> Option<String> {
        match self {
            Self::Float(n) if !n.is_finite() => Some(prefix.to_string()),
            Self::List(items) => items
                .iter()
                .enumerate()
                .find_map(|(i, v)| v.non_finite_path(&format!("{prefix}[{i}]"))),
            Self::Map(m) => m
                .iter()
                .find_map(|(k, v)| v.non_finite_path(&join_path(prefix, k))),
            _ => None,
        }
    }
}

/// Join a parent path and a key with a dot, omitting the dot at the root.
pub(crate) fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Parse a literal as a finite number. `inf` and `NaN` spellings are not
/// numbers for authored content.
pub(crate) fn parse_finite(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::List(_) | Self::Map(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                write!(f, "{json}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<Map> for Value {
    fn from(m: Map) -> Self {
        Self::Map(m)
    }
}
