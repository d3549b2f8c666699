#![forbid(unsafe_code)]

//! Dynamic values carried by cells, and the type descriptors that guard them.
//!
//! A [`Value`] is what a [`Cell`](crate::Cell) holds. A [`ValueType`] is the
//! declared descriptor a writable cell checks every incoming value against.
//!
//! # Equality vs. identity
//!
//! `PartialEq` on [`Value`] is numeric equality: `-0.0 == 0.0` and
//! `NaN != NaN`. Change detection must instead use [`Value::same_value`],
//! which distinguishes the sign of zero and treats `NaN` as itself. A cell
//! that transitions from `0` to `-0` has changed.
//!
//! # Storage representation
//!
//! [`ValueType::format_stored`] and [`ValueType::parse_stored`] convert to and
//! from the plain strings kept in a storage namespace. Numbers use the same
//! textual form a browser produces for the common cases (`"0"`, `"1"`,
//! `"-5"`, `"0.5"`, `"NaN"`, `"Infinity"`).

use std::fmt;

use crate::block::Block;

/// A dynamically typed cell value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    /// Structured data with no further typing (scope frames, driver info).
    Data(serde_json::Value),
    Block(Block),
}

impl Value {
    /// Identity comparison used for change detection.
    ///
    /// Unlike `==`, this separates `0.0` from `-0.0`, considers `NaN`
    /// identical to itself, and compares blocks by identity.
    #[must_use]
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a.to_bits() == b.to_bits()
                }
            }
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Data(a), Self::Data(b)) => a == b,
            (Self::Block(a), Self::Block(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Data(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Self::Block(b) => Some(b),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Data(_) => "data",
            Self::Block(_) => "block",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Data(a), Self::Data(b)) => a == b,
            (Self::Block(a), Self::Block(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Text(s) => f.write_str(s),
            Self::Data(d) => write!(f, "{d}"),
            Self::Block(b) => write!(f, "<block #{}>", b.id().raw()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Block> for Value {
    fn from(b: Block) -> Self {
        Self::Block(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(d: serde_json::Value) -> Self {
        Self::Data(d)
    }
}

/// Declared value-type descriptor of a cell.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    /// Accepts every value.
    Any,
    Number,
    Boolean,
    Text,
    Block,
    /// A number within `[min, max]`, optionally restricted to integers.
    Range { min: f64, max: f64, integer: bool },
    /// A text value drawn from a fixed set of members.
    Enum(Vec<String>),
}

impl ValueType {
    /// Whether `value` is acceptable. Never coerces.
    #[must_use]
    pub fn check(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Any, _) => true,
            (Self::Number, Value::Number(_)) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Text, Value::Text(_)) => true,
            (Self::Block, Value::Block(_)) => true,
            (Self::Range { min, max, integer }, Value::Number(n)) => {
                *n >= *min && *n <= *max && (!*integer || n.fract() == 0.0)
            }
            (Self::Enum(members), Value::Text(s)) => members.iter().any(|m| m == s),
            _ => false,
        }
    }

    /// Whether a cell of this type can ever hold a block.
    #[must_use]
    pub fn may_hold_block(&self) -> bool {
        matches!(self, Self::Any | Self::Block)
    }

    /// Parse the storage representation of a value of this type.
    ///
    /// Returns `None` for text that does not describe an acceptable value.
    #[must_use]
    pub fn parse_stored(&self, text: &str) -> Option<Value> {
        let value = match self {
            Self::Number | Self::Range { .. } => Value::Number(parse_number(text)?),
            Self::Boolean => match text {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => return None,
            },
            Self::Text | Self::Enum(_) => Value::Text(text.to_owned()),
            Self::Any => match text {
                "NaN" | "Infinity" | "-Infinity" => Value::Number(parse_number(text)?),
                _ => serde_json::from_str::<serde_json::Value>(text)
                    .map(json_to_value)
                    .unwrap_or_else(|_| Value::Text(text.to_owned())),
            },
            Self::Block => return None,
        };
        self.check(&value).then_some(value)
    }

    /// Storage representation of `value`.
    ///
    /// Under [`ValueType::Any`] text is stored as a JSON string, so `"3"`
    /// and `3` stay distinct. Unquoted stored text that is not JSON still
    /// parses back as text. Blocks have no storage representation and yield
    /// `None`.
    #[must_use]
    pub fn format_stored(&self, value: &Value) -> Option<String> {
        match value {
            Value::Null => Some("null".to_owned()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(format_number(*n)),
            Value::Text(s) if *self == Self::Any => {
                Some(serde_json::Value::String(s.clone()).to_string())
            }
            Value::Text(s) => Some(s.clone()),
            Value::Data(d) => Some(d.to_string()),
            Value::Block(_) => None,
        }
    }

    /// Short descriptor name, used in error messages.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Any => "any".to_owned(),
            Self::Number => "number".to_owned(),
            Self::Boolean => "boolean".to_owned(),
            Self::Text => "text".to_owned(),
            Self::Block => "block".to_owned(),
            Self::Range { min, max, integer } => {
                let kind = if *integer { "integer" } else { "number" };
                format!("{kind} in [{}, {}]", format_number(*min), format_number(*max))
            }
            Self::Enum(members) => format!("one of {}", members.join("|")),
        }
    }
}

fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
        serde_json::Value::String(s) => Value::Text(s),
        other => Value::Data(other),
    }
}

/// Format a number the way a browser stringifies it for ordinary values.
///
/// Negative zero formats as `"0"`.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_owned()
        } else {
            "-Infinity".to_owned()
        }
    } else if n == 0.0 {
        "0".to_owned()
    } else {
        n.to_string()
    }
}

/// Inverse of [`format_number`].
#[must_use]
pub fn parse_number(text: &str) -> Option<f64> {
    match text.trim() {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        "" => None,
        other => other.parse::<f64>().ok().filter(|n| n.is_finite()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_zero_is_equal_but_not_same() {
        let pos = Value::Number(0.0);
        let neg = Value::Number(-0.0);
        assert_eq!(pos, neg);
        assert!(!pos.same_value(&neg));
        assert!(neg.same_value(&Value::Number(-0.0)));
    }

    #[test]
    fn nan_is_same_as_itself() {
        let a = Value::Number(f64::NAN);
        assert_ne!(a, a.clone());
        assert!(a.same_value(&Value::Number(f64::NAN)));
    }

    #[test]
    fn range_checks_bounds_and_integrality() {
        let t = ValueType::Range {
            min: 0.0,
            max: 10.0,
            integer: true,
        };
        assert!(t.check(&Value::Number(3.0)));
        assert!(!t.check(&Value::Number(3.5)));
        assert!(!t.check(&Value::Number(11.0)));
        assert!(!t.check(&Value::Text("3".into())));
    }

    #[test]
    fn enum_checks_membership() {
        let t = ValueType::Enum(vec!["AM".into(), "FM".into()]);
        assert!(t.check(&"FM".into()));
        assert!(!t.check(&"USB".into()));
    }

    #[test]
    fn number_formatting_matches_browser_for_common_values() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-5.0), "-5");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(f64::NAN), "NaN");
    }

    #[test]
    fn parse_stored_rejects_garbage() {
        assert_eq!(ValueType::Number.parse_stored("12.5"), Some(Value::Number(12.5)));
        assert_eq!(ValueType::Number.parse_stored("abc"), None);
        assert_eq!(ValueType::Boolean.parse_stored("true"), Some(Value::Bool(true)));
        assert_eq!(ValueType::Block.parse_stored("{}"), None);
        let ranged = ValueType::Range {
            min: 1.0,
            max: 20.0,
            integer: false,
        };
        assert_eq!(ranged.parse_stored("0"), None);
    }

    #[test]
    fn any_parses_json_or_falls_back_to_text() {
        assert_eq!(ValueType::Any.parse_stored("3"), Some(Value::Number(3.0)));
        assert_eq!(
            ValueType::Any.parse_stored("hello"),
            Some(Value::Text("hello".into()))
        );
    }

    #[test]
    fn any_keeps_scalar_looking_text_as_text() {
        for text in ["3", "true", "null", "hello"] {
            let value = Value::Text(text.into());
            let stored = ValueType::Any.format_stored(&value).unwrap();
            assert_eq!(stored, format!("\"{text}\""));
            assert_eq!(ValueType::Any.parse_stored(&stored), Some(value));
        }
    }

    #[test]
    fn any_round_trips_scalars_and_non_finite_numbers() {
        let values = [
            Value::Null,
            Value::Bool(false),
            Value::Number(-2.5),
            Value::Number(f64::INFINITY),
            Value::Data(serde_json::json!([1, "two"])),
        ];
        for value in values {
            let stored = ValueType::Any.format_stored(&value).unwrap();
            let back = ValueType::Any.parse_stored(&stored).unwrap();
            assert!(back.same_value(&value), "{value:?} -> {stored} -> {back:?}");
        }
        let nan = ValueType::Any.parse_stored("NaN").unwrap();
        assert!(nan.same_value(&Value::Number(f64::NAN)));
    }
}
