use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{Error as DeError, Visitor},
};
use std::{cmp::Ordering, fmt};

///
/// Value
///
/// A resolved scalar produced or consumed by filter evaluation.
///
/// `Null` is a first-class value: it flows through evaluation under
/// relational-query conventions (unknown, not error). Numbers are kept
/// as f64 since the interchange format carries one numeric type.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Num(f64),
    Text(String),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Truthiness used by AND/OR absorption and NOT.
    ///
    /// `Null`, `false`, zero, NaN, and the empty string are falsy;
    /// everything else is truthy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Num(n) => *n != 0.0 && !n.is_nan(),
            Self::Text(s) => !s.is_empty(),
        }
    }

    /// Numeric coercion for ordering comparisons and arithmetic.
    ///
    /// Bools widen to 0/1; text coerces only when the whole string
    /// parses as a number. `Null` and non-numeric text do not coerce.
    #[must_use]
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(f64::from(u8::from(*b))),
            Self::Num(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Ordering semantics for `>` `>=` `<` `<=`.
    ///
    /// Two texts compare lexicographically; any other pair is coerced
    /// numerically. `None` means the pair is incomparable (failed
    /// coercion or NaN), in which case every ordering operator is false.
    #[must_use]
    pub fn loose_cmp(&self, other: &Self) -> Option<Ordering> {
        if let (Self::Text(a), Self::Text(b)) = (self, other) {
            return Some(a.cmp(b));
        }
        let a = self.as_num()?;
        let b = other.as_num()?;
        a.partial_cmp(&b)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Num(n)
    }
}

impl From<i64> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: i64) -> Self {
        Self::Num(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Num(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

///
/// Display renders the string coercion used by `||` concatenation and
/// `UPPER`/`LOWER`. Whole numbers print without a fractional part.
/// `Null` never reaches concatenation (it propagates first) and renders
/// empty.
///

impl fmt::Display for Value {
    #[allow(clippy::cast_possible_truncation)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Num(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Self::Text(s) => f.write_str(s),
        }
    }
}

///
/// WIRE
///
/// Scalars cross the subsystem boundary as bare JSON-style scalars;
/// only compound expression nodes are tagged arrays.
///

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Num(n) => serializer.serialize_f64(*n),
            Self::Text(s) => serializer.serialize_str(s),
        }
    }
}

struct ValueVisitor;

impl Visitor<'_> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a scalar (null, bool, number, or string)")
    }

    fn visit_unit<E: DeError>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: DeError>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_bool<E: DeError>(self, b: bool) -> Result<Value, E> {
        Ok(Value::Bool(b))
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_i64<E: DeError>(self, n: i64) -> Result<Value, E> {
        Ok(Value::Num(n as f64))
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_u64<E: DeError>(self, n: u64) -> Result<Value, E> {
        Ok(Value::Num(n as f64))
    }

    fn visit_f64<E: DeError>(self, n: f64) -> Result<Value, E> {
        Ok(Value::Num(n))
    }

    fn visit_str<E: DeError>(self, s: &str) -> Result<Value, E> {
        Ok(Value::Text(s.to_string()))
    }

    fn visit_string<E: DeError>(self, s: String) -> Result<Value, E> {
        Ok(Value::Text(s))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

///
/// TESTS
///
