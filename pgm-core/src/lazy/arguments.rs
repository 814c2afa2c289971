//! Arguments handed to user functions.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::Value;

/// The resolved value of one parent role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParentValue {
    /// A node's value or a constant.
    Single(Value),

    /// The values of a container's members, in order.
    Group(Vec<Value>),
}

impl fmt::Display for ParentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentValue::Single(value) => write!(f, "{}", value),
            ParentValue::Group(values) => {
                write!(f, "(")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Current values of a node's parents, keyed by role name.
///
/// A stochastic node's log-density function additionally sees its own value
/// under the key `"value"`.
///
/// # Example
///
/// ```rust,ignore
/// let normal = |args: &Arguments| {
///     let x = args.f64("value")?;
///     let mu = args.f64("mu")?;
///     let tau = args.f64("tau")?;
///     Ok(Value::from(-0.5 * tau * (x - mu).powi(2)))
/// };
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: IndexMap<String, ParentValue>,
}

impl Arguments {
    pub(crate) fn new(values: IndexMap<String, ParentValue>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Result<&ParentValue> {
        self.values.get(key).ok_or_else(|| Error::Argument {
            key: key.to_string(),
            reason: "no such argument".into(),
        })
    }

    /// The argument as a single value.
    pub fn value(&self, key: &str) -> Result<&Value> {
        match self.get(key)? {
            ParentValue::Single(value) => Ok(value),
            ParentValue::Group(_) => Err(mismatch(key, "a single value", "a container")),
        }
    }

    /// The argument as a container's member values.
    pub fn group(&self, key: &str) -> Result<&[Value]> {
        match self.get(key)? {
            ParentValue::Group(values) => Ok(values.as_slice()),
            ParentValue::Single(value) => Err(mismatch(key, "a container", &value.to_string())),
        }
    }

    pub fn f64(&self, key: &str) -> Result<f64> {
        let value = self.value(key)?;
        value
            .as_f64()
            .ok_or_else(|| mismatch(key, "a real number", &value.to_string()))
    }

    pub fn i64(&self, key: &str) -> Result<i64> {
        let value = self.value(key)?;
        value
            .as_i64()
            .ok_or_else(|| mismatch(key, "an integer", &value.to_string()))
    }

    pub fn bool(&self, key: &str) -> Result<bool> {
        let value = self.value(key)?;
        value
            .as_bool()
            .ok_or_else(|| mismatch(key, "a boolean", &value.to_string()))
    }

    pub fn floats(&self, key: &str) -> Result<&[f64]> {
        let value = self.value(key)?;
        value
            .as_floats()
            .ok_or_else(|| mismatch(key, "a float array", &value.to_string()))
    }

    pub fn ints(&self, key: &str) -> Result<&[i64]> {
        let value = self.value(key)?;
        value
            .as_ints()
            .ok_or_else(|| mismatch(key, "an integer array", &value.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParentValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn into_inner(self) -> IndexMap<String, ParentValue> {
        self.values
    }
}

fn mismatch(key: &str, expected: &str, found: &str) -> Error {
    Error::Argument {
        key: key.to_string(),
        reason: format!("expected {}, found {}", expected, found),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Arguments {
        let mut values = IndexMap::new();
        values.insert("mu".to_string(), ParentValue::Single(Value::from(1.5)));
        values.insert("n".to_string(), ParentValue::Single(Value::from(3i64)));
        values.insert("xs".to_string(), ParentValue::Single(Value::from(vec![1.0, 2.0])));
        values.insert(
            "group".to_string(),
            ParentValue::Group(vec![Value::from(1.0), Value::from(2.0)]),
        );
        Arguments::new(values)
    }

    #[test]
    fn typed_accessors() {
        let args = args();
        assert_eq!(args.f64("mu").unwrap(), 1.5);
        assert_eq!(args.f64("n").unwrap(), 3.0);
        assert_eq!(args.i64("n").unwrap(), 3);
        assert_eq!(args.floats("xs").unwrap(), &[1.0, 2.0]);
        assert_eq!(args.group("group").unwrap().len(), 2);
    }

    #[test]
    fn accessor_errors_name_the_key() {
        let args = args();

        let err = args.f64("missing").unwrap_err();
        assert!(err.to_string().contains("missing"));

        let err = args.f64("xs").unwrap_err();
        assert!(matches!(err, Error::Argument { ref key, .. } if key == "xs"));

        assert!(args.value("group").is_err());
        assert!(args.group("mu").is_err());
    }

    #[test]
    fn group_display() {
        let value = ParentValue::Group(vec![Value::from(1.0), Value::from(2i64)]);
        assert_eq!(value.to_string(), "(1, 2)");
    }
}
