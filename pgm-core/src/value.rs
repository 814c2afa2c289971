//! Value Payloads
//!
//! Values carried by stochastic and deterministic nodes. Arrays are stored
//! behind `Arc<[T]>`, so a value handed out by the model can never be
//! mutated behind the model's back; producing a new array always means
//! allocating a new one, which in turn gets a fresh version stamp.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// The log-density at or below which a state is treated as impossible.
///
/// This is the most negative finite `f64`, standing in for `log(0)`.
/// Negative infinity also falls below it.
pub const LOG_ZERO: f64 = f64::MIN;

/// Element type of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dtype {
    Float,
    Int,
    Bool,
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dtype::Float => write!(f, "float"),
            Dtype::Int => write!(f, "int"),
            Dtype::Bool => write!(f, "bool"),
        }
    }
}

/// A scalar or array payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Float(f64),
    Int(i64),
    Bool(bool),
    FloatArray(Arc<[f64]>),
    IntArray(Arc<[i64]>),
    BoolArray(Arc<[bool]>),
}

impl Value {
    /// The element type of this value.
    pub fn dtype(&self) -> Dtype {
        match self {
            Value::Float(_) | Value::FloatArray(_) => Dtype::Float,
            Value::Int(_) | Value::IntArray(_) => Dtype::Int,
            Value::Bool(_) | Value::BoolArray(_) => Dtype::Bool,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Value::FloatArray(_) | Value::IntArray(_) | Value::BoolArray(_)
        )
    }

    /// Number of elements; `None` for scalars.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::FloatArray(a) => Some(a.len()),
            Value::IntArray(a) => Some(a.len()),
            Value::BoolArray(a) => Some(a.len()),
            _ => None,
        }
    }

    /// Interpret the value as a real number.
    ///
    /// Floats and integers convert, as do arrays holding exactly one float or
    /// integer. Booleans do not.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Int(x) => Some(*x as f64),
            Value::FloatArray(a) if a.len() == 1 => Some(a[0]),
            Value::IntArray(a) if a.len() == 1 => Some(a[0] as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(x) => Some(*x),
            Value::IntArray(a) if a.len() == 1 => Some(a[0]),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(x) => Some(*x),
            Value::BoolArray(a) if a.len() == 1 => Some(a[0]),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            Value::FloatArray(a) => Some(&a[..]),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            Value::IntArray(a) => Some(&a[..]),
            _ => None,
        }
    }

    pub fn as_bools(&self) -> Option<&[bool]> {
        match self {
            Value::BoolArray(a) => Some(&a[..]),
            _ => None,
        }
    }

    /// Convert to the given element type.
    ///
    /// Returns a clone sharing the same storage when the type already
    /// matches. Floats convert to integers by truncation; non-finite floats
    /// cannot be converted. Returns `None` when conversion is impossible.
    pub fn coerce(&self, dtype: Dtype) -> Option<Value> {
        if self.dtype() == dtype {
            return Some(self.clone());
        }
        let value = match (self, dtype) {
            (Value::Float(x), Dtype::Int) => Value::Int(float_to_int(*x)?),
            (Value::Float(x), Dtype::Bool) => Value::Bool(*x != 0.0),
            (Value::Int(x), Dtype::Float) => Value::Float(*x as f64),
            (Value::Int(x), Dtype::Bool) => Value::Bool(*x != 0),
            (Value::Bool(x), Dtype::Float) => Value::Float(if *x { 1.0 } else { 0.0 }),
            (Value::Bool(x), Dtype::Int) => Value::Int(i64::from(*x)),
            (Value::FloatArray(a), Dtype::Int) => Value::IntArray(
                a.iter()
                    .map(|x| float_to_int(*x))
                    .collect::<Option<Arc<[i64]>>>()?,
            ),
            (Value::FloatArray(a), Dtype::Bool) => {
                Value::BoolArray(a.iter().map(|x| *x != 0.0).collect())
            }
            (Value::IntArray(a), Dtype::Float) => {
                Value::FloatArray(a.iter().map(|x| *x as f64).collect())
            }
            (Value::IntArray(a), Dtype::Bool) => Value::BoolArray(a.iter().map(|x| *x != 0).collect()),
            (Value::BoolArray(a), Dtype::Float) => {
                Value::FloatArray(a.iter().map(|x| if *x { 1.0 } else { 0.0 }).collect())
            }
            (Value::BoolArray(a), Dtype::Int) => {
                Value::IntArray(a.iter().map(|x| i64::from(*x)).collect())
            }
            _ => return None,
        };
        Some(value)
    }

    /// Whether `source` is an array of this array's length, so it can feed
    /// [`scatter`](Self::scatter).
    pub fn same_shape(&self, source: &Value) -> bool {
        matches!((self.len(), source.len()), (Some(a), Some(b)) if a == b)
    }

    /// Copy of `self` with the entries at `indices` taken from `source`.
    ///
    /// Both values must be arrays of the same length. Only the taken
    /// entries of `source` are coerced to this value's element type.
    pub fn scatter(&self, indices: &[usize], source: &Value) -> Option<Value> {
        let len = self.len()?;
        if source.len()? != len || indices.iter().any(|&i| i >= len) {
            return None;
        }
        let source = source.select(indices).coerce(self.dtype())?;
        let value = match (self, &source) {
            (Value::FloatArray(dst), Value::FloatArray(src)) => {
                Value::FloatArray(scatter_slice(&dst[..], indices, &src[..]))
            }
            (Value::IntArray(dst), Value::IntArray(src)) => {
                Value::IntArray(scatter_slice(&dst[..], indices, &src[..]))
            }
            (Value::BoolArray(dst), Value::BoolArray(src)) => {
                Value::BoolArray(scatter_slice(&dst[..], indices, &src[..]))
            }
            _ => return None,
        };
        Some(value)
    }

    /// The entries at `indices`, which must be in bounds. Scalars are
    /// returned as they are.
    fn select(&self, indices: &[usize]) -> Value {
        match self {
            Value::FloatArray(a) => Value::FloatArray(indices.iter().map(|&i| a[i]).collect()),
            Value::IntArray(a) => Value::IntArray(indices.iter().map(|&i| a[i]).collect()),
            Value::BoolArray(a) => Value::BoolArray(indices.iter().map(|&i| a[i]).collect()),
            scalar => scalar.clone(),
        }
    }

    /// Whether two values share the same array storage.
    ///
    /// Scalars never share storage.
    pub fn shares_storage(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::FloatArray(a), Value::FloatArray(b)) => Arc::ptr_eq(a, b),
            (Value::IntArray(a), Value::IntArray(b)) => Arc::ptr_eq(a, b),
            (Value::BoolArray(a), Value::BoolArray(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn float_to_int(x: f64) -> Option<i64> {
    if x.is_finite() && x >= i64::MIN as f64 && x <= i64::MAX as f64 {
        Some(x.trunc() as i64)
    } else {
        None
    }
}

/// `src` holds one entry per index, in order.
fn scatter_slice<T: Copy>(dst: &[T], indices: &[usize], src: &[T]) -> Arc<[T]> {
    let mut out = dst.to_vec();
    for (&i, &x) in indices.iter().zip(src) {
        out[i] = x;
    }
    out.into()
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, "]")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(x) => write!(f, "{}", x),
            Value::Int(x) => write!(f, "{}", x),
            Value::Bool(x) => write!(f, "{}", x),
            Value::FloatArray(a) => write_list(f, &a[..]),
            Value::IntArray(a) => write_list(f, &a[..]),
            Value::BoolArray(a) => write_list(f, &a[..]),
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<i64> for Value {
    fn from(x: i64) -> Self {
        Value::Int(x)
    }
}

impl From<bool> for Value {
    fn from(x: bool) -> Self {
        Value::Bool(x)
    }
}

impl From<Vec<f64>> for Value {
    fn from(a: Vec<f64>) -> Self {
        Value::FloatArray(a.into())
    }
}

impl From<&[f64]> for Value {
    fn from(a: &[f64]) -> Self {
        Value::FloatArray(a.into())
    }
}

impl From<Vec<i64>> for Value {
    fn from(a: Vec<i64>) -> Self {
        Value::IntArray(a.into())
    }
}

impl From<Vec<bool>> for Value {
    fn from(a: Vec<bool>) -> Self {
        Value::BoolArray(a.into())
    }
}
