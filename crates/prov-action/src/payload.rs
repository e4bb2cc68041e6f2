//! Opaque data values carried by action objects.
//!
//! A [`Payload`] is a scalar, a string, or an n-dimensional array. Each
//! payload reports its [`PayloadKind`], which the registry maps to a wrapper
//! type. The action layer never looks inside a payload; only the compute
//! engine does.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Coarse classification of a payload, used as the registry key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PayloadKind {
    Int,
    Float,
    Bool,
    Str,
    Array,
}

impl PayloadKind {
    pub const ALL: [PayloadKind; 5] = [Self::Int, Self::Float, Self::Bool, Self::Str, Self::Array];

    /// Parse the lowercase display name (`"int"`, `"array"`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.to_string() == name)
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Bool => write!(f, "bool"),
            Self::Str => write!(f, "str"),
            Self::Array => write!(f, "array"),
        }
    }
}

/// Element type of an array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    Int64,
    Float64,
    Bool,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int64 => write!(f, "int64"),
            Self::Float64 => write!(f, "float64"),
            Self::Bool => write!(f, "bool"),
        }
    }
}

/// A single numeric element.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    pub fn dtype(&self) -> DType {
        match self {
            Self::Int(_) => DType::Int64,
            Self::Float(_) => DType::Float64,
            Self::Bool(_) => DType::Bool,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Int(n) => n as f64,
            Self::Float(x) => x,
            Self::Bool(b) => f64::from(u8::from(b)),
        }
    }

    /// Integer view; floats truncate toward zero.
    pub fn as_i64(&self) -> i64 {
        match *self {
            Self::Int(n) => n,
            Self::Float(x) => x as i64,
            Self::Bool(b) => i64::from(b),
        }
    }

    /// Numeric equality across element types (`1 == 1.0 == true`).
    pub fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Float(_), _) | (_, Self::Float(_)) => self.as_f64() == other.as_f64(),
            _ => self.as_i64() == other.as_i64(),
        }
    }

    /// Convert to the given element type.
    pub fn cast(self, dtype: DType) -> Self {
        match dtype {
            DType::Int64 => Self::Int(self.as_i64()),
            DType::Float64 => Self::Float(self.as_f64()),
            DType::Bool => Self::Bool(self.as_f64() != 0.0),
        }
    }
}

/// Typed, flat array storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ArrayData {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Bool(Vec<bool>),
}

impl ArrayData {
    pub fn dtype(&self) -> DType {
        match self {
            Self::Int(_) => DType::Int64,
            Self::Float(_) => DType::Float64,
            Self::Bool(_) => DType::Bool,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Int(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn scalars(&self) -> Vec<Scalar> {
        match self {
            Self::Int(v) => v.iter().copied().map(Scalar::Int).collect(),
            Self::Float(v) => v.iter().copied().map(Scalar::Float).collect(),
            Self::Bool(v) => v.iter().copied().map(Scalar::Bool).collect(),
        }
    }

    /// Collect scalars into storage of `dtype`, casting as needed.
    pub fn from_scalars(dtype: DType, scalars: impl IntoIterator<Item = Scalar>) -> Self {
        let scalars = scalars.into_iter();
        match dtype {
            DType::Int64 => Self::Int(scalars.map(|s| s.as_i64()).collect()),
            DType::Float64 => Self::Float(scalars.map(|s| s.as_f64()).collect()),
            DType::Bool => Self::Bool(scalars.map(|s| s.as_f64() != 0.0).collect()),
        }
    }
}

/// An n-dimensional array in row-major order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NdArray {
    shape: Vec<usize>,
    data: ArrayData,
}

impl NdArray {
    /// Build an array, checking that `data` fills `shape` exactly.
    pub fn new(shape: Vec<usize>, data: ArrayData) -> Result<Self, EngineError> {
        let array = Self { shape, data };
        array.check()?;
        Ok(array)
    }

    /// Verify the shape/data invariant. Arrays that arrive through
    /// deserialization are re-checked by the engine before use.
    pub fn check(&self) -> Result<(), EngineError> {
        let expected: usize = self.shape.iter().product();
        if expected != self.data.len() {
            return Err(EngineError::InvalidArray(format!(
                "shape {:?} needs {expected} elements, found {}",
                self.shape,
                self.data.len()
            )));
        }
        Ok(())
    }

    pub fn from_ints(values: Vec<i64>) -> Self {
        Self {
            shape: vec![values.len()],
            data: ArrayData::Int(values),
        }
    }

    pub fn from_floats(values: Vec<f64>) -> Self {
        Self {
            shape: vec![values.len()],
            data: ArrayData::Float(values),
        }
    }

    pub fn from_bools(values: Vec<bool>) -> Self {
        Self {
            shape: vec![values.len()],
            data: ArrayData::Bool(values),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn same_value(&self, other: &Self) -> bool {
        self.shape == other.shape
            && self.len() == other.len()
            && self
                .data
                .scalars()
                .iter()
                .zip(other.data.scalars().iter())
                .all(|(a, b)| a.same_value(b))
    }
}

/// An opaque data value.
///
/// The derived `PartialEq` is structural. [`Payload::same_value`] is the
/// numeric comparison used for action-object equality.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Array(NdArray),
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Int(_) => PayloadKind::Int,
            Self::Float(_) => PayloadKind::Float,
            Self::Bool(_) => PayloadKind::Bool,
            Self::Str(_) => PayloadKind::Str,
            Self::Array(_) => PayloadKind::Array,
        }
    }

    /// The scalar value, if this payload is numeric and not an array.
    pub fn as_scalar(&self) -> Option<Scalar> {
        match *self {
            Self::Int(n) => Some(Scalar::Int(n)),
            Self::Float(x) => Some(Scalar::Float(x)),
            Self::Bool(b) => Some(Scalar::Bool(b)),
            Self::Str(_) | Self::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&NdArray> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Value equality: numeric across scalar types, and for arrays equal
    /// shape with every element equal.
    pub fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a.same_value(b),
            (Self::Str(_), _) | (_, Self::Str(_)) => false,
            (Self::Array(_), _) | (_, Self::Array(_)) => false,
            _ => match (self.as_scalar(), other.as_scalar()) {
                (Some(a), Some(b)) => a.same_value(&b),
                _ => false,
            },
        }
    }
}

impl From<Scalar> for Payload {
    fn from(s: Scalar) -> Self {
        match s {
            Scalar::Int(n) => Self::Int(n),
            Scalar::Float(x) => Self::Float(x),
            Scalar::Bool(b) => Self::Bool(b),
        }
    }
}

impl From<i64> for Payload {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for Payload {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for Payload {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<NdArray> for Payload {
    fn from(a: NdArray) -> Self {
        Self::Array(a)
    }
}

impl From<Vec<i64>> for Payload {
    fn from(values: Vec<i64>) -> Self {
        Self::Array(NdArray::from_ints(values))
    }
}

impl From<Vec<f64>> for Payload {
    fn from(values: Vec<f64>) -> Self {
        Self::Array(NdArray::from_floats(values))
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Array(a) => write!(f, "array<{}>{:?}", a.dtype(), a.shape()),
        }
    }
}
