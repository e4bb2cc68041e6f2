//! The compute-engine seam and the element-wise reference engine.
//!
//! The dispatcher hands an engine an operation name, a [`Method`], the
//! unwrapped positional payloads and keyword payloads. The engine returns
//! either one payload or a tuple of payloads.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::payload::{ArrayData, DType, NdArray, Payload, Scalar};

/// Keyword arguments passed through to the engine.
pub type Kwargs = BTreeMap<String, Payload>;

/// How an operation is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// Apply element-wise to the arguments.
    Call,
    /// Fold the operation over the elements of a single argument.
    Reduce,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Reduce => write!(f, "reduce"),
        }
    }
}

/// Result of an engine call.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineOutput {
    Single(Payload),
    Tuple(Vec<Payload>),
}

/// A computation backend.
pub trait ComputeEngine: Send + Sync {
    fn dispatch(
        &self,
        op: &str,
        method: Method,
        args: &[Payload],
        kwargs: &Kwargs,
    ) -> Result<EngineOutput, EngineError>;
}

/// Reference engine over [`Payload`] values.
///
/// Supports `add`, `subtract`, `multiply`, `divide`, `negative`, `equal`
/// and `divmod` with [`Method::Call`], and `add`/`multiply` with
/// [`Method::Reduce`] (sum and product, with an optional `initial` kwarg).
/// A scalar operand broadcasts against an array; two arrays must have the
/// same shape.
#[derive(Clone, Copy, Debug, Default)]
pub struct ElementwiseEngine;

impl ElementwiseEngine {
    pub fn new() -> Self {
        Self
    }
}

impl ComputeEngine for ElementwiseEngine {
    fn dispatch(
        &self,
        op: &str,
        method: Method,
        args: &[Payload],
        kwargs: &Kwargs,
    ) -> Result<EngineOutput, EngineError> {
        for arg in args {
            if let Payload::Array(a) = arg {
                a.check()?;
            }
        }
        match method {
            Method::Call => {
                if let Some(name) = kwargs.keys().next() {
                    return Err(EngineError::UnexpectedKwarg(name.clone()));
                }
                call(op, args)
            }
            Method::Reduce => reduce(op, args, kwargs).map(EngineOutput::Single),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    FloorDiv,
    Mod,
}

impl BinOp {
    fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "subtract",
            Self::Mul => "multiply",
            Self::Div => "divide",
            Self::Eq => "equal",
            Self::FloorDiv => "floor_divide",
            Self::Mod => "remainder",
        }
    }

    fn result_dtype(self, lhs: DType, rhs: DType) -> DType {
        match self {
            Self::Eq => DType::Bool,
            Self::Div => DType::Float64,
            _ if lhs == DType::Float64 || rhs == DType::Float64 => DType::Float64,
            _ => DType::Int64,
        }
    }
}

fn call(op: &str, args: &[Payload]) -> Result<EngineOutput, EngineError> {
    let elementwise = |bin: BinOp| -> Result<EngineOutput, EngineError> {
        let [lhs, rhs] = expect_args::<2>(op, args)?;
        binary(bin, lhs, rhs).map(EngineOutput::Single)
    };
    match op {
        "add" => elementwise(BinOp::Add),
        "subtract" => elementwise(BinOp::Sub),
        "multiply" => elementwise(BinOp::Mul),
        "divide" => elementwise(BinOp::Div),
        "equal" => elementwise(BinOp::Eq),
        "divmod" => {
            let [lhs, rhs] = expect_args::<2>(op, args)?;
            Ok(EngineOutput::Tuple(vec![
                binary(BinOp::FloorDiv, lhs, rhs)?,
                binary(BinOp::Mod, lhs, rhs)?,
            ]))
        }
        "negative" => {
            let [value] = expect_args::<1>(op, args)?;
            negative(value).map(EngineOutput::Single)
        }
        _ => Err(EngineError::UnknownOp(op.to_string())),
    }
}

fn expect_args<'a, const N: usize>(
    op: &str,
    args: &'a [Payload],
) -> Result<[&'a Payload; N], EngineError> {
    let arity = || EngineError::Arity {
        op: op.to_string(),
        expected: N,
        actual: args.len(),
    };
    let refs: Vec<&Payload> = args.iter().collect();
    refs.try_into().map_err(|_| arity())
}

fn binary(op: BinOp, lhs: &Payload, rhs: &Payload) -> Result<Payload, EngineError> {
    if let (Payload::Str(a), Payload::Str(b)) = (lhs, rhs) {
        return match op {
            BinOp::Add => Ok(Payload::Str(format!("{a}{b}"))),
            BinOp::Eq => Ok(Payload::Bool(a == b)),
            _ => Err(unsupported(op.name(), "str")),
        };
    }

    let left = Numeric::from_payload(op.name(), lhs)?;
    let right = Numeric::from_payload(op.name(), rhs)?;
    let shape = match (&left.shape, &right.shape) {
        (Some(l), Some(r)) if l != r => {
            return Err(EngineError::ShapeMismatch {
                left: l.clone(),
                right: r.clone(),
            });
        }
        (Some(s), _) | (None, Some(s)) => Some(s.clone()),
        (None, None) => None,
    };
    let dtype = op.result_dtype(left.dtype, right.dtype);

    let len = shape.as_ref().map_or(1, |s| s.iter().product());
    let values = (0..len)
        .map(|i| apply(op, left.at(i)?, right.at(i)?, dtype))
        .collect::<Result<Vec<_>, _>>()?;
    Numeric {
        shape,
        dtype,
        values,
    }
    .into_payload()
}

/// Apply `op` to one pair of elements, producing an element of `dtype`.
fn apply(op: BinOp, a: Scalar, b: Scalar, dtype: DType) -> Result<Scalar, EngineError> {
    match dtype {
        DType::Bool => Ok(Scalar::Bool(a.same_value(&b))),
        DType::Float64 => float_op(op, a.as_f64(), b.as_f64()).map(Scalar::Float),
        DType::Int64 => int_op(op, a.as_i64(), b.as_i64()).map(Scalar::Int),
    }
}

fn float_op(op: BinOp, x: f64, y: f64) -> Result<f64, EngineError> {
    if matches!(op, BinOp::Div | BinOp::FloorDiv | BinOp::Mod) && y == 0.0 {
        return Err(EngineError::DivisionByZero);
    }
    Ok(match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => x / y,
        BinOp::FloorDiv => (x / y).floor(),
        BinOp::Mod => x - (x / y).floor() * y,
        BinOp::Eq => f64::from(u8::from(x == y)),
    })
}

fn int_op(op: BinOp, x: i64, y: i64) -> Result<i64, EngineError> {
    if matches!(op, BinOp::Div | BinOp::FloorDiv | BinOp::Mod) && y == 0 {
        return Err(EngineError::DivisionByZero);
    }
    let overflow = || EngineError::Overflow(op.name().to_string());
    match op {
        BinOp::Add => x.checked_add(y).ok_or_else(overflow),
        BinOp::Sub => x.checked_sub(y).ok_or_else(overflow),
        BinOp::Mul => x.checked_mul(y).ok_or_else(overflow),
        BinOp::Div => x.checked_div(y).ok_or_else(overflow),
        // Floor semantics: the remainder takes the divisor's sign.
        BinOp::FloorDiv => {
            let q = x.checked_div(y).ok_or_else(overflow)?;
            Ok(if x % y != 0 && ((x < 0) != (y < 0)) { q - 1 } else { q })
        }
        BinOp::Mod => {
            let r = x.checked_rem(y).ok_or_else(overflow)?;
            Ok(if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r })
        }
        BinOp::Eq => Ok(i64::from(x == y)),
    }
}

fn negative(value: &Payload) -> Result<Payload, EngineError> {
    let numeric = Numeric::from_payload("negative", value)?;
    if numeric.dtype == DType::Bool {
        return Err(unsupported("negative", "bool"));
    }
    let values = numeric
        .values
        .iter()
        .map(|s| match *s {
            Scalar::Float(x) => Ok(Scalar::Float(-x)),
            other => other
                .as_i64()
                .checked_neg()
                .map(Scalar::Int)
                .ok_or_else(|| EngineError::Overflow("negative".into())),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Numeric { values, ..numeric }.into_payload()
}

fn reduce(op: &str, args: &[Payload], kwargs: &Kwargs) -> Result<Payload, EngineError> {
    let bin = match op {
        "add" => BinOp::Add,
        "multiply" => BinOp::Mul,
        "subtract" | "divide" | "equal" | "divmod" | "negative" => {
            return Err(EngineError::UnsupportedMethod {
                op: op.to_string(),
                method: Method::Reduce.to_string(),
            });
        }
        _ => return Err(EngineError::UnknownOp(op.to_string())),
    };
    if let Some(name) = kwargs.keys().find(|k| k.as_str() != "initial") {
        return Err(EngineError::UnexpectedKwarg(name.clone()));
    }

    let [value] = expect_args::<1>(op, args)?;
    let numeric = Numeric::from_payload(op, value)?;
    let identity = if bin == BinOp::Add {
        Scalar::Int(0)
    } else {
        Scalar::Int(1)
    };
    let initial = match kwargs.get("initial") {
        Some(p) => p
            .as_scalar()
            .ok_or_else(|| unsupported(op, &format!("initial {}", p.kind())))?,
        None => identity,
    };

    let dtype = bin.result_dtype(numeric.dtype, initial.dtype());
    let mut acc = initial.cast(dtype);
    for s in &numeric.values {
        acc = apply(bin, acc, *s, dtype)?;
    }
    Ok(Payload::from(acc))
}

fn unsupported(op: &str, kind: &str) -> EngineError {
    EngineError::UnsupportedType {
        op: op.to_string(),
        kind: kind.to_string(),
    }
}

/// A numeric operand flattened for element-wise work. `shape` is `None`
/// for a scalar, which broadcasts.
struct Numeric {
    shape: Option<Vec<usize>>,
    dtype: DType,
    values: Vec<Scalar>,
}

impl Numeric {
    fn from_payload(op: &str, payload: &Payload) -> Result<Self, EngineError> {
        if let Some(s) = payload.as_scalar() {
            return Ok(Self {
                shape: None,
                dtype: s.dtype(),
                values: vec![s],
            });
        }
        match payload {
            Payload::Array(a) => Ok(Self {
                shape: Some(a.shape().to_vec()),
                dtype: a.dtype(),
                values: a.data().scalars(),
            }),
            other => Err(unsupported(op, &other.kind().to_string())),
        }
    }

    /// Element `i`; a scalar answers every index.
    fn at(&self, i: usize) -> Result<Scalar, EngineError> {
        let index = if self.shape.is_some() { i } else { 0 };
        self.values
            .get(index)
            .copied()
            .ok_or_else(|| EngineError::InvalidArray(format!("no element at index {index}")))
    }

    fn into_payload(self) -> Result<Payload, EngineError> {
        match self.shape {
            None => self
                .values
                .into_iter()
                .next()
                .map(|s| Payload::from(s.cast(self.dtype)))
                .ok_or_else(|| EngineError::InvalidArray("scalar operand without a value".into())),
            Some(shape) => {
                let data = ArrayData::from_scalars(self.dtype, self.values);
                NdArray::new(shape, data).map(Payload::Array)
            }
        }
    }
}
