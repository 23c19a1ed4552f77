//! Conversion of generic JSON argument values into typed call arguments
//!
//! Every parameter carries a closed `ParamShape` tag chosen at registration time;
//! coercion is a plain match over that tag.

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Largest integer magnitude an `f64` represents exactly.
const MAX_EXACT_F64_INT: u64 = 1 << 53;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamShape {
    String,
    Integer,
    Number,
    Boolean,
    Enum(Vec<String>),
    Array,
    Object,
}

impl ParamShape {
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum(values.into_iter().map(Into::into).collect())
    }

    /// JSON Schema `type` keyword advertised for this shape.
    pub fn json_type(&self) -> &'static str {
        match self {
            Self::String | Self::Enum(_) => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Null,
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Array(Vec<Value>),
    Object(Map<String, Value>),
}

impl ArgValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Number(_) => "number",
            Self::Boolean(_) => "boolean",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::String(value) => Value::String(value.clone()),
            Self::Integer(value) => Value::Number((*value).into()),
            Self::Number(value) => Number::from_f64(*value).map_or(Value::Null, Value::Number),
            Self::Boolean(value) => Value::Bool(*value),
            Self::Array(items) => Value::Array(items.clone()),
            Self::Object(map) => Value::Object(map.clone()),
        }
    }
}

impl From<ArgValue> for Value {
    fn from(value: ArgValue) -> Self {
        match value {
            ArgValue::String(value) => Value::String(value),
            ArgValue::Array(items) => Value::Array(items),
            ArgValue::Object(map) => Value::Object(map),
            other => other.to_value(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    #[error("expected {expected}, got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("'{value}' is not one of: {}", .allowed.join(", "))]
    EnumViolation { value: String, allowed: Vec<String> },
}

impl CoercionError {
    fn mismatch(shape: &ParamShape, found: &'static str) -> Self {
        Self::TypeMismatch {
            expected: shape.json_type(),
            found,
        }
    }
}

pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Coerces `value` into the argument representation demanded by `shape`.
///
/// A JSON `null` always becomes `ArgValue::Null`, whatever the shape.
pub fn coerce(value: &Value, shape: &ParamShape) -> Result<ArgValue, CoercionError> {
    if value.is_null() {
        return Ok(ArgValue::Null);
    }

    match shape {
        ParamShape::String => value
            .as_str()
            .map(|text| ArgValue::String(text.to_string()))
            .ok_or_else(|| CoercionError::mismatch(shape, value_kind(value))),
        ParamShape::Integer => coerce_integer(value, shape).map(ArgValue::Integer),
        ParamShape::Number => coerce_number(value, shape).map(ArgValue::Number),
        ParamShape::Boolean => value
            .as_bool()
            .map(ArgValue::Boolean)
            .ok_or_else(|| CoercionError::mismatch(shape, value_kind(value))),
        ParamShape::Enum(allowed) => {
            let text = value
                .as_str()
                .ok_or_else(|| CoercionError::mismatch(shape, value_kind(value)))?;
            if allowed.iter().any(|candidate| candidate == text) {
                Ok(ArgValue::String(text.to_string()))
            } else {
                Err(CoercionError::EnumViolation {
                    value: text.to_string(),
                    allowed: allowed.clone(),
                })
            }
        }
        ParamShape::Array => value
            .as_array()
            .map(|items| ArgValue::Array(items.clone()))
            .ok_or_else(|| CoercionError::mismatch(shape, value_kind(value))),
        ParamShape::Object => value
            .as_object()
            .map(|map| ArgValue::Object(map.clone()))
            .ok_or_else(|| CoercionError::mismatch(shape, value_kind(value))),
    }
}

fn coerce_integer(value: &Value, shape: &ParamShape) -> Result<i64, CoercionError> {
    let Value::Number(number) = value else {
        return Err(CoercionError::mismatch(shape, value_kind(value)));
    };

    if let Some(integer) = number.as_i64() {
        return Ok(integer);
    }
    if number.is_u64() {
        return Err(CoercionError::mismatch(shape, "out-of-range integer"));
    }

    let float = number
        .as_f64()
        .ok_or_else(|| CoercionError::mismatch(shape, "number"))?;
    if float.fract() != 0.0 {
        return Err(CoercionError::mismatch(shape, "fractional number"));
    }
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
    if float < i64::MIN as f64 || float >= i64::MAX as f64 {
        return Err(CoercionError::mismatch(shape, "out-of-range integer"));
    }

    Ok(float as i64)
}

fn coerce_number(value: &Value, shape: &ParamShape) -> Result<f64, CoercionError> {
    let Value::Number(number) = value else {
        return Err(CoercionError::mismatch(shape, value_kind(value)));
    };

    if let Some(integer) = number.as_i64() {
        if integer.unsigned_abs() > MAX_EXACT_F64_INT {
            return Err(CoercionError::mismatch(shape, "integer beyond f64 precision"));
        }
        return Ok(integer as f64);
    }
    if number.is_u64() {
        return Err(CoercionError::mismatch(shape, "integer beyond f64 precision"));
    }

    number
        .as_f64()
        .ok_or_else(|| CoercionError::mismatch(shape, "number"))
}
