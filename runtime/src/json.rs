//! Lenient JSON readers used by generated `from_json` implementations.
//!
//! Numbers are accepted either as JSON numbers or as numeric strings, and an
//! explicit `null` is treated exactly like a missing field.

use std::str::FromStr;

pub use serde_json::{Map, Value};

use crate::error::CodecError;

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null      => "null",
        Value::Bool(_)   => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_)  => "array",
        Value::Object(_) => "object",
    }
}

fn unexpected(expected: &'static str, value: &Value) -> CodecError {
    CodecError::UnexpectedJson {
        expected,
        found: kind(value).to_string(),
    }
}

pub fn object(value: &Value) -> Result<&Map<String, Value>, CodecError> {
    value.as_object().ok_or_else(|| unexpected("object", value))
}

pub fn array(value: &Value) -> Result<&Vec<Value>, CodecError> {
    value.as_array().ok_or_else(|| unexpected("array", value))
}

/// Looks up a field, folding `null` into absence.
pub fn field<'a>(object: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    object.get(name).filter(|value| !value.is_null())
}

pub fn str(value: &Value) -> Result<&str, CodecError> {
    value.as_str().ok_or_else(|| unexpected("string", value))
}

pub fn string(value: &Value) -> Result<String, CodecError> {
    str(value).map(|s| s.to_string())
}

pub fn bool(value: &Value) -> Result<bool, CodecError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s == "true" => Ok(true),
        Value::String(s) if s == "false" => Ok(false),
        other => Err(unexpected("boolean", other)),
    }
}

/// Reads any integral JSON value into an `i128`, wide enough for every
/// protobuf integer type. Callers narrow with an overflow check.
pub fn integer(value: &Value) -> Result<i128, CodecError> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                Ok(i128::from(v))
            } else if let Some(v) = n.as_u64() {
                Ok(i128::from(v))
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.is_finite() => Ok(f as i128),
                    _ => Err(CodecError::UnexpectedJson {
                        expected: "integer",
                        found:    n.to_string(),
                    }),
                }
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i128>()
            .map_err(|_| CodecError::InvalidLong(s.clone())),
        other => Err(unexpected("integer", other)),
    }
}

fn narrow<T: TryFrom<i128>>(wide: i128) -> Result<T, CodecError> {
    T::try_from(wide).map_err(|_| CodecError::Overflow(wide.to_string()))
}

pub fn int32(value: &Value) -> Result<i32, CodecError> {
    narrow(integer(value)?)
}

pub fn uint32(value: &Value) -> Result<u32, CodecError> {
    narrow(integer(value)?)
}

pub fn int64(value: &Value) -> Result<i64, CodecError> {
    narrow(integer(value)?)
}

pub fn uint64(value: &Value) -> Result<u64, CodecError> {
    narrow(integer(value)?)
}

pub fn double(value: &Value) -> Result<f64, CodecError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| unexpected("number", value)),
        Value::String(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => other.trim().parse::<f64>().map_err(|_| unexpected("number", value)),
        },
        other => Err(unexpected("number", other)),
    }
}

pub fn float(value: &Value) -> Result<f32, CodecError> {
    Ok(double(value)? as f32)
}

/// Renders a double, spelling out the values JSON numbers cannot carry.
pub fn from_f64(value: f64) -> Value {
    if value.is_nan() {
        Value::from("NaN")
    } else if value == f64::INFINITY {
        Value::from("Infinity")
    } else if value == f64::NEG_INFINITY {
        Value::from("-Infinity")
    } else {
        Value::from(value)
    }
}

pub fn from_f32(value: f32) -> Value {
    from_f64(f64::from(value))
}

/// JSON object keys are always strings; non-string map keys are parsed back.
pub fn map_key<K: FromStr>(key: &str) -> Result<K, CodecError> {
    key.parse().map_err(|_| CodecError::UnexpectedJson {
        expected: "map key",
        found:    key.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_is_absent() {
        let value = json!({ "a": null, "b": 1 });
        let object = object(&value).unwrap();
        assert_eq!(field(object, "a"), None);
        assert_eq!(field(object, "b"), Some(&json!(1)));
        assert_eq!(field(object, "c"), None);
    }

    #[test]
    fn integers_accept_numbers_and_strings() {
        assert_eq!(int32(&json!(-7)), Ok(-7));
        assert_eq!(int32(&json!("42")), Ok(42));
        assert_eq!(int32(&json!(3.0)), Ok(3));
        assert_eq!(uint32(&json!(-1)), Err(CodecError::Overflow("-1".to_string())));
        assert_eq!(
            int32(&json!(2147483648u64)),
            Err(CodecError::Overflow("2147483648".to_string()))
        );
        assert!(int32(&json!(1.5)).is_err());
        assert!(int32(&json!(true)).is_err());
    }

    #[test]
    fn longs_keep_full_precision_and_signedness() {
        assert_eq!(uint64(&json!("18446744073709551615")), Ok(u64::MAX));
        assert_eq!(int64(&json!(9007199254740993i64)), Ok(9007199254740993));
        assert_eq!(int64(&json!("-9223372036854775808")), Ok(i64::MIN));
        assert_eq!(
            uint64(&json!("-1")),
            Err(CodecError::Overflow("-1".to_string()))
        );
        assert_eq!(
            int64(&json!("18446744073709551615")),
            Err(CodecError::Overflow("18446744073709551615".to_string()))
        );
        assert!(uint64(&json!("18446744073709551616")).is_err());
        assert_eq!(
            int64(&json!("12ab")),
            Err(CodecError::InvalidLong("12ab".to_string()))
        );
    }

    #[test]
    fn doubles_round_trip_special_values() {
        assert_eq!(from_f64(f64::INFINITY), json!("Infinity"));
        assert_eq!(double(&json!("-Infinity")), Ok(f64::NEG_INFINITY));
        assert!(double(&from_f64(f64::NAN)).unwrap().is_nan());
        assert_eq!(float(&json!("1.5")), Ok(1.5));
        assert_eq!(from_f32(0.5), json!(0.5));
    }

    #[test]
    fn map_keys_parse_into_key_type() {
        assert_eq!(map_key::<i64>("-3"), Ok(-3));
        assert_eq!(map_key::<bool>("true"), Ok(true));
        assert_eq!(map_key::<String>("x"), Ok("x".to_string()));
        assert!(map_key::<u32>("x").is_err());
    }
}
