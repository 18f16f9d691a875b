//! Primitive `TypeAdapter` behavior.

use crate::error::{Error, Result};
use crate::signature::PrimitiveName;
use crate::value::Value;
use crate::vm::value::{JValue, Primitive};

pub(super) fn wire_type(p: PrimitiveName) -> Primitive {
    match p {
        PrimitiveName::Boolean => Primitive::Boolean,
        PrimitiveName::Byte => Primitive::Byte,
        PrimitiveName::Char => Primitive::Char,
        PrimitiveName::Short => Primitive::Short,
        PrimitiveName::Int => Primitive::Int,
        PrimitiveName::Long => Primitive::Long,
        PrimitiveName::Float => Primitive::Float,
        PrimitiveName::Double => Primitive::Double,
        PrimitiveName::Void => Primitive::Void,
    }
}

/// Range/shape checks: `isCompatible` enforces numeric range (e.g. `byte` ∈
/// [-128,127]). Deliberately strict and JNI-call free: this runs on the
/// overload-selection hot path, and a float value is never compatible with
/// an `int` parameter or vice versa (`m(42.0)` against an `m(int)` overload
/// fails with `NoSuchOverload`).
pub(super) fn is_compatible(p: PrimitiveName, value: &Value) -> bool {
    match p {
        PrimitiveName::Boolean => matches!(value, Value::Bool(_)),
        PrimitiveName::Byte => matches!(value, Value::Int(v) if (i8::MIN as i64..=i8::MAX as i64).contains(v)),
        PrimitiveName::Char => matches!(value, Value::Str(s) if s.chars().count() == 1),
        PrimitiveName::Short => matches!(value, Value::Int(v) if (i16::MIN as i64..=i16::MAX as i64).contains(v)),
        PrimitiveName::Int => matches!(value, Value::Int(v) if (i32::MIN as i64..=i32::MAX as i64).contains(v)),
        PrimitiveName::Long => matches!(value, Value::Int(_)),
        PrimitiveName::Float => matches!(value, Value::Float(v) if v.is_finite() || v.is_nan()),
        PrimitiveName::Double => matches!(value, Value::Float(_)),
        // `void` only ever appears as a return type; never a valid argument.
        PrimitiveName::Void => false,
    }
}

pub(super) fn from_jni(p: PrimitiveName, raw: JValue) -> Result<Value> {
    Ok(match (p, raw) {
        (PrimitiveName::Boolean, JValue::Boolean(b)) => Value::Bool(b),
        (PrimitiveName::Byte, JValue::Byte(b)) => Value::Int(b as i64),
        (PrimitiveName::Char, JValue::Char(c)) => {
            Value::Str(char::from_u32(c as u32).unwrap_or('\u{FFFD}').to_string())
        }
        (PrimitiveName::Short, JValue::Short(s)) => Value::Int(s as i64),
        (PrimitiveName::Int, JValue::Int(i)) => Value::Int(i as i64),
        (PrimitiveName::Long, JValue::Long(j)) => Value::Int(j),
        (PrimitiveName::Float, JValue::Float(f)) => Value::Float(f as f64),
        (PrimitiveName::Double, JValue::Double(d)) => Value::Float(d),
        (PrimitiveName::Void, JValue::Void) => Value::Null,
        _ => return Err(Error::Jni(format!("wire value {raw:?} does not match primitive {p:?}"))),
    })
}

pub(super) fn to_jni(p: PrimitiveName, value: &Value) -> Result<JValue> {
    if p != PrimitiveName::Void && !is_compatible(p, value) {
        return Err(Error::incompatible_argument(0, p.source_name()));
    }
    Ok(match (p, value) {
        (PrimitiveName::Boolean, Value::Bool(b)) => JValue::Boolean(*b),
        (PrimitiveName::Byte, Value::Int(v)) => JValue::Byte(*v as i8),
        (PrimitiveName::Char, Value::Str(s)) => {
            JValue::Char(s.chars().next().map(|c| c as u16).unwrap_or(0))
        }
        (PrimitiveName::Short, Value::Int(v)) => JValue::Short(*v as i16),
        (PrimitiveName::Int, Value::Int(v)) => JValue::Int(*v as i32),
        (PrimitiveName::Long, Value::Int(v)) => JValue::Long(*v),
        (PrimitiveName::Float, Value::Float(v)) => JValue::Float(*v as f32),
        (PrimitiveName::Double, Value::Float(v)) => JValue::Double(*v),
        (PrimitiveName::Void, _) => JValue::Void,
        _ => return Err(Error::incompatible_argument(0, p.source_name())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_rejects_out_of_range() {
        assert!(!is_compatible(PrimitiveName::Byte, &Value::Int(128)));
        assert!(!is_compatible(PrimitiveName::Byte, &Value::Int(-129)));
        assert!(is_compatible(PrimitiveName::Byte, &Value::Int(127)));
        assert!(is_compatible(PrimitiveName::Byte, &Value::Int(-128)));
    }

    #[test]
    fn boolean_maps_true_false_to_one_zero() {
        let raw = to_jni(PrimitiveName::Boolean, &Value::Bool(true)).unwrap();
        assert!(matches!(raw, JValue::Boolean(true)));
    }
}
