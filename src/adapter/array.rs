//! Array `TypeAdapter` behavior, covering both primitive arrays and object
//! arrays.

use crate::adapter::{ObjectHost, TypeAdapter};
use crate::error::{Error, Result};
use crate::signature::{PrimitiveName, TypeName};
use crate::value::Value;
use crate::vm::value::{JValue, Primitive};
use crate::vm::Env;

fn read_element(ty: PrimitiveName, bytes: &[u8]) -> Value {
    match ty {
        PrimitiveName::Boolean => Value::Bool(bytes[0] != 0),
        PrimitiveName::Byte => Value::Int(bytes[0] as i8 as i64),
        PrimitiveName::Char => Value::Str(
            char::from_u32(u16::from_ne_bytes([bytes[0], bytes[1]]) as u32)
                .unwrap_or('\u{FFFD}')
                .to_string(),
        ),
        PrimitiveName::Short => Value::Int(i16::from_ne_bytes([bytes[0], bytes[1]]) as i64),
        PrimitiveName::Int => Value::Int(i32::from_ne_bytes(bytes.try_into().unwrap()) as i64),
        PrimitiveName::Long => Value::Int(i64::from_ne_bytes(bytes.try_into().unwrap())),
        PrimitiveName::Float => Value::Float(f32::from_ne_bytes(bytes.try_into().unwrap()) as f64),
        PrimitiveName::Double => Value::Float(f64::from_ne_bytes(bytes.try_into().unwrap())),
        PrimitiveName::Void => unreachable!("void has no array form"),
    }
}

fn write_element(ty: PrimitiveName, value: &Value, out: &mut [u8]) -> Result<()> {
    match (ty, value) {
        (PrimitiveName::Boolean, Value::Bool(b)) => out[0] = *b as u8,
        (PrimitiveName::Byte, Value::Int(v)) => out[0] = *v as i8 as u8,
        (PrimitiveName::Char, Value::Str(s)) => {
            let code = s.chars().next().map(|c| c as u16).unwrap_or(0);
            out.copy_from_slice(&code.to_ne_bytes());
        }
        (PrimitiveName::Short, Value::Int(v)) => out.copy_from_slice(&(*v as i16).to_ne_bytes()),
        (PrimitiveName::Int, Value::Int(v)) => out.copy_from_slice(&(*v as i32).to_ne_bytes()),
        (PrimitiveName::Long, Value::Int(v)) => out.copy_from_slice(&v.to_ne_bytes()),
        (PrimitiveName::Float, Value::Float(v)) => out.copy_from_slice(&(*v as f32).to_ne_bytes()),
        (PrimitiveName::Double, Value::Float(v)) => out.copy_from_slice(&v.to_ne_bytes()),
        _ => return Err(Error::incompatible_argument(0, ty.source_name())),
    }
    Ok(())
}

fn wire_of(ty: PrimitiveName) -> Primitive {
    super::primitive::wire_type(ty)
}

pub(super) fn primitive_from_jni(env: &dyn Env, elem: PrimitiveName, raw: JValue) -> Result<Value> {
    let Some(array) = raw.as_object() else {
        return Ok(Value::Null);
    };
    if array.is_null() {
        return Ok(Value::Null);
    }
    let len = env.get_array_length(array)?;
    let elem_size = wire_of(elem).byte_size().expect("primitive element has fixed size");
    let mut buf = vec![0u8; elem_size * len as usize];
    if len > 0 {
        env.get_primitive_array_region(array, wire_of(elem), 0, &mut buf)?;
    }
    let items = buf.chunks(elem_size).map(|chunk| read_element(elem, chunk)).collect();
    Ok(Value::Array(items))
}

pub(super) fn primitive_to_jni(env: &dyn Env, elem: PrimitiveName, value: &Value) -> Result<JValue> {
    let Value::Array(items) = value else {
        if matches!(value, Value::Null) {
            return Ok(JValue::Object(std::ptr::null_mut()));
        }
        return Err(Error::incompatible_argument(0, format!("{}[]", elem.source_name())));
    };
    let array = env.new_primitive_array(wire_of(elem), items.len() as i32)?;
    if !items.is_empty() {
        let elem_size = wire_of(elem).byte_size().expect("primitive element has fixed size");
        let mut buf = vec![0u8; elem_size * items.len()];
        for (chunk, item) in buf.chunks_mut(elem_size).zip(items) {
            write_element(elem, item, chunk)?;
        }
        env.set_primitive_array_region(array, wire_of(elem), 0, &buf)?;
    }
    Ok(JValue::Object(array))
}

pub(super) fn object_from_jni(
    env: &dyn Env,
    host: &dyn ObjectHost,
    elem_adapter: &TypeAdapter,
    raw: JValue,
    unbox_strings: bool,
) -> Result<Value> {
    let Some(array) = raw.as_object() else {
        return Ok(Value::Null);
    };
    if array.is_null() {
        return Ok(Value::Null);
    }
    let len = env.get_array_length(array)?;
    let mut items = Vec::with_capacity(len as usize);
    for i in 0..len {
        let elem_handle = env.get_object_array_element(array, i)?;
        items.push(elem_adapter.from_jni(env, host, JValue::Object(elem_handle), None, unbox_strings)?);
        if !elem_handle.is_null() {
            env.delete_local_ref(elem_handle)?;
        }
    }
    Ok(Value::Array(items))
}

pub(super) fn object_to_jni(
    env: &dyn Env,
    host: &dyn ObjectHost,
    array_type: &TypeName,
    elem_adapter: &TypeAdapter,
    value: &Value,
) -> Result<JValue> {
    if matches!(value, Value::Null) {
        return Ok(JValue::Object(std::ptr::null_mut()));
    }
    let Value::Array(items) = value else {
        return Err(Error::incompatible_argument(0, array_type.to_source_name()));
    };
    let element_type = array_type.element_type().expect("object array TypeName always wraps an element type");
    let element_class = host.resolve_class(env, element_type)?;
    let initial = items.first().map(|v| elem_adapter.to_jni(env, host, v)).transpose()?;
    let initial_handle = initial.and_then(|v| v.as_object()).unwrap_or(std::ptr::null_mut());
    let array = env.new_object_array(items.len() as i32, element_class, initial_handle)?;
    for (i, item) in items.iter().enumerate().skip(1) {
        let raw = elem_adapter.to_jni(env, host, item)?;
        env.set_object_array_element(array, i as i32, raw.as_object().unwrap_or(std::ptr::null_mut()))?;
    }
    Ok(JValue::Object(array))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_byte_round_trip() {
        let mut buf = [0u8; 4];
        write_element(PrimitiveName::Int, &Value::Int(-7), &mut buf).unwrap();
        assert!(matches!(read_element(PrimitiveName::Int, &buf), Value::Int(-7)));
    }
}
