//! Reference-type `TypeAdapter` behavior.

use crate::adapter::ObjectHost;
use crate::error::Result;
use crate::signature::TypeName;
use crate::value::Value;
use crate::vm::value::JValue;
use crate::vm::Env;

pub(super) fn is_compatible(string_like: bool, value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Instance(_) => true,
        Value::Str(_) => string_like,
        _ => false,
    }
}

pub(super) fn from_jni(
    env: &dyn Env,
    host: &dyn ObjectHost,
    type_name: &TypeName,
    string_like: bool,
    raw: JValue,
    receiver: Option<&Value>,
    unbox_strings: bool,
) -> Result<Value> {
    let handle = raw.as_object().unwrap_or(std::ptr::null_mut());
    if handle.is_null() {
        return Ok(Value::Null);
    }

    // Preserve identity with the receiver when the handle matches it,
    // rather than minting a fresh wrapper for the same object.
    if let Some(Value::Instance(recv)) = receiver {
        if let Some(recv_handle) = recv.handle() {
            if env.is_same_object(recv_handle, handle) {
                return Ok(Value::Instance(recv.clone()));
            }
        }
    }

    let is_string = matches!(type_name, TypeName::Object(name) if name == "java.lang.String");
    if string_like && is_string && unbox_strings {
        let bytes = env.get_string_utf_chars(handle)?;
        return Ok(Value::Str(crate::strings::decode_modified_utf8(&bytes)));
    }

    host.wrap(env, handle, type_name)
}

pub(super) fn to_jni(env: &dyn Env, string_like: bool, value: &Value) -> Result<JValue> {
    Ok(match value {
        Value::Null => JValue::Object(std::ptr::null_mut()),
        Value::Str(s) if string_like => {
            let jni_string: crate::strings::JNIString = s.as_str().into();
            JValue::Object(env.new_string_utf(jni_string.to_bytes())?)
        }
        Value::Instance(instance) => JValue::Object(instance.handle().unwrap_or(std::ptr::null_mut())),
        _ => {
            return Err(crate::error::Error::incompatible_argument(
                0,
                if string_like { "java.lang.String" } else { "object" },
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_like_accepts_raw_host_strings() {
        assert!(is_compatible(true, &Value::Str("hi".into())));
        assert!(!is_compatible(false, &Value::Str("hi".into())));
    }

    #[test]
    fn every_adapter_accepts_null() {
        assert!(is_compatible(true, &Value::Null));
        assert!(is_compatible(false, &Value::Null));
    }
}
