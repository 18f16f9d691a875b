//! Wire-level value and type tags shared by the `vm::Env` call families.

use jni_sys::{jobject, jvalue};

/// The raw JNI wire type a [`TypeAdapter`] marshals to and from.
///
/// This is what selects which `CallXMethod`/`GetXField`/... family `vm::Env`
/// dispatches to for a given member, so a single generic call/field accessor
/// can stand in for the whole per-primitive JNI function family: a
/// precomputed table of argument TypeAdapter vtables plus a small
/// interpreter loop, rather than a per-type dispatch table.
///
/// [`TypeAdapter`]: crate::adapter::TypeAdapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
    /// Object/array reference wire type (`L...;`, `[...`).
    Object,
}

impl Primitive {
    /// Size in bytes of one element on the JNI wire, as used for array
    /// region transfers. `Object` and `Void` have no fixed element size.
    pub fn byte_size(self) -> Option<usize> {
        match self {
            Primitive::Boolean | Primitive::Byte => Some(1),
            Primitive::Char | Primitive::Short => Some(2),
            Primitive::Int | Primitive::Float => Some(4),
            Primitive::Long | Primitive::Double => Some(8),
            Primitive::Void | Primitive::Object => None,
        }
    }
}

/// A JNI value tagged with its wire type, used for method arguments, field
/// values, and return values alike.
#[derive(Debug, Clone, Copy)]
pub enum JValue {
    Void,
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Object(jobject),
}

impl JValue {
    pub fn primitive(&self) -> Primitive {
        match self {
            JValue::Void => Primitive::Void,
            JValue::Boolean(_) => Primitive::Boolean,
            JValue::Byte(_) => Primitive::Byte,
            JValue::Char(_) => Primitive::Char,
            JValue::Short(_) => Primitive::Short,
            JValue::Int(_) => Primitive::Int,
            JValue::Long(_) => Primitive::Long,
            JValue::Float(_) => Primitive::Float,
            JValue::Double(_) => Primitive::Double,
            JValue::Object(_) => Primitive::Object,
        }
    }

    /// Converts to the raw `jvalue` union JNI call sites expect.
    pub fn to_raw(self) -> jvalue {
        match self {
            JValue::Void => jvalue { l: std::ptr::null_mut() },
            JValue::Boolean(b) => jvalue { z: b as u8 },
            JValue::Byte(b) => jvalue { b },
            JValue::Char(c) => jvalue { c },
            JValue::Short(s) => jvalue { s },
            JValue::Int(i) => jvalue { i },
            JValue::Long(j) => jvalue { j },
            JValue::Float(f) => jvalue { f },
            JValue::Double(d) => jvalue { d },
            JValue::Object(l) => jvalue { l },
        }
    }

    /// Reinterprets a raw `jvalue` as the given wire type.
    ///
    /// # Safety
    /// `raw`'s active union field must match `prim`.
    pub unsafe fn from_raw(prim: Primitive, raw: jvalue) -> JValue {
        unsafe {
            match prim {
                Primitive::Void => JValue::Void,
                Primitive::Boolean => JValue::Boolean(raw.z != 0),
                Primitive::Byte => JValue::Byte(raw.b),
                Primitive::Char => JValue::Char(raw.c),
                Primitive::Short => JValue::Short(raw.s),
                Primitive::Int => JValue::Int(raw.i),
                Primitive::Long => JValue::Long(raw.j),
                Primitive::Float => JValue::Float(raw.f),
                Primitive::Double => JValue::Double(raw.d),
                Primitive::Object => JValue::Object(raw.l),
            }
        }
    }

    pub fn as_object(&self) -> Option<jobject> {
        match self {
            JValue::Object(o) => Some(*o),
            _ => None,
        }
    }
}
