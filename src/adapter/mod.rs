//! The TypeAdapter registry.
//!
//! For every Java type name this crate encounters — as a method parameter,
//! return type, or field type — it needs a [`TypeAdapter`]: the pairing of a
//! raw JNI wire type with the conversions and compatibility checks that move
//! values across the marshaling boundary. [`Registry`] builds and caches one
//! adapter per [`TypeName`]: all type lookups cache their result, and
//! unknown type names fail with `UnsupportedType`.
//!
//! Object and array adapters need two things this module does not itself
//! own: a way to wrap a raw `jobject` as a [`ClassInstance`](crate::class::ClassInstance)
//! (Component B's `cast`), and a way to resolve a class loader's view of an
//! element class for `NewObjectArray`. Both are abstracted behind
//! [`ObjectHost`], implemented by [`crate::class::Factory`].

mod array;
mod object;
mod primitive;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use jni_sys::{jclass, jobject};

use crate::error::{Error, Result};
use crate::signature::{PrimitiveName, TypeName};
use crate::value::Value;
use crate::vm::value::{JValue, Primitive};
use crate::vm::Env;

/// What an object/array [`TypeAdapter`] needs from the class cache, without
/// depending on `crate::class` directly (`Factory` implements this trait).
pub trait ObjectHost: Send + Sync {
    /// Wraps `handle` (known non-null) as a [`Value::Instance`] via the
    /// class cache's cast, preserving identity when the handle equals the
    /// receiver's own.
    fn wrap(&self, env: &dyn Env, handle: jobject, static_type: &TypeName) -> Result<Value>;

    /// Resolves the `jclass` for `type_name`, via the installed class
    /// loader if one is set, else `FindClass`.
    fn resolve_class(&self, env: &dyn Env, type_name: &TypeName) -> Result<jclass>;
}

/// The behavior a [`TypeAdapter`] dispatches to, one variant per marshaling
/// category.
enum Kind {
    Primitive(PrimitiveName),
    /// `java.lang.String`/`java.lang.CharSequence` get the extra
    /// auto-boxing rule; every other reference type behaves identically
    /// otherwise, so one variant with a flag covers both.
    Object { class_name: String, string_like: bool },
    PrimitiveArray(PrimitiveName),
    ObjectArray(Arc<TypeAdapter>),
}

/// A type name's marshaling descriptor: wire type, sizes, compatibility
/// predicate, and `fromJni`/`toJni` converters.
pub struct TypeAdapter {
    type_name: TypeName,
    kind: Kind,
}

impl TypeAdapter {
    pub fn type_name(&self) -> &TypeName {
        &self.type_name
    }

    /// The wire type selecting which `CallXMethod`/`GetXField`/... family a
    /// member using this adapter dispatches through.
    pub fn wire_type(&self) -> Primitive {
        match &self.kind {
            Kind::Primitive(p) => primitive::wire_type(*p),
            Kind::Object { .. } | Kind::PrimitiveArray(_) | Kind::ObjectArray(_) => Primitive::Object,
        }
    }

    /// Element byte size for array region transfers; `None` for
    /// object/array/void adapters, which have no fixed element width.
    pub fn byte_size(&self) -> Option<usize> {
        match &self.kind {
            Kind::Primitive(p) => self.wire_type_of(*p).byte_size(),
            _ => None,
        }
    }

    fn wire_type_of(&self, p: PrimitiveName) -> Primitive {
        primitive::wire_type(p)
    }

    /// `isCompatible`: a pure, JNI-call-free predicate used on the hot path
    /// of overload selection.
    pub fn is_compatible(&self, value: &Value) -> bool {
        match &self.kind {
            Kind::Primitive(p) => primitive::is_compatible(*p, value),
            Kind::Object { string_like, .. } => object::is_compatible(*string_like, value),
            Kind::PrimitiveArray(elem) => match value {
                Value::Null => true,
                Value::Array(items) => items.iter().all(|v| primitive::is_compatible(*elem, v)),
                _ => false,
            },
            Kind::ObjectArray(elem_adapter) => match value {
                Value::Null => true,
                Value::Array(items) => items.iter().all(|v| elem_adapter.is_compatible(v)),
                _ => false,
            },
        }
    }

    /// `fromJni`: converts a raw wire value back to a host [`Value`].
    ///
    /// `receiver` is the instance the call that produced `raw` was made
    /// on, if any; passed through so object adapters can preserve identity
    /// with the receiver. `unbox_strings` is true when the caller wants a
    /// `java.lang.String` returned as a host string rather than a wrapped
    /// instance.
    pub fn from_jni(
        &self,
        env: &dyn Env,
        host: &dyn ObjectHost,
        raw: JValue,
        receiver: Option<&Value>,
        unbox_strings: bool,
    ) -> Result<Value> {
        match &self.kind {
            Kind::Primitive(p) => primitive::from_jni(*p, raw),
            Kind::Object { string_like, .. } => {
                object::from_jni(env, host, &self.type_name, *string_like, raw, receiver, unbox_strings)
            }
            Kind::PrimitiveArray(elem) => array::primitive_from_jni(env, *elem, raw),
            Kind::ObjectArray(elem_adapter) => array::object_from_jni(env, host, elem_adapter, raw, unbox_strings),
        }
    }

    /// `toJni`: converts a host [`Value`] into its wire representation.
    pub fn to_jni(&self, env: &dyn Env, host: &dyn ObjectHost, value: &Value) -> Result<JValue> {
        match &self.kind {
            Kind::Primitive(p) => primitive::to_jni(*p, value),
            Kind::Object { string_like, .. } => object::to_jni(env, *string_like, value),
            Kind::PrimitiveArray(elem) => array::primitive_to_jni(env, *elem, value),
            Kind::ObjectArray(elem_adapter) => array::object_to_jni(env, host, &self.type_name, elem_adapter, value),
        }
    }

    /// Number of local references a worst-case `fromJni`/`toJni` call may
    /// allocate, used to size local frames.
    pub fn local_budget(&self) -> i32 {
        match &self.kind {
            Kind::Primitive(_) => 0,
            Kind::Object { .. } => 1,
            Kind::PrimitiveArray(_) => 1,
            Kind::ObjectArray(_) => 1,
        }
    }
}

/// Caches one [`TypeAdapter`] per [`TypeName`]; all type lookups cache
/// their result.
pub struct Registry {
    cache: Mutex<HashMap<TypeName, Arc<TypeAdapter>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry { cache: Mutex::new(HashMap::new()) }
    }

    /// Looks up (building and caching on first request) the adapter for a
    /// `getTypeName()`-style source name.
    pub fn lookup_source_name(&self, name: &str) -> Result<Arc<TypeAdapter>> {
        let type_name = TypeName::from_source_name(name)?;
        self.lookup(&type_name)
    }

    /// Looks up (building and caching on first request) the adapter for a
    /// parsed [`TypeName`].
    pub fn lookup(&self, type_name: &TypeName) -> Result<Arc<TypeAdapter>> {
        if let Some(hit) = self.cache.lock().unwrap().get(type_name) {
            return Ok(hit.clone());
        }
        let built = Arc::new(self.build(type_name)?);
        self.cache.lock().unwrap().entry(type_name.clone()).or_insert_with(|| built.clone());
        Ok(built)
    }

    fn build(&self, type_name: &TypeName) -> Result<TypeAdapter> {
        let kind = match type_name {
            TypeName::Primitive(p) => Kind::Primitive(*p),
            TypeName::Object(name) => Kind::Object {
                string_like: name == "java.lang.String" || name == "java.lang.CharSequence",
                class_name: name.clone(),
            },
            TypeName::Array(elem) => match elem.as_ref() {
                TypeName::Primitive(PrimitiveName::Void) => {
                    return Err(Error::UnsupportedType(type_name.to_source_name()))
                }
                TypeName::Primitive(p) => Kind::PrimitiveArray(*p),
                _ => {
                    let elem_adapter = self.lookup(elem)?;
                    Kind::ObjectArray(elem_adapter)
                }
            },
        };
        Ok(TypeAdapter { type_name: type_name.clone(), kind })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::test_support::MockEnv;

    struct NullHost;
    impl ObjectHost for NullHost {
        fn wrap(&self, _env: &dyn Env, _handle: jobject, _static_type: &TypeName) -> Result<Value> {
            unreachable!("no object args in these tests")
        }
        fn resolve_class(&self, _env: &dyn Env, _type_name: &TypeName) -> Result<jclass> {
            unreachable!("no object arrays in these tests")
        }
    }

    #[test]
    fn primitive_round_trip_boundaries() {
        let registry = Registry::new();
        let env = MockEnv::new();
        let host = NullHost;
        let adapter = registry.lookup_source_name("byte").unwrap();
        for v in [i64::from(i8::MIN), -1, 0, 1, i64::from(i8::MAX)] {
            let value = Value::Int(v);
            assert!(adapter.is_compatible(&value));
            let raw = adapter.to_jni(&env, &host, &value).unwrap();
            let back = adapter.from_jni(&env, &host, raw, None, false).unwrap();
            assert!(matches!(back, Value::Int(b) if b == v));
        }
        assert!(!adapter.is_compatible(&Value::Int(i64::from(i8::MAX) + 1)));
        assert!(!adapter.is_compatible(&Value::Int(i64::from(i8::MIN) - 1)));
    }

    #[test]
    fn char_marshals_through_one_code_unit_string() {
        let registry = Registry::new();
        let env = MockEnv::new();
        let host = NullHost;
        let adapter = registry.lookup_source_name("char").unwrap();
        let value = Value::Str("x".to_string());
        assert!(adapter.is_compatible(&value));
        let raw = adapter.to_jni(&env, &host, &value).unwrap();
        let back = adapter.from_jni(&env, &host, raw, None, false).unwrap();
        assert!(matches!(back, Value::Str(s) if s == "x"));
        assert!(!adapter.is_compatible(&Value::Str("xy".to_string())));
    }

    #[test]
    fn array_adapter_round_trips_including_empty_and_null() {
        let registry = Registry::new();
        let env = MockEnv::new();
        let host = NullHost;
        let adapter = registry.lookup_source_name("int[]").unwrap();

        let empty = Value::Array(vec![]);
        let raw = adapter.to_jni(&env, &host, &empty).unwrap();
        let back = adapter.from_jni(&env, &host, raw, None, false).unwrap();
        assert!(matches!(back, Value::Array(items) if items.is_empty()));

        let xs = Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let raw = adapter.to_jni(&env, &host, &xs).unwrap();
        let back = adapter.from_jni(&env, &host, raw, None, false).unwrap();
        assert!(matches!(back, Value::Array(items) if items.len() == 3));

        let raw = adapter.to_jni(&env, &host, &Value::Null).unwrap();
        assert!(matches!(raw, JValue::Object(p) if p.is_null()));
    }

    #[test]
    fn unknown_type_name_is_unsupported() {
        let registry = Registry::new();
        assert!(matches!(registry.lookup_source_name("").unwrap_err(), Error::UnsupportedType(_)));
    }
}
