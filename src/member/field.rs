//! Field accessors.
//!
//! Each field on a class becomes a get/set pair that pushes a local frame
//! sized to its worst case before calling `GetXField`/`SetXField` (the
//! static variant when applicable), checks for a pending exception, marshals
//! through the field's [`TypeAdapter`], and pops the frame on every exit
//! path including errors — [`LocalFrame`]'s `Drop` impl is what gives us the
//! "every exit path" half of that for free.

use std::sync::Arc;

use jni_sys::{jclass, jfieldID};

use crate::adapter::{ObjectHost, TypeAdapter};
use crate::error::{Error, Result};
use crate::value::Value;
use crate::vm::value::JValue;
use crate::vm::{Env, LocalFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Static,
    Instance,
}

/// A single field's descriptor.
pub struct FieldAccessor {
    pub(crate) name: String,
    pub(crate) kind: FieldKind,
    pub(crate) field_id: jfieldID,
    pub(crate) adapter: Arc<TypeAdapter>,
    /// The declaring class, needed for `GetStaticField`/`SetStaticField`.
    pub(crate) declaring_class: jclass,
}

// See `dispatch::MethodDescriptor`'s identical impls: `jfieldID`/`jclass` are
// opaque, non-thread-affine handles dereferenced only through `&dyn Env`.
unsafe impl Send for FieldAccessor {}
unsafe impl Sync for FieldAccessor {}

impl FieldAccessor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn type_adapter(&self) -> &Arc<TypeAdapter> {
        &self.adapter
    }

    /// `k.f` — reads the field's current value.
    pub fn get(&self, env: &dyn Env, host: &dyn ObjectHost, receiver: Option<&Value>) -> Result<Value> {
        let budget = 2 + self.adapter.local_budget();
        let mut frame = LocalFrame::push(env, budget)?;
        let raw = self.read_raw(env, receiver)?;
        if env.exception_check() {
            return Err(capture_exception(env));
        }
        let value = self.adapter.from_jni(env, host, raw, receiver, true)?;
        if let Value::Instance(instance) = &value {
            frame.keep(instance.handle().unwrap_or(std::ptr::null_mut()));
        }
        frame.pop()?;
        Ok(value)
    }

    /// `k.f = v` — writes the field, rejecting `v` up front if it is
    /// incompatible with the field's declared type (e.g. `k.f = "x"` on an
    /// `int` field fails with `IncompatibleArgument`).
    pub fn set(&self, env: &dyn Env, host: &dyn ObjectHost, receiver: Option<&Value>, value: &Value) -> Result<()> {
        if !self.adapter.is_compatible(value) {
            return Err(Error::incompatible_argument(0, self.adapter.type_name().to_source_name()));
        }
        let frame = LocalFrame::push(env, 2)?;
        let raw = self.adapter.to_jni(env, host, value)?;
        self.write_raw(env, receiver, raw)?;
        let pending = env.exception_check();
        frame.pop()?;
        if pending {
            return Err(capture_exception(env));
        }
        Ok(())
    }

    fn read_raw(&self, env: &dyn Env, receiver: Option<&Value>) -> Result<JValue> {
        match self.kind {
            FieldKind::Static => env.get_static_field(self.declaring_class, self.field_id, self.adapter.wire_type()),
            FieldKind::Instance => {
                let obj = receiver
                    .and_then(Value::as_instance)
                    .and_then(|i| i.handle())
                    .ok_or_else(|| Error::Jni(format!("`{}` requires an instance receiver", self.name)))?;
                env.get_field(obj, self.field_id, self.adapter.wire_type())
            }
        }
    }

    fn write_raw(&self, env: &dyn Env, receiver: Option<&Value>, raw: JValue) -> Result<()> {
        match self.kind {
            FieldKind::Static => env.set_static_field(self.declaring_class, self.field_id, raw),
            FieldKind::Instance => {
                let obj = receiver
                    .and_then(Value::as_instance)
                    .and_then(|i| i.handle())
                    .ok_or_else(|| Error::Jni(format!("`{}` requires an instance receiver", self.name)))?;
                env.set_field(obj, self.field_id, raw)
            }
        }
    }
}

/// Captures a pending exception into a [`Error::JavaException`], clearing it
/// from the environment.
pub(crate) fn capture_exception(env: &dyn Env) -> Error {
    let Some(throwable) = env.exception_occurred() else {
        env.exception_clear();
        return Error::Jni("exception pending but ExceptionOccurred returned null".into());
    };
    env.exception_clear();
    let (class_name, message) = env.describe_exception(throwable).unwrap_or_else(|_| ("java.lang.Throwable".to_string(), None));
    match crate::refs::GlobalRef::new(env, throwable) {
        Ok(global) => Error::JavaException(crate::error::JavaException {
            class_name,
            message,
            throwable: global,
        }),
        Err(e) => e,
    }
}
