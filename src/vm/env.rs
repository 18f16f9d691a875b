//! The `Env` external collaborator: the JNI function table surface this
//! crate needs from the host environment.
//!
//! `Env` is this crate's only way to reach the JNI function table. It is
//! deliberately expressed as a trait rather than a wrapper around a raw
//! `*mut sys::JNIEnv`: production embedders implement it over the live
//! pointer handed to them by the host process they've attached to, while
//! `vm::test_support::MockEnv` implements it over an in-memory fake object
//! graph so the rest of this crate can be exercised without a real Dalvik or
//! ART process.

use jni_sys::{jclass, jfieldID, jmethodID, jobject};

use crate::error::Result;
use crate::vm::reflect::ClassReflection;
use crate::vm::value::{JValue, Primitive};

/// Which invoker a method call should go through.
///
/// The Invocation Dispatcher picks `Virtual` for ordinary instance dispatch
/// and `NonVirtual` when the calling thread is inside the replaced body of
/// the same method, so that self-invocation reaches the original
/// implementation rather than recursing into the replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Virtual,
    NonVirtual,
    Static,
}

/// The JNI entry points this crate needs from the host environment.
///
/// Every method here corresponds to one or more raw JNI functions.
/// Per-primitive-type families (`CallBooleanMethod`, `CallByteMethod`, ...)
/// are collapsed into one [`Primitive`]-tagged method, favoring a small
/// interpreter loop over a per-type dispatch table.
pub trait Env: Send + Sync {
    // -- Classes --------------------------------------------------------
    fn find_class(&self, slash_name: &str) -> Result<jclass>;
    fn get_superclass(&self, class: jclass) -> Result<Option<jclass>>;
    fn get_object_class(&self, obj: jobject) -> Result<jclass>;
    fn is_instance_of(&self, obj: jobject, class: jclass) -> Result<bool>;
    fn is_same_object(&self, a: jobject, b: jobject) -> bool;

    /// `Class.getName()`, dotted form. Needed to cache-key a superclass
    /// wrapper discovered via `GetSuperclass` without the caller already
    /// knowing its name.
    fn class_name(&self, class: jclass) -> Result<String>;

    // -- References ------------------------------------------------------
    fn new_global_ref(&self, obj: jobject) -> Result<jobject>;
    fn delete_global_ref(&self, obj: jobject) -> Result<()>;
    fn new_weak_global_ref(&self, obj: jobject) -> Result<jobject>;
    fn delete_weak_global_ref(&self, obj: jobject) -> Result<()>;
    fn delete_local_ref(&self, obj: jobject) -> Result<()>;
    fn push_local_frame(&self, capacity: i32) -> Result<()>;
    /// Pops the current local frame, keeping `result` (if any) alive by
    /// returning it re-homed into the enclosing frame.
    fn pop_local_frame(&self, result: jobject) -> Result<jobject>;

    // -- Construction -----------------------------------------------------
    fn alloc_object(&self, class: jclass) -> Result<jobject>;
    fn new_object(&self, class: jclass, ctor: jmethodID, args: &[JValue]) -> Result<jobject>;

    // -- Member lookup (by JNI name/signature, used to bootstrap the fixed
    // reflective method ids this crate calls through, e.g.
    // `Class.getDeclaredMethods`) ----------------------------------------
    fn get_method_id(&self, class: jclass, name: &str, sig: &str) -> Result<jmethodID>;
    fn get_static_method_id(&self, class: jclass, name: &str, sig: &str) -> Result<jmethodID>;
    fn get_field_id(&self, class: jclass, name: &str, sig: &str) -> Result<jfieldID>;
    fn get_static_field_id(&self, class: jclass, name: &str, sig: &str) -> Result<jfieldID>;
    fn from_reflected_method(&self, reflected: jobject) -> Result<jmethodID>;
    fn from_reflected_field(&self, reflected: jobject) -> Result<jfieldID>;

    /// Enumerates `class`'s declared methods, fields, and constructors.
    ///
    /// See the module docs for how this collapses the reflective call
    /// sequence.
    fn reflect_class(&self, class: jclass) -> Result<ClassReflection>;

    // -- Invocation -------------------------------------------------------
    fn call_method(
        &self,
        obj: jobject,
        method: jmethodID,
        ret: Primitive,
        args: &[JValue],
        dispatch: Dispatch,
        // Only meaningful for `Dispatch::NonVirtual`: the class whose
        // implementation of `method` should run, per `CallNonvirtualXMethod`.
        direct_class: Option<jclass>,
    ) -> Result<JValue>;

    fn call_static_method(
        &self,
        class: jclass,
        method: jmethodID,
        ret: Primitive,
        args: &[JValue],
    ) -> Result<JValue>;

    // -- Fields -------------------------------------------------------------
    fn get_field(&self, obj: jobject, field: jfieldID, ty: Primitive) -> Result<JValue>;
    fn set_field(&self, obj: jobject, field: jfieldID, value: JValue) -> Result<()>;
    fn get_static_field(&self, class: jclass, field: jfieldID, ty: Primitive) -> Result<JValue>;
    fn set_static_field(&self, class: jclass, field: jfieldID, value: JValue) -> Result<()>;

    // -- Arrays ---------------------------------------------------------
    fn get_array_length(&self, array: jobject) -> Result<i32>;
    fn new_primitive_array(&self, ty: Primitive, len: i32) -> Result<jobject>;
    /// Copies `len` elements starting at `start` out of `array` into `out`,
    /// which must be `len * ty.byte_size()` bytes.
    fn get_primitive_array_region(
        &self,
        array: jobject,
        ty: Primitive,
        start: i32,
        out: &mut [u8],
    ) -> Result<()>;
    /// Writes `data` (`len * ty.byte_size()` bytes) into `array` starting at
    /// `start`.
    fn set_primitive_array_region(
        &self,
        array: jobject,
        ty: Primitive,
        start: i32,
        data: &[u8],
    ) -> Result<()>;
    fn new_object_array(&self, len: i32, element_class: jclass, initial: jobject) -> Result<jobject>;
    fn get_object_array_element(&self, array: jobject, index: i32) -> Result<jobject>;
    fn set_object_array_element(&self, array: jobject, index: i32, value: jobject) -> Result<()>;

    // -- Strings ----------------------------------------------------------
    fn new_string_utf(&self, modified_utf8: &[u8]) -> Result<jobject>;
    fn get_string_utf_chars(&self, string: jobject) -> Result<Vec<u8>>;

    // -- Exceptions -------------------------------------------------------
    fn exception_check(&self) -> bool;
    fn exception_clear(&self);
    /// Returns the pending exception (if any) without clearing it.
    fn exception_occurred(&self) -> Option<jobject>;
    fn throw(&self, throwable: jobject) -> Result<()>;

    /// Captures a throwable's class name and `getMessage()` result, for
    /// [`crate::error::JavaException`]'s eager capture.
    /// A production embedder does this via `GetObjectClass` +
    /// `Class.getName` + `Throwable.getMessage`; `MockEnv` answers directly
    /// from its fake object graph.
    fn describe_exception(&self, throwable: jobject) -> Result<(String, Option<String>)>;
}
