//! Java reflective metadata, as surfaced by [`Env::reflect_class`].
//!
//! Materializing a class's members means calling
//! `Class.getDeclaredMethods`/`.getDeclaredFields`/`.getDeclaredConstructors`
//! reflectively, then, for each result, pulling its name/modifiers/parameter
//! and return type names back out via further reflective calls on
//! `java.lang.reflect.Method`/`Field`/`Constructor`. [`Env::reflect_class`]
//! collapses that whole dance behind one call: a production implementation
//! performs exactly the reflective calls above and packs their results into
//! a [`ClassReflection`]; [`crate::vm::test_support::MockEnv`] answers from a
//! schema registered directly, with no JNI calls at all.

use jni_sys::{jfieldID, jmethodID};

/// `java.lang.reflect.Modifier.STATIC`'s bit, used to classify members.
pub const MODIFIER_STATIC: i32 = 0x0008;

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub name: String,
    pub modifiers: i32,
    /// Parameter type names exactly as `Class.getTypeName()` would report
    /// them (e.g. `int`, `java.lang.String`, `java.lang.String[]`).
    pub param_types: Vec<String>,
    pub return_type: String,
    pub is_varargs: bool,
    pub method_id: jmethodID,
}

impl MethodInfo {
    pub fn is_static(&self) -> bool {
        self.modifiers & MODIFIER_STATIC != 0
    }
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub modifiers: i32,
    pub field_type: String,
    pub field_id: jfieldID,
}

impl FieldInfo {
    pub fn is_static(&self) -> bool {
        self.modifiers & MODIFIER_STATIC != 0
    }
}

#[derive(Debug, Clone)]
pub struct ConstructorInfo {
    pub modifiers: i32,
    pub param_types: Vec<String>,
    pub is_varargs: bool,
    pub method_id: jmethodID,
}

#[derive(Debug, Clone, Default)]
pub struct ClassReflection {
    pub methods: Vec<MethodInfo>,
    pub fields: Vec<FieldInfo>,
    pub constructors: Vec<ConstructorInfo>,
}
