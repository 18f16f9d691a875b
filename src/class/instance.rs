//! `ClassInstance`: a host-side handle to a Java object.

use std::fmt;
use std::sync::Arc;

use jni_sys::jobject;

use crate::class::ClassWrapper;
use crate::refs::{GlobalRef, Reference};
use crate::vm::Env;

/// A Java object, or a class-only static view, paired with the
/// [`ClassWrapper`] that resolved it.
///
/// When `instance` is `None` this is a static view created by
/// [`Factory::use_class`](crate::class::Factory::use_class) rather than
/// `$new`/`$alloc`/`cast`: it has no `$handle`, and calling an instance-kind
/// member through it is an error (the `toString` special case aside).
///
/// Dropping the last `ClassInstance` for a given object drops its
/// [`GlobalRef`]: the strong global keeps the Java object alive for exactly
/// as long as some host reference to it exists, and `GlobalRef`'s own `Drop`
/// (see `refs.rs`) is what releases it deterministically — no weak-reference
/// finalizer or factory-owned sweep is needed on top, since a live
/// `ClassInstance` always holds its `GlobalRef` strongly and there is
/// nothing left to collect once the last one is dropped.
#[derive(Clone)]
pub struct ClassInstance {
    // `Debug` is hand-written below rather than derived: `ClassWrapper`
    // doesn't derive it either, and a handle/class-name summary is more
    // useful in a panic message than the wrapper's own internals.
    wrapper: Arc<ClassWrapper>,
    instance: Option<Arc<GlobalRef>>,
}

impl ClassInstance {
    pub(crate) fn new_instance(wrapper: Arc<ClassWrapper>, global: GlobalRef) -> Self {
        ClassInstance {
            wrapper,
            instance: Some(Arc::new(global)),
        }
    }

    pub(crate) fn static_view(wrapper: Arc<ClassWrapper>) -> Self {
        ClassInstance { wrapper, instance: None }
    }

    pub fn wrapper(&self) -> &Arc<ClassWrapper> {
        &self.wrapper
    }

    /// The `$handle` property: `None` for a static/class-only view.
    pub fn handle(&self) -> Option<jobject> {
        self.instance.as_ref().map(|g| g.as_raw())
    }

    pub fn is_static_view(&self) -> bool {
        self.instance.is_none()
    }

    /// `$className`.
    pub fn class_name(&self) -> &str {
        self.wrapper.name()
    }

    /// `$isSameObject`.
    pub fn is_same_object(&self, env: &dyn Env, other: &ClassInstance) -> bool {
        match (self.handle(), other.handle()) {
            (Some(a), Some(b)) => env.is_same_object(a, b),
            (None, None) => Arc::ptr_eq(&self.wrapper, &other.wrapper),
            _ => false,
        }
    }
}

impl Reference for ClassInstance {
    fn as_raw(&self) -> jobject {
        self.handle().unwrap_or(std::ptr::null_mut())
    }
}

impl fmt::Debug for ClassInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassInstance")
            .field("class_name", &self.class_name())
            .field("handle", &self.handle())
            .finish()
    }
}
