//! `ClassWrapper`: the per-class record cached by the factory.

use std::sync::{Arc, Mutex, OnceLock};

use jni_sys::jclass;

use crate::hook::WrapperHookState;
use crate::member::Members;
use crate::refs::{GlobalRef, Reference};

/// A Java class, reflected lazily on first member access.
///
/// At most one `ClassWrapper` exists per fully-qualified name for the
/// lifetime of the owning [`Factory`](crate::class::Factory). Superclass
/// linkage is a plain `Arc` to the parent wrapper rather than an arena
/// index: the cache holds the only strong reference a name can be looked up
/// by, and every child keeps its parent alive for as long as the child
/// itself is reachable, giving the cache sole ownership and parents acting
/// as indices without hand-rolling an arena.
pub struct ClassWrapper {
    class_ref: GlobalRef,
    name: String,
    parent: Option<Arc<ClassWrapper>>,
    members: OnceLock<Members>,
    pub(crate) hook_state: Mutex<WrapperHookState>,
}

impl ClassWrapper {
    pub(crate) fn new(class_ref: GlobalRef, name: String, parent: Option<Arc<ClassWrapper>>) -> Self {
        ClassWrapper {
            class_ref,
            name,
            parent,
            members: OnceLock::new(),
            hook_state: Mutex::new(WrapperHookState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class_raw(&self) -> jclass {
        self.class_ref.as_raw()
    }

    pub fn parent(&self) -> Option<&Arc<ClassWrapper>> {
        self.parent.as_ref()
    }

    /// Returns the already-materialized members, if any, without triggering
    /// reflection. [`crate::class::Factory`] is the only caller that
    /// populates this lazily via [`ClassWrapper::get_or_init_members`].
    pub fn members(&self) -> Option<&Members> {
        self.members.get()
    }

    pub(crate) fn get_or_init_members(&self, init: impl FnOnce() -> crate::error::Result<Members>) -> crate::error::Result<&Members> {
        if let Some(m) = self.members.get() {
            return Ok(m);
        }
        let built = init()?;
        // Lost races discard `built` and reuse whichever finished first; both
        // would have reflected the same immutable class metadata.
        let _ = self.members.set(built);
        Ok(self.members.get().expect("member table set above"))
    }

    /// Looks up a property by name, falling through to the superclass chain
    /// the way instance method/field lookup does in Java itself.
    pub fn lookup<'a>(&'a self, name: &str) -> Option<&'a crate::member::Property> {
        let mut current = Some(self);
        while let Some(wrapper) = current {
            if let Some(members) = wrapper.members() {
                if let Some(prop) = members.get(name) {
                    return Some(prop);
                }
            }
            current = wrapper.parent.as_deref();
        }
        None
    }
}

impl Reference for ClassWrapper {
    fn as_raw(&self) -> jclass {
        self.class_ref.as_raw()
    }
}
