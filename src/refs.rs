//! Reference-counted handles to Java objects.
//!
//! [`GlobalRef`] is this crate's RAII wrapper around a JNI global reference:
//! unlike a local reference it is not bound to a particular thread or to the
//! lifetime of a `vm::Env` borrow, so it is what [`ClassWrapper`] and
//! [`ClassInstance`] pin their underlying Java objects with.
//!
//! [`ClassWrapper`]: crate::class::ClassWrapper
//! [`ClassInstance`]: crate::class::ClassInstance

use std::fmt;

use jni_sys::jobject;
use log::warn;

use crate::vm::{self, Env};

/// Common identity operations shared by every wrapped Java reference.
///
/// A single place for raw-handle access and same-object comparison, shared
/// by `JObject`/`JClass`/`JString`/etc. regardless of which concrete wrapper
/// a value is held in.
pub trait Reference {
    /// Returns the raw JNI handle. The handle is only valid while `self` (or
    /// whatever owns the underlying reference) is alive.
    fn as_raw(&self) -> jobject;

    /// `$isSameObject`: true if `self` and `other` refer to the same Java
    /// object, as determined by `IsSameObject` rather than Rust-level
    /// pointer equality of the wrapper.
    fn is_same_object(&self, env: &dyn Env, other: &dyn Reference) -> bool {
        env.is_same_object(self.as_raw(), other.as_raw())
    }
}

/// An RAII-owned JNI global reference.
///
/// Creating one calls `NewGlobalRef`; dropping it calls `DeleteGlobalRef`.
/// Because global references are not bound to a thread, `GlobalRef` is `Send`
/// and `Sync`, and may be dropped from any thread — including one that has
/// never been attached to the runtime, in which case the delete is skipped
/// and a [`log::Level::Warn`] message is emitted instead of silently leaking
/// or attaching a thread the embedder never asked to attach (this crate does
/// not own the attach/detach lifecycle).
pub struct GlobalRef {
    raw: jobject,
}

// Safety: a JNI global reference is valid from any thread, and `jobject` is
// just an opaque handle; all of the operations that dereference it go
// through `vm::Env`, which is itself required to be `Send + Sync`.
unsafe impl Send for GlobalRef {}
unsafe impl Sync for GlobalRef {}

impl GlobalRef {
    /// Wraps an already-global reference.
    ///
    /// # Safety
    /// `raw`, if non-null, must be a valid JNI global reference that this
    /// `GlobalRef` now owns exclusively: the caller must not also delete it
    /// or hand it to another owning wrapper.
    pub unsafe fn from_raw(raw: jobject) -> Self {
        GlobalRef { raw }
    }

    /// Promotes a local or other reference to a new global reference via
    /// `NewGlobalRef`.
    pub fn new(env: &dyn Env, local: jobject) -> crate::error::Result<Self> {
        let raw = env.new_global_ref(local)?;
        Ok(GlobalRef { raw })
    }

    pub fn as_raw(&self) -> jobject {
        self.raw
    }

    pub fn is_null(&self) -> bool {
        self.raw.is_null()
    }
}

impl Reference for GlobalRef {
    fn as_raw(&self) -> jobject {
        self.raw
    }
}

impl fmt::Debug for GlobalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalRef").field("raw", &self.raw).finish()
    }
}

impl Drop for GlobalRef {
    fn drop(&mut self) {
        if self.raw.is_null() {
            return;
        }
        match vm::with_current_env(|env| env.delete_global_ref(self.raw)) {
            Some(Ok(())) => {}
            Some(Err(e)) => warn!("error dropping global ref: {e:#?}"),
            None => {
                warn!(
                    "a GlobalRef was dropped on a thread with no attached runtime Env; \
                     the underlying global reference was leaked"
                );
            }
        }
    }
}

/// A weak global reference, obtained via `NewWeakGlobalRef`.
///
/// Unlike [`GlobalRef`], a `WeakRef` does not prevent the referent from being
/// garbage collected. [`WeakRef::upgrade`] promotes it back to a strong
/// [`GlobalRef`] if the object is still alive, returning `None` if it has
/// already been collected. This is the weak destructor token `ClassInstance`
/// finalization relies on: holding only a weak reference to the underlying
/// object lets the Java side collect it, while still letting this crate
/// react when that happens.
pub struct WeakRef {
    raw: jobject,
}

unsafe impl Send for WeakRef {}
unsafe impl Sync for WeakRef {}

impl WeakRef {
    pub fn new(env: &dyn Env, local: jobject) -> crate::error::Result<Self> {
        let raw = env.new_weak_global_ref(local)?;
        Ok(WeakRef { raw })
    }

    /// Resolves the weak reference to a strong [`GlobalRef`], or `None` if
    /// the referent has been garbage collected.
    pub fn upgrade(&self, env: &dyn Env) -> crate::error::Result<Option<GlobalRef>> {
        if env.is_same_object(self.raw, std::ptr::null_mut()) {
            return Ok(None);
        }
        let global = env.new_global_ref(self.raw)?;
        Ok(Some(unsafe { GlobalRef::from_raw(global) }))
    }
}

impl Drop for WeakRef {
    fn drop(&mut self) {
        if self.raw.is_null() {
            return;
        }
        match vm::with_current_env(|env| env.delete_weak_global_ref(self.raw)) {
            Some(Ok(())) => {}
            Some(Err(e)) => warn!("error dropping weak global ref: {e:#?}"),
            None => {
                warn!(
                    "a WeakRef was dropped on a thread with no attached runtime Env; \
                     the underlying weak global reference was leaked"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::test_support::MockEnv;

    #[test]
    fn global_ref_drops_cleanly_with_attached_env() {
        let env = MockEnv::new();
        let obj = env.new_fake_object("java/lang/Object");
        let global = vm::with_env_attached(&env, || GlobalRef::new(&env, obj)).unwrap();
        drop(global);
        assert_eq!(env.global_ref_count(), 0);
    }

    #[test]
    fn weak_ref_upgrades_while_referent_alive() {
        let env = MockEnv::new();
        let obj = env.new_fake_object("java/lang/Object");
        let weak = vm::with_env_attached(&env, || WeakRef::new(&env, obj)).unwrap();
        let upgraded = vm::with_env_attached(&env, || weak.upgrade(&env)).unwrap();
        assert!(upgraded.is_some());
    }
}
