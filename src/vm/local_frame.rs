//! RAII guard around `PushLocalFrame`/`PopLocalFrame`.
//!
//! Field accessors and method invocations need a local frame sized to
//! worst-case retained references, popped on every exit path including
//! errors. Rather than repeat manual push/pop at every field accessor and
//! method invocation call site, this crate threads every such call through
//! one guard type whose `Drop` impl pops unconditionally.

use jni_sys::jobject;

use crate::error::Result;
use crate::vm::Env;

/// Holds a local reference frame open for its lifetime, popping it on drop.
///
/// The frame's result slot defaults to `null`; call [`LocalFrame::keep`] to
/// name the one local reference (if any) that should survive into the
/// enclosing frame.
pub struct LocalFrame<'env> {
    env: &'env dyn Env,
    keep: jobject,
    popped: bool,
}

impl<'env> LocalFrame<'env> {
    /// Pushes a new frame able to hold at least `capacity` local references.
    pub fn push(env: &'env dyn Env, capacity: i32) -> Result<Self> {
        env.push_local_frame(capacity)?;
        Ok(LocalFrame {
            env,
            keep: std::ptr::null_mut(),
            popped: false,
        })
    }

    /// Marks `obj` as the reference to re-home into the enclosing frame when
    /// this guard is popped (either explicitly via [`LocalFrame::pop`] or
    /// implicitly on drop).
    pub fn keep(&mut self, obj: jobject) {
        self.keep = obj;
    }

    /// Pops the frame early, returning whichever reference was last passed
    /// to [`LocalFrame::keep`].
    pub fn pop(mut self) -> Result<jobject> {
        let result = self.env.pop_local_frame(self.keep)?;
        self.popped = true;
        Ok(result)
    }
}

impl Drop for LocalFrame<'_> {
    fn drop(&mut self) {
        if !self.popped {
            if let Err(e) = self.env.pop_local_frame(self.keep) {
                log::error!("error popping local frame: {e:#?}");
            }
        }
    }
}
