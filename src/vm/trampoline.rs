//! The native-callback / native-function FFI boundary.
//!
//! Installing a replacement method body needs a genuine JNI-callable native
//! function pointer: something the live `Method`/`ArtMethod` record's code
//! pointer can point straight at, matching the calling convention the VM
//! itself expects for that method's signature. Synthesizing *that* —
//! turning an arbitrary host closure into machine code with the right
//! native ABI — is FFI machinery that lives outside this crate, alongside
//! `Env`/`Api`. [`Trampolines`] is the trait boundary for it: this crate
//! hands the embedder a fully-marshaled
//! [`NativeHandler`] closure (wire-level `JValue`s in and out, all argument
//! adapting already done) and gets back an opaque callable pointer to write
//! into the method record; how that pointer comes to call the closure when
//! the VM invokes it is the embedder's problem, not this crate's.

use std::os::raw::c_void;
use std::sync::Arc;

use jni_sys::jobject;

use crate::error::Result;
use crate::vm::value::JValue;
use crate::vm::Env;

/// A fully wire-level replacement body: receives the environment, the
/// receiver (`None` for a static method), and the already-marshaled
/// arguments, and returns the already-marshaled result.
///
/// [`crate::hook`] is the only caller that constructs one of these; it closes
/// over a host-level replacement closure and the member's `TypeAdapter`s so
/// this signature never has to change shape with the member it replaces.
pub type NativeHandler = dyn Fn(&dyn Env, Option<jobject>, &[JValue]) -> Result<JValue> + Send + Sync;

/// An opaque native function pointer installed as a method's code pointer.
#[derive(Debug, Clone, Copy)]
pub struct NativeTrampoline(pub *const c_void);

unsafe impl Send for NativeTrampoline {}
unsafe impl Sync for NativeTrampoline {}

/// The external collaborator that turns a [`NativeHandler`] into a
/// [`NativeTrampoline`].
pub trait Trampolines: Send + Sync {
    /// Builds a trampoline matching `shorty` (the JNI "short descriptor" of
    /// the method being replaced, e.g. `"ILI"` for `int m(int, Object)`),
    /// backed by `handler`.
    fn build(&self, shorty: &str, handler: Arc<NativeHandler>) -> Result<NativeTrampoline>;

    /// Releases a trampoline built by [`Trampolines::build`]. Called once
    /// the method is unhooked and the trampoline is no longer reachable
    /// from live code.
    fn release(&self, trampoline: NativeTrampoline);
}
