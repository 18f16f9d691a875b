//! The external-collaborator boundary.
//!
//! `Env` and `Api` are the two collaborators supplied by an embedding host
//! rather than this crate. They are expressed here as
//! traits so the rest of the crate can be written once against an abstract
//! runtime and exercised in tests against an in-memory fake rather than a
//! live Dalvik/ART process.

mod api;
mod env;
mod local_frame;
pub mod reflect;
pub mod test_support;
pub mod trampoline;
pub mod value;

pub use api::{Api, ArtMethodOffsets, ArtSymbols, DalvikSymbols, Flavor, OffsetSpec, RuntimeOffsets};
pub use env::{Dispatch, Env};
pub use local_frame::LocalFrame;
pub use trampoline::{NativeHandler, NativeTrampoline, Trampolines};

use std::cell::Cell;

thread_local! {
    static CURRENT_ENV: Cell<Option<*const dyn Env>> = const { Cell::new(None) };
}

/// Runs `f` with `env` installed as the thread's active `Env`, so that code
/// with no `Env` in hand (chiefly [`GlobalRef`](crate::refs::GlobalRef)'s
/// `Drop` impl) can still reach the JNI function table.
///
/// Rather than a global singleton holding the crate's process-wide state,
/// the active `Env` is scoped to whichever call chain is currently attached,
/// matching the single-threaded-cooperative scheduling model where every
/// host-visible call already runs inside a `vm.perform(...)` callback on the
/// scripting thread.
pub fn with_env_attached<R>(env: &dyn Env, f: impl FnOnce() -> R) -> R {
    // Erase the borrow's lifetime: `previous` restores the exact prior value
    // before this function returns, so the thread-local never outlives the
    // borrow it's actually pointed at.
    let erased: *const dyn Env = env;
    let erased: *const (dyn Env + 'static) = unsafe { std::mem::transmute(erased) };
    let previous = CURRENT_ENV.with(|cell| cell.replace(Some(erased)));
    let result = f();
    CURRENT_ENV.with(|cell| cell.set(previous));
    result
}

/// Accesses the thread's currently-attached `Env`, if any.
///
/// Returns `None` on a thread that is not inside a [`with_env_attached`]
/// scope (for instance a Rust-owned background thread the host never
/// attached).
pub fn with_current_env<R>(f: impl FnOnce(&dyn Env) -> R) -> Option<R> {
    CURRENT_ENV.with(|cell| cell.get().map(|ptr| f(unsafe { &*ptr })))
}
