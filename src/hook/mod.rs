//! The Hooking Engine.
//!
//! Two layers are kept apart, same split as [`dalvik`]/[`art`]:
//!
//! - Replacing a method's *Rust-level* dispatch — what
//!   [`crate::member::dispatch::MethodDescriptor::invoke`] consults — needs
//!   no live process at all; `set_implementation` alone makes every call this
//!   crate itself makes through a [`crate::member::Dispatcher`] observe the
//!   replacement, with correct re-entry into the original implementation on
//!   self-invocation.
//! - Making calls that originate from *arbitrary, unmodified Java code*
//!   reach that same replacement additionally requires patching the live
//!   method record so its native code pointer lands on a trampoline. That
//!   half is real pointer-width memory writes into a running Dalvik/ART
//!   process and is only compiled behind the `android-hooks` feature;
//!   without it, [`install`] still wires up Rust-level dispatch and logs
//!   that the live half was skipped.

pub mod art;
pub mod dalvik;

use std::collections::HashMap;
use std::sync::Arc;

use jni_sys::{jmethodID, jobject};

use crate::adapter::ObjectHost;
use crate::class::ClassWrapper;
use crate::error::Result;
use crate::member::dispatch::{MethodDescriptor, Replacement};
use crate::signature::TypeName;
use crate::value::Value;
use crate::vm::value::{JValue, Primitive};
use crate::vm::{Api, Env, Flavor, NativeHandler, NativeTrampoline, Trampolines};

fn key(method_id: jmethodID) -> usize {
    method_id as usize
}

/// The restoration data for one hooked method, one variant per flavor.
enum HookRecord {
    Dalvik {
        original: dalvik::MethodSnapshot,
        trampoline: NativeTrampoline,
    },
    Art {
        original: art::ArtMethodSnapshot,
        trampoline: NativeTrampoline,
    },
}

/// Per-class hook bookkeeping, threaded through [`ClassWrapper::hook_state`].
#[derive(Default)]
pub struct WrapperHookState {
    installed: HashMap<usize, HookRecord>,
}

impl WrapperHookState {
    pub fn is_installed(&self, method_id: jmethodID) -> bool {
        self.installed.contains_key(&key(method_id))
    }

    /// Number of methods this wrapper currently has a live record for; used
    /// by `Factory::dispose` to drain restoration by cardinality rather than
    /// a stale length snapshot.
    pub fn installed_count(&self) -> usize {
        self.installed.len()
    }

    pub fn installed_method_ids(&self) -> Vec<jmethodID> {
        self.installed.keys().map(|&k| k as jmethodID).collect()
    }
}

/// The JNI "shorty" character for a wire type, used to build a native
/// trampoline with the right JNI calling convention.
fn shorty_char(prim: Primitive) -> char {
    match prim {
        Primitive::Boolean => 'Z',
        Primitive::Byte => 'B',
        Primitive::Char => 'C',
        Primitive::Short => 'S',
        Primitive::Int => 'I',
        Primitive::Long => 'J',
        Primitive::Float => 'F',
        Primitive::Double => 'D',
        Primitive::Void => 'V',
        Primitive::Object => 'L',
    }
}

/// Builds the JNI short descriptor (return type first, then each argument)
/// `Trampolines::build` expects.
pub fn shorty_for(descriptor: &MethodDescriptor) -> String {
    let mut s = String::with_capacity(descriptor.arity() + 1);
    s.push(shorty_char(descriptor.return_type().wire_type()));
    for arg in descriptor.argument_types() {
        s.push(shorty_char(arg.wire_type()));
    }
    s
}

/// Wraps `descriptor` (and the class cache it belongs to) into a wire-level
/// [`NativeHandler`] that re-enters `descriptor.invoke`, so a call reaching
/// the trampoline from live Java code observes exactly the same replacement
/// (and the same re-entry bookkeeping) as a call made through this crate's
/// own [`crate::member::Dispatcher::call`].
fn build_handler(descriptor: Arc<MethodDescriptor>, host: Arc<dyn ObjectHost>, declaring_class_name: String) -> Arc<NativeHandler> {
    Arc::new(move |env: &dyn Env, recv: Option<jobject>, raw_args: &[JValue]| -> Result<JValue> {
        let receiver = match recv {
            Some(obj) if !obj.is_null() => Some(host.wrap(env, obj, &TypeName::object(declaring_class_name.clone()))?),
            _ => None,
        };
        let args: Vec<Value> = descriptor
            .argument_types()
            .iter()
            .zip(raw_args)
            .map(|(adapter, raw)| adapter.from_jni(env, host.as_ref(), *raw, receiver.as_ref(), false))
            .collect::<Result<_>>()?;
        let result = descriptor.invoke(env, host.as_ref(), receiver.as_ref(), &args)?;
        descriptor.return_type().to_jni(env, host.as_ref(), &result)
    })
}

/// Installs a live hook for `descriptor` on `wrapper`.
///
/// Always sets the Rust-level `replacement` so this crate's own dispatch
/// observes it; patches the live method record too when `android-hooks` is
/// enabled, recording whatever is needed to restore it later.
pub fn install(
    wrapper: &ClassWrapper,
    descriptor: &Arc<MethodDescriptor>,
    replacement: Replacement,
    api: &dyn Api,
    trampolines: &dyn Trampolines,
    host: Arc<dyn ObjectHost>,
) -> Result<()> {
    descriptor.set_implementation(Some(replacement))?;

    let mut state = wrapper.hook_state.lock().unwrap();
    if state.is_installed(descriptor.method_id()) {
        return Ok(());
    }

    let handler = build_handler(descriptor.clone(), host, wrapper.name().to_string());
    let shorty = shorty_for(descriptor);
    let trampoline = trampolines.build(&shorty, handler)?;

    let record = match api.flavor() {
        Flavor::Dalvik => install_dalvik(descriptor, api, trampoline)?,
        Flavor::Art => install_art(descriptor, api, trampoline)?,
    };
    state.installed.insert(key(descriptor.method_id()), record);
    log::debug!("installed hook for `{}` on `{}`", descriptor.name(), wrapper.name());
    Ok(())
}

#[cfg(feature = "android-hooks")]
fn install_dalvik(descriptor: &Arc<MethodDescriptor>, api: &dyn Api, trampoline: NativeTrampoline) -> Result<HookRecord> {
    let dalvik = api
        .dalvik_symbols()
        .ok_or(crate::error::Error::VmSpecMissing("DalvikSymbols"))?;
    let method_ptr = descriptor.method_id() as *mut u8;
    let mut bytes = [0u8; dalvik::METHOD_RECORD_SIZE];
    unsafe {
        std::ptr::copy_nonoverlapping(method_ptr, bytes.as_mut_ptr(), dalvik::METHOD_RECORD_SIZE);
    }
    let original = dalvik::MethodSnapshot(bytes);
    let is_instance = matches!(descriptor.kind(), crate::member::MethodKind::Instance);
    let arg_words: u16 = descriptor
        .argument_types()
        .iter()
        .map(|a| if a.wire_type() == Primitive::Long || a.wire_type() == Primitive::Double { 2u16 } else { 1u16 })
        .sum();
    let patched = dalvik::patch_for_hook(bytes, arg_words, is_instance);
    unsafe {
        dalvik::apply_live(method_ptr, patched, trampoline.0, dalvik)?;
    }
    Ok(HookRecord::Dalvik { original, trampoline })
}

#[cfg(not(feature = "android-hooks"))]
fn install_dalvik(_descriptor: &Arc<MethodDescriptor>, api: &dyn Api, trampoline: NativeTrampoline) -> Result<HookRecord> {
    let _ = dalvik::apply_live_unsupported(api);
    log::warn!("android-hooks feature disabled; only Rust-level dispatch is hooked");
    Ok(HookRecord::Dalvik {
        original: dalvik::MethodSnapshot([0u8; dalvik::METHOD_RECORD_SIZE]),
        trampoline,
    })
}

#[cfg(feature = "android-hooks")]
fn install_art(descriptor: &Arc<MethodDescriptor>, api: &dyn Api, trampoline: NativeTrampoline) -> Result<HookRecord> {
    let offsets = api.art_method_offsets().ok_or(crate::error::Error::VmSpecMissing("ArtMethodOffsets"))?;
    let runtime_offsets = api.runtime_offsets().ok_or(crate::error::Error::VmSpecMissing("RuntimeOffsets"))?;
    let art_symbols = api.art_symbols().ok_or(crate::error::Error::VmSpecMissing("ArtSymbols"))?;
    let method_ptr = descriptor.method_id() as *mut u8;
    let record_len = offsets.interpreter_code.0 + std::mem::size_of::<usize>();
    let mut bytes = vec![0u8; record_len];
    unsafe {
        std::ptr::copy_nonoverlapping(method_ptr, bytes.as_mut_ptr(), record_len);
    }
    let original = art::snapshot(&bytes, offsets);
    let generic_jni_trampoline =
        unsafe { art::locate_generic_jni_trampoline(art_symbols.runtime_instance_ptr as *const u8, runtime_offsets)? };
    let patched = art::patch_for_hook(
        original,
        trampoline.0 as usize,
        art_symbols.interpreter_to_compiled_code_bridge as usize,
        generic_jni_trampoline,
    );
    unsafe {
        art::apply_live(method_ptr, patched, offsets);
    }
    Ok(HookRecord::Art { original, trampoline })
}

#[cfg(not(feature = "android-hooks"))]
fn install_art(_descriptor: &Arc<MethodDescriptor>, api: &dyn Api, trampoline: NativeTrampoline) -> Result<HookRecord> {
    let _ = art::apply_live_unsupported(api);
    log::warn!("android-hooks feature disabled; only Rust-level dispatch is hooked");
    Ok(HookRecord::Art {
        original: art::ArtMethodSnapshot {
            access_flags: 0,
            jni_code: 0,
            quick_code: 0,
            interpreter_code: 0,
        },
        trampoline,
    })
}

/// Restores `descriptor`'s method record (if a live patch was applied) and
/// clears its Rust-level replacement.
pub fn uninstall(wrapper: &ClassWrapper, descriptor: &MethodDescriptor, api: &dyn Api, trampolines: &dyn Trampolines) -> Result<()> {
    descriptor.set_implementation(None)?;

    let mut state = wrapper.hook_state.lock().unwrap();
    let Some(record) = state.installed.remove(&key(descriptor.method_id())) else {
        return Ok(());
    };

    match record {
        HookRecord::Dalvik { original, trampoline } => {
            restore_dalvik(descriptor, api, original)?;
            trampolines.release(trampoline);
        }
        HookRecord::Art { original, trampoline } => {
            restore_art(descriptor, api, original)?;
            trampolines.release(trampoline);
        }
    }
    log::debug!("uninstalled hook for `{}` on `{}`", descriptor.name(), wrapper.name());
    Ok(())
}

#[cfg(feature = "android-hooks")]
fn restore_dalvik(descriptor: &MethodDescriptor, _api: &dyn Api, original: dalvik::MethodSnapshot) -> Result<()> {
    let method_ptr = descriptor.method_id() as *mut u8;
    unsafe {
        dalvik::restore_live(method_ptr, original);
    }
    Ok(())
}

#[cfg(not(feature = "android-hooks"))]
fn restore_dalvik(_descriptor: &MethodDescriptor, _api: &dyn Api, _original: dalvik::MethodSnapshot) -> Result<()> {
    Ok(())
}

#[cfg(feature = "android-hooks")]
fn restore_art(descriptor: &MethodDescriptor, api: &dyn Api, original: art::ArtMethodSnapshot) -> Result<()> {
    let offsets = api.art_method_offsets().ok_or(crate::error::Error::VmSpecMissing("ArtMethodOffsets"))?;
    let method_ptr = descriptor.method_id() as *mut u8;
    unsafe {
        art::restore_live(method_ptr, original, offsets);
    }
    Ok(())
}

#[cfg(not(feature = "android-hooks"))]
fn restore_art(_descriptor: &MethodDescriptor, _api: &dyn Api, _original: art::ArtMethodSnapshot) -> Result<()> {
    Ok(())
}

/// Restores every method this wrapper has hooked, by cardinality of the
/// installed-method map, used by `Factory::dispose`.
pub fn uninstall_all(wrapper: &Arc<ClassWrapper>, api: &dyn Api, trampolines: &dyn Trampolines) -> Result<()> {
    let ids = wrapper.hook_state.lock().unwrap().installed_method_ids();
    for method_id in ids {
        if let Some(members) = wrapper.members() {
            if let Some(descriptor) = find_descriptor(members, method_id) {
                uninstall(wrapper, &descriptor, api, trampolines)?;
            }
        }
    }
    Ok(())
}

fn find_descriptor(members: &crate::member::Members, method_id: jmethodID) -> Option<Arc<MethodDescriptor>> {
    for name in members.names() {
        if let Some(dispatcher) = members.get(name).and_then(|p| p.as_method()) {
            if let Some(m) = dispatcher.overloads().iter().find(|m| m.method_id() == method_id) {
                return Some(m.clone());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Registry;
    use crate::member::MethodKind;

    fn descriptor(registry: &Registry) -> MethodDescriptor {
        MethodDescriptor::new(
            "m".into(),
            MethodKind::Instance,
            1usize as *mut std::ffi::c_void as jmethodID,
            std::ptr::null_mut(),
            registry.lookup_source_name("int").unwrap(),
            vec![registry.lookup_source_name("int").unwrap(), registry.lookup_source_name("long").unwrap()],
            false,
        )
    }

    #[test]
    fn shorty_orders_return_then_arguments() {
        let registry = Registry::new();
        let d = descriptor(&registry);
        assert_eq!(shorty_for(&d), "IIJ");
    }

    #[test]
    fn hook_state_starts_with_nothing_installed() {
        let registry = Registry::new();
        let d = descriptor(&registry);
        let state = WrapperHookState::default();
        assert!(!state.is_installed(d.method_id()));
        assert_eq!(state.installed_count(), 0);
    }
}
