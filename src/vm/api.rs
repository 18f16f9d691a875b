//! The `Api` external collaborator.
//!
//! `Api` bundles the runtime-identification and symbol-resolution work this
//! crate leaves to the embedding host: version/ABI probing and offset-table
//! lookup. What this crate needs back is a `flavor` tag plus the raw
//! function pointers and field offsets its hooking and heap-scanning
//! strategies are written against.

use std::os::raw::c_void;

/// Which managed runtime the attached process is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Dalvik,
    Art,
}

/// A byte offset into a native runtime struct, as resolved by the embedding
/// host's version/ABI probing. Opaque to this crate beyond its numeric
/// value: it is added to a base pointer and dereferenced at the declared
/// width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetSpec(pub usize);

/// `ArtMethod` field offsets, used by the ART hooking strategy.
#[derive(Debug, Clone, Copy)]
pub struct ArtMethodOffsets {
    pub access_flags: OffsetSpec,
    pub jni_code: OffsetSpec,
    pub quick_code: OffsetSpec,
    pub interpreter_code: OffsetSpec,
}

/// `Runtime`/`ClassLinker` offsets needed to locate
/// `quickGenericJniTrampoline` via the live runtime instance rather than a
/// statically linked copy: using the runtime's own copy is critical so
/// stack walks recognize the JNI frame.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOffsets {
    pub class_linker: OffsetSpec,
    pub quick_generic_jni_trampoline: OffsetSpec,
}

/// Dalvik symbols resolved by the embedding host.
#[derive(Debug, Clone, Copy)]
pub struct DalvikSymbols {
    pub dvm_decode_indirect_ref: *const c_void,
    pub dvm_heap_source_get_base: *const c_void,
    pub dvm_heap_source_get_limit: *const c_void,
    pub dvm_is_valid_object: *const c_void,
    pub dvm_use_jni_bridge: *const c_void,
    /// Lazily resolved by [`crate::heap`] if absent.
    pub add_local_reference: Option<*const c_void>,
}

/// ART symbols resolved by the embedding host.
#[derive(Debug, Clone, Copy)]
pub struct ArtSymbols {
    pub thread_current_from_gdb: *const c_void,
    pub mirror_object_clone: *const c_void,
    pub interpreter_to_compiled_code_bridge: *const c_void,
    pub runtime_instance_ptr: *const c_void,
}

// Raw function pointers are not automatically Send/Sync; the embedding host
// resolved them from a process-wide, immutable symbol table, so sharing them
// across the scripting thread is sound.
unsafe impl Send for DalvikSymbols {}
unsafe impl Sync for DalvikSymbols {}
unsafe impl Send for ArtSymbols {}
unsafe impl Sync for ArtSymbols {}

/// The VM entry-point / offset resolver external collaborator.
pub trait Api: Send + Sync {
    fn flavor(&self) -> Flavor;

    fn dalvik_symbols(&self) -> Option<&DalvikSymbols> {
        None
    }

    fn art_symbols(&self) -> Option<&ArtSymbols> {
        None
    }

    fn art_method_offsets(&self) -> Option<&ArtMethodOffsets> {
        None
    }

    fn runtime_offsets(&self) -> Option<&RuntimeOffsets> {
        None
    }
}
