//! The Heap Enumerator.
//!
//! `choose(name, {onMatch, onComplete})` is Dalvik-only: decode the class
//! object's pointer, build a byte pattern matching it, scan
//! the Dalvik heap region for occurrences, validate each candidate, and
//! synthesize a local reference for every match. As with [`crate::hook`], the
//! pattern search and signature scan are pure and unit-tested directly; only
//! the part that walks live process memory is feature-gated.

use std::os::raw::c_void;

use jni_sys::{jclass, jobject};

use crate::error::{Error, Result};
use crate::vm::{Api, DalvikSymbols, Env, Flavor};

/// What an `onMatch` callback returns to continue or end a scan: an
/// `onMatch` return of `"stop"` terminates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Continue,
    Stop,
}

/// The architecture the attached process runs, needed only to decide the ARM
/// Thumb bit and to pick an `addLocalReference` byte signature: on ARM the
/// resolved address is OR'd with 1 to select Thumb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    Arm,
    Arm64,
    X86,
    X86_64,
}

impl Arch {
    /// The architecture this binary itself was built for — the only
    /// sensible default, since the embedding host and attached process share
    /// one process image.
    pub fn current() -> Self {
        if cfg!(target_arch = "arm") {
            Arch::Arm
        } else if cfg!(target_arch = "aarch64") {
            Arch::Arm64
        } else if cfg!(target_arch = "x86") {
            Arch::X86
        } else {
            Arch::X86_64
        }
    }
}

const POINTER_WIDTH: usize = std::mem::size_of::<usize>();

/// The native-endian byte pattern a pointer value scans as.
fn pointer_pattern(ptr: usize) -> [u8; POINTER_WIDTH] {
    ptr.to_ne_bytes()
}

/// Finds every pointer-aligned offset in `region` where `pattern` occurs.
/// Alignment follows from every live pointer value itself being
/// pointer-aligned; scanning only aligned offsets is both correct and far
/// cheaper than a byte-by-byte search over a multi-megabyte heap.
fn scan_for_pattern(region: &[u8], pattern: &[u8]) -> Vec<usize> {
    if pattern.is_empty() || region.len() < pattern.len() {
        return Vec::new();
    }
    let mut matches = Vec::new();
    let mut offset = 0;
    while offset + pattern.len() <= region.len() {
        if &region[offset..offset + pattern.len()] == pattern {
            matches.push(offset);
        }
        offset += POINTER_WIDTH;
    }
    matches
}

/// ORs `addr` with 1 on ARM, to select Thumb mode for a function pointer
/// call; a no-op on every other architecture.
fn apply_thumb_bit(addr: usize, arch: Arch) -> usize {
    match arch {
        Arch::Arm => addr | 1,
        _ => addr,
    }
}

/// A byte signature with wildcard positions (`None`), used to locate
/// `addLocalReference` inside `libdvm.so` when the embedding host didn't
/// already resolve it, by an architecture-appropriate byte-signature scan.
fn find_byte_signature(haystack: &[u8], signature: &[Option<u8>]) -> Option<usize> {
    if signature.is_empty() || haystack.len() < signature.len() {
        return None;
    }
    (0..=haystack.len() - signature.len()).find(|&offset| {
        signature
            .iter()
            .enumerate()
            .all(|(i, expected)| expected.is_none_or(|b| haystack[offset + i] == b))
    })
}

/// Best-effort `addLocalReference` prologue signature, one per architecture
/// this crate's ARM/ARM64 hooking strategies target. These are a fallback
/// only consulted when `DalvikSymbols::add_local_reference` is absent; a
/// host that already knows the address should supply it directly.
fn add_local_reference_signature(arch: Arch) -> &'static [Option<u8>] {
    match arch {
        Arch::Arm => &[Some(0xF0), Some(0xB5), None, None],
        Arch::Arm64 => &[None, None, Some(0x00), Some(0xF9)],
        Arch::X86 | Arch::X86_64 => &[Some(0x55), None, None, None],
    }
}

/// `choose(name, {onMatch, onComplete})`. `on_match` receives each live
/// instance's local reference and says whether to keep scanning; the
/// caller (`crate::class::Factory::choose`) is responsible for invoking
/// `onComplete` once this returns — `onComplete` is always invoked,
/// regardless of how the scan ended.
pub fn choose(
    env: &dyn Env,
    api: &dyn Api,
    dalvik: &DalvikSymbols,
    target_class: jclass,
    on_match: impl FnMut(&dyn Env, jobject) -> MatchOutcome,
) -> Result<()> {
    if api.flavor() != Flavor::Dalvik {
        return Err(Error::HeapScanUnsupported);
    }
    scan(env, dalvik, target_class, Arch::current(), on_match)
}

#[cfg(feature = "android-hooks")]
fn scan(
    env: &dyn Env,
    dalvik: &DalvikSymbols,
    target_class: jclass,
    arch: Arch,
    mut on_match: impl FnMut(&dyn Env, jobject) -> MatchOutcome,
) -> Result<()> {
    type DecodeIndirectRef = unsafe extern "C" fn(jclass) -> *mut c_void;
    type HeapBound = unsafe extern "C" fn() -> *mut u8;
    type IsValidObject = unsafe extern "C" fn(*const c_void) -> u8;
    type AddLocalReference = unsafe extern "C" fn(*mut c_void) -> jobject;

    let decode: DecodeIndirectRef = unsafe { std::mem::transmute(dalvik.dvm_decode_indirect_ref) };
    let get_base: HeapBound = unsafe { std::mem::transmute(dalvik.dvm_heap_source_get_base) };
    let get_limit: HeapBound = unsafe { std::mem::transmute(dalvik.dvm_heap_source_get_limit) };
    let is_valid: IsValidObject = unsafe { std::mem::transmute(dalvik.dvm_is_valid_object) };

    let class_ptr = unsafe { decode(target_class) } as usize;
    let pattern = pointer_pattern(class_ptr);

    let base = unsafe { get_base() };
    let limit = unsafe { get_limit() };
    if (limit as usize) <= (base as usize) {
        return Ok(());
    }
    let region = unsafe { std::slice::from_raw_parts(base, limit as usize - base as usize) };

    let add_local_reference_addr = match dalvik.add_local_reference {
        Some(addr) => addr as usize,
        None => resolve_add_local_reference(arch)?,
    };
    let add_local: AddLocalReference =
        unsafe { std::mem::transmute(apply_thumb_bit(add_local_reference_addr, arch) as *const c_void) };

    for offset in scan_for_pattern(region, &pattern) {
        let candidate = unsafe { base.add(offset) } as *mut c_void;
        if unsafe { is_valid(candidate) } == 0 {
            continue;
        }
        let local = unsafe { add_local(candidate) };
        if matches!(on_match(env, local), MatchOutcome::Stop) {
            break;
        }
    }
    Ok(())
}

#[cfg(not(feature = "android-hooks"))]
fn scan(
    _env: &dyn Env,
    _dalvik: &DalvikSymbols,
    _target_class: jclass,
    _arch: Arch,
    _on_match: impl FnMut(&dyn Env, jobject) -> MatchOutcome,
) -> Result<()> {
    log::warn!("android-hooks feature disabled; heap scan skipped (0 matches)");
    Ok(())
}

/// Locates `libdvm.so`'s mapped range via `/proc/self/maps` and scans it for
/// `addLocalReference`'s prologue.
#[cfg(feature = "android-hooks")]
fn resolve_add_local_reference(arch: Arch) -> Result<usize> {
    let maps = std::fs::read_to_string("/proc/self/maps").map_err(|e| Error::Jni(format!("reading /proc/self/maps: {e}")))?;
    let (start, end) = maps
        .lines()
        .filter(|line| line.contains("libdvm.so"))
        .filter_map(|line| {
            let (range, _) = line.split_once(' ')?;
            let (start, end) = range.split_once('-')?;
            Some((usize::from_str_radix(start, 16).ok()?, usize::from_str_radix(end, 16).ok()?))
        })
        .reduce(|(min_a, max_a), (min_b, max_b)| (min_a.min(min_b), max_a.max(max_b)))
        .ok_or_else(|| Error::Jni("libdvm.so not found in /proc/self/maps".into()))?;

    let region = unsafe { std::slice::from_raw_parts(start as *const u8, end - start) };
    let offset = find_byte_signature(region, add_local_reference_signature(arch))
        .ok_or_else(|| Error::Jni("addLocalReference signature not found in libdvm.so".into()))?;
    Ok(start + offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_scan_finds_aligned_occurrences_only() {
        let needle: usize = 0xDEAD_BEEF;
        let pattern = pointer_pattern(needle);
        let mut region = vec![0u8; POINTER_WIDTH * 4];
        region[POINTER_WIDTH..POINTER_WIDTH * 2].copy_from_slice(&pattern);
        region[POINTER_WIDTH * 3..].copy_from_slice(&pattern);
        let hits = scan_for_pattern(&region, &pattern);
        assert_eq!(hits, vec![POINTER_WIDTH, POINTER_WIDTH * 3]);
    }

    #[test]
    fn pattern_scan_ignores_misaligned_matches() {
        let pattern = [0xAAu8, 0xBB, 0xCC, 0xDD];
        let mut region = vec![0u8; 16];
        // Place the pattern at an offset that is not a multiple of
        // `POINTER_WIDTH`; the aligned scan must not report it.
        region[1..5].copy_from_slice(&pattern);
        let hits = scan_for_pattern(&region, &pattern);
        assert!(hits.is_empty());
    }

    #[test]
    fn thumb_bit_only_applied_on_arm() {
        assert_eq!(apply_thumb_bit(0x1000, Arch::Arm), 0x1001);
        assert_eq!(apply_thumb_bit(0x1000, Arch::Arm64), 0x1000);
        assert_eq!(apply_thumb_bit(0x1000, Arch::X86_64), 0x1000);
    }

    #[test]
    fn byte_signature_scan_honors_wildcards() {
        let haystack = [0x10, 0xF0, 0xB5, 0x99, 0x42, 0x00];
        let signature = [Some(0xF0), Some(0xB5), None, None];
        assert_eq!(find_byte_signature(&haystack, &signature), Some(1));
    }

    #[test]
    fn byte_signature_scan_reports_none_when_absent() {
        let haystack = [0x00, 0x01, 0x02, 0x03];
        let signature = [Some(0xFF), Some(0xEE)];
        assert_eq!(find_byte_signature(&haystack, &signature), None);
    }

    #[test]
    fn non_dalvik_flavor_is_rejected_before_any_scan() {
        struct ArtApi;
        impl Api for ArtApi {
            fn flavor(&self) -> Flavor {
                Flavor::Art
            }
        }
        let dalvik = DalvikSymbols {
            dvm_decode_indirect_ref: std::ptr::null(),
            dvm_heap_source_get_base: std::ptr::null(),
            dvm_heap_source_get_limit: std::ptr::null(),
            dvm_is_valid_object: std::ptr::null(),
            dvm_use_jni_bridge: std::ptr::null(),
            add_local_reference: None,
        };
        let env = crate::vm::test_support::MockEnv::new();
        let err = choose(&env, &ArtApi, &dalvik, std::ptr::null_mut(), |_, _| MatchOutcome::Stop).unwrap_err();
        assert!(matches!(err, Error::HeapScanUnsupported));
    }
}
