//! Java's [modified UTF-8] string encoding.
//!
//! Java class/method/field names and signatures, and `java.lang.String`
//! contents at the JNI boundary, are encoded in a variant of UTF-8 that
//! differs from standard UTF-8 in how it represents the NUL code point and
//! code points above U+FFFF. [`JNIString`] is the owned, null-terminated
//! counterpart of a Rust [`String`] in that encoding; [`JNIStr`] is its
//! borrowed counterpart, the way [`CStr`] is to [`CString`].
//!
//! [modified UTF-8]: https://en.wikipedia.org/wiki/UTF-8#Modified_UTF-8

use std::{
    borrow::Cow,
    ffi::{CStr, CString},
    os::raw::c_char,
};

use cesu8::{from_java_cesu8, to_java_cesu8};

/// An owned, null-terminated string encoded in Java's modified UTF-8.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct JNIString {
    internal: CString,
}

/// A borrowed, null-terminated string encoded in Java's modified UTF-8.
#[derive(Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct JNIStr {
    internal: CStr,
}

impl<T: AsRef<str>> From<T> for JNIString {
    fn from(other: T) -> Self {
        let encoded = to_java_cesu8(other.as_ref()).into_owned();
        JNIString {
            // `to_java_cesu8` never produces interior NULs: Java's encoding
            // represents the NUL code point itself as the two-byte sequence
            // 0xC0 0x80.
            internal: unsafe { CString::from_vec_unchecked(encoded) },
        }
    }
}

impl From<JNIString> for String {
    fn from(other: JNIString) -> String {
        other.to_str().into_owned()
    }
}

impl std::ops::Deref for JNIString {
    type Target = JNIStr;

    fn deref(&self) -> &Self::Target {
        unsafe { JNIStr::from_ptr(self.internal.as_ptr()) }
    }
}

impl AsRef<JNIStr> for JNIString {
    fn as_ref(&self) -> &JNIStr {
        self
    }
}

impl JNIString {
    pub fn new(s: impl AsRef<str>) -> Self {
        s.into()
    }

    pub fn as_ptr(&self) -> *const c_char {
        self.internal.as_ptr()
    }
}

impl JNIStr {
    /// # Safety
    /// `ptr` must point to a null-terminated string encoded in modified
    /// UTF-8, valid for the returned lifetime.
    pub unsafe fn from_ptr<'a>(ptr: *const c_char) -> &'a JNIStr {
        unsafe { &*(CStr::from_ptr(ptr) as *const CStr as *const JNIStr) }
    }

    pub fn as_ptr(&self) -> *const c_char {
        self.internal.as_ptr()
    }

    pub fn to_bytes(&self) -> &[u8] {
        self.internal.to_bytes()
    }

    /// Converts to a standard Rust string, falling back to a lossy
    /// conversion if the modified-UTF-8 decoder rejects the bytes (which
    /// should not happen for strings that actually came from the JVM).
    pub fn to_str(&self) -> Cow<'_, str> {
        Cow::Owned(decode_modified_utf8(self.to_bytes()))
    }
}

impl std::fmt::Display for JNIStr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

/// Decodes a byte slice already known to be Java's modified UTF-8 (e.g. from
/// `GetStringUTFChars`), falling back to lossy standard UTF-8 decoding.
/// Shared by [`JNIStr::to_str`] and the `java.lang.String` auto-unboxing
/// path in `crate::adapter`.
pub fn decode_modified_utf8(bytes: &[u8]) -> String {
    match from_java_cesu8(bytes) {
        Ok(s) => s.into_owned(),
        Err(e) => {
            log::debug!("error decoding modified utf-8: {e:#?}");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Converts a fully-qualified dotted Java name (`java.lang.String`) into the
/// slash form JNI's `FindClass` expects (`java/lang/String`).
pub fn to_jni_class_name(dotted: &str) -> String {
    dotted.replace('.', "/")
}

/// Converts a JNI slash-form class name back to the dotted form used
/// throughout the rest of the public surface (`$className`, cache keys).
pub fn to_dotted_class_name(slashed: &str) -> String {
    slashed.replace('/', ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_ascii() {
        let s = JNIString::new("hello");
        assert_eq!(s.to_str(), "hello");
    }

    #[test]
    fn encodes_embedded_nul_as_two_bytes() {
        let s = JNIString::new("a\u{0}b");
        assert_eq!(s.to_bytes(), &[b'a', 0xC0, 0x80, b'b']);
    }

    #[test]
    fn class_name_conversions_round_trip() {
        assert_eq!(to_jni_class_name("java.lang.String"), "java/lang/String");
        assert_eq!(to_dotted_class_name("java/lang/String"), "java.lang.String");
    }
}
