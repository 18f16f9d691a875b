//! Crate-wide error type.
//!
//! Every fallible operation in this crate returns [`Result<T>`]. The variants
//! here correspond 1:1 with the error kinds enumerated for this bridge: class
//! and member lookup failures, overload resolution, type marshaling, hooking,
//! and heap scanning.

use std::fmt;

use crate::refs::GlobalRef;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `use(name)` could not resolve a class, either because `FindClass`
    /// failed or the installed class loader's `loadClass` threw.
    #[error("class not found: {0}")]
    ClassNotFound(String),

    /// A property name did not match any field or method on a class or its
    /// superclass chain.
    #[error("no such member `{member}` on `{class}`")]
    NoSuchMember { class: String, member: String },

    /// `.overload(...)` did not match any signature in the group, or a call
    /// site's argument count/types matched no overload in the arity bucket.
    #[error("no overload of `{member}` matches {detail}")]
    NoSuchOverload { member: String, detail: String },

    /// `.implementation` was accessed on a dispatcher with more than one
    /// overload.
    #[error("`{member}` has {count} overloads; call `.overload(...)` first")]
    AmbiguousOverload { member: String, count: usize },

    /// `cast(handle, wrapper)` failed `IsInstanceOf`.
    #[error("object is not an instance of `{0}`")]
    BadCast(String),

    /// An argument's runtime value was rejected by its `TypeAdapter`'s
    /// `is_compatible` predicate.
    #[error("argument {index} incompatible with `{expected}`")]
    IncompatibleArgument { index: usize, expected: String },

    /// A replacement implementation returned a value its declared return
    /// type rejects.
    #[error("replacement for `{member}` returned a value incompatible with `{expected}`")]
    IncompatibleReturn { member: String, expected: String },

    /// A JNI type name had no registered `TypeAdapter` and none could be
    /// synthesized (e.g. malformed array/object descriptor).
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// A Java exception was pending after a JNI call. Carries the captured
    /// exception so it can be displayed or re-thrown without requiring the
    /// caller to still have the environment that raised it.
    #[error("java exception: {0}")]
    JavaException(JavaException),

    /// The embedding host did not supply the `ArtMethod`/`Runtime`/
    /// `ClassLinker` offsets this ART flavor needs.
    #[error("missing VM offset spec for {0}")]
    VmSpecMissing(&'static str),

    /// `quickGenericJniTrampoline` could not be located in the runtime's
    /// `ClassLinker`.
    #[error("generic JNI trampoline not found")]
    TrampolineNotFound,

    /// `PushLocalFrame` failed.
    #[error("out of memory pushing a local reference frame of size {0}")]
    OutOfMemory(i32),

    /// `choose(...)` was called on a non-Dalvik flavor.
    #[error("heap scanning is only supported on Dalvik")]
    HeapScanUnsupported,

    /// A raw JNI call failed for a reason not covered above (e.g. a null
    /// handle where a non-null one was required).
    #[error("jni call failed: {0}")]
    Jni(String),
}

impl Error {
    pub(crate) fn incompatible_argument(index: usize, expected: impl Into<String>) -> Self {
        Error::IncompatibleArgument {
            index,
            expected: expected.into(),
        }
    }
}

/// A captured Java exception.
///
/// Capturing eagerly pulls the exception's class name and message into a
/// [`GlobalRef`] so the error remains legible (via [`Display`](fmt::Display))
/// even after the pending exception has been cleared, or on a thread that no
/// longer has the environment that raised it in scope.
pub struct JavaException {
    pub(crate) class_name: String,
    pub(crate) message: Option<String>,
    /// The throwable itself, pinned so the caller can re-throw it verbatim.
    pub(crate) throwable: GlobalRef,
}

impl JavaException {
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn throwable(&self) -> &GlobalRef {
        &self.throwable
    }
}

impl fmt::Display for JavaException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}: {}", self.class_name, msg),
            None => write!(f, "{}", self.class_name),
        }
    }
}

impl fmt::Debug for JavaException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JavaException")
            .field("class_name", &self.class_name)
            .field("message", &self.message)
            .finish()
    }
}
