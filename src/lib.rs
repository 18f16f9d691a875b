//! An in-process reflective bridge into a running Dalvik or ART Java
//! runtime.
//!
//! Given a process already attached to a Dalvik or ART VM (attaching itself
//! is handled elsewhere), this crate exposes that process's Java class
//! graph to an embedding scripting host:
//!
//! - [`adapter`] — marshals values across the JNI boundary ([`adapter::TypeAdapter`]).
//! - [`class`] — resolves, caches, and constructs classes ([`class::Factory`]).
//! - [`member`] — reflects and dispatches methods/fields/constructors.
//! - [`hook`] — replaces a method's implementation at runtime.
//! - [`heap`] — enumerates live instances of a class (Dalvik only).
//!
//! [`vm::Env`] and [`vm::Api`] are this crate's two external collaborators:
//! the live JNI function table and the runtime/ABI symbol resolver,
//! respectively. Production embedders implement both over the host process
//! they've attached to; [`vm::test_support::MockEnv`] implements both over an
//! in-memory fake so the rest of this crate can be built and exercised
//! without a live Dalvik or ART process.

pub mod adapter;
pub mod class;
pub mod error;
pub mod heap;
pub mod hook;
pub mod member;
pub mod refs;
pub mod signature;
pub mod strings;
pub mod value;
pub mod vm;

pub use class::{ClassInstance, ClassWrapper, DexFile, Factory, FactoryBuilder};
pub use error::{Error, JavaException, Result};
pub use heap::{Arch, MatchOutcome};
pub use member::{Dispatcher, FieldAccessor, FieldKind, MethodDescriptor, MethodKind, Replacement};
pub use signature::{MethodSignature, PrimitiveName, TypeName};
pub use value::Value;
pub use vm::{Api, Dispatch, Env, Flavor};
