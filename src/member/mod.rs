//! The Member Resolver and Invocation Dispatcher.
//!
//! [`resolve::build`] turns one [`crate::vm::reflect::ClassReflection`] into
//! a [`Members`] table: a name→[`Property`] map where a name with both a
//! field and a method merges into one [`Property::Both`] (if a member
//! appears as both field and method of the same name, both descriptors are
//! merged under one property). [`crate::class::ClassWrapper`] materializes
//! this lazily on first property access and never mutates it afterward,
//! except for hook install/uninstall on a [`dispatch::MethodDescriptor`].

pub mod dispatch;
pub mod field;
pub mod resolve;

use std::collections::HashMap;

pub use dispatch::{Dispatcher, MethodDescriptor, MethodKind, Replacement};
pub use field::{FieldAccessor, FieldKind};

/// A class's resolved members: one [`Property`] per name, plus the two
/// constructor dispatcher variants `$new`/`$init` need.
pub struct Members {
    properties: HashMap<String, Property>,
    /// Overload group that produces a new instance (`$new`).
    pub(crate) constructors_new: Dispatcher,
    /// Overload group that runs `<init>` on an already-allocated instance
    /// (`$init`).
    pub(crate) constructors_init: Dispatcher,
}

/// A property merging a field and/or a method of the same name.
pub enum Property {
    Field(FieldAccessor),
    Method(Dispatcher),
    Both(FieldAccessor, Dispatcher),
}

impl Property {
    pub fn as_field(&self) -> Option<&FieldAccessor> {
        match self {
            Property::Field(f) | Property::Both(f, _) => Some(f),
            Property::Method(_) => None,
        }
    }

    pub fn as_method(&self) -> Option<&Dispatcher> {
        match self {
            Property::Method(m) | Property::Both(_, m) => Some(m),
            Property::Field(_) => None,
        }
    }
}

impl Members {
    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn new_dispatcher(&self) -> &Dispatcher {
        &self.constructors_new
    }

    pub fn init_dispatcher(&self) -> &Dispatcher {
        &self.constructors_init
    }
}
