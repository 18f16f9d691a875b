//! The Invocation Dispatcher and the `Method` half of the Member Resolver's
//! output.
//!
//! A [`Dispatcher`] is what a property access for a method name returns: a
//! callable, overload-aware object. It owns one [`MethodDescriptor`] per
//! overload, bucketed by arity. Each `MethodDescriptor` in turn owns the
//! hot invocation path (marshal, call, check exception, marshal back) and
//! the replacement/re-entry bookkeeping the hooking engine needs, so
//! `crate::hook` only has to reach in and flip `replacement`/`pending`
//! rather than re-implement call dispatch itself.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use jni_sys::{jclass, jmethodID, jobject};

use crate::adapter::{ObjectHost, TypeAdapter};
use crate::error::{Error, Result};
use crate::member::field::capture_exception;
use crate::value::Value;
use crate::vm::env::Dispatch;
use crate::vm::value::JValue;
use crate::vm::{Env, LocalFrame};

/// A host-level replacement body: receives the environment, the receiver
/// (`None` for a static method or constructor), and the already-marshaled
/// arguments, and returns the already-marshaled result.
///
/// To call the original implementation from inside a replacement — `M.call
/// (this)` in the scripting surface's terms — a replacement closure
/// re-invokes the very [`MethodDescriptor`] it replaced, passed as the last
/// argument; `MethodDescriptor::invoke`'s thread-local pending-calls check
/// is what routes that recursive call to the original body instead of
/// looping back into the replacement.
pub type Replacement =
    Arc<dyn Fn(&dyn Env, &dyn ObjectHost, Option<&Value>, &[Value], &MethodDescriptor) -> Result<Value> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// `$new`: `NewObject`, producing a fresh instance.
    Constructor,
    /// `$init`: runs `<init>` on an already-allocated instance via
    /// `CallNonvirtualVoidMethod`.
    Init,
    Static,
    Instance,
    /// The synthetic `valueOf` overload: a method whose name is `valueOf`
    /// and which has no zero-argument instance overload gains a synthetic
    /// instance overload returning the receiver itself with declared return
    /// type `int`. Never calls through JNI; [`MethodDescriptor::invoke`]
    /// special-cases it to hand back the receiver directly.
    ValueOfSelf,
}

/// One overload's full descriptor.
pub struct MethodDescriptor {
    name: String,
    kind: MethodKind,
    method_id: jmethodID,
    /// The class that declared this overload; used for `CallStaticXMethod`,
    /// `NewObject`, and as the `direct_class` for `CallNonvirtualXMethod`
    /// re-entry dispatch.
    declaring_class: jclass,
    return_adapter: Arc<TypeAdapter>,
    arg_adapters: Vec<Arc<TypeAdapter>>,
    is_varargs: bool,
    replacement: Mutex<Option<Replacement>>,
    /// Native thread ids currently inside this method's replacement body. A
    /// `std::thread::ThreadId` stands in for the native thread id: this
    /// crate's single-threaded cooperative scheduling model means every
    /// host-visible call already runs on one Rust thread per attached
    /// native thread.
    pending: Mutex<HashSet<ThreadId>>,
}

// `jmethodID`/`jclass` are opaque handles, not thread-affine; every operation
// that dereferences them goes through `&dyn Env`, itself required to be
// `Send + Sync` (mirrors `refs::GlobalRef`'s rationale for the same impls).
unsafe impl Send for MethodDescriptor {}
unsafe impl Sync for MethodDescriptor {}

impl MethodDescriptor {
    pub(crate) fn new(
        name: String,
        kind: MethodKind,
        method_id: jmethodID,
        declaring_class: jclass,
        return_adapter: Arc<TypeAdapter>,
        arg_adapters: Vec<Arc<TypeAdapter>>,
        is_varargs: bool,
    ) -> Self {
        MethodDescriptor {
            name,
            kind,
            method_id,
            declaring_class,
            return_adapter,
            arg_adapters,
            is_varargs,
            replacement: Mutex::new(None),
            pending: Mutex::new(HashSet::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    pub fn arity(&self) -> usize {
        self.arg_adapters.len()
    }

    pub fn argument_types(&self) -> &[Arc<TypeAdapter>] {
        &self.arg_adapters
    }

    pub fn return_type(&self) -> &Arc<TypeAdapter> {
        &self.return_adapter
    }

    pub fn is_varargs(&self) -> bool {
        self.is_varargs
    }

    pub fn method_id(&self) -> jmethodID {
        self.method_id
    }

    pub fn declaring_class(&self) -> jclass {
        self.declaring_class
    }

    /// `.canInvokeWith` / overload selection's positional compatibility
    /// check.
    pub fn can_invoke_with(&self, args: &[Value]) -> bool {
        if args.len() != self.arg_adapters.len() {
            return false;
        }
        self.arg_adapters.iter().zip(args).all(|(adapter, value)| adapter.is_compatible(value))
    }

    /// Whether a replacement implementation is currently installed.
    pub fn has_implementation(&self) -> bool {
        self.replacement.lock().unwrap().is_some()
    }

    pub fn implementation(&self) -> Option<Replacement> {
        self.replacement.lock().unwrap().clone()
    }

    /// Sets (or, with `None`, clears) the host-level replacement body.
    ///
    /// This only updates the in-process dispatch table consulted by
    /// [`MethodDescriptor::invoke`]; wiring a replacement into the live
    /// Dalvik/ART method record so calls from arbitrary Java code reach it
    /// too is [`crate::hook::install`]'s job. `$new` cannot be
    /// re-implemented: callers resolve a constructor's `<init>` dispatcher
    /// instead.
    pub fn set_implementation(&self, replacement: Option<Replacement>) -> Result<()> {
        if self.kind == MethodKind::Constructor {
            return Err(Error::Jni("constructors cannot be re-implemented; replace the underlying `<init>`".into()));
        }
        if self.kind == MethodKind::ValueOfSelf {
            return Err(Error::Jni("the synthetic `valueOf` overload has no underlying method to replace".into()));
        }
        *self.replacement.lock().unwrap() = replacement;
        Ok(())
    }

    /// Invokes this overload.
    pub fn invoke(&self, env: &dyn Env, host: &dyn ObjectHost, receiver: Option<&Value>, args: &[Value]) -> Result<Value> {
        if self.kind == MethodKind::ValueOfSelf {
            return receiver.cloned().ok_or_else(|| Error::Jni(format!("`{}` requires an instance receiver", self.name)));
        }
        let tid = std::thread::current().id();
        let already_pending = self.pending.lock().unwrap().contains(&tid);

        if already_pending {
            return self.invoke_direct(env, host, receiver, args, true);
        }

        let replacement = self.replacement.lock().unwrap().clone();
        let Some(replacement) = replacement else {
            return self.invoke_direct(env, host, receiver, args, false);
        };

        self.pending.lock().unwrap().insert(tid);
        let result = replacement(env, host, receiver, args, self);
        self.pending.lock().unwrap().remove(&tid);

        let value = result?;
        if !value.is_null() && !self.return_adapter.is_compatible(&value) {
            return Err(Error::IncompatibleReturn {
                member: self.name.clone(),
                expected: self.return_adapter.type_name().to_source_name(),
            });
        }
        Ok(value)
    }

    /// The actual JNI round trip: push a frame, marshal arguments, call
    /// through `Env`, check for a pending exception, marshal the return,
    /// pop the frame on every exit path.
    fn invoke_direct(&self, env: &dyn Env, host: &dyn ObjectHost, receiver: Option<&Value>, args: &[Value], reentrant: bool) -> Result<Value> {
        if args.len() != self.arg_adapters.len() {
            return Err(Error::NoSuchOverload {
                member: self.name.clone(),
                detail: format!("{} arguments", args.len()),
            });
        }

        let mut budget = 2i32;
        for (i, (adapter, value)) in self.arg_adapters.iter().zip(args).enumerate() {
            if !adapter.is_compatible(value) {
                return Err(Error::incompatible_argument(i, adapter.type_name().to_source_name()));
            }
            budget += adapter.local_budget();
        }
        budget += self.return_adapter.local_budget();

        let mut frame = LocalFrame::push(env, budget)?;

        let raw_args: Vec<JValue> = match self
            .arg_adapters
            .iter()
            .zip(args)
            .map(|(adapter, value)| adapter.to_jni(env, host, value))
            .collect::<Result<Vec<_>>>()
        {
            Ok(v) => v,
            Err(e) => {
                let _ = frame.pop();
                return Err(e);
            }
        };

        let call_result = self.dispatch(env, receiver, &raw_args, reentrant);

        let raw = match call_result {
            Ok(raw) => raw,
            Err(e) => {
                let _ = frame.pop();
                return Err(e);
            }
        };

        if env.exception_check() {
            let e = capture_exception(env);
            let _ = frame.pop();
            return Err(e);
        }

        let value = match self.return_adapter.from_jni(env, host, raw, receiver, true) {
            Ok(v) => v,
            Err(e) => {
                let _ = frame.pop();
                return Err(e);
            }
        };
        if let Value::Instance(instance) = &value {
            frame.keep(instance.handle().unwrap_or(std::ptr::null_mut()));
        }
        frame.pop()?;
        Ok(value)
    }

    fn dispatch(&self, env: &dyn Env, receiver: Option<&Value>, raw_args: &[JValue], reentrant: bool) -> Result<JValue> {
        match self.kind {
            MethodKind::Static => env.call_static_method(self.declaring_class, self.method_id, self.return_adapter.wire_type(), raw_args),
            MethodKind::Constructor => {
                let obj = env.new_object(self.declaring_class, self.method_id, raw_args)?;
                Ok(JValue::Object(obj))
            }
            MethodKind::Init => {
                let obj = receiver
                    .and_then(Value::as_instance)
                    .and_then(|i| i.handle())
                    .ok_or_else(|| Error::Jni(format!("`{}` requires an instance receiver", self.name)))?;
                env.call_method(obj, self.method_id, self.return_adapter.wire_type(), raw_args, Dispatch::NonVirtual, Some(self.declaring_class))
            }
            MethodKind::Instance => {
                let obj = receiver
                    .and_then(Value::as_instance)
                    .and_then(|i| i.handle())
                    .ok_or_else(|| Error::Jni(format!("`{}` requires an instance receiver", self.name)))?;
                // Re-entry from a replacement body dispatches nonvirtually so
                // it lands on the original implementation rather than
                // recursing into the replacement.
                let dispatch = if reentrant { Dispatch::NonVirtual } else { Dispatch::Virtual };
                let direct_class = reentrant.then_some(self.declaring_class);
                env.call_method(obj, self.method_id, self.return_adapter.wire_type(), raw_args, dispatch, direct_class)
            }
            MethodKind::ValueOfSelf => unreachable!("short-circuited in invoke()"),
        }
    }
}

/// A name's overload group, bucketed by arity.
pub struct Dispatcher {
    name: String,
    by_arity: HashMap<usize, Vec<Arc<MethodDescriptor>>>,
    all: Vec<Arc<MethodDescriptor>>,
}

impl Dispatcher {
    pub(crate) fn new(name: String, overloads: Vec<Arc<MethodDescriptor>>) -> Self {
        let mut by_arity: HashMap<usize, Vec<Arc<MethodDescriptor>>> = HashMap::new();
        for overload in &overloads {
            by_arity.entry(overload.arity()).or_default().push(overload.clone());
        }
        Dispatcher {
            name,
            by_arity,
            all: overloads,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `.overloads`.
    pub fn overloads(&self) -> &[Arc<MethodDescriptor>] {
        &self.all
    }

    /// `.overload(...argTypeNames)` — selects exactly one by signature-string
    /// match.
    pub fn overload(&self, arg_type_names: &[&str]) -> Result<Arc<MethodDescriptor>> {
        self.all
            .iter()
            .find(|m| {
                m.argument_types().len() == arg_type_names.len()
                    && m.argument_types()
                        .iter()
                        .zip(arg_type_names)
                        .all(|(adapter, name)| adapter.type_name().to_source_name() == *name)
            })
            .cloned()
            .ok_or_else(|| Error::NoSuchOverload {
                member: self.name.clone(),
                detail: format!("signature ({})", arg_type_names.join(", ")),
            })
    }

    /// `.implementation` getter/setter: a hard error on multi-overload
    /// groups.
    pub fn sole_overload(&self) -> Result<&Arc<MethodDescriptor>> {
        if self.all.len() != 1 {
            return Err(Error::AmbiguousOverload {
                member: self.name.clone(),
                count: self.all.len(),
            });
        }
        Ok(&self.all[0])
    }

    /// Call semantics: reject if the arity bucket is absent, else pick the
    /// first overload in that bucket whose positional `isCompatible`
    /// predicates all hold.
    ///
    /// One exception precedes overload selection entirely: `toString`
    /// called with a receiver that is a class-only static view (no
    /// `$handle`) never reaches JNI at all — it returns the literal
    /// `"<"+className+">"`, since an instance-kind `toString` has nothing to
    /// invoke on and a class view is not itself a `Class` object.
    pub fn call(&self, env: &dyn Env, host: &dyn ObjectHost, receiver: Option<&Value>, args: &[Value]) -> Result<Value> {
        if self.name == "toString" && args.is_empty() {
            if let Some(instance) = receiver.and_then(Value::as_instance) {
                if instance.is_static_view() {
                    return Ok(Value::Str(format!("<{}>", instance.class_name())));
                }
            }
        }
        let Some(bucket) = self.by_arity.get(&args.len()) else {
            return Err(Error::NoSuchOverload {
                member: self.name.clone(),
                detail: format!("{} arguments", args.len()),
            });
        };
        let selected = bucket
            .iter()
            .find(|m| m.can_invoke_with(args))
            .ok_or_else(|| Error::NoSuchOverload {
                member: self.name.clone(),
                detail: format!("arguments {args:?}"),
            })?;
        selected.invoke(env, host, receiver, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Registry;
    use crate::vm::test_support::MockEnv;

    struct NullHost;
    impl ObjectHost for NullHost {
        fn wrap(&self, _env: &dyn Env, _handle: jobject, _static_type: &crate::signature::TypeName) -> Result<Value> {
            unreachable!()
        }
        fn resolve_class(&self, _env: &dyn Env, _type_name: &crate::signature::TypeName) -> Result<jclass> {
            unreachable!()
        }
    }

    fn int_method(registry: &Registry, method_id: jmethodID) -> MethodDescriptor {
        MethodDescriptor::new(
            "m".into(),
            MethodKind::Static,
            method_id,
            std::ptr::null_mut(),
            registry.lookup_source_name("int").unwrap(),
            vec![registry.lookup_source_name("int").unwrap()],
            false,
        )
    }

    fn string_method(registry: &Registry, method_id: jmethodID) -> MethodDescriptor {
        MethodDescriptor::new(
            "m".into(),
            MethodKind::Static,
            method_id,
            std::ptr::null_mut(),
            registry.lookup_source_name("int").unwrap(),
            vec![registry.lookup_source_name("java.lang.String").unwrap()],
            false,
        )
    }

    #[test]
    fn overload_selection_picks_first_compatible_bucket_member() {
        let registry = Registry::new();
        let int_m = Arc::new(int_method(&registry, 1usize as *mut std::ffi::c_void as jmethodID));
        let str_m = Arc::new(string_method(&registry, 1usize as *mut std::ffi::c_void as jmethodID));
        let dispatcher = Dispatcher::new("m".into(), vec![int_m.clone(), str_m.clone()]);

        assert!(dispatcher.by_arity.get(&1).unwrap().iter().any(|m| Arc::ptr_eq(m, &int_m)));
        assert!(int_m.can_invoke_with(&[Value::Int(42)]));
        assert!(!int_m.can_invoke_with(&[Value::Float(42.0)]));
        assert!(str_m.can_invoke_with(&[Value::Str("x".into())]));
    }

    #[test]
    fn ambiguous_overload_rejects_implementation_access() {
        let registry = Registry::new();
        let int_m = Arc::new(int_method(&registry, 1usize as *mut std::ffi::c_void as jmethodID));
        let str_m = Arc::new(string_method(&registry, 2usize as *mut std::ffi::c_void as jmethodID));
        let dispatcher = Dispatcher::new("m".into(), vec![int_m, str_m]);
        assert!(matches!(dispatcher.sole_overload().unwrap_err(), Error::AmbiguousOverload { .. }));
    }

    #[test]
    fn replacement_observes_reentrant_call_as_original() {
        let env = MockEnv::new();
        let class = env.define_class(
            "demo.Counter",
            None,
            vec![crate::vm::test_support::MethodSpec {
                name: "value",
                is_static: true,
                is_varargs: false,
                param_types: vec![],
                return_type: "int",
                handler: Box::new(|_env, _recv, _args| Ok(JValue::Int(10))),
            }],
            vec![],
        );
        let reflection = env.reflect_class(class).unwrap();
        let registry = Registry::new();
        let method_info = &reflection.methods[0];
        let descriptor = Arc::new(MethodDescriptor::new(
            "value".into(),
            MethodKind::Static,
            method_info.method_id,
            class,
            registry.lookup_source_name("int").unwrap(),
            vec![],
            false,
        ));

        let replacement: Replacement = Arc::new(|env, host, receiver, args, original| {
            let base = original.invoke(env, host, receiver, args)?;
            match base {
                Value::Int(v) => Ok(Value::Int(v + 1)),
                other => Ok(other),
            }
        });
        descriptor.set_implementation(Some(replacement)).unwrap();

        let host = NullHost;
        let result = crate::vm::with_env_attached(&env, || descriptor.invoke(&env, &host, None, &[])).unwrap();
        assert!(matches!(result, Value::Int(11)));
    }

    #[test]
    fn to_string_on_static_view_returns_class_literal_without_any_jni_call() {
        let env = MockEnv::new();
        let class = env.define_class("demo.Thing", None, vec![], vec![]);
        let wrapper = crate::vm::with_env_attached(&env, || {
            let class_ref = crate::refs::GlobalRef::new(&env, class).unwrap();
            Arc::new(crate::class::ClassWrapper::new(class_ref, "demo.Thing".into(), None))
        });
        let static_view = crate::class::ClassInstance::static_view(wrapper);

        // No overloads registered at all: if the intercept didn't fire this
        // would hit the "arity bucket absent" `NoSuchOverload` error rather
        // than ever reaching `NullHost`'s `unreachable!()`.
        let dispatcher = Dispatcher::new("toString".into(), vec![]);
        let host = NullHost;
        let result = dispatcher.call(&env, &host, Some(&Value::Instance(static_view)), &[]).unwrap();
        assert!(matches!(result, Value::Str(s) if s == "<demo.Thing>"));
    }
}
