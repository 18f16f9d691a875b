//! The class cache and wrapper factory.
//!
//! [`Factory`] is the root object this crate's public surface hangs off:
//! `use(name)` resolves and caches one [`ClassWrapper`] per fully-qualified
//! name, recursively building superclass wrappers along the way, and
//! implements [`ObjectHost`] so the [`crate::adapter`] registry can wrap
//! object-typed results and resolve element classes for object arrays
//! without depending on this module directly.

mod instance;
mod wrapper;

pub use instance::ClassInstance;
pub use wrapper::ClassWrapper;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use jni_sys::{jclass, jobject};

use crate::adapter::{ObjectHost, Registry};
use crate::error::{Error, Result};
use crate::member::{resolve, MethodKind};
use crate::refs::{GlobalRef, Reference};
use crate::signature::TypeName;
use crate::strings::to_jni_class_name;
use crate::value::Value;
use crate::vm::{Api, Env, Trampolines};

/// Classes resolved directly via `FindClass` even when a custom class loader
/// is installed.
///
/// `use_class` routes through the installed loader's own `loadClass` so
/// classes that loader defines or shadows resolve correctly. But `loadClass`
/// is itself resolved by reflecting `java.lang.ClassLoader` and invoking a
/// method *through this very factory* — so the handful of classes needed to
/// get that machinery running at all must bottom out in a direct
/// `FindClass`, or the first `use("some.Type")` call on a loader-backed
/// factory would recurse forever.
const BOOTSTRAP_CLASSES: &[&str] = [
    "java.lang.ClassLoader",
    "java.lang.Class",
    "java.lang.String",
    "java.io.File",
    "dalvik.system.DexClassLoader",
    "android.app.ActivityThread",
]
.as_slice();

/// Builder for [`Factory`], using a consuming-`self` style so each setter
/// returns an owned builder ready for the next call.
pub struct FactoryBuilder {
    loader: Option<jobject>,
}

impl FactoryBuilder {
    pub fn new() -> Self {
        FactoryBuilder { loader: None }
    }

    /// Installs a custom class loader: `use_class` resolves any name outside
    /// [`BOOTSTRAP_CLASSES`] through its `loadClass` rather than `FindClass`,
    /// so classes the loader defines or shadows resolve correctly.
    pub fn loader(mut self, loader: jobject) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn build(self, env: &dyn Env, api: Arc<dyn Api>) -> Result<Factory> {
        let loader = match self.loader {
            Some(raw) => Some(GlobalRef::new(env, raw)?),
            None => None,
        };
        Ok(Factory {
            api,
            registry: Arc::new(Registry::new()),
            cache: Mutex::new(HashMap::new()),
            loader: Mutex::new(loader),
        })
    }
}

impl Default for FactoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The class cache and the root of this crate's public surface. At most one
/// [`ClassWrapper`] exists per fully-qualified name for the lifetime of the
/// factory.
pub struct Factory {
    api: Arc<dyn Api>,
    registry: Arc<Registry>,
    cache: Mutex<HashMap<String, Arc<ClassWrapper>>>,
    loader: Mutex<Option<GlobalRef>>,
}

impl Factory {
    /// Builds a factory with no custom class loader; equivalent to
    /// `FactoryBuilder::new().build(env, api)`.
    pub fn new(env: &dyn Env, api: Arc<dyn Api>) -> Result<Self> {
        FactoryBuilder::new().build(env, api)
    }

    pub fn builder() -> FactoryBuilder {
        FactoryBuilder::new()
    }

    pub fn api(&self) -> &Arc<dyn Api> {
        &self.api
    }

    /// `use(name)`: resolves and caches a [`ClassWrapper`] by fully-qualified
    /// dotted name, recursively resolving and caching its superclass chain.
    pub fn use_class(self: &Arc<Self>, env: &dyn Env, dotted_name: &str) -> Result<Arc<ClassWrapper>> {
        if let Some(hit) = self.cache.lock().unwrap().get(dotted_name) {
            return Ok(hit.clone());
        }
        let handle = self.resolve_class_handle(env, dotted_name)?;
        self.build_wrapper(env, dotted_name, handle)
    }

    fn resolve_class_handle(&self, env: &dyn Env, dotted_name: &str) -> Result<jclass> {
        let has_loader = self.loader.lock().unwrap().is_some();
        if has_loader && !BOOTSTRAP_CLASSES.contains(&dotted_name) {
            return self.load_via_loader(env, dotted_name);
        }
        env.find_class(&to_jni_class_name(dotted_name))
            .map_err(|_| Error::ClassNotFound(dotted_name.to_string()))
    }

    /// Resolves `dotted_name` by calling the installed loader's
    /// `loadClass(String)` through this very factory, as an ordinary call
    /// rather than a special-cased path.
    fn load_via_loader(self: &Arc<Self>, env: &dyn Env, dotted_name: &str) -> Result<jclass> {
        let loader_global = {
            let guard = self.loader.lock().unwrap();
            guard.as_ref().expect("checked by caller").as_raw()
        };
        let loader_wrapper = self.use_class(env, "java.lang.ClassLoader")?;
        self.members(env, &loader_wrapper)?;
        let load_class = loader_wrapper
            .lookup("loadClass")
            .and_then(|p| p.as_method())
            .ok_or_else(|| Error::NoSuchMember {
                class: "java.lang.ClassLoader".to_string(),
                member: "loadClass".to_string(),
            })?;

        let global = GlobalRef::new(env, loader_global)?;
        let loader_instance = Value::Instance(ClassInstance::new_instance(loader_wrapper.clone(), global));

        let result = load_class.call(env, self.as_ref(), Some(&loader_instance), &[Value::Str(dotted_name.to_string())])?;
        let Value::Instance(class_instance) = result else {
            return Err(Error::ClassNotFound(dotted_name.to_string()));
        };
        class_instance.handle().ok_or_else(|| Error::ClassNotFound(dotted_name.to_string()))
    }

    fn build_wrapper(self: &Arc<Self>, env: &dyn Env, dotted_name: &str, handle: jclass) -> Result<Arc<ClassWrapper>> {
        if let Some(hit) = self.cache.lock().unwrap().get(dotted_name) {
            return Ok(hit.clone());
        }

        let class_ref = GlobalRef::new(env, handle)?;
        let parent = match env.get_superclass(handle)? {
            Some(super_handle) => {
                let super_name = env.class_name(super_handle)?;
                Some(self.use_class(env, &super_name)?)
            }
            None => None,
        };

        let wrapper = Arc::new(ClassWrapper::new(class_ref, dotted_name.to_string(), parent));
        let mut cache = self.cache.lock().unwrap();
        let wrapper = cache.entry(dotted_name.to_string()).or_insert_with(|| wrapper).clone();
        log::debug!("cached class wrapper for `{dotted_name}`");
        Ok(wrapper)
    }

    /// Materializes `wrapper`'s members on first access, reflecting them
    /// lazily rather than eagerly at `use_class` time.
    pub fn members<'a>(&self, env: &dyn Env, wrapper: &'a Arc<ClassWrapper>) -> Result<&'a crate::member::Members> {
        wrapper.get_or_init_members(|| {
            let reflection = env.reflect_class(wrapper.class_raw())?;
            resolve::build(&self.registry, wrapper.class_raw(), wrapper.name(), &reflection)
        })
    }

    /// `cast(handle, wrapper)`: fails with [`Error::BadCast`] when
    /// `IsInstanceOf` rejects `handle`.
    pub fn cast(&self, env: &dyn Env, handle: jobject, wrapper: &Arc<ClassWrapper>) -> Result<ClassInstance> {
        if !env.is_instance_of(handle, wrapper.class_raw())? {
            return Err(Error::BadCast(wrapper.name().to_string()));
        }
        let global = GlobalRef::new(env, handle)?;
        Ok(ClassInstance::new_instance(wrapper.clone(), global))
    }

    /// `$new`: produces a new instance via the class's `<init>` overloads.
    pub fn new_instance(self: &Arc<Self>, env: &dyn Env, wrapper: &Arc<ClassWrapper>, args: &[Value]) -> Result<ClassInstance> {
        self.members(env, wrapper)?;
        let members = wrapper.members().expect("just materialized above");
        let result = members.new_dispatcher().call(env, self.as_ref(), None, args)?;
        let Value::Instance(instance) = result else {
            return Err(Error::Jni(format!("`{}`'s constructor returned a non-instance value", wrapper.name())));
        };
        Ok(instance)
    }

    /// `$alloc`: `AllocObject` without running any constructor.
    pub fn alloc(&self, env: &dyn Env, wrapper: &Arc<ClassWrapper>) -> Result<ClassInstance> {
        let handle = env.alloc_object(wrapper.class_raw())?;
        let global = GlobalRef::new(env, handle)?;
        Ok(ClassInstance::new_instance(wrapper.clone(), global))
    }

    /// `$init`: runs `<init>` on an already-allocated instance.
    pub fn init(self: &Arc<Self>, env: &dyn Env, instance: &ClassInstance, args: &[Value]) -> Result<()> {
        self.members(env, instance.wrapper())?;
        let members = instance.wrapper().members().expect("just materialized above");
        members
            .init_dispatcher()
            .call(env, self.as_ref(), Some(&Value::Instance(instance.clone())), args)?;
        Ok(())
    }

    /// Installs a replacement body for `descriptor`, wiring both this
    /// crate's own dispatch and (when available) the live method record.
    /// `$new` cannot be re-implemented; see
    /// [`crate::member::dispatch::MethodDescriptor::set_implementation`].
    pub fn hook(
        self: &Arc<Self>,
        wrapper: &ClassWrapper,
        descriptor: &Arc<crate::member::MethodDescriptor>,
        replacement: crate::member::Replacement,
        trampolines: &dyn Trampolines,
    ) -> Result<()> {
        if descriptor.kind() == MethodKind::Constructor {
            return Err(Error::Jni("constructors cannot be re-implemented; replace the underlying `<init>`".into()));
        }
        crate::hook::install(wrapper, descriptor, replacement, self.api.as_ref(), trampolines, self.clone())
    }

    /// Removes a previously installed replacement and restores the live
    /// method record.
    pub fn unhook(&self, wrapper: &ClassWrapper, descriptor: &crate::member::MethodDescriptor, trampolines: &dyn Trampolines) -> Result<()> {
        crate::hook::uninstall(wrapper, descriptor, self.api.as_ref(), trampolines)
    }

    /// `choose(name, {onMatch, onComplete})`, Dalvik-only. `on_match`
    /// receives each matching instance and decides
    /// whether to keep scanning; `on_complete` runs once scanning finishes
    /// (whether or not it was stopped early).
    pub fn choose(
        self: &Arc<Self>,
        env: &dyn Env,
        dotted_name: &str,
        dalvik: &crate::vm::DalvikSymbols,
        mut on_match: impl FnMut(ClassInstance) -> crate::heap::MatchOutcome,
        on_complete: impl FnOnce(),
    ) -> Result<()> {
        let wrapper = self.use_class(env, dotted_name)?;
        let result = crate::heap::choose(env, self.api.as_ref(), dalvik, wrapper.class_raw(), |env, handle| {
            match self.cast(env, handle, &wrapper) {
                Ok(instance) => on_match(instance),
                Err(_) => crate::heap::MatchOutcome::Continue,
            }
        });
        on_complete();
        result
    }

    /// `openClassFile(path)`: returns a [`DexFile`] facade rather than
    /// loading anything itself — both of its operations are ordinary calls
    /// through this factory.
    pub fn open_class_file(self: &Arc<Self>, path: &str) -> DexFile {
        DexFile {
            factory: self.clone(),
            path: path.to_string(),
        }
    }

    /// Releases every pinned global reference and restores every hook this
    /// factory installed, then clears its caches.
    pub fn dispose(&self, env: &dyn Env, trampolines: &dyn Trampolines) -> Result<()> {
        let mut cache = self.cache.lock().unwrap();
        for wrapper in cache.values() {
            crate::hook::uninstall_all(wrapper, self.api.as_ref(), trampolines)?;
        }
        cache.clear();
        *self.loader.lock().unwrap() = None;
        let _ = env;
        Ok(())
    }
}

/// `openClassFile(path)`'s facade: `load()` and `getClassNames()` are both
/// expressed as ordinary calls through the owning [`Factory`] rather than a
/// bespoke dex-parsing path.
pub struct DexFile {
    factory: Arc<Factory>,
    path: String,
}

impl DexFile {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Installs a `dalvik.system.DexClassLoader` over this file as the
    /// factory's current class loader, parented to whichever loader (if any)
    /// the factory is currently using.
    pub fn load(&self, env: &dyn Env) -> Result<()> {
        let loader_class = self.factory.use_class(env, "dalvik.system.DexClassLoader")?;
        let parent_loader = self.factory.loader.lock().unwrap().as_ref().map(|g| g.as_raw());
        let parent = match parent_loader {
            Some(raw) => {
                let class_loader_class = self.factory.use_class(env, "java.lang.ClassLoader")?;
                Value::Instance(self.factory.cast(env, raw, &class_loader_class)?)
            }
            None => Value::Null,
        };
        let instance = self.factory.new_instance(
            env,
            &loader_class,
            &[
                Value::Str(self.path.clone()),
                Value::Str("/data/local/tmp".to_string()),
                Value::Null,
                parent,
            ],
        )?;
        let handle = instance
            .handle()
            .ok_or_else(|| Error::Jni("DexClassLoader construction returned a collected instance".into()))?;
        *self.factory.loader.lock().unwrap() = Some(GlobalRef::new(env, handle)?);
        Ok(())
    }

    /// Enumerates this file's class names via `dalvik.system.DexFile`'s own
    /// `entries()` `Enumeration<String>`, iterated through the factory's
    /// normal call dispatch.
    pub fn get_class_names(&self, env: &dyn Env) -> Result<Vec<String>> {
        let dexfile_class = self.factory.use_class(env, "dalvik.system.DexFile")?;
        let dexfile = self.factory.new_instance(env, &dexfile_class, &[Value::Str(self.path.clone())])?;
        let entries = self.call_no_args(env, &dexfile_class, "entries", &Value::Instance(dexfile))?;
        let Value::Instance(enumeration) = entries else {
            return Err(Error::Jni("DexFile.entries() returned a non-instance value".into()));
        };
        let enum_wrapper = enumeration.wrapper().clone();
        let mut names = Vec::new();
        loop {
            let has_more = self.call_no_args(env, &enum_wrapper, "hasMoreElements", &Value::Instance(enumeration.clone()))?;
            if !matches!(has_more, Value::Bool(true)) {
                break;
            }
            let next = self.call_no_args(env, &enum_wrapper, "nextElement", &Value::Instance(enumeration.clone()))?;
            match next {
                Value::Str(s) => names.push(s),
                Value::Instance(i) => names.push(i.class_name().to_string()),
                _ => {}
            }
        }
        Ok(names)
    }

    fn call_no_args(&self, env: &dyn Env, wrapper: &Arc<ClassWrapper>, method: &str, receiver: &Value) -> Result<Value> {
        self.factory.members(env, wrapper)?;
        let members = wrapper.members().expect("just materialized above");
        let dispatcher = members
            .get(method)
            .and_then(|p| p.as_method())
            .ok_or_else(|| Error::NoSuchMember {
                class: wrapper.name().to_string(),
                member: method.to_string(),
            })?;
        dispatcher.call(env, self.factory.as_ref(), Some(receiver), &[])
    }
}

impl ObjectHost for Factory {
    fn wrap(&self, env: &dyn Env, handle: jobject, static_type: &TypeName) -> Result<Value> {
        // `use_class` needs `Arc<Self>` for superclass/loader recursion;
        // `ObjectHost` only hands us `&self`, so resolution here goes
        // through the non-recursive cache-or-`FindClass` path directly. An
        // object's static declared type has always already been `use`d once
        // by the time a call returns it (it appeared in a reflected
        // signature), so the cache is warm in practice.
        let dotted = match static_type {
            TypeName::Object(name) => name.clone(),
            other => other.to_source_name(),
        };
        let wrapper = {
            let hit = self.cache.lock().unwrap().get(&dotted).cloned();
            match hit {
                Some(w) => w,
                None => {
                    let handle = self.resolve_class_handle(env, &dotted)?;
                    let class_ref = GlobalRef::new(env, handle)?;
                    let parent = match env.get_superclass(handle)? {
                        Some(super_handle) => {
                            let super_name = env.class_name(super_handle)?;
                            let parent_handle = self.resolve_class_handle(env, &super_name)?;
                            let parent_ref = GlobalRef::new(env, parent_handle)?;
                            Some(Arc::new(ClassWrapper::new(parent_ref, super_name, None)))
                        }
                        None => None,
                    };
                    let wrapper = Arc::new(ClassWrapper::new(class_ref, dotted.clone(), parent));
                    let mut cache = self.cache.lock().unwrap();
                    cache.entry(dotted.clone()).or_insert_with(|| wrapper).clone()
                }
            }
        };
        let instance = self.cast(env, handle, &wrapper)?;
        Ok(Value::Instance(instance))
    }

    fn resolve_class(&self, env: &dyn Env, type_name: &TypeName) -> Result<jclass> {
        match type_name {
            TypeName::Object(name) => {
                if let Some(hit) = self.cache.lock().unwrap().get(name) {
                    return Ok(hit.class_raw());
                }
                self.resolve_class_handle(env, name)
            }
            // Array/primitive class objects (e.g. `int[]`'s `Class`) are
            // resolved directly by descriptor; the class cache only tracks
            // object types by dotted name.
            _ => env.find_class(&type_name.to_descriptor()),
        }
    }
}
