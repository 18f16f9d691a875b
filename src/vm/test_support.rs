//! An in-memory fake of [`Env`] and [`Api`], standing in for a live Dalvik or
//! ART process.
//!
//! The process-attach mechanism and the `Env`/`Api` collaborators themselves
//! live outside this crate, and this crate's own CI can no more launch a
//! Dalvik/ART process than a JVM. `MockEnv` is a hand-built fake object
//! graph (classes, instances, methods, fields) that answers the same `Env`
//! trait the rest of the crate is written against, closely mirroring how
//! `j4rs` and `rust_jvm`'s own test suites build minimal native-side fakes
//! rather than driving a full JVM.

use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::Mutex;

use jni_sys::{jclass, jfieldID, jmethodID, jobject};

use crate::error::{Error, Result};
use crate::vm::env::Dispatch;
use crate::vm::reflect::{ClassReflection, ConstructorInfo, FieldInfo, MethodInfo, MODIFIER_STATIC};
use crate::vm::value::{JValue, Primitive};
use crate::vm::{Api, Flavor};

/// A method or constructor handler registered for a fake class.
pub type MethodHandler = Box<dyn Fn(&MockEnv, Option<jobject>, &[JValue]) -> Result<JValue> + Send + Sync>;

/// Declares one method (or constructor, when `name` is `"<init>"`) on a
/// [`MockEnv`] fake class.
pub struct MethodSpec {
    pub name: &'static str,
    pub is_static: bool,
    pub is_varargs: bool,
    pub param_types: Vec<&'static str>,
    pub return_type: &'static str,
    pub handler: MethodHandler,
}

/// Declares one field on a [`MockEnv`] fake class.
pub struct FieldSpec {
    pub name: &'static str,
    pub is_static: bool,
    pub field_type: &'static str,
}

struct FakeClass {
    name: String,
    super_name: Option<String>,
    methods: Vec<MethodInfo>,
    constructors: Vec<ConstructorInfo>,
    fields: Vec<FieldInfo>,
    class_obj: jobject,
}

enum ArrayData {
    Primitive(Primitive, Vec<u8>),
    Object(jclass, Vec<jobject>),
}

struct FakeObject {
    class_name: String,
    array: Option<ArrayData>,
    string: Option<Vec<u8>>,
}

struct State {
    classes: HashMap<String, FakeClass>,
    objects: HashMap<usize, FakeObject>,
    fields: HashMap<(usize, usize), JValue>,
    static_fields: HashMap<(String, usize), JValue>,
    handlers: HashMap<usize, MethodHandler>,
    global_refs: HashMap<usize, u32>,
    weak_refs: HashMap<usize, u32>,
    pending_exception: Option<jobject>,
    next_id: usize,
    next_member_id: usize,
}

/// An in-memory fake JNI environment.
///
/// Build one with [`MockEnv::new`], register fake classes with
/// [`MockEnv::define_class`], then use it anywhere this crate expects `&dyn
/// Env` (it also implements [`Api`] with [`Flavor::Dalvik`]).
pub struct MockEnv {
    state: Mutex<State>,
}

// Test double only: every access goes through the internal `Mutex`, and the
// raw pointers it hands out are opaque ids this struct alone interprets.
unsafe impl Send for MockEnv {}
unsafe impl Sync for MockEnv {}

impl MockEnv {
    pub fn new() -> Self {
        MockEnv {
            state: Mutex::new(State {
                classes: HashMap::new(),
                objects: HashMap::new(),
                fields: HashMap::new(),
                static_fields: HashMap::new(),
                handlers: HashMap::new(),
                global_refs: HashMap::new(),
                weak_refs: HashMap::new(),
                pending_exception: None,
                next_id: 1,
                next_member_id: 1,
            }),
        }
    }

    fn alloc_id(state: &mut State) -> usize {
        let id = state.next_id;
        state.next_id += 1;
        id
    }

    fn id_to_ptr(id: usize) -> jobject {
        id as jobject
    }

    fn ptr_to_id(ptr: jobject) -> usize {
        ptr as usize
    }

    fn alloc_member_id(state: &mut State) -> usize {
        let id = state.next_member_id;
        state.next_member_id += 1;
        id
    }

    /// Registers a fake class under `dotted_name`, with an optional
    /// superclass (which must already be registered) and member specs.
    pub fn define_class(
        &self,
        dotted_name: &str,
        super_name: Option<&str>,
        methods: Vec<MethodSpec>,
        fields: Vec<FieldSpec>,
    ) -> jclass {
        let mut state = self.state.lock().unwrap();
        let class_id = Self::alloc_id(&mut state);
        let class_obj = Self::id_to_ptr(class_id);
        state.objects.insert(
            class_id,
            FakeObject {
                class_name: "java.lang.Class".to_string(),
                array: None,
                string: None,
            },
        );

        let mut method_infos = Vec::new();
        let mut ctor_infos = Vec::new();
        for spec in methods {
            let member_id = Self::alloc_member_id(&mut state);
            let member_ptr = member_id as *mut c_void as jmethodID;
            state.handlers.insert(member_id, spec.handler);
            if spec.name == "<init>" {
                ctor_infos.push(ConstructorInfo {
                    modifiers: 0,
                    param_types: spec.param_types.iter().map(|s| s.to_string()).collect(),
                    is_varargs: spec.is_varargs,
                    method_id: member_ptr,
                });
            } else {
                method_infos.push(MethodInfo {
                    name: spec.name.to_string(),
                    modifiers: if spec.is_static { MODIFIER_STATIC } else { 0 },
                    param_types: spec.param_types.iter().map(|s| s.to_string()).collect(),
                    return_type: spec.return_type.to_string(),
                    is_varargs: spec.is_varargs,
                    method_id: member_ptr,
                });
            }
        }

        let field_infos = fields
            .into_iter()
            .map(|f| {
                let member_id = Self::alloc_member_id(&mut state);
                FieldInfo {
                    name: f.name.to_string(),
                    modifiers: if f.is_static { MODIFIER_STATIC } else { 0 },
                    field_type: f.field_type.to_string(),
                    field_id: member_id as *mut c_void as jfieldID,
                }
            })
            .collect();

        state.classes.insert(
            dotted_name.to_string(),
            FakeClass {
                name: dotted_name.to_string(),
                super_name: super_name.map(|s| s.to_string()),
                methods: method_infos,
                constructors: ctor_infos,
                fields: field_infos,
                class_obj,
            },
        );
        class_obj
    }

    /// Creates a fake instance of `dotted_name` without running any
    /// registered constructor (mirrors `$alloc`/`AllocObject`).
    pub fn new_fake_object(&self, dotted_name: &str) -> jobject {
        let mut state = self.state.lock().unwrap();
        let id = Self::alloc_id(&mut state);
        state.objects.insert(
            id,
            FakeObject {
                class_name: dotted_name.to_string(),
                array: None,
                string: None,
            },
        );
        Self::id_to_ptr(id)
    }

    pub fn global_ref_count(&self) -> usize {
        self.state.lock().unwrap().global_refs.values().filter(|c| **c > 0).count()
    }

    fn class_chain<'s>(state: &'s State, dotted_name: &str) -> Vec<&'s FakeClass> {
        let mut chain = Vec::new();
        let mut current = Some(dotted_name.to_string());
        while let Some(name) = current {
            match state.classes.get(&name) {
                Some(class) => {
                    current = class.super_name.clone();
                    chain.push(class);
                }
                None => break,
            }
        }
        chain
    }
}

impl Default for MockEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Api for MockEnv {
    fn flavor(&self) -> Flavor {
        Flavor::Dalvik
    }
}

impl crate::vm::Env for MockEnv {
    fn find_class(&self, slash_name: &str) -> Result<jclass> {
        let dotted = slash_name.replace('/', ".");
        let state = self.state.lock().unwrap();
        state
            .classes
            .get(&dotted)
            .map(|c| c.class_obj)
            .ok_or_else(|| Error::ClassNotFound(dotted))
    }

    fn get_superclass(&self, class: jclass) -> Result<Option<jclass>> {
        let state = self.state.lock().unwrap();
        let id = Self::ptr_to_id(class);
        let Some(obj) = state.objects.get(&id) else {
            return Ok(None);
        };
        let name = match state.classes.values().find(|c| c.class_obj == class) {
            Some(c) => c.name.clone(),
            None => return Ok(None),
        };
        let _ = obj;
        let Some(class_rec) = state.classes.get(&name) else {
            return Ok(None);
        };
        Ok(class_rec
            .super_name
            .as_ref()
            .and_then(|s| state.classes.get(s))
            .map(|c| c.class_obj))
    }

    fn get_object_class(&self, obj: jobject) -> Result<jclass> {
        let state = self.state.lock().unwrap();
        let id = Self::ptr_to_id(obj);
        let class_name = state
            .objects
            .get(&id)
            .map(|o| o.class_name.clone())
            .ok_or_else(|| Error::Jni("no such fake object".into()))?;
        state
            .classes
            .get(&class_name)
            .map(|c| c.class_obj)
            .ok_or_else(|| Error::ClassNotFound(class_name))
    }

    fn is_instance_of(&self, obj: jobject, class: jclass) -> Result<bool> {
        if obj.is_null() {
            return Ok(true);
        }
        let state = self.state.lock().unwrap();
        let id = Self::ptr_to_id(obj);
        let Some(fake) = state.objects.get(&id) else {
            return Ok(false);
        };
        let chain = Self::class_chain(&state, &fake.class_name);
        Ok(chain.iter().any(|c| c.class_obj == class))
    }

    fn is_same_object(&self, a: jobject, b: jobject) -> bool {
        a == b
    }

    fn class_name(&self, class: jclass) -> Result<String> {
        let state = self.state.lock().unwrap();
        state
            .classes
            .values()
            .find(|c| c.class_obj == class)
            .map(|c| c.name.clone())
            .ok_or_else(|| Error::Jni("no such fake class".into()))
    }

    fn new_global_ref(&self, obj: jobject) -> Result<jobject> {
        let mut state = self.state.lock().unwrap();
        *state.global_refs.entry(Self::ptr_to_id(obj)).or_insert(0) += 1;
        Ok(obj)
    }

    fn delete_global_ref(&self, obj: jobject) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(count) = state.global_refs.get_mut(&Self::ptr_to_id(obj)) {
            *count = count.saturating_sub(1);
        }
        Ok(())
    }

    fn new_weak_global_ref(&self, obj: jobject) -> Result<jobject> {
        let mut state = self.state.lock().unwrap();
        *state.weak_refs.entry(Self::ptr_to_id(obj)).or_insert(0) += 1;
        Ok(obj)
    }

    fn delete_weak_global_ref(&self, obj: jobject) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(count) = state.weak_refs.get_mut(&Self::ptr_to_id(obj)) {
            *count = count.saturating_sub(1);
        }
        Ok(())
    }

    fn delete_local_ref(&self, _obj: jobject) -> Result<()> {
        Ok(())
    }

    fn push_local_frame(&self, _capacity: i32) -> Result<()> {
        Ok(())
    }

    fn pop_local_frame(&self, result: jobject) -> Result<jobject> {
        Ok(result)
    }

    fn alloc_object(&self, class: jclass) -> Result<jobject> {
        let mut state = self.state.lock().unwrap();
        let class_name = state
            .classes
            .values()
            .find(|c| c.class_obj == class)
            .map(|c| c.name.clone())
            .ok_or_else(|| Error::Jni("no such fake class".into()))?;
        let id = Self::alloc_id(&mut state);
        state.objects.insert(
            id,
            FakeObject {
                class_name,
                array: None,
                string: None,
            },
        );
        Ok(Self::id_to_ptr(id))
    }

    fn new_object(&self, class: jclass, ctor: jmethodID, args: &[JValue]) -> Result<jobject> {
        let obj = self.alloc_object(class)?;
        let handler = {
            let state = self.state.lock().unwrap();
            let id = ctor as usize;
            state.handlers.get(&id).map(|_| id)
        };
        if let Some(id) = handler {
            self.call_handler(id, Some(obj), args)?;
        }
        Ok(obj)
    }

    fn get_method_id(&self, _class: jclass, _name: &str, _sig: &str) -> Result<jmethodID> {
        Err(Error::Jni("MockEnv does not resolve raw method ids by signature; use reflect_class".into()))
    }

    fn get_static_method_id(&self, _class: jclass, _name: &str, _sig: &str) -> Result<jmethodID> {
        Err(Error::Jni("MockEnv does not resolve raw method ids by signature; use reflect_class".into()))
    }

    fn get_field_id(&self, _class: jclass, _name: &str, _sig: &str) -> Result<jfieldID> {
        Err(Error::Jni("MockEnv does not resolve raw field ids by signature; use reflect_class".into()))
    }

    fn get_static_field_id(&self, _class: jclass, _name: &str, _sig: &str) -> Result<jfieldID> {
        Err(Error::Jni("MockEnv does not resolve raw field ids by signature; use reflect_class".into()))
    }

    fn from_reflected_method(&self, reflected: jobject) -> Result<jmethodID> {
        Ok(reflected as jmethodID)
    }

    fn from_reflected_field(&self, reflected: jobject) -> Result<jfieldID> {
        Ok(reflected as jfieldID)
    }

    fn reflect_class(&self, class: jclass) -> Result<ClassReflection> {
        let state = self.state.lock().unwrap();
        let class_rec = state
            .classes
            .values()
            .find(|c| c.class_obj == class)
            .ok_or_else(|| Error::Jni("no such fake class".into()))?;
        Ok(ClassReflection {
            methods: class_rec.methods.clone(),
            fields: class_rec.fields.clone(),
            constructors: class_rec.constructors.clone(),
        })
    }

    fn call_method(
        &self,
        obj: jobject,
        method: jmethodID,
        _ret: Primitive,
        args: &[JValue],
        _dispatch: Dispatch,
        _direct_class: Option<jclass>,
    ) -> Result<JValue> {
        self.call_handler(method as usize, Some(obj), args)
    }

    fn call_static_method(
        &self,
        _class: jclass,
        method: jmethodID,
        _ret: Primitive,
        args: &[JValue],
    ) -> Result<JValue> {
        self.call_handler(method as usize, None, args)
    }

    fn get_field(&self, obj: jobject, field: jfieldID, ty: Primitive) -> Result<JValue> {
        let state = self.state.lock().unwrap();
        let key = (Self::ptr_to_id(obj), field as usize);
        Ok(state.fields.get(&key).copied().unwrap_or(zero_value(ty)))
    }

    fn set_field(&self, obj: jobject, field: jfieldID, value: JValue) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.fields.insert((Self::ptr_to_id(obj), field as usize), value);
        Ok(())
    }

    fn get_static_field(&self, class: jclass, field: jfieldID, ty: Primitive) -> Result<JValue> {
        let state = self.state.lock().unwrap();
        let class_name = state
            .classes
            .values()
            .find(|c| c.class_obj == class)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        let key = (class_name, field as usize);
        Ok(state.static_fields.get(&key).copied().unwrap_or(zero_value(ty)))
    }

    fn set_static_field(&self, class: jclass, field: jfieldID, value: JValue) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let class_name = state
            .classes
            .values()
            .find(|c| c.class_obj == class)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        state.static_fields.insert((class_name, field as usize), value);
        Ok(())
    }

    fn get_array_length(&self, array: jobject) -> Result<i32> {
        let state = self.state.lock().unwrap();
        let obj = state
            .objects
            .get(&Self::ptr_to_id(array))
            .ok_or_else(|| Error::Jni("no such fake array".into()))?;
        Ok(match &obj.array {
            Some(ArrayData::Primitive(ty, bytes)) => {
                let elem = ty.byte_size().unwrap_or(1);
                (bytes.len() / elem) as i32
            }
            Some(ArrayData::Object(_, elems)) => elems.len() as i32,
            None => 0,
        })
    }

    fn new_primitive_array(&self, ty: Primitive, len: i32) -> Result<jobject> {
        let mut state = self.state.lock().unwrap();
        let id = Self::alloc_id(&mut state);
        let elem = ty.byte_size().unwrap_or(1);
        state.objects.insert(
            id,
            FakeObject {
                class_name: format!("[{ty:?}"),
                array: Some(ArrayData::Primitive(ty, vec![0u8; elem * len as usize])),
                string: None,
            },
        );
        Ok(Self::id_to_ptr(id))
    }

    fn get_primitive_array_region(
        &self,
        array: jobject,
        ty: Primitive,
        start: i32,
        out: &mut [u8],
    ) -> Result<()> {
        let state = self.state.lock().unwrap();
        let obj = state
            .objects
            .get(&Self::ptr_to_id(array))
            .ok_or_else(|| Error::Jni("no such fake array".into()))?;
        let Some(ArrayData::Primitive(_, bytes)) = &obj.array else {
            return Err(Error::Jni("not a primitive array".into()));
        };
        let elem = ty.byte_size().unwrap_or(1);
        let offset = start as usize * elem;
        out.copy_from_slice(&bytes[offset..offset + out.len()]);
        Ok(())
    }

    fn set_primitive_array_region(
        &self,
        array: jobject,
        ty: Primitive,
        start: i32,
        data: &[u8],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let obj = state
            .objects
            .get_mut(&Self::ptr_to_id(array))
            .ok_or_else(|| Error::Jni("no such fake array".into()))?;
        let Some(ArrayData::Primitive(_, bytes)) = &mut obj.array else {
            return Err(Error::Jni("not a primitive array".into()));
        };
        let elem = ty.byte_size().unwrap_or(1);
        let offset = start as usize * elem;
        bytes[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn new_object_array(&self, len: i32, element_class: jclass, initial: jobject) -> Result<jobject> {
        let mut state = self.state.lock().unwrap();
        let id = Self::alloc_id(&mut state);
        state.objects.insert(
            id,
            FakeObject {
                class_name: "[Ljava.lang.Object;".to_string(),
                array: Some(ArrayData::Object(element_class, vec![initial; len as usize])),
                string: None,
            },
        );
        Ok(Self::id_to_ptr(id))
    }

    fn get_object_array_element(&self, array: jobject, index: i32) -> Result<jobject> {
        let state = self.state.lock().unwrap();
        let obj = state
            .objects
            .get(&Self::ptr_to_id(array))
            .ok_or_else(|| Error::Jni("no such fake array".into()))?;
        let Some(ArrayData::Object(_, elems)) = &obj.array else {
            return Err(Error::Jni("not an object array".into()));
        };
        Ok(elems[index as usize])
    }

    fn set_object_array_element(&self, array: jobject, index: i32, value: jobject) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let obj = state
            .objects
            .get_mut(&Self::ptr_to_id(array))
            .ok_or_else(|| Error::Jni("no such fake array".into()))?;
        let Some(ArrayData::Object(_, elems)) = &mut obj.array else {
            return Err(Error::Jni("not an object array".into()));
        };
        elems[index as usize] = value;
        Ok(())
    }

    fn new_string_utf(&self, modified_utf8: &[u8]) -> Result<jobject> {
        let mut state = self.state.lock().unwrap();
        let id = Self::alloc_id(&mut state);
        state.objects.insert(
            id,
            FakeObject {
                class_name: "java.lang.String".to_string(),
                array: None,
                string: Some(modified_utf8.to_vec()),
            },
        );
        Ok(Self::id_to_ptr(id))
    }

    fn get_string_utf_chars(&self, string: jobject) -> Result<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(&Self::ptr_to_id(string))
            .and_then(|o| o.string.clone())
            .ok_or_else(|| Error::Jni("no such fake string".into()))
    }

    fn exception_check(&self) -> bool {
        self.state.lock().unwrap().pending_exception.is_some()
    }

    fn exception_clear(&self) {
        self.state.lock().unwrap().pending_exception = None;
    }

    fn exception_occurred(&self) -> Option<jobject> {
        self.state.lock().unwrap().pending_exception
    }

    fn throw(&self, throwable: jobject) -> Result<()> {
        self.state.lock().unwrap().pending_exception = Some(throwable);
        Ok(())
    }

    fn describe_exception(&self, throwable: jobject) -> Result<(String, Option<String>)> {
        let state = self.state.lock().unwrap();
        let class_name = state
            .objects
            .get(&Self::ptr_to_id(throwable))
            .map(|o| o.class_name.clone())
            .unwrap_or_else(|| "java.lang.Throwable".to_string());
        let message = state
            .objects
            .get(&Self::ptr_to_id(throwable))
            .and_then(|o| o.string.as_ref())
            .map(|bytes| crate::strings::decode_modified_utf8(bytes));
        Ok((class_name, message))
    }
}

fn zero_value(ty: Primitive) -> JValue {
    match ty {
        Primitive::Boolean => JValue::Boolean(false),
        Primitive::Byte => JValue::Byte(0),
        Primitive::Char => JValue::Char(0),
        Primitive::Short => JValue::Short(0),
        Primitive::Int => JValue::Int(0),
        Primitive::Long => JValue::Long(0),
        Primitive::Float => JValue::Float(0.0),
        Primitive::Double => JValue::Double(0.0),
        Primitive::Void => JValue::Void,
        Primitive::Object => JValue::Object(std::ptr::null_mut()),
    }
}

impl MockEnv {
    fn call_handler(&self, member_id: usize, receiver: Option<jobject>, args: &[JValue]) -> Result<JValue> {
        // The handler closure may itself call back into `self` (e.g. to read
        // a field via `get_field`), so the lock must not be held while it
        // runs; handlers are stored behind `Mutex` only to satisfy `Sync`.
        let handler_ptr: *const MethodHandler = {
            let state = self.state.lock().unwrap();
            match state.handlers.get(&member_id) {
                Some(h) => h as *const MethodHandler,
                None => return Err(Error::Jni(format!("no handler registered for member {member_id}"))),
            }
        };
        // Safety: handlers are never removed or moved once inserted, and
        // `MockEnv` itself outlives this call.
        let handler = unsafe { &*handler_ptr };
        handler(self, receiver, args)
    }
}
