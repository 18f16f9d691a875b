//! Coverage of [`Factory::hook`]/[`Factory::unhook`]'s Rust-level dispatch
//! wiring against the in-memory [`MockEnv`], without the `android-hooks`
//! feature: only the replacement/re-entry bookkeeping is exercised, since
//! live vtable/`ArtMethod` patching needs a real Dalvik/ART process.

use std::sync::{Arc, Mutex};

use jbridge::vm::test_support::{MethodSpec, MockEnv};
use jbridge::vm::value::JValue;
use jbridge::vm::{NativeHandler, NativeTrampoline, Trampolines};
use jbridge::{Api, Factory, Value};

struct NullTrampolines;

impl Trampolines for NullTrampolines {
    fn build(&self, _shorty: &str, _handler: Arc<NativeHandler>) -> jbridge::Result<NativeTrampoline> {
        Ok(NativeTrampoline(std::ptr::null()))
    }

    fn release(&self, _trampoline: NativeTrampoline) {}
}

#[test]
fn hook_replaces_the_call_and_unhook_restores_it() {
    let env = MockEnv::new();
    env.define_class(
        "demo.Greeter",
        None,
        vec![MethodSpec {
            name: "greet",
            is_static: true,
            is_varargs: false,
            param_types: vec![],
            return_type: "int",
            handler: Box::new(|_, _, _| Ok(JValue::Int(1))),
        }],
        vec![],
    );
    let api: Arc<dyn Api> = Arc::new(MockEnv::new());
    let factory = Arc::new(Factory::new(&env, api).unwrap());
    let wrapper = factory.use_class(&env, "demo.Greeter").unwrap();
    factory.members(&env, &wrapper).unwrap();
    let members = wrapper.members().unwrap();
    let descriptor = members.get("greet").unwrap().as_method().unwrap().overloads()[0].clone();

    let call_count = Arc::new(Mutex::new(0));
    let counted = call_count.clone();
    let replacement: jbridge::Replacement = Arc::new(move |env, host, receiver, args, original| {
        *counted.lock().unwrap() += 1;
        let base = original.invoke(env, host, receiver, args)?;
        match base {
            Value::Int(v) => Ok(Value::Int(v * 100)),
            other => Ok(other),
        }
    });

    factory.hook(&wrapper, &descriptor, replacement, &NullTrampolines).unwrap();
    let result = jbridge::vm::with_env_attached(&env, || descriptor.invoke(&env, factory.as_ref(), None, &[])).unwrap();
    assert!(matches!(result, Value::Int(100)));
    assert_eq!(*call_count.lock().unwrap(), 1);

    factory.unhook(&wrapper, &descriptor, &NullTrampolines).unwrap();
    let result = jbridge::vm::with_env_attached(&env, || descriptor.invoke(&env, factory.as_ref(), None, &[])).unwrap();
    assert!(matches!(result, Value::Int(1)));
    assert_eq!(*call_count.lock().unwrap(), 1, "unhooked call must not re-enter the replacement");
}
