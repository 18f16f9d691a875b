//! End-to-end coverage of class resolution, construction, and method/field
//! dispatch through [`Factory`], against the in-memory [`MockEnv`].

use std::sync::Arc;

use jbridge::vm::test_support::{FieldSpec, MethodSpec, MockEnv};
use jbridge::vm::value::{JValue, Primitive};
use jbridge::vm::Env;
use jbridge::{Api, Factory, Value};

fn field_id(env: &MockEnv, recv: jni_sys::jobject, name: &str) -> jni_sys::jfieldID {
    let class = env.get_object_class(recv).unwrap();
    let reflection = env.reflect_class(class).unwrap();
    reflection.fields.iter().find(|f| f.name == name).unwrap().field_id
}

fn define_point(env: &MockEnv) {
    env.define_class(
        "demo.Point",
        None,
        vec![
            MethodSpec {
                name: "<init>",
                is_static: false,
                is_varargs: false,
                param_types: vec!["int", "int"],
                return_type: "void",
                handler: Box::new(|env, recv, args| {
                    let recv = recv.expect("instance constructor has a receiver");
                    let x_id = field_id(env, recv, "x");
                    let y_id = field_id(env, recv, "y");
                    env.set_field(recv, x_id, args[0])?;
                    env.set_field(recv, y_id, args[1])?;
                    Ok(JValue::Void)
                }),
            },
            MethodSpec {
                name: "distanceFromOrigin",
                is_static: false,
                is_varargs: false,
                param_types: vec![],
                return_type: "double",
                handler: Box::new(|env, recv, _args| {
                    let recv = recv.expect("instance method has a receiver");
                    let x_id = field_id(env, recv, "x");
                    let y_id = field_id(env, recv, "y");
                    let x = env.get_field(recv, x_id, Primitive::Int)?;
                    let y = env.get_field(recv, y_id, Primitive::Int)?;
                    let (JValue::Int(x), JValue::Int(y)) = (x, y) else {
                        unreachable!("fields are declared int")
                    };
                    Ok(JValue::Double(((x * x + y * y) as f64).sqrt()))
                }),
            },
        ],
        vec![
            FieldSpec { name: "x", is_static: false, field_type: "int" },
            FieldSpec { name: "y", is_static: false, field_type: "int" },
        ],
    );
}

#[test]
fn constructs_an_instance_and_reads_back_a_field() {
    let env = MockEnv::new();
    define_point(&env);
    let api: Arc<dyn Api> = Arc::new(MockEnv::new());
    let factory = Arc::new(Factory::new(&env, api).unwrap());

    let wrapper = factory.use_class(&env, "demo.Point").unwrap();
    let instance = factory.new_instance(&env, &wrapper, &[Value::Int(3), Value::Int(4)]).unwrap();

    factory.members(&env, &wrapper).unwrap();
    let members = wrapper.members().unwrap();
    let x_field = members.get("x").unwrap().as_field().unwrap();
    let read_back = x_field.get(&env, factory.as_ref(), Some(&Value::Instance(instance.clone()))).unwrap();
    assert!(matches!(read_back, Value::Int(3)));

    let dispatcher = members.get("distanceFromOrigin").unwrap().as_method().unwrap();
    let result = dispatcher.call(&env, factory.as_ref(), Some(&Value::Instance(instance)), &[]).unwrap();
    assert!(matches!(result, Value::Float(d) if (d - 5.0).abs() < 1e-9));
}

#[test]
fn unresolved_class_name_surfaces_class_not_found() {
    let env = MockEnv::new();
    let api: Arc<dyn Api> = Arc::new(MockEnv::new());
    let factory = Arc::new(Factory::new(&env, api).unwrap());

    let err = factory.use_class(&env, "demo.DoesNotExist").unwrap_err();
    assert!(matches!(err, jbridge::Error::ClassNotFound(name) if name == "demo.DoesNotExist"));
}
