//! Builds a [`Members`] table from one [`ClassReflection`].
//!
//! This is the one-time materialization [`crate::class::ClassWrapper::get_or_init_members`]
//! drives on first property access: reflect the class's declared methods,
//! fields, and constructors, build a [`TypeAdapter`] for every parameter and
//! return/field type via the shared [`Registry`], apply the varargs and
//! `valueOf` special cases, and group everything by name.

use std::collections::HashMap;
use std::sync::Arc;

use jni_sys::jclass;

use crate::adapter::{Registry, TypeAdapter};
use crate::error::Result;
use crate::member::dispatch::{Dispatcher, MethodDescriptor, MethodKind};
use crate::member::field::{FieldAccessor, FieldKind};
use crate::member::{Members, Property};
use crate::signature::TypeName;
use crate::vm::reflect::ClassReflection;

fn adapters_for(registry: &Registry, param_types: &[String], is_varargs: bool) -> Result<Vec<Arc<TypeAdapter>>> {
    let mut adapters = Vec::with_capacity(param_types.len());
    for (i, name) in param_types.iter().enumerate() {
        let is_last = i + 1 == param_types.len();
        if is_varargs && is_last {
            // If the method is varargs, replace the last parameter's
            // TypeAdapter with its array-of form.
            let elem = TypeName::from_source_name(name)?;
            adapters.push(registry.lookup(&elem.array_of())?);
        } else {
            adapters.push(registry.lookup_source_name(name)?);
        }
    }
    Ok(adapters)
}

/// Builds the members table for `class` (fully-qualified name `class_name`),
/// whose reflective metadata is `reflection`.
pub fn build(registry: &Registry, class: jclass, class_name: &str, reflection: &ClassReflection) -> Result<Members> {
    let mut method_groups: HashMap<String, Vec<Arc<MethodDescriptor>>> = HashMap::new();

    for info in &reflection.methods {
        let kind = if info.is_static() { MethodKind::Static } else { MethodKind::Instance };
        let return_adapter = registry.lookup_source_name(&info.return_type)?;
        let arg_adapters = adapters_for(registry, &info.param_types, info.is_varargs)?;
        let descriptor = Arc::new(MethodDescriptor::new(
            info.name.clone(),
            kind,
            info.method_id,
            class,
            return_adapter,
            arg_adapters,
            info.is_varargs,
        ));
        method_groups.entry(info.name.clone()).or_default().push(descriptor);
    }

    // A method whose name is `valueOf` and which has no zero-argument
    // instance overload gains a synthetic instance overload returning the
    // receiver itself with declared return type `int`.
    let value_of_needs_synthetic = match method_groups.get("valueOf") {
        None => true,
        Some(group) => !group.iter().any(|m| m.kind() == MethodKind::Instance && m.arity() == 0),
    };
    if value_of_needs_synthetic {
        let synthetic = Arc::new(MethodDescriptor::new(
            "valueOf".to_string(),
            MethodKind::ValueOfSelf,
            std::ptr::null_mut(),
            class,
            registry.lookup_source_name("int")?,
            Vec::new(),
            false,
        ));
        method_groups.entry("valueOf".to_string()).or_default().push(synthetic);
    }

    let mut fields: HashMap<String, FieldAccessor> = HashMap::new();
    for info in &reflection.fields {
        let adapter = registry.lookup_source_name(&info.field_type)?;
        fields.insert(
            info.name.clone(),
            FieldAccessor {
                name: info.name.clone(),
                kind: if info.is_static() { FieldKind::Static } else { FieldKind::Instance },
                field_id: info.field_id,
                adapter,
                declaring_class: class,
            },
        );
    }

    let mut properties = HashMap::new();
    let field_names: Vec<String> = fields.keys().cloned().collect();
    for name in field_names {
        let field = fields.remove(&name).expect("just collected this key");
        match method_groups.remove(&name) {
            Some(overloads) => {
                properties.insert(name.clone(), Property::Both(field, Dispatcher::new(name, overloads)));
            }
            None => {
                properties.insert(name.clone(), Property::Field(field));
            }
        }
    }
    for (name, overloads) in method_groups {
        properties.insert(name.clone(), Property::Method(Dispatcher::new(name, overloads)));
    }

    // Constructors get two parallel overload lists — one producing a new
    // instance (`$new`), one that only runs `<init>` on an existing
    // instance (`$init`).
    let mut new_overloads = Vec::with_capacity(reflection.constructors.len());
    let mut init_overloads = Vec::with_capacity(reflection.constructors.len());
    // `$new` returns the freshly allocated instance, so its return adapter
    // is the class itself; `$init` only runs `<init>` on an instance that
    // already exists and, like any other void-returning call, yields nothing.
    let self_type = registry.lookup(&TypeName::object(class_name))?;
    let void = registry.lookup_source_name("void")?;
    for ctor in &reflection.constructors {
        let arg_adapters = adapters_for(registry, &ctor.param_types, ctor.is_varargs)?;
        new_overloads.push(Arc::new(MethodDescriptor::new(
            "<init>".to_string(),
            MethodKind::Constructor,
            ctor.method_id,
            class,
            self_type.clone(),
            arg_adapters.clone(),
            ctor.is_varargs,
        )));
        init_overloads.push(Arc::new(MethodDescriptor::new(
            "<init>".to_string(),
            MethodKind::Init,
            ctor.method_id,
            class,
            void.clone(),
            arg_adapters,
            ctor.is_varargs,
        )));
    }

    Ok(Members {
        properties,
        constructors_new: Dispatcher::new("<init>".to_string(), new_overloads),
        constructors_init: Dispatcher::new("<init>".to_string(), init_overloads),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::test_support::{FieldSpec, MethodSpec, MockEnv};
    use crate::vm::value::JValue;
    use crate::vm::Env;

    #[test]
    fn merges_field_and_method_of_the_same_name() {
        let env = MockEnv::new();
        let class = env.define_class(
            "demo.Dual",
            None,
            vec![MethodSpec {
                name: "value",
                is_static: false,
                is_varargs: false,
                param_types: vec![],
                return_type: "int",
                handler: Box::new(|_, _, _| Ok(JValue::Int(1))),
            }],
            vec![FieldSpec {
                name: "value",
                is_static: false,
                field_type: "int",
            }],
        );
        let reflection = env.reflect_class(class).unwrap();
        let registry = Registry::new();
        let members = build(&registry, class, "demo.Dual", &reflection).unwrap();
        let prop = members.get("value").unwrap();
        assert!(prop.as_field().is_some());
        assert!(prop.as_method().is_some());
    }

    #[test]
    fn value_of_gets_synthetic_zero_arg_overload_when_missing() {
        let env = MockEnv::new();
        let class = env.define_class("demo.NoValueOf", None, vec![], vec![]);
        let reflection = env.reflect_class(class).unwrap();
        let registry = Registry::new();
        let members = build(&registry, class, "demo.NoValueOf", &reflection).unwrap();
        let dispatcher = members.get("valueOf").unwrap().as_method().unwrap();
        assert_eq!(dispatcher.overloads().len(), 1);
        assert_eq!(dispatcher.overloads()[0].kind(), MethodKind::ValueOfSelf);
    }

    #[test]
    fn varargs_last_parameter_becomes_array_adapter() {
        let env = MockEnv::new();
        let class = env.define_class(
            "demo.Varargs",
            None,
            vec![MethodSpec {
                name: "m",
                is_static: false,
                is_varargs: true,
                param_types: vec!["int", "java.lang.String"],
                return_type: "void",
                handler: Box::new(|_, _, _| Ok(JValue::Void)),
            }],
            vec![],
        );
        let reflection = env.reflect_class(class).unwrap();
        let registry = Registry::new();
        let members = build(&registry, class, "demo.Varargs", &reflection).unwrap();
        let dispatcher = members.get("m").unwrap().as_method().unwrap();
        let overload = &dispatcher.overloads()[0];
        assert!(overload.argument_types()[1].type_name().is_array());
    }
}
