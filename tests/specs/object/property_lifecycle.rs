//! Property definition and mutability, exercised through the public
//! object API rather than the `Property` type directly.

use clypsalot_core::{AnyValue, Error, ObjectConfig};

use crate::prelude::*;

struct NoopBehavior;
impl clypsalot_core::ObjectHooks for NoopBehavior {}

#[test]
fn reading_an_unconfigured_optional_property_is_undefined() {
    let pool = pool(1);
    let object = new_object(&pool, "node", NoopBehavior);
    object.add_property(clypsalot_core::Property::new("label", clypsalot_core::PropertyType::String));
    object.configure(&ObjectConfig::new()).unwrap();

    let err = object.property("label").unwrap().get().unwrap_err();
    assert!(matches!(err, Error::Undefined { .. }));
}

#[test]
fn configuring_a_required_property_makes_it_readable() {
    let pool = pool(1);
    let object = new_object(&pool, "node", NoopBehavior);
    object.add_property(max_process_property());
    object.configure(&ObjectConfig::new().with("max_process", 7i64)).unwrap();

    let value = object.property("max_process").unwrap().get().unwrap().clone();
    assert_eq!(value, AnyValue::Integer(7));
}

#[test]
fn configuring_without_a_required_property_faults_the_object() {
    let pool = pool(1);
    let object = new_object(&pool, "node", NoopBehavior);
    object.add_property(max_process_property());

    let err = object.configure(&ObjectConfig::new()).unwrap_err();
    assert!(matches!(err, Error::Undefined { .. }));
    assert_eq!(object.state(), clypsalot_core::ObjectState::Faulted);
}

#[test]
fn public_write_is_rejected_unless_public_mutable() {
    let pool = pool(1);
    let object = new_object(&pool, "node", NoopBehavior);
    object.add_property(max_process_property());
    object.configure(&ObjectConfig::new().with("max_process", 1i64)).unwrap();

    let err = object.set_property("max_process", AnyValue::Integer(2)).unwrap_err();
    assert!(matches!(err, Error::Immutable { .. }));
}

#[test]
fn public_write_succeeds_once_marked_public_mutable() {
    let pool = pool(1);
    let object = new_object(&pool, "node", NoopBehavior);
    let property = clypsalot_core::Property::new("label", clypsalot_core::PropertyType::String)
        .set_configurable(true)
        .set_public_mutable(true);
    object.add_property(property);
    object.configure(&ObjectConfig::new()).unwrap();

    object.set_property("label", AnyValue::from("hello")).unwrap();
    let value = object.property("label").unwrap().get().unwrap().clone();
    assert_eq!(value, AnyValue::from("hello"));
}
