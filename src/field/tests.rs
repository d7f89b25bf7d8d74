use std::{cell::Cell, rc::Rc, time::Duration};

use assert_call::{call, CallRecorder};
use tokio::{task::LocalSet, time::sleep};

use crate::{
    effect, untracked, AsyncValidator, Field, FieldOptions, Form, FormError, FormOptions, Schema,
    SyncValidateFn, AsyncValidateFn, SyncValidator, UnmountBehavior, ValidatorAdapter, Value,
};

fn json(v: serde_json::Value) -> Value {
    v.into()
}

fn form() -> Form {
    Form::new(FormOptions::new().default_values(json(serde_json::json!({"name": "test"}))))
}

fn not_test() -> SyncValidator {
    SyncValidator::new(|v: &Value| (v.as_str() != Some("test")).then(|| "error".to_string()))
}

fn errors(f: &Field) -> Vec<String> {
    untracked(|sc| f.errors(sc))
}

#[test]
fn data_is_created_with_default() {
    let form = form();
    let name = Field::new(&form, "name", FieldOptions::new());
    let age = Field::new(&form, "profile.age", FieldOptions::new().default_value(3));
    assert_eq!(name.peek(), Value::from("test"));
    assert_eq!(age.peek(), Value::from(3));
    assert_eq!(
        form.peek(),
        json(serde_json::json!({"name": "test", "profile": {"age": 3}}))
    );
    assert!(age.data().ptr_eq(&age.data()));
}

#[test]
fn registering_twice_keeps_first_field() {
    let form = form();
    let a = Field::new(&form, "name", FieldOptions::new());
    let b = Field::new(&form, "name", FieldOptions::new());
    assert!(form.field("name").unwrap().ptr_eq(&a));
    assert!(!form.field("name").unwrap().ptr_eq(&b));
    assert!(form
        .get_or_create_field("name", FieldOptions::new())
        .ptr_eq(&a));
}

#[test]
fn change_is_ignored_while_unmounted() {
    let form = form();
    let f = Field::new(&form, "name", FieldOptions::new());
    f.handle_change("x");
    assert_eq!(f.peek(), Value::from("test"));

    f.mount().unwrap();
    f.handle_change("x");
    assert_eq!(f.peek(), Value::from("x"));
}

#[test]
fn dirty_follows_value() {
    let form = form();
    let f = Field::new(&form, "name", FieldOptions::new());
    f.mount().unwrap();
    assert!(!untracked(|sc| f.is_dirty(sc)));
    f.handle_change("x");
    assert!(untracked(|sc| f.is_dirty(sc)));
    f.handle_change("test");
    assert!(!untracked(|sc| f.is_dirty(sc)));
}

#[test]
fn change_validates() {
    let form = form();
    let f = Field::new(&form, "name", FieldOptions::new().validator(not_test()));
    f.mount().unwrap();
    assert!(errors(&f).is_empty());

    f.handle_change("x");
    assert_eq!(errors(&f), ["error"]);
    assert!(!untracked(|sc| f.is_valid(sc)));

    f.handle_change("test");
    assert!(errors(&f).is_empty());
}

#[test]
fn mount_validates_only_mount_validators() {
    let mut cr = CallRecorder::new();
    let form = Form::new(FormOptions::new());
    let bare = SyncValidator::new(|_| {
        call!("bare");
        None
    });
    let on_mount = SyncValidator::new(|_| {
        call!("on_mount");
        None
    })
    .on_mount(true);
    let f = Field::new(
        &form,
        "name",
        FieldOptions::new().validator(bare).validator(on_mount),
    );
    f.mount().unwrap();
    cr.verify("on_mount");
    f.mount().unwrap();
    cr.verify(());
}

#[test]
fn change_after_touched() {
    let form = form();
    let f = Field::new(
        &form,
        "name",
        FieldOptions::new().validator(not_test().on_change_after_touched(true)),
    );
    f.mount().unwrap();
    f.handle_change("x");
    assert!(errors(&f).is_empty());

    f.handle_change_with("y", true);
    assert!(untracked(|sc| f.is_touched(sc)));
    assert_eq!(errors(&f), ["error"]);
}

#[test]
fn blur_touches_and_validates() {
    let form = form();
    let f = Field::new(
        &form,
        "name",
        FieldOptions::new().validator(not_test().on_change(false)),
    );
    f.mount().unwrap();
    f.handle_change("x");
    assert!(errors(&f).is_empty());
    assert!(!untracked(|sc| f.is_touched(sc)));

    f.handle_blur();
    assert!(untracked(|sc| f.is_touched(sc)));
    assert_eq!(errors(&f), ["error"]);
}

#[test]
fn change_clears_submit_errors() {
    let form = form();
    let f = Field::new(&form, "name", FieldOptions::new());
    f.mount().unwrap();
    f.set_error(Some("taken".into()));
    assert_eq!(errors(&f), ["taken"]);
    f.handle_change("other");
    assert!(errors(&f).is_empty());
}

#[test]
fn unmount_remove() {
    let form = form();
    let f = Field::new(&form, "name", FieldOptions::new());
    f.mount().unwrap();
    f.handle_change_with("x", true);
    f.unmount();
    assert!(form.field("name").is_none());
    assert_eq!(form.peek(), Value::object());
    assert!(!untracked(|sc| f.is_touched(sc)));
    assert!(!untracked(|sc| f.is_mounted(sc)));
}

#[test]
fn unmount_reset() {
    let form = form();
    let f = Field::new(
        &form,
        "name",
        FieldOptions::new().unmount(UnmountBehavior::Reset),
    );
    f.mount().unwrap();
    f.handle_change("x");
    f.unmount();
    assert!(form.field("name").is_none());
    assert_eq!(form.peek(), json(serde_json::json!({"name": "test"})));
}

#[test]
fn unmount_preserve() {
    let form = form();
    let f = Field::new(
        &form,
        "name",
        FieldOptions::new().unmount(UnmountBehavior::Preserve),
    );
    f.mount().unwrap();
    f.handle_change("x");
    f.unmount();
    assert!(form.field("name").is_some_and(|g| g.ptr_eq(&f)));
    assert_eq!(form.peek(), json(serde_json::json!({"name": "x"})));

    f.mount().unwrap();
    assert!(untracked(|sc| f.is_mounted(sc)));
}

#[test]
fn unmounted_field_stops_validating() {
    let mut cr = CallRecorder::new();
    let form = form();
    let f = Field::new(
        &form,
        "name",
        FieldOptions::new()
            .validator(SyncValidator::new(|v| {
                call!("{v}");
                None
            }))
            .unmount(UnmountBehavior::Preserve),
    );
    f.mount().unwrap();
    form.set_value_at("name", "a");
    cr.verify("a");
    f.unmount();
    form.set_value_at("name", "b");
    cr.verify(());
}

#[test]
fn blur_is_ignored_while_unmounted() {
    let form = form();
    let f = Field::new(
        &form,
        "name",
        FieldOptions::new()
            .validator(not_test())
            .unmount(UnmountBehavior::Preserve),
    );
    f.mount().unwrap();
    f.unmount();
    form.set_value_at("name", "");
    f.handle_blur();
    assert!(errors(&f).is_empty());
    assert!(!untracked(|sc| f.is_touched(sc)));
}

#[test]
fn mixins_are_validated_with_the_value() {
    let mut cr = CallRecorder::new();
    let form = Form::new(FormOptions::new().default_values(json(
        serde_json::json!({"password": "a", "confirm": "a"}),
    )));
    let confirm = Field::new(
        &form,
        "confirm",
        FieldOptions::new().mixin("password").validator(SyncValidator::new(|v| {
            call!("{v}");
            let items = v.as_array()?;
            (items[0] != items[1]).then(|| "mismatch".to_string())
        })),
    );
    confirm.mount().unwrap();
    confirm.handle_change("b");
    cr.verify(r#"["b","a"]"#);
    assert_eq!(errors(&confirm), ["mismatch"]);

    form.set_value_at("password", "b");
    cr.verify(r#"["b","b"]"#);
    assert!(errors(&confirm).is_empty());
}

#[test]
fn array_mutators() {
    let form = Form::new(FormOptions::new());
    let f = Field::new(
        &form,
        "items",
        FieldOptions::new().default_value(json(serde_json::json!([1, 2]))),
    );
    f.push(3);
    f.swap(0, 2);
    f.move_item(2, 0);
    f.push_at(1, 9);
    f.remove(3);
    f.insert(0, 0);
    assert_eq!(f.peek(), json(serde_json::json!([0, 9, 3])));
}

#[test]
fn value_as_typed() {
    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Address {
        city: String,
        zip: u32,
    }
    let form = Form::new(FormOptions::new().default_values(json(
        serde_json::json!({"address": {"city": "Oslo", "zip": 150}}),
    )));
    let f = Field::new(&form, "address", FieldOptions::new());
    let address: Address = untracked(|sc| f.value_as(sc)).unwrap();
    assert_eq!(
        address,
        Address {
            city: "Oslo".into(),
            zip: 150
        }
    );
}

#[test]
fn reset_restores_default() {
    let form = form();
    let f = Field::new(&form, "name", FieldOptions::new().validator(not_test()));
    f.mount().unwrap();
    f.handle_change_with("x", true);
    assert_eq!(errors(&f), ["error"]);

    f.reset();
    assert_eq!(f.peek(), Value::from("test"));
    assert!(errors(&f).is_empty());
    assert!(!untracked(|sc| f.is_touched(sc)));
}

#[test]
fn effect_sees_field_value() {
    let mut cr = CallRecorder::new();
    let form = form();
    let f = Field::new(&form, "name", FieldOptions::new());
    f.mount().unwrap();
    let f0 = f.clone();
    let _e = effect(move |sc| call!("{}", f0.value(sc)));
    cr.verify("test");
    f.handle_change("x");
    cr.verify("x");
}

struct LengthAdapter;

impl ValidatorAdapter for LengthAdapter {
    fn sync(&self, schema: &Schema) -> Option<SyncValidateFn> {
        let max = *schema.downcast_ref::<usize>()?;
        Some(Rc::new(move |v: &Value| {
            (v.as_str()?.len() > max).then(|| format!("at most {max} characters"))
        }))
    }
    fn async_(&self, _schema: &Schema) -> Option<AsyncValidateFn> {
        None
    }
}

#[test]
fn schema_validator_needs_adapter() {
    let form = form();
    let f = Field::new(
        &form,
        "name",
        FieldOptions::new().validator(SyncValidator::schema(Schema::new(3_usize))),
    );
    assert!(matches!(f.mount(), Err(FormError::SyncValidatorNotFunction)));
    assert!(!untracked(|sc| f.is_mounted(sc)));

    let f = Field::new(
        &form,
        "nick",
        FieldOptions::new()
            .validator(SyncValidator::schema(Schema::new(3_usize)))
            .adapter(LengthAdapter),
    );
    f.mount().unwrap();
    f.handle_change("abcd");
    assert_eq!(errors(&f), ["at most 3 characters"]);
}

#[test]
fn form_adapter_is_inherited() {
    let form = Form::new(FormOptions::new().adapter(LengthAdapter));
    let f = Field::new(
        &form,
        "name",
        FieldOptions::new().async_validator(AsyncValidator::schema(Schema::new(3_usize))),
    );
    assert!(matches!(f.mount(), Err(FormError::AsyncValidatorNotFunction)));
}

fn counting_validator(ms: u64) -> AsyncValidator {
    let n = Rc::new(Cell::new(0));
    AsyncValidator::new(move |v: Value| {
        n.set(n.get() + 1);
        let n = n.get();
        call!("validate {n} {v}");
        async move {
            sleep(Duration::from_millis(ms)).await;
            Some(format!("error {n}"))
        }
    })
}

#[tokio::test(start_paused = true)]
async fn second_submit_supersedes_first() {
    let mut cr = CallRecorder::new();
    let form = form();
    let f = Field::new(
        &form,
        "name",
        FieldOptions::new().async_validator(counting_validator(100)),
    );
    f.mount().unwrap();

    let first = async {
        let value = f.handle_submit().await;
        assert!(errors(&f).is_empty());
        assert!(untracked(|sc| f.is_validating(sc)));
        value
    };
    let second = async {
        sleep(Duration::from_millis(50)).await;
        f.handle_submit().await
    };
    let (_, second) = futures::join!(first, second);
    assert_eq!(second, None);
    cr.verify(["validate 1 test", "validate 2 test"]);
    assert_eq!(errors(&f), ["error 2"]);
    assert!(!untracked(|sc| f.is_validating(sc)));
}

#[tokio::test(start_paused = true)]
async fn submit_returns_value_when_valid() {
    let form = form();
    let f = Field::new(
        &form,
        "name",
        FieldOptions::new().async_validator(AsyncValidator::new(|v: Value| async move {
            sleep(Duration::from_millis(10)).await;
            (v.as_str() != Some("test")).then(|| "error".to_string())
        })),
    );
    f.mount().unwrap();
    assert_eq!(f.handle_submit().await, Some(Value::from("test")));
}

#[tokio::test]
async fn submit_validates_field_that_was_never_mounted() {
    let form = Form::new(FormOptions::new().default_values(json(serde_json::json!({"name": ""}))));
    let f = Field::new(
        &form,
        "name",
        FieldOptions::new().validator(SyncValidator::new(|v: &Value| {
            v.as_str()
                .is_some_and(str::is_empty)
                .then(|| "required".to_string())
        })),
    );
    assert_eq!(f.handle_submit().await, None);
    assert_eq!(errors(&f), ["required"]);
}

#[tokio::test(start_paused = true)]
async fn debounced_change_validates_once() {
    LocalSet::new()
        .run_until(async {
            let mut cr = CallRecorder::new();
            let form = form();
            let validator = AsyncValidator::new(|v: Value| {
                call!("validate {v}");
                async move { (v.as_str() != Some("test")).then(|| "error".to_string()) }
            })
            .debounce(Duration::from_millis(100));
            let f = Field::new(&form, "name", FieldOptions::new().async_validator(validator));
            f.mount().unwrap();

            f.handle_change("a");
            assert!(untracked(|sc| f.is_validating(sc)));
            sleep(Duration::from_millis(50)).await;
            f.handle_change("b");
            sleep(Duration::from_millis(200)).await;

            cr.verify("validate b");
            assert_eq!(errors(&f), ["error"]);
            assert!(!untracked(|sc| f.is_validating(sc)));
        })
        .await;
}
