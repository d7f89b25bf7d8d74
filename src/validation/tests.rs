use std::{cell::Cell, rc::Rc, time::Duration};

use assert_call::{call, CallRecorder};
use rstest::rstest;
use tokio::time::sleep;

use crate::{effect, untracked, Value};

use super::{
    AsyncValidator, SyncValidator, Validation, ValidationEvent, ValidationOptions, ValidatorConfig,
};

fn validation(
    options: ValidationOptions,
    sync: &[SyncValidator],
    async_: &[AsyncValidator],
) -> Validation {
    let v = Validation::new(options);
    v.install(sync, async_, None).unwrap();
    v
}

fn errors(v: &Validation) -> Vec<String> {
    untracked(|sc| v.errors(sc))
}
fn is_validating(v: &Validation) -> bool {
    untracked(|sc| v.is_validating(sc))
}

fn fails(name: &'static str) -> SyncValidator {
    SyncValidator::new(move |_| {
        call!("{name}");
        Some(format!("{name} failed"))
    })
}

fn delayed(ms: u64) -> AsyncValidator {
    let n = Rc::new(Cell::new(0));
    AsyncValidator::new(move |value: Value| {
        n.set(n.get() + 1);
        let n = n.get();
        call!("start {n} {value}");
        async move {
            sleep(Duration::from_millis(ms)).await;
            Some(format!("error {n}"))
        }
    })
}

#[rstest]
#[case(None, ValidationEvent::OnMount, false, false)]
#[case(None, ValidationEvent::OnChange, false, true)]
#[case(None, ValidationEvent::OnBlur, false, true)]
#[case(None, ValidationEvent::OnSubmit, false, true)]
#[case(Some(ValidatorConfig::default()), ValidationEvent::OnMount, false, false)]
#[case(Some(ValidatorConfig { on_mount: true, ..Default::default() }), ValidationEvent::OnMount, false, true)]
#[case(Some(ValidatorConfig { on_change: false, ..Default::default() }), ValidationEvent::OnChange, true, false)]
#[case(Some(ValidatorConfig { on_change_after_touched: true, ..Default::default() }), ValidationEvent::OnChange, false, false)]
#[case(Some(ValidatorConfig { on_change_after_touched: true, ..Default::default() }), ValidationEvent::OnChange, true, true)]
#[case(Some(ValidatorConfig { on_blur: false, ..Default::default() }), ValidationEvent::OnBlur, false, false)]
#[case(Some(ValidatorConfig { on_change: false, on_blur: false, on_mount: false, on_change_after_touched: false }), ValidationEvent::OnSubmit, false, true)]
fn gating(
    #[case] config: Option<ValidatorConfig>,
    #[case] event: ValidationEvent,
    #[case] is_touched: bool,
    #[case] expected: bool,
) {
    let mut validator = SyncValidator::new(|_| Some("e".into()));
    if let Some(config) = config {
        validator = validator.config(config);
    }
    let v = validation(ValidationOptions::default(), &[validator], &[]);
    assert!(v.run(event, &Value::Null, is_touched).is_none());
    assert_eq!(!errors(&v).is_empty(), expected);
}

#[test]
fn sync_short_circuits_on_first_error() {
    let mut cr = CallRecorder::new();
    let v = validation(
        ValidationOptions::default(),
        &[fails("a"), fails("b")],
        &[delayed(10)],
    );
    assert!(v.run(ValidationEvent::OnChange, &Value::Null, false).is_none());
    cr.verify("a");
    assert_eq!(errors(&v), ["a failed"]);
    assert!(!is_validating(&v));
}

#[test]
fn accumulate_errors_runs_every_sync_validator() {
    let mut cr = CallRecorder::new();
    let options = ValidationOptions {
        accumulate_errors: true,
        ..Default::default()
    };
    let v = validation(options, &[fails("a"), fails("b")], &[]);
    v.run(ValidationEvent::OnChange, &Value::Null, false);
    cr.verify(["a", "b"]);
    assert_eq!(errors(&v), ["a failed", "b failed"]);
}

#[test]
fn unchanged_result_is_not_rewritten() {
    let mut cr = CallRecorder::new();
    let v = Rc::new(validation(
        ValidationOptions::default(),
        &[SyncValidator::new(|v: &Value| {
            (v.as_str() != Some("ok")).then(|| "bad".to_string())
        })],
        &[],
    ));
    let v0 = v.clone();
    let _e = effect(move |sc| call!("{:?}", v0.errors(sc)));
    cr.verify("[]");

    v.run(ValidationEvent::OnChange, &"x".into(), false);
    cr.verify(r#"["bad"]"#);
    v.run(ValidationEvent::OnChange, &"y".into(), false);
    cr.verify(());
    v.run(ValidationEvent::OnChange, &"ok".into(), false);
    cr.verify("[]");
}

#[test]
fn errors_are_kept_per_event() {
    let v = validation(ValidationOptions::default(), &[fails("a")], &[]);
    let mut cr = CallRecorder::new();
    v.run(ValidationEvent::OnChange, &Value::Null, false);
    v.run(ValidationEvent::OnBlur, &Value::Null, false);
    cr.verify(["a", "a"]);
    assert_eq!(errors(&v), ["a failed", "a failed"]);

    v.clear_event(ValidationEvent::OnBlur);
    assert_eq!(errors(&v), ["a failed"]);
}

#[tokio::test(start_paused = true)]
async fn async_result_is_written() {
    let mut cr = CallRecorder::new();
    let v = validation(ValidationOptions::default(), &[], &[delayed(100)]);
    let round = v.run(ValidationEvent::OnSubmit, &"a".into(), false).unwrap();
    assert!(is_validating(&v));
    round.await;
    cr.verify("start 1 a");
    assert_eq!(errors(&v), ["error 1"]);
    assert!(!is_validating(&v));
}

#[tokio::test(start_paused = true)]
async fn superseded_round_never_writes() {
    let mut cr = CallRecorder::new();
    let v = validation(ValidationOptions::default(), &[], &[delayed(100)]);
    let first = v.run(ValidationEvent::OnSubmit, &"a".into(), false).unwrap();
    let second = async {
        sleep(Duration::from_millis(50)).await;
        let round = v.run(ValidationEvent::OnSubmit, &"b".into(), false).unwrap();
        round.await;
    };
    let check_after_first = async {
        first.await;
        // the first round settled aborted: no error written, still validating
        assert_eq!(errors(&v), Vec::<String>::new());
        assert!(is_validating(&v));
    };
    futures::join!(check_after_first, second);
    cr.verify(["start 1 a", "start 2 b"]);
    assert_eq!(errors(&v), ["error 2"]);
    assert!(!is_validating(&v));
}

#[tokio::test(start_paused = true)]
async fn debounce_calls_only_the_latest() {
    let mut cr = CallRecorder::new();
    let v = validation(
        ValidationOptions::default(),
        &[],
        &[delayed(10).debounce(Duration::from_millis(100))],
    );
    let first = v.run(ValidationEvent::OnChange, &"a".into(), false).unwrap();
    let second = async {
        sleep(Duration::from_millis(50)).await;
        v.run(ValidationEvent::OnChange, &"b".into(), false)
            .unwrap()
            .await;
    };
    futures::join!(first, second);
    cr.verify("start 1 b");
    assert_eq!(errors(&v), ["error 1"]);
}

#[tokio::test(start_paused = true)]
async fn other_keys_are_not_superseded() {
    let mut cr = CallRecorder::new();
    let a = delayed(100);
    let b = delayed(100);
    let v = validation(ValidationOptions::default(), &[], &[a, b]);
    let round = v.run(ValidationEvent::OnSubmit, &Value::Null, false).unwrap();
    round.await;
    cr.verify(["start 1 null", "start 1 null"]);
    assert_eq!(errors(&v), ["error 1", "error 1"]);
}

#[tokio::test(start_paused = true)]
async fn abort_siblings_on_error() {
    let mut cr = CallRecorder::new();
    let fast = AsyncValidator::new(|_| async {
        sleep(Duration::from_millis(10)).await;
        Some("fast".to_string())
    });
    let slow = AsyncValidator::new(|_| async {
        sleep(Duration::from_millis(100)).await;
        call!("slow finished");
        Some("slow".to_string())
    });
    let options = ValidationOptions {
        abort_siblings_on_error: true,
        ..Default::default()
    };
    let v = validation(options, &[], &[fast, slow]);
    v.run(ValidationEvent::OnSubmit, &Value::Null, false)
        .unwrap()
        .await;
    cr.verify(());
    assert_eq!(errors(&v), ["fast"]);
    assert!(!is_validating(&v));
}

#[tokio::test(start_paused = true)]
async fn reset_cancels_in_flight_calls() {
    let mut cr = CallRecorder::new();
    let v = validation(ValidationOptions::default(), &[fails("a")], &[]);
    v.run(ValidationEvent::OnChange, &Value::Null, false);
    cr.verify("a");
    let v2 = validation(ValidationOptions::default(), &[], &[delayed(100)]);
    let round = v2.run(ValidationEvent::OnSubmit, &Value::Null, false).unwrap();
    v2.reset();
    round.await;
    cr.verify(());
    assert!(errors(&v2).is_empty());
    assert!(!is_validating(&v2));

    v.reset();
    assert!(errors(&v).is_empty());
}
