use assert_call::{call, CallRecorder};

use crate::{batch, effect, State};

#[test]
fn test_effect() {
    let mut cr = CallRecorder::new();
    let s = State::new(10);

    let s0 = s.to_signal();
    let e = effect(move |sc| call!("{}", s0.get(sc)));
    cr.verify("10");

    s.set(20);
    cr.verify("20"); // called again because state changed

    drop(e);
    s.set(30);
    cr.verify(()); // not called again because effect was dropped
}

#[test]
fn effect_drops_stale_dependencies() {
    let mut cr = CallRecorder::new();
    let flag = State::new(true);
    let a = State::new(1);
    let b = State::new(2);
    let _e = effect({
        let flag = flag.clone();
        let a = a.clone();
        let b = b.clone();
        move |sc| {
            if flag.get(sc) {
                call!("a{}", a.get(sc));
            } else {
                call!("b{}", b.get(sc));
            }
        }
    });
    cr.verify("a1");

    flag.set(false);
    cr.verify("b2");

    a.set(5);
    cr.verify(());

    b.set(6);
    cr.verify("b6");
}

#[test]
fn effect_writing_state_runs_dependents_after() {
    let mut cr = CallRecorder::new();
    let src = State::new(1);
    let dst = State::new(0);
    let _copy = effect({
        let src = src.clone();
        let dst = dst.clone();
        move |sc| {
            dst.set_dedup(src.get(sc) * 100);
        }
    });
    let _log = effect({
        let dst = dst.clone();
        move |sc| call!("{}", dst.get(sc))
    });
    cr.verify("100");

    src.set(2);
    cr.verify("200");
}

#[test]
fn effect_in_batch_is_deferred() {
    let mut cr = CallRecorder::new();
    let s = State::new(1);
    batch(|| {
        let s0 = s.clone();
        let e = effect(move |sc| call!("{}", s0.get(sc)));
        cr.verify(());
        s.set(2);
        std::mem::forget(e);
    });
    cr.verify("2");
}
