use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use crate::{
    core::{flush, schedule_reaction, BindSink, Reaction, SourceBindings},
    SignalContext, Subscription,
};

#[cfg(test)]
mod tests;

/// Call a function now and again each time a dependency changes.
///
/// The function runs once the current write or [`batch`](crate::batch) has finished.
/// If a dependency changes several times within one batch, the function is called once.
///
/// If the [`Subscription`] returned from this function is dropped, the function will not be called again.
pub fn effect(f: impl FnMut(&mut SignalContext) + 'static) -> Subscription {
    let node = EffectNode::new(f);
    node.schedule();
    flush();
    Subscription::from_rc(node)
}

struct EffectData<F> {
    f: F,
    sources: SourceBindings,
}

struct EffectNode<F> {
    data: RefCell<EffectData<F>>,
    is_scheduled: Cell<bool>,
    this: Weak<Self>,
}
impl<F> EffectNode<F>
where
    F: FnMut(&mut SignalContext) + 'static,
{
    fn new(f: F) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            data: RefCell::new(EffectData {
                f,
                sources: SourceBindings::new(),
            }),
            is_scheduled: Cell::new(false),
            this: this.clone(),
        })
    }

    fn schedule(&self) {
        if !self.is_scheduled.replace(true) {
            let this: Weak<dyn Reaction> = self.this.clone();
            schedule_reaction(this);
        }
    }
}

impl<F> Reaction for EffectNode<F>
where
    F: FnMut(&mut SignalContext) + 'static,
{
    fn run(self: Rc<Self>) {
        self.is_scheduled.set(false);
        let Ok(mut d) = self.data.try_borrow_mut() else {
            // still running further up the stack; run again afterwards
            self.schedule();
            return;
        };
        let d = &mut *d;
        let sink: Weak<dyn BindSink> = self.this.clone();
        let f = &mut d.f;
        d.sources.update(sink, |sc| f(sc));
    }
}

impl<F> BindSink for EffectNode<F>
where
    F: FnMut(&mut SignalContext) + 'static,
{
    fn notify(self: Rc<Self>) {
        self.schedule();
    }
}
