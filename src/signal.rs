use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use derive_ex::derive_ex;

use crate::{
    core::{
        borrow_or_cyclic, notify_sinks, BindKey, BindSink, BindSource, SinkBindings,
        SourceBindings,
    },
    SignalContext,
};


pub trait SignalNode: 'static {
    type Value: 'static;
    fn get(self: Rc<Self>, sc: &mut SignalContext) -> Self::Value;
    fn peek(self: Rc<Self>) -> Self::Value;
}

/// A read-only reactive value.
///
/// Computed signals are evaluated lazily and cached until one of their dependencies changes.
#[derive_ex(Clone, bound())]
pub struct Signal<T: 'static>(Rc<dyn SignalNode<Value = T>>);

impl<T: Clone + 'static> Signal<T> {
    pub fn new(f: impl Fn(&mut SignalContext) -> T + 'static) -> Self {
        Self::from_node(ComputedNode::new(f))
    }
    pub fn from_value(value: T) -> Self {
        Self::from_node(Rc::new(ConstantNode(value)))
    }
    pub fn from_node(node: Rc<impl SignalNode<Value = T>>) -> Self {
        Signal(node)
    }

    /// Gets the current value and adds a dependency on this signal to the specified `SignalContext`.
    pub fn get(&self, sc: &mut SignalContext) -> T {
        self.0.clone().get(sc)
    }

    /// Gets the current value without adding a dependency.
    pub fn peek(&self) -> T {
        self.0.clone().peek()
    }

    pub fn map<U: Clone + 'static>(&self, f: impl Fn(T) -> U + 'static) -> Signal<U> {
        let this = self.clone();
        Signal::new(move |sc| f(this.get(sc)))
    }
}
impl<T: Clone + std::fmt::Debug + 'static> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.peek(), f)
    }
}

pub trait ToSignal {
    type Value: 'static;
    fn to_signal(&self) -> Signal<Self::Value>;
}
impl<T: Clone + 'static> ToSignal for Signal<T> {
    type Value = T;
    fn to_signal(&self) -> Signal<T> {
        self.clone()
    }
}
impl<T: Clone + 'static> ToSignal for crate::State<T> {
    type Value = T;
    fn to_signal(&self) -> Signal<T> {
        crate::State::to_signal(self)
    }
}

struct ConstantNode<T>(T);

impl<T: Clone + 'static> SignalNode for ConstantNode<T> {
    type Value = T;
    fn get(self: Rc<Self>, _sc: &mut SignalContext) -> T {
        self.0.clone()
    }
    fn peek(self: Rc<Self>) -> T {
        self.0.clone()
    }
}

struct ComputedData<T> {
    value: Option<T>,
    sources: SourceBindings,
}

struct ComputedNode<T, F> {
    f: F,
    data: RefCell<ComputedData<T>>,
    is_dirty: Cell<bool>,
    sinks: RefCell<SinkBindings>,
    this: Weak<Self>,
}
impl<T, F> ComputedNode<T, F>
where
    T: Clone + 'static,
    F: Fn(&mut SignalContext) -> T + 'static,
{
    fn new(f: F) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            f,
            data: RefCell::new(ComputedData {
                value: None,
                sources: SourceBindings::new(),
            }),
            is_dirty: Cell::new(true),
            sinks: RefCell::new(SinkBindings::new()),
            this: this.clone(),
        })
    }
    fn value(&self) -> T {
        if self.is_dirty.get() {
            let mut d = borrow_or_cyclic(&self.data);
            self.is_dirty.set(false);
            let sink: Weak<dyn BindSink> = self.this.clone();
            let value = d.sources.update(sink, |sc| (self.f)(sc));
            d.value = Some(value);
        }
        match &self.data.borrow().value {
            Some(value) => value.clone(),
            None => unreachable!("computed value is evaluated before use"),
        }
    }
}
impl<T, F> SignalNode for ComputedNode<T, F>
where
    T: Clone + 'static,
    F: Fn(&mut SignalContext) -> T + 'static,
{
    type Value = T;
    fn get(self: Rc<Self>, sc: &mut SignalContext) -> T {
        self.sinks.borrow_mut().bind(self.clone(), sc);
        self.value()
    }
    fn peek(self: Rc<Self>) -> T {
        self.value()
    }
}
impl<T, F> BindSource for ComputedNode<T, F>
where
    T: 'static,
    F: 'static,
{
    fn unbind(self: Rc<Self>, key: BindKey) {
        self.sinks.borrow_mut().unbind(key);
    }
}
impl<T, F> BindSink for ComputedNode<T, F>
where
    T: 'static,
    F: 'static,
{
    fn notify(self: Rc<Self>) {
        if !self.is_dirty.replace(true) {
            notify_sinks(&self.sinks);
        }
    }
}
