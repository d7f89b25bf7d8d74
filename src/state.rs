use std::{
    cell::{Ref, RefCell},
    rc::Rc,
};

use derive_ex::derive_ex;
use serde::{Deserialize, Serialize};

use crate::{
    core::{flush, notify_sinks, BindKey, BindSource, SinkBindings},
    signal::SignalNode,
    Signal, SignalContext,
};


/// Similar to `Rc<RefCell<T>>`, but with added functionality to observe changes.
#[derive(Default)]
#[derive_ex(Clone, bound())]
pub struct State<T: 'static>(Rc<StateNode<T>>);

impl<T: 'static> State<T> {
    /// Create a new `State` with the given initial value.
    pub fn new(value: T) -> Self {
        Self(Rc::new(StateNode {
            sinks: RefCell::new(SinkBindings::new()),
            value: RefCell::new(value),
        }))
    }

    /// Obtains a reference to the current value and adds a dependency on this `State` to the specified `SignalContext`.
    pub fn borrow<'a>(&'a self, sc: &mut SignalContext) -> Ref<'a, T> {
        self.0.bind(sc);
        self.0.value.borrow()
    }

    /// Gets the current value and adds a dependency on this `State` to the specified `SignalContext`.
    pub fn get(&self, sc: &mut SignalContext) -> T
    where
        T: Clone,
    {
        self.borrow(sc).clone()
    }

    /// Gets the current value without adding a dependency.
    pub fn peek(&self) -> T
    where
        T: Clone,
    {
        self.0.value.borrow().clone()
    }

    /// Calls `f` with the current value without adding a dependency.
    pub fn with_peek<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        f(&self.0.value.borrow())
    }

    /// Sets the value of the state and notifies the dependencies.
    pub fn set(&self, value: T) {
        *self.0.value.borrow_mut() = value;
        self.0.notify();
    }

    /// Sets the value of the state and notifies the dependencies only if the current state is different from the specified value.
    ///
    /// Returns `true` if the value was changed.
    pub fn set_dedup(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        {
            let mut this_value = self.0.value.borrow_mut();
            if *this_value == value {
                return false;
            }
            *this_value = value;
        }
        self.0.notify();
        true
    }

    /// Modifies the value in place and notifies the dependencies if `f` returns `true`.
    pub fn update(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        let changed = f(&mut self.0.value.borrow_mut());
        if changed {
            self.0.notify();
        }
        changed
    }

    /// Returns `true` if both handles refer to the same state.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Returns a `Signal` representing this state.
    pub fn to_signal(&self) -> Signal<T>
    where
        T: Clone,
    {
        Signal::from_node(self.0.clone())
    }
}
impl<T: std::fmt::Debug> std::fmt::Debug for State<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.value.try_borrow() {
            Ok(value) => std::fmt::Debug::fmt(&*value, f),
            Err(_) => write!(f, "<borrowed>"),
        }
    }
}
impl<T> Serialize for State<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        match self.0.value.try_borrow() {
            Ok(value) => T::serialize(&*value, serializer),
            Err(_) => Err(serde::ser::Error::custom("borrowed")),
        }
    }
}
impl<'de, T> Deserialize<'de> for State<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<State<T>, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        T::deserialize(deserializer).map(|value| State::new(value))
    }
}

#[derive(Default)]
struct StateNode<T: 'static> {
    sinks: RefCell<SinkBindings>,
    value: RefCell<T>,
}
impl<T: 'static> StateNode<T> {
    fn bind(self: &Rc<Self>, sc: &mut SignalContext) {
        self.sinks.borrow_mut().bind(self.clone(), sc);
    }
    fn notify(&self) {
        notify_sinks(&self.sinks);
        flush();
    }
}

impl<T: 'static> BindSource for StateNode<T> {
    fn unbind(self: Rc<Self>, key: BindKey) {
        self.sinks.borrow_mut().unbind(key);
    }
}

impl<T: Clone + 'static> SignalNode for StateNode<T> {
    type Value = T;
    fn get(self: Rc<Self>, sc: &mut SignalContext) -> T {
        self.bind(sc);
        self.value.borrow().clone()
    }
    fn peek(self: Rc<Self>) -> T {
        self.value.borrow().clone()
    }
}
