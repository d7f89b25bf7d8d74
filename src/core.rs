use std::{
    cell::RefCell,
    collections::VecDeque,
    mem::take,
    rc::{Rc, Weak},
};

use parse_display::Display;
use slabmap::SlabMap;


thread_local! {
    static GLOBALS: RefCell<Globals> = RefCell::new(Globals::new());
}

struct Globals {
    batch_depth: usize,
    is_flushing: bool,
    reactions: VecDeque<Weak<dyn Reaction>>,
}
impl Globals {
    fn new() -> Self {
        Self {
            batch_depth: 0,
            is_flushing: false,
            reactions: VecDeque::new(),
        }
    }
    fn with<T>(f: impl FnOnce(&mut Self) -> T) -> T {
        GLOBALS.with(|g| f(&mut g.borrow_mut()))
    }
    fn can_flush(&self) -> bool {
        self.batch_depth == 0 && !self.is_flushing
    }
}

/// A node that runs again when one of its dependencies changes.
pub(crate) trait Reaction: 'static {
    fn run(self: Rc<Self>);
}

/// Queue a reaction to be run at the end of the current write or batch.
pub(crate) fn schedule_reaction(reaction: Weak<dyn Reaction>) {
    Globals::with(|g| g.reactions.push_back(reaction));
}

/// Run every scheduled reaction unless a batch or another flush is in progress.
pub fn flush() {
    if !Globals::with(|g| {
        let can_flush = g.can_flush();
        if can_flush {
            g.is_flushing = true;
        }
        can_flush
    }) {
        return;
    }
    struct FlushGuard;
    impl Drop for FlushGuard {
        fn drop(&mut self) {
            Globals::with(|g| g.is_flushing = false);
        }
    }
    let _guard = FlushGuard;
    while let Some(reaction) = Globals::with(|g| g.reactions.pop_front()) {
        if let Some(reaction) = reaction.upgrade() {
            reaction.run();
        }
    }
}

/// Perform several writes while deferring effects until the outermost batch ends.
///
/// Computed signals stay consistent inside the batch because they are recomputed lazily on read.
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    struct BatchGuard;
    impl Drop for BatchGuard {
        fn drop(&mut self) {
            Globals::with(|g| g.batch_depth -= 1);
        }
    }
    Globals::with(|g| g.batch_depth += 1);
    let ret = {
        let _guard = BatchGuard;
        f()
    };
    flush();
    ret
}

/// Call a function with a [`SignalContext`] that does not track dependencies.
pub fn untracked<T>(f: impl FnOnce(&mut SignalContext) -> T) -> T {
    f(&mut SignalContext { sink: None })
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct BindKey(usize);

pub trait BindSink: 'static {
    fn notify(self: Rc<Self>);
}

pub trait BindSource: 'static {
    fn unbind(self: Rc<Self>, key: BindKey);
}

struct SourceBinding {
    source: Rc<dyn BindSource>,
    key: BindKey,
}

/// Dependencies recorded by one computation.
///
/// Dropping the bindings removes the computation from every source.
#[derive(Default)]
pub struct SourceBindings(Vec<SourceBinding>);

impl SourceBindings {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn clear(&mut self) {
        for b in take(&mut self.0) {
            b.source.unbind(b.key);
        }
    }

    /// Run `f` while recording every source it reads into `self`.
    ///
    /// The previous dependencies are released after `f` returns.
    pub fn update<T>(
        &mut self,
        sink: Weak<dyn BindSink>,
        f: impl FnOnce(&mut SignalContext) -> T,
    ) -> T {
        let mut s = Sink {
            sink,
            sources: SourceBindings::new(),
        };
        let ret = f(&mut SignalContext {
            sink: Some(&mut s),
        });
        *self = take(&mut s.sources);
        ret
    }
}
impl Drop for SourceBindings {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Computations that depend on one source.
#[derive(Default)]
pub struct SinkBindings(SlabMap<Weak<dyn BindSink>>);

impl SinkBindings {
    pub fn new() -> Self {
        Self(SlabMap::new())
    }
    pub fn bind(&mut self, this: Rc<dyn BindSource>, sc: &mut SignalContext) {
        let Some(sink) = &mut sc.sink else {
            return;
        };
        let key = BindKey(self.0.insert(sink.sink.clone()));
        sink.sources.0.push(SourceBinding { source: this, key });
    }
    pub fn unbind(&mut self, key: BindKey) {
        self.0.remove(key.0);
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    fn targets(&self) -> Vec<Weak<dyn BindSink>> {
        self.0.values().cloned().collect()
    }
}

/// Notify every sink of `sinks`.
///
/// The borrow of `sinks` is released before any sink is called.
/// Effects reached by the notification are queued, not run; see [`flush`].
pub fn notify_sinks(sinks: &RefCell<SinkBindings>) {
    let targets = sinks.borrow().targets();
    for target in targets {
        if let Some(target) = target.upgrade() {
            target.notify();
        }
    }
}

struct Sink {
    sink: Weak<dyn BindSink>,
    sources: SourceBindings,
}

/// Context for retrieving state and tracking dependencies.
pub struct SignalContext<'s> {
    sink: Option<&'s mut Sink>,
}

impl SignalContext<'_> {
    /// Call a function with a [`SignalContext`] that does not track dependencies.
    pub fn untrack<T>(&mut self, f: impl FnOnce(&mut SignalContext) -> T) -> T {
        untracked(f)
    }

    /// Returns `true` if reads through this context are recorded as dependencies.
    pub fn is_tracking(&self) -> bool {
        self.sink.is_some()
    }
}

#[non_exhaustive]
#[derive(Display, Debug)]
#[display("detect cyclic dependency")]
pub struct CyclicError {}

impl std::error::Error for CyclicError {}

pub(crate) fn borrow_or_cyclic<T>(cell: &RefCell<T>) -> std::cell::RefMut<'_, T> {
    match cell.try_borrow_mut() {
        Ok(b) => b,
        Err(_) => panic!("{}", CyclicError {}),
    }
}
