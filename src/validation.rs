use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
};

use futures::{
    future::{join_all, AbortHandle, Abortable, LocalBoxFuture},
    FutureExt,
};

use crate::{FormError, SignalContext, State, Value};

mod adapter;
mod errors;
mod validator;

pub use adapter::*;
pub use errors::*;
pub use validator::*;

use validator::{ResolvedAsync, ResolvedSync};

#[cfg(test)]
mod tests;

/// How a validation round treats failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Keep running sync validators after the first error, and run the async ones as well.
    pub accumulate_errors: bool,
    /// Cancel the other async validators of a round once one of them reports an error.
    pub abort_siblings_on_error: bool,
}

#[derive(Default)]
struct Validators {
    sync: Vec<ResolvedSync>,
    async_: Vec<ResolvedAsync>,
}

/// Validation state of one owner (a form, a field group or a field).
pub(crate) struct Validation {
    errors: State<FieldErrors>,
    is_validating: State<bool>,
    validators: RefCell<Rc<Validators>>,
    options: ValidationOptions,
    in_flight: RefCell<HashMap<ValidatorKey, AbortHandle>>,
}

impl Validation {
    pub fn new(options: ValidationOptions) -> Self {
        Self {
            errors: State::new(FieldErrors::new()),
            is_validating: State::new(false),
            validators: RefCell::new(Rc::new(Validators::default())),
            options,
            in_flight: RefCell::new(HashMap::new()),
        }
    }

    /// Resolves schema validators and installs the result.
    pub fn install(
        &self,
        sync: &[SyncValidator],
        async_: &[AsyncValidator],
        adapter: Option<&dyn ValidatorAdapter>,
    ) -> Result<(), FormError> {
        let validators = Validators {
            sync: sync
                .iter()
                .map(|v| v.resolve(adapter))
                .collect::<Result<_, _>>()?,
            async_: async_
                .iter()
                .map(|v| v.resolve(adapter))
                .collect::<Result<_, _>>()?,
        };
        *self.validators.borrow_mut() = Rc::new(validators);
        Ok(())
    }

    /// Installs every validator that resolves, leaving out the schema validators `adapter` cannot handle.
    ///
    /// Owners call this on construction so that submission validates them before they are mounted.
    pub fn install_resolvable(
        &self,
        sync: &[SyncValidator],
        async_: &[AsyncValidator],
        adapter: Option<&dyn ValidatorAdapter>,
    ) {
        let validators = Validators {
            sync: sync.iter().filter_map(|v| v.resolve(adapter).ok()).collect(),
            async_: async_.iter().filter_map(|v| v.resolve(adapter).ok()).collect(),
        };
        *self.validators.borrow_mut() = Rc::new(validators);
    }

    pub fn errors(&self, sc: &mut SignalContext) -> Vec<String> {
        self.errors.borrow(sc).messages()
    }
    pub fn is_valid(&self, sc: &mut SignalContext) -> bool {
        self.errors.borrow(sc).is_empty()
    }
    pub fn is_validating(&self, sc: &mut SignalContext) -> bool {
        self.is_validating.get(sc)
    }

    pub fn set_error(
        &self,
        phase: ValidationPhase,
        event: ValidationEvent,
        source: ErrorSource,
        error: Option<String>,
    ) {
        write_error(&self.errors, phase, event, source, error);
    }
    pub fn clear_event(&self, event: ValidationEvent) {
        self.errors.update(|e| e.clear_event(event));
    }

    /// Cancels every in-flight call and clears all errors.
    pub fn reset(&self) {
        self.abort_all();
        self.errors.update(|e| e.clear());
    }
    pub fn abort_all(&self) {
        for (_, handle) in self.in_flight.borrow_mut().drain() {
            handle.abort();
        }
        self.is_validating.set_dedup(false);
    }

    /// Runs one validation round for `event`.
    ///
    /// The sync phase runs before this returns. If async validators are eligible, the returned future
    /// drives them; the calls it supersedes have already been cancelled when this returns.
    pub fn run(
        &self,
        event: ValidationEvent,
        value: &Value,
        is_touched: bool,
    ) -> Option<LocalBoxFuture<'static, ()>> {
        let validators = self.validators.borrow().clone();
        for v in validators.sync.iter().filter(|v| v.is_eligible(event, is_touched)) {
            let error = (v.f)(value).filter(|e| !e.is_empty());
            let failed = error.is_some();
            self.set_error(
                ValidationPhase::Sync,
                event,
                ErrorSource::Validator(v.key),
                error,
            );
            if failed && !self.options.accumulate_errors {
                tracing::trace!(%event, key = %v.key, "sync validation failed, skipping the rest of the round");
                return None;
            }
        }

        let eligible: Vec<_> = validators
            .async_
            .iter()
            .filter(|v| v.is_eligible(event, is_touched))
            .collect();
        if eligible.is_empty() {
            return None;
        }
        let mut handles = Vec::with_capacity(eligible.len());
        let mut registrations = Vec::with_capacity(eligible.len());
        {
            let mut in_flight = self.in_flight.borrow_mut();
            for v in &eligible {
                let (handle, registration) = AbortHandle::new_pair();
                if let Some(old) = in_flight.insert(v.key, handle.clone()) {
                    old.abort();
                }
                handles.push(handle);
                registrations.push(registration);
            }
        }
        self.is_validating.set_dedup(true);

        let handles = Rc::new(handles);
        let siblings_aborted = Rc::new(Cell::new(false));
        let calls: Vec<_> = eligible
            .into_iter()
            .zip(registrations)
            .map(|(v, registration)| {
                let f = v.f.clone();
                let key = v.key;
                let debounce = v.debounce;
                let value = value.clone();
                let errors = self.errors.clone();
                let handles = handles.clone();
                let siblings_aborted = siblings_aborted.clone();
                let abort_siblings = self.options.abort_siblings_on_error;
                async move {
                    let work = async move {
                        if let Some(interval) = debounce {
                            tokio::time::sleep(interval).await;
                        }
                        f(value).await
                    };
                    match Abortable::new(work, registration).await {
                        Ok(error) => {
                            let error = error.filter(|e| !e.is_empty());
                            if error.is_some() && abort_siblings && !siblings_aborted.replace(true) {
                                for handle in handles.iter() {
                                    handle.abort();
                                }
                            }
                            write_error(
                                &errors,
                                ValidationPhase::Async,
                                event,
                                ErrorSource::Validator(key),
                                error,
                            );
                            true
                        }
                        Err(_) => {
                            tracing::trace!(%event, %key, "async validation superseded");
                            false
                        }
                    }
                }
            })
            .collect();

        let is_validating = self.is_validating.clone();
        Some(
            async move {
                let settled = join_all(calls).await;
                if settled.iter().all(|s| *s) || siblings_aborted.get() {
                    is_validating.set_dedup(false);
                }
            }
            .boxed_local(),
        )
    }
}

fn write_error(
    errors: &State<FieldErrors>,
    phase: ValidationPhase,
    event: ValidationEvent,
    source: ErrorSource,
    error: Option<String>,
) {
    errors.update(|e| e.set(phase, event, source, error));
}

/// Drives the async part of a round started outside of an `async` context.
///
/// Requires a [`tokio::task::LocalSet`].
pub(crate) fn spawn_round(round: Option<LocalBoxFuture<'static, ()>>) {
    if let Some(round) = round {
        tokio::task::spawn_local(round);
    }
}
