use std::{error::Error, future::Future, rc::Rc};

use futures::{
    future::{join_all, LocalBoxFuture},
    FutureExt,
};
use indexmap::IndexMap;
use parse_display::Display;

use crate::{
    batch,
    validation::{ErrorSource, Validation, ValidationEvent, ValidationPhase},
    Field, FormError, Path, SignalContext, State, Value,
};


/// Failure reported by a submit callback.
#[derive(Display, Debug)]
pub enum SubmitError {
    /// Recorded as an error of the submitting form or group; the submission counts as unsuccessful.
    #[display("{0}")]
    Rejected(String),
    /// Returned to the caller of `handle_submit` as [`FormError::Submit`].
    #[display("{0}")]
    Escalated(Box<dyn Error>),
}
impl SubmitError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
    pub fn escalated(e: impl Into<Box<dyn Error>>) -> Self {
        Self::Escalated(e.into())
    }
}
impl Error for SubmitError {}

type SubmitFn = dyn Fn(Value, ErrorSink) -> LocalBoxFuture<'static, Result<(), SubmitError>>;

/// The callback invoked with the data of a valid submission.
#[derive(Clone)]
pub struct SubmitHandler(Rc<SubmitFn>);

impl SubmitHandler {
    pub fn new<Fut>(f: impl Fn(Value, ErrorSink) -> Fut + 'static) -> Self
    where
        Fut: Future<Output = Result<(), SubmitError>> + 'static,
    {
        Self(Rc::new(move |value, sink| f(value, sink).boxed_local()))
    }
    fn call(&self, value: Value, sink: ErrorSink) -> LocalBoxFuture<'static, Result<(), SubmitError>> {
        (self.0)(value, sink)
    }
}

/// Routes errors found by a submit callback back into the form.
///
/// The empty path addresses the submitting form or group itself; any other path addresses
/// the field registered at that path.
#[derive(Clone)]
pub struct ErrorSink {
    own: Rc<Validation>,
    fields: Rc<IndexMap<Path, Field>>,
}

impl ErrorSink {
    pub(crate) fn new(own: Rc<Validation>, fields: Rc<IndexMap<Path, Field>>) -> Self {
        Self { own, fields }
    }

    pub fn add_error(&self, path: impl Into<Path>, message: impl Into<String>) {
        let path = path.into();
        let message = Some(message.into());
        if path.is_root() {
            self.own.set_error(
                ValidationPhase::Async,
                ValidationEvent::OnSubmit,
                ErrorSource::General,
                message,
            );
        } else if let Some(field) = self.fields.get(&path) {
            field.set_error(message);
        } else {
            tracing::warn!(%path, "no field registered for submit error");
        }
    }

    pub fn add_errors<P: Into<Path>, S: Into<String>>(
        &self,
        errors: impl IntoIterator<Item = (P, S)>,
    ) {
        batch(|| {
            for (path, message) in errors {
                self.add_error(path, message);
            }
        })
    }
}

/// Submission status shared by forms and field groups.
pub(crate) struct SubmitState {
    is_submitting: State<bool>,
    is_submitted: State<bool>,
    is_submit_successful: State<bool>,
    count_successful: State<u32>,
    count_unsuccessful: State<u32>,
}

impl SubmitState {
    pub fn new() -> Self {
        Self {
            is_submitting: State::new(false),
            is_submitted: State::new(false),
            is_submit_successful: State::new(false),
            count_successful: State::new(0),
            count_unsuccessful: State::new(0),
        }
    }

    pub fn is_submitting(&self, sc: &mut SignalContext) -> bool {
        self.is_submitting.get(sc)
    }
    pub fn is_submitted(&self, sc: &mut SignalContext) -> bool {
        self.is_submitted.get(sc)
    }
    pub fn is_submit_successful(&self, sc: &mut SignalContext) -> bool {
        self.is_submit_successful.get(sc)
    }
    pub fn count_successful(&self, sc: &mut SignalContext) -> u32 {
        self.count_successful.get(sc)
    }
    pub fn count_unsuccessful(&self, sc: &mut SignalContext) -> u32 {
        self.count_unsuccessful.get(sc)
    }

    fn begin(&self) {
        self.is_submitting.set_dedup(true);
    }
    fn finish(&self, successful: bool) {
        batch(|| {
            self.is_submitting.set_dedup(false);
            self.is_submitted.set_dedup(true);
            self.is_submit_successful.set_dedup(successful);
            let count = if successful {
                &self.count_successful
            } else {
                &self.count_unsuccessful
            };
            count.update(|n| {
                *n += 1;
                true
            });
        })
    }
    fn abandon(&self) {
        self.is_submitting.set_dedup(false);
    }

    pub fn reset(&self) {
        batch(|| {
            self.is_submitting.set_dedup(false);
            self.is_submitted.set_dedup(false);
            self.is_submit_successful.set_dedup(false);
            self.count_successful.set_dedup(0);
            self.count_unsuccessful.set_dedup(0);
        })
    }
}

/// One submission of a form or a field group.
pub(crate) struct Submission<'a> {
    pub state: &'a SubmitState,
    pub validation: &'a Rc<Validation>,
    /// The fields to blur and validate along with the owner.
    pub fields: Vec<Field>,
    /// Every registered field, as targets of [`ErrorSink`].
    pub registry: Rc<IndexMap<Path, Field>>,
    pub handler: Option<SubmitHandler>,
}

impl Submission<'_> {
    pub async fn run(
        self,
        validated_value: impl Fn() -> Value,
        data: impl Fn() -> Value,
        is_valid: impl Fn() -> bool,
    ) -> Result<(), FormError> {
        self.state.begin();

        // The submit rounds below supersede the async part of every blur round.
        for field in &self.fields {
            drop(field.blur_round());
        }

        let mut rounds = Vec::new();
        rounds.extend(
            self.validation
                .run(ValidationEvent::OnSubmit, &validated_value(), true),
        );
        rounds.extend(self.fields.iter().filter_map(|f| f.submit_round()));
        join_all(rounds).await;

        if !is_valid() {
            tracing::debug!("submission rejected by validation");
            self.state.finish(false);
            return Ok(());
        }
        let Some(handler) = self.handler else {
            self.state.finish(true);
            return Ok(());
        };
        let sink = ErrorSink::new(self.validation.clone(), self.registry);
        match handler.call(data(), sink).await {
            Ok(()) => {
                let successful = is_valid();
                tracing::debug!(successful, "submission finished");
                self.state.finish(successful);
                Ok(())
            }
            Err(SubmitError::Rejected(message)) => {
                tracing::debug!(%message, "submission rejected by the callback");
                batch(|| {
                    self.validation.set_error(
                        ValidationPhase::Async,
                        ValidationEvent::OnSubmit,
                        ErrorSource::General,
                        Some(message),
                    );
                    self.state.finish(false);
                });
                Ok(())
            }
            Err(SubmitError::Escalated(e)) => {
                self.state.abandon();
                Err(FormError::Submit(e))
            }
        }
    }
}
