use std::{
    cell::RefCell,
    mem::take,
    rc::{Rc, Weak},
};

use crate::{
    batch, effect, equal_ignoring_missing,
    field::with_mixins,
    form::FormInner,
    get_at_tracked, left_unequal_paths,
    path::{get_value_at, set_value_at},
    submit::{SubmitState, Submission},
    untracked, write_at,
    validation::{spawn_round, ErrorSource, Validation, ValidationEvent, ValidationPhase},
    DeepSignal, Field, FieldGroupOptions, Form, FormError, Path, SignalContext, State,
    Subscription, ValidatorAdapter, Value,
};


/// An aggregate over a fixed set of member paths of a form.
///
/// The group has no data of its own; [`value`](FieldGroup::value) projects the members out of the
/// form's data into one object. It subscribes to the member paths only, so changes elsewhere in the
/// form do not touch it.
#[derive(Clone)]
pub struct FieldGroup(Rc<FieldGroupInner>);

struct FieldGroupInner {
    form: Weak<FormInner>,
    root: DeepSignal,
    members: Vec<Path>,
    options: FieldGroupOptions,
    validation: Rc<Validation>,
    submit: SubmitState,
    is_mounted: State<bool>,
    is_disabled: State<bool>,
    effect: RefCell<Subscription>,
}

impl FieldGroup {
    pub(crate) fn new(form: &Form, members: Vec<Path>, options: FieldGroupOptions) -> Self {
        let group = Self(Rc::new(FieldGroupInner {
            form: form.downgrade(),
            root: form.data(),
            members,
            validation: Rc::new(Validation::new(options.validation)),
            options,
            submit: SubmitState::new(),
            is_mounted: State::new(false),
            is_disabled: State::new(false),
            effect: RefCell::new(Subscription::empty()),
        }));
        group.0.validation.install_resolvable(
            &group.0.options.validators,
            &group.0.options.async_validators,
            group.adapter().as_deref(),
        );
        group
    }
    fn adapter(&self) -> Option<Rc<dyn ValidatorAdapter>> {
        self.0
            .options
            .adapter
            .clone()
            .or_else(|| self.form().and_then(|f| f.adapter()))
    }

    pub fn members(&self) -> &[Path] {
        &self.0.members
    }
    pub fn form(&self) -> Option<Form> {
        Form::from_weak(&self.0.form)
    }

    /// The members' current values, nested under their paths.
    ///
    /// Members missing from the form's data are left out.
    pub fn value(&self, sc: &mut SignalContext) -> Value {
        let mut value = Value::object();
        for member in &self.0.members {
            if let Some(signal) = get_at_tracked(&self.0.root, member, sc) {
                set_value_at(&mut value, member, signal.get(sc));
            }
        }
        value
    }
    pub fn peek(&self) -> Value {
        untracked(|sc| self.value(sc))
    }
    fn validated_value(&self, sc: &mut SignalContext) -> Value {
        let value = self.value(sc);
        with_mixins(&self.0.root, value, &self.0.options.mixins, sc)
    }

    /// The members' default values, in the shape of [`value`](Self::value).
    pub fn default_value(&self, sc: &mut SignalContext) -> Value {
        let Some(form) = self.form() else {
            return Value::object();
        };
        let defaults = form.effective_defaults(sc);
        let mut value = Value::object();
        for member in &self.0.members {
            if let Some(default) = get_value_at(&defaults, member) {
                set_value_at(&mut value, member, default.clone());
            }
        }
        value
    }

    /// Registered fields at or below a member path.
    fn member_fields(&self, sc: &mut SignalContext) -> Vec<Field> {
        let Some(form) = self.form() else {
            return Vec::new();
        };
        form.fields(sc)
            .values()
            .filter(|f| self.0.members.iter().any(|m| f.path().starts_with(m)))
            .cloned()
            .collect()
    }

    pub fn mount(&self) -> Result<(), FormError> {
        if self.0.is_mounted.peek() {
            return Ok(());
        }
        self.0.validation.install(
            &self.0.options.validators,
            &self.0.options.async_validators,
            self.adapter().as_deref(),
        )?;
        self.0.is_mounted.set(true);
        tracing::debug!(members = ?self.0.members, "field group mounted");
        spawn_round(self.0.validation.run(
            ValidationEvent::OnMount,
            &untracked(|sc| self.validated_value(sc)),
            untracked(|sc| self.is_touched(sc)),
        ));

        let group = Rc::downgrade(&self.0);
        let mut is_first = true;
        let subscription = effect(move |sc| {
            let Some(group) = group.upgrade().map(FieldGroup) else {
                return;
            };
            let value = group.validated_value(sc);
            if take(&mut is_first) {
                return;
            }
            group.0.validation.clear_event(ValidationEvent::OnSubmit);
            let is_touched = untracked(|sc| group.is_touched(sc));
            spawn_round(
                group
                    .0
                    .validation
                    .run(ValidationEvent::OnChange, &value, is_touched),
            );
        });
        *self.0.effect.borrow_mut() = subscription;
        Ok(())
    }
    pub fn unmount(&self) {
        if !self.0.is_mounted.peek() {
            return;
        }
        self.0.effect.borrow_mut().unsubscribe();
        self.0.validation.abort_all();
        self.0.is_mounted.set(false);
    }
    pub fn is_mounted(&self, sc: &mut SignalContext) -> bool {
        self.0.is_mounted.get(sc)
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.0.is_disabled.set_dedup(disabled);
    }
    pub fn is_disabled(&self, sc: &mut SignalContext) -> bool {
        self.0.is_disabled.get(sc)
    }

    pub fn dirty_fields(&self, sc: &mut SignalContext) -> Vec<Path> {
        let defaults = self.default_value(sc);
        left_unequal_paths(&self.value(sc), &defaults)
    }
    pub fn is_dirty(&self, sc: &mut SignalContext) -> bool {
        let defaults = self.default_value(sc);
        !equal_ignoring_missing(&self.value(sc), &defaults)
    }
    pub fn is_touched(&self, sc: &mut SignalContext) -> bool {
        self.member_fields(sc).iter().any(|f| f.is_touched(sc))
    }
    pub fn is_valid_fields(&self, sc: &mut SignalContext) -> bool {
        self.member_fields(sc).iter().all(|f| f.is_valid(sc))
    }
    pub fn is_validating_fields(&self, sc: &mut SignalContext) -> bool {
        self.member_fields(sc).iter().any(|f| f.is_validating(sc))
    }

    /// Errors of the group itself, not including field errors.
    pub fn errors(&self, sc: &mut SignalContext) -> Vec<String> {
        self.0.validation.errors(sc)
    }
    pub fn is_valid(&self, sc: &mut SignalContext) -> bool {
        self.0.validation.is_valid(sc) && self.is_valid_fields(sc)
    }
    pub fn is_validating(&self, sc: &mut SignalContext) -> bool {
        self.0.validation.is_validating(sc) || self.is_validating_fields(sc)
    }
    pub fn is_submitting(&self, sc: &mut SignalContext) -> bool {
        self.0.submit.is_submitting(sc)
    }
    pub fn is_submitted(&self, sc: &mut SignalContext) -> bool {
        self.0.submit.is_submitted(sc)
    }
    pub fn is_submit_successful(&self, sc: &mut SignalContext) -> bool {
        self.0.submit.is_submit_successful(sc)
    }
    pub fn submit_count_successful(&self, sc: &mut SignalContext) -> u32 {
        self.0.submit.count_successful(sc)
    }
    pub fn submit_count_unsuccessful(&self, sc: &mut SignalContext) -> u32 {
        self.0.submit.count_unsuccessful(sc)
    }
    pub fn can_submit(&self, sc: &mut SignalContext) -> bool {
        self.is_mounted(sc)
            && !self.is_disabled(sc)
            && !self.is_submitting(sc)
            && !self.is_validating(sc)
            && self.is_valid(sc)
    }

    /// Validates the group and its member fields, then calls the group's submit callback.
    ///
    /// Does nothing unless [`can_submit`](Self::can_submit) holds.
    pub async fn handle_submit(&self) -> Result<(), FormError> {
        if !untracked(|sc| self.can_submit(sc)) {
            tracing::trace!(members = ?self.0.members, "field group cannot be submitted now");
            return Ok(());
        }
        let Some(form) = self.form() else {
            return Ok(());
        };
        Submission {
            state: &self.0.submit,
            validation: &self.0.validation,
            fields: untracked(|sc| self.member_fields(sc)),
            registry: untracked(|sc| form.fields(sc)),
            handler: self.0.options.on_submit.clone(),
        }
        .run(
            || untracked(|sc| self.validated_value(sc)),
            || self.peek(),
            || untracked(|sc| self.is_valid(sc)),
        )
        .await
    }

    /// Sets or clears the group's own error. It is cleared again by the next change.
    pub fn set_error(&self, error: Option<String>) {
        self.0.validation.set_error(
            ValidationPhase::Async,
            ValidationEvent::OnSubmit,
            ErrorSource::General,
            error,
        );
    }

    pub fn reset_submission_state(&self) {
        self.0.submit.reset();
    }
    pub fn reset_validation(&self) {
        batch(|| {
            self.0.validation.reset();
            for field in untracked(|sc| self.member_fields(sc)) {
                field.reset_validation();
            }
        })
    }
    pub fn reset_touched(&self) {
        batch(|| {
            for field in untracked(|sc| self.member_fields(sc)) {
                field.reset_touched();
            }
        })
    }

    pub(crate) fn reset_state(&self) {
        batch(|| {
            self.0.submit.reset();
            self.0.validation.reset();
        })
    }

    /// Clears the group's state and its member fields' state, then writes the members' defaults back.
    pub fn reset(&self) {
        batch(|| {
            self.reset_state();
            for field in untracked(|sc| self.member_fields(sc)) {
                field.reset_touched();
                field.reset_validation();
            }
            let Some(form) = self.form() else {
                return;
            };
            let defaults = untracked(|sc| form.effective_defaults(sc));
            for member in &self.0.members {
                if let Some(default) = get_value_at(&defaults, member) {
                    write_at(&self.0.root, member, default);
                }
            }
        })
    }
}

impl std::fmt::Debug for FieldGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldGroup")
            .field("members", &self.0.members)
            .field("value", &self.peek())
            .finish()
    }
}
