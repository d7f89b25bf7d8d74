use std::{
    cell::RefCell,
    mem::take,
    rc::{Rc, Weak},
};

use indexmap::IndexMap;

use crate::{
    batch, effect, equal_ignoring_missing, left_unequal_paths,
    path::{get_value_at, set_value_at},
    signalify, untracked, value_at_tracked, write_at,
    submit::{SubmitState, Submission},
    validation::{spawn_round, ErrorSource, Validation, ValidationEvent, ValidationPhase},
    DeepSignal, Field, FieldGroup, FieldGroupOptions, FieldOptions, FormError, FormOptions, Path,
    SignalContext, State, Subscription, Value,
};


/// The root of a form: its data, its fields and groups, and its submission state.
///
/// `Form` is a cheap handle; clones share the same form. Fields and groups keep only a weak
/// reference back, so the form must be kept alive by its owner.
#[derive(Clone)]
pub struct Form(pub(crate) Rc<FormInner>);

pub(crate) struct FormInner {
    pub data: DeepSignal,
    pub default_values: Value,
    options: FormOptions,
    pub fields: State<Rc<IndexMap<Path, Field>>>,
    groups: State<Rc<IndexMap<Vec<Path>, FieldGroup>>>,
    validation: Rc<Validation>,
    submit: SubmitState,
    is_mounted: State<bool>,
    effect: RefCell<Subscription>,
}

impl Form {
    pub fn new(options: FormOptions) -> Self {
        let default_values = match &options.default_values {
            Value::Null => Value::object(),
            values => values.clone(),
        };
        let data = signalify(&default_values);
        let form = Self(Rc::new(FormInner {
            data,
            default_values,
            validation: Rc::new(Validation::new(options.validation)),
            options,
            fields: State::new(Rc::new(IndexMap::new())),
            groups: State::new(Rc::new(IndexMap::new())),
            submit: SubmitState::new(),
            is_mounted: State::new(false),
            effect: RefCell::new(Subscription::empty()),
        }));
        let options = &form.0.options;
        form.0.validation.install_resolvable(
            &options.validators,
            &options.async_validators,
            options.adapter.as_deref(),
        );
        form
    }
    pub(crate) fn from_weak(form: &Weak<FormInner>) -> Option<Self> {
        form.upgrade().map(Form)
    }
    pub(crate) fn downgrade(&self) -> Weak<FormInner> {
        Rc::downgrade(&self.0)
    }
    pub(crate) fn adapter(&self) -> Option<Rc<dyn crate::ValidatorAdapter>> {
        self.0.options.adapter.clone()
    }

    /// The reactive data of the whole form.
    pub fn data(&self) -> DeepSignal {
        self.0.data.clone()
    }
    pub fn default_values(&self) -> &Value {
        &self.0.default_values
    }
    pub fn value(&self, sc: &mut SignalContext) -> Value {
        self.0.data.get(sc)
    }
    pub fn peek(&self) -> Value {
        self.0.data.unsignalify()
    }
    pub fn value_at(&self, path: impl Into<Path>, sc: &mut SignalContext) -> Value {
        value_at_tracked(&self.0.data, &path.into(), sc)
    }
    pub fn set_value_at(&self, path: impl Into<Path>, value: impl Into<Value>) {
        write_at(&self.0.data, &path.into(), &value.into());
    }

    /// The field registered at `path`.
    pub fn field(&self, path: impl Into<Path>) -> Option<Field> {
        let path = path.into();
        self.0.fields.with_peek(|fields| fields.get(&path).cloned())
    }

    /// Returns the field registered at `path`, or creates and registers a new one.
    pub fn get_or_create_field(&self, path: impl Into<Path>, options: FieldOptions) -> Field {
        let path = path.into();
        match self.field(&path) {
            Some(field) => field,
            None => Field::new(self, path, options),
        }
    }

    pub(crate) fn register_field(&self, field: &Field) {
        self.0.fields.update(|fields| {
            if fields.contains_key(field.path()) {
                return false;
            }
            let mut new_fields = (**fields).clone();
            new_fields.insert(field.path().clone(), field.clone());
            *fields = Rc::new(new_fields);
            true
        });
    }
    pub(crate) fn unregister_field(&self, field: &Field) {
        self.0.fields.update(|fields| {
            if !fields.get(field.path()).is_some_and(|f| f.ptr_eq(field)) {
                return false;
            }
            let mut new_fields = (**fields).clone();
            new_fields.shift_remove(field.path());
            *fields = Rc::new(new_fields);
            true
        });
    }
    pub(crate) fn fields(&self, sc: &mut SignalContext) -> Rc<IndexMap<Path, Field>> {
        self.0.fields.get(sc)
    }

    pub fn field_group<P: Into<Path>>(&self, members: impl IntoIterator<Item = P>) -> Option<FieldGroup> {
        let key = group_key(members);
        self.0.groups.with_peek(|groups| groups.get(&key).cloned())
    }

    /// Returns the group over `members`, creating it on first use.
    ///
    /// Groups are identified by their member set, so the order of `members` does not matter for lookup.
    /// The options are only used when the group is created.
    pub fn get_or_create_field_group<P: Into<Path>>(
        &self,
        members: impl IntoIterator<Item = P>,
        options: FieldGroupOptions,
    ) -> FieldGroup {
        let mut ordered: Vec<Path> = Vec::new();
        for member in members {
            let member = member.into();
            if !ordered.contains(&member) {
                ordered.push(member);
            }
        }
        let key = group_key(ordered.iter());
        if let Some(group) = self.0.groups.with_peek(|groups| groups.get(&key).cloned()) {
            return group;
        }
        let group = FieldGroup::new(self, ordered, options);
        self.0.groups.update(|groups| {
            let mut new_groups = (**groups).clone();
            new_groups.insert(key, group.clone());
            *groups = Rc::new(new_groups);
            true
        });
        group
    }

    /// Default values with the explicit default of every registered field applied.
    pub(crate) fn effective_defaults(&self, sc: &mut SignalContext) -> Value {
        let mut defaults = self.0.default_values.clone();
        for field in self.fields(sc).values() {
            if let Some(value) = field.own_default_value() {
                set_value_at(&mut defaults, field.path(), value.clone());
            }
        }
        defaults
    }

    pub fn mount(&self) -> Result<(), FormError> {
        if self.0.is_mounted.peek() {
            return Ok(());
        }
        let options = &self.0.options;
        self.0.validation.install(
            &options.validators,
            &options.async_validators,
            options.adapter.as_deref(),
        )?;
        self.0.is_mounted.set(true);
        tracing::debug!("form mounted");
        spawn_round(self.0.validation.run(
            ValidationEvent::OnMount,
            &self.peek(),
            untracked(|sc| self.is_touched(sc)),
        ));

        let form = Rc::downgrade(&self.0);
        let mut is_first = true;
        let subscription = effect(move |sc| {
            let Some(form) = Form::from_weak(&form) else {
                return;
            };
            let value = form.value(sc);
            if take(&mut is_first) {
                return;
            }
            form.0.validation.clear_event(ValidationEvent::OnSubmit);
            let is_touched = untracked(|sc| form.is_touched(sc));
            spawn_round(form.0.validation.run(ValidationEvent::OnChange, &value, is_touched));
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
        tracing::debug!("form unmounted");
    }
    pub fn is_mounted(&self, sc: &mut SignalContext) -> bool {
        self.0.is_mounted.get(sc)
    }

    pub fn is_valid_fields(&self, sc: &mut SignalContext) -> bool {
        self.fields(sc).values().all(|f| f.is_valid(sc))
    }
    pub fn is_validating_fields(&self, sc: &mut SignalContext) -> bool {
        self.fields(sc).values().any(|f| f.is_validating(sc))
    }
    pub fn is_touched(&self, sc: &mut SignalContext) -> bool {
        self.fields(sc).values().any(|f| f.is_touched(sc))
    }

    /// Paths of the leaves whose current value differs from its default.
    pub fn dirty_fields(&self, sc: &mut SignalContext) -> Vec<Path> {
        let defaults = self.effective_defaults(sc);
        left_unequal_paths(&self.value(sc), &defaults)
    }
    pub fn is_dirty(&self, sc: &mut SignalContext) -> bool {
        let defaults = self.effective_defaults(sc);
        self.fields(sc).values().any(|f| f.is_dirty(sc))
            || !equal_ignoring_missing(&self.value(sc), &defaults)
    }

    /// Errors of the form itself, not including field errors.
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
            && !self.is_submitting(sc)
            && !self.is_validating(sc)
            && self.is_valid(sc)
    }

    /// Sets or clears an error of the form itself. It is cleared again on the next change of the data.
    pub fn set_error(&self, error: Option<String>) {
        self.0.validation.set_error(
            ValidationPhase::Async,
            ValidationEvent::OnSubmit,
            ErrorSource::General,
            error,
        );
    }

    /// Validates and submits the form.
    ///
    /// Does nothing unless [`can_submit`](Self::can_submit) holds. Every registered field is blurred and
    /// validated for submission together with the form; the submit callback only runs if all of them
    /// end up valid.
    pub async fn handle_submit(&self) -> Result<(), FormError> {
        if !untracked(|sc| self.can_submit(sc)) {
            tracing::trace!("form cannot be submitted now");
            return Ok(());
        }
        let registry = self.0.fields.peek();
        Submission {
            state: &self.0.submit,
            validation: &self.0.validation,
            fields: registry.values().cloned().collect(),
            registry,
            handler: self.0.options.on_submit.clone(),
        }
        .run(
            || self.peek(),
            || self.peek(),
            || untracked(|sc| self.is_valid(sc)),
        )
        .await
    }

    pub fn reset_submission_state(&self) {
        self.0.submit.reset();
    }
    pub fn reset_validation(&self) {
        batch(|| {
            self.0.validation.reset();
            for field in self.0.fields.peek().values() {
                field.reset_validation();
            }
        })
    }
    pub fn reset_touched(&self) {
        batch(|| {
            for field in self.0.fields.peek().values() {
                field.reset_touched();
            }
        })
    }

    /// Clears submission, validation, touched and error state, then writes every default value back.
    pub fn reset(&self) {
        batch(|| {
            self.reset_submission_state();
            self.reset_validation();
            self.reset_touched();
            for group in self.0.groups.peek().values() {
                group.reset_state();
            }
            match &self.0.default_values {
                Value::Object(defaults) => {
                    for (key, value) in defaults {
                        write_at(&self.0.data, &Path::from_segments([key]), value);
                    }
                }
                Value::Null => {}
                defaults => self.0.data.assign(defaults),
            }
            for field in self.0.fields.peek().values() {
                if let Some(value) = field.own_default_value() {
                    write_at(&self.0.data, field.path(), value);
                }
            }
        })
    }

    /// The default value of `path`, with field defaults taking precedence.
    pub(crate) fn default_value_at(&self, path: &Path) -> Value {
        if let Some(value) = self.field(path).and_then(|f| f.own_default_value().cloned()) {
            return value;
        }
        get_value_at(&self.0.default_values, path)
            .cloned()
            .unwrap_or_default()
    }
}

fn group_key<P: Into<Path>>(members: impl IntoIterator<Item = P>) -> Vec<Path> {
    let mut key: Vec<Path> = members.into_iter().map(Into::into).collect();
    key.sort();
    key.dedup();
    key
}

impl std::fmt::Debug for Form {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Form")
            .field("data", &self.peek())
            .field("fields", &self.0.fields.with_peek(|f| f.keys().cloned().collect::<Vec<_>>()))
            .finish()
    }
}
