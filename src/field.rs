use std::{
    cell::RefCell,
    mem::take,
    rc::{Rc, Weak},
};

use futures::future::LocalBoxFuture;
use serde::de::DeserializeOwned;

use crate::{
    batch, effect,
    form::FormInner,
    get_at, remove_at, set_at, untracked, value_at_tracked, write_at,
    validation::{spawn_round, ErrorSource, Validation, ValidationEvent, ValidationPhase},
    DeepSignal, FieldOptions, Form, FormError, Path, SignalContext, State, Subscription,
    UnmountBehavior, ValidatorAdapter, Value,
};

#[cfg(test)]
mod tests;

/// A view of one path of a form's data, with its own touched flag and validation.
///
/// The field does not own its data. [`data`](Field::data) is the container at the field's path
/// inside the form, created with the field's default value when it is missing.
#[derive(Clone)]
pub struct Field(Rc<FieldInner>);

struct FieldInner {
    form: Weak<FormInner>,
    root: DeepSignal,
    path: Path,
    default_value: Value,
    options: FieldOptions,
    validation: Rc<Validation>,
    is_touched: State<bool>,
    is_mounted: State<bool>,
    effect: RefCell<Subscription>,
}

impl Field {
    /// Creates a field and registers it, unless another field is already registered at `path`.
    pub fn new(form: &Form, path: impl Into<Path>, options: FieldOptions) -> Self {
        let path = path.into();
        let default_value = options
            .default_value
            .clone()
            .unwrap_or_else(|| form.default_value_at(&path));
        let field = Field(Rc::new(FieldInner {
            form: form.downgrade(),
            root: form.data(),
            path,
            default_value,
            validation: Rc::new(Validation::new(options.validation)),
            options,
            is_touched: State::new(false),
            is_mounted: State::new(false),
            effect: RefCell::new(Subscription::empty()),
        }));
        field.0.validation.install_resolvable(
            &field.0.options.validators,
            &field.0.options.async_validators,
            field.adapter().as_deref(),
        );
        field.data();
        form.register_field(&field);
        field
    }

    pub fn path(&self) -> &Path {
        &self.0.path
    }
    pub fn form(&self) -> Option<Form> {
        Form::from_weak(&self.0.form)
    }
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The default value: the field's own, or else the form's default for this path.
    pub fn default_value(&self) -> &Value {
        &self.0.default_value
    }
    pub(crate) fn own_default_value(&self) -> Option<&Value> {
        self.0.options.default_value.as_ref()
    }

    /// The container holding this field's data, created on first access.
    pub fn data(&self) -> DeepSignal {
        match get_at(&self.0.root, &self.0.path) {
            Some(data) => data,
            None => set_at(&self.0.root, &self.0.path, &self.0.default_value),
        }
    }
    pub fn value(&self, sc: &mut SignalContext) -> Value {
        value_at_tracked(&self.0.root, &self.0.path, sc)
    }
    pub fn peek(&self) -> Value {
        untracked(|sc| self.value(sc))
    }
    /// The value converted into `T`.
    pub fn value_as<T: DeserializeOwned>(&self, sc: &mut SignalContext) -> Result<T, serde_json::Error> {
        self.value(sc).deserialize_into()
    }

    fn adapter(&self) -> Option<Rc<dyn ValidatorAdapter>> {
        self.0
            .options
            .adapter
            .clone()
            .or_else(|| self.form().and_then(|f| f.adapter()))
    }

    /// The value handed to validators: the field's value, followed by the mixin values if there are any.
    fn validated_value(&self, sc: &mut SignalContext) -> Value {
        with_mixins(&self.0.root, self.value(sc), &self.0.options.mixins, sc)
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
        let form = self.form();
        if let Some(form) = &form {
            form.register_field(self);
        }
        self.data();
        self.0.is_mounted.set(true);
        tracing::debug!(path = %self.0.path, "field mounted");
        spawn_round(self.0.validation.run(
            ValidationEvent::OnMount,
            &untracked(|sc| self.validated_value(sc)),
            self.0.is_touched.peek(),
        ));

        let field = Rc::downgrade(&self.0);
        let mut is_first = true;
        let subscription = effect(move |sc| {
            let Some(field) = field.upgrade().map(Field) else {
                return;
            };
            let value = field.validated_value(sc);
            if take(&mut is_first) {
                return;
            }
            field.0.validation.clear_event(ValidationEvent::OnSubmit);
            if field.0.is_mounted.peek() {
                spawn_round(field.0.validation.run(
                    ValidationEvent::OnChange,
                    &value,
                    field.0.is_touched.peek(),
                ));
            }
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
        batch(|| {
            self.0.is_touched.set_dedup(false);
            self.0.is_mounted.set(false);
            let form = self.form();
            match self.0.options.unmount {
                UnmountBehavior::Remove => {
                    remove_at(&self.0.root, &self.0.path);
                    if let Some(form) = &form {
                        form.unregister_field(self);
                    }
                }
                UnmountBehavior::Reset => {
                    write_at(&self.0.root, &self.0.path, &self.0.default_value);
                    if let Some(form) = &form {
                        form.unregister_field(self);
                    }
                }
                UnmountBehavior::Preserve => {}
            }
        });
        tracing::debug!(path = %self.0.path, behavior = ?self.0.options.unmount, "field unmounted");
    }
    pub fn is_mounted(&self, sc: &mut SignalContext) -> bool {
        self.0.is_mounted.get(sc)
    }

    /// Writes a new value. Ignored while the field is not mounted.
    pub fn handle_change(&self, value: impl Into<Value>) {
        self.handle_change_with(value, false)
    }
    /// Writes a new value and optionally marks the field as touched, notifying once.
    pub fn handle_change_with(&self, value: impl Into<Value>, touch: bool) {
        if !self.0.is_mounted.peek() {
            tracing::trace!(path = %self.0.path, "change ignored on unmounted field");
            return;
        }
        let value = value.into();
        batch(|| {
            write_at(&self.0.root, &self.0.path, &value);
            if touch {
                self.0.is_touched.set_dedup(true);
            }
        })
    }

    /// Marks the field as touched and validates it for the blur event.
    ///
    /// Async validators are driven on the current [`LocalSet`](tokio::task::LocalSet).
    /// Marks the field as touched and validates it for blur. Ignored while the field is not mounted.
    pub fn handle_blur(&self) {
        if !self.0.is_mounted.peek() {
            tracing::trace!(path = %self.0.path, "blur ignored on unmounted field");
            return;
        }
        spawn_round(self.blur_round());
    }
    pub(crate) fn blur_round(&self) -> Option<LocalBoxFuture<'static, ()>> {
        self.0.is_touched.set_dedup(true);
        if !self.0.is_mounted.peek() {
            return None;
        }
        self.0.validation.run(
            ValidationEvent::OnBlur,
            &untracked(|sc| self.validated_value(sc)),
            true,
        )
    }
    pub(crate) fn submit_round(&self) -> Option<LocalBoxFuture<'static, ()>> {
        self.0.validation.run(
            ValidationEvent::OnSubmit,
            &untracked(|sc| self.validated_value(sc)),
            self.0.is_touched.peek(),
        )
    }

    /// Validates the field for submission, mounted or not.
    ///
    /// Returns the value if the field is valid afterwards.
    pub async fn handle_submit(&self) -> Option<Value> {
        if let Some(round) = self.submit_round() {
            round.await;
        }
        untracked(|sc| self.is_valid(sc)).then(|| self.peek())
    }

    pub fn errors(&self, sc: &mut SignalContext) -> Vec<String> {
        self.0.validation.errors(sc)
    }
    /// `true` if no validator or submit callback left an error.
    pub fn is_valid(&self, sc: &mut SignalContext) -> bool {
        self.0.validation.is_valid(sc)
    }
    pub fn is_validating(&self, sc: &mut SignalContext) -> bool {
        self.0.validation.is_validating(sc)
    }
    pub fn is_touched(&self, sc: &mut SignalContext) -> bool {
        self.0.is_touched.get(sc)
    }
    pub fn is_dirty(&self, sc: &mut SignalContext) -> bool {
        self.value(sc) != self.0.default_value
    }

    /// Sets or clears an error that is not owned by a validator. It is cleared again on the next change.
    pub fn set_error(&self, error: Option<String>) {
        self.0.validation.set_error(
            ValidationPhase::Async,
            ValidationEvent::OnSubmit,
            ErrorSource::General,
            error,
        );
    }

    pub fn reset_touched(&self) {
        self.0.is_touched.set_dedup(false);
    }
    pub fn reset_validation(&self) {
        self.0.validation.reset();
    }
    /// Clears touched and validation state and writes the default value back.
    pub fn reset(&self) {
        batch(|| {
            self.reset_touched();
            self.reset_validation();
            write_at(&self.0.root, &self.0.path, &self.0.default_value);
        })
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.data().push(&value.into())
    }
    pub fn push_at(&self, index: usize, value: impl Into<Value>) {
        self.data().push_at(index, &value.into())
    }
    pub fn insert(&self, index: usize, value: impl Into<Value>) {
        self.data().insert(index, &value.into())
    }
    pub fn remove(&self, index: usize) {
        self.data().remove(index)
    }
    pub fn swap(&self, i: usize, j: usize) {
        self.data().swap(i, j)
    }
    pub fn move_item(&self, from: usize, to: usize) {
        self.data().move_item(from, to)
    }
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("path", &self.0.path)
            .field("value", &self.peek())
            .finish()
    }
}

/// `value` alone, or `[value, mixin...]` when mixin paths are given.
pub(crate) fn with_mixins(
    root: &DeepSignal,
    value: Value,
    mixins: &[Path],
    sc: &mut SignalContext,
) -> Value {
    if mixins.is_empty() {
        return value;
    }
    let mut values = vec![value];
    values.extend(mixins.iter().map(|path| value_at_tracked(root, path, sc)));
    Value::Array(values)
}
