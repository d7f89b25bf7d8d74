use std::rc::Rc;

use crate::{
    AsyncValidator, ErrorSink, Path, SubmitError, SubmitHandler, SyncValidator, ValidationOptions,
    ValidatorAdapter, Value,
};

/// What happens to a field's data when the field is unmounted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnmountBehavior {
    /// Delete the data from the form and unregister the field.
    #[default]
    Remove,
    /// Write the default value back and unregister the field.
    Reset,
    /// Keep the data and the registration. The field is still validated when the form is submitted.
    Preserve,
}

macro_rules! validator_setters {
    () => {
        pub fn validator(mut self, validator: SyncValidator) -> Self {
            self.validators.push(validator);
            self
        }
        pub fn async_validator(mut self, validator: AsyncValidator) -> Self {
            self.async_validators.push(validator);
            self
        }
        pub fn accumulate_errors(mut self, value: bool) -> Self {
            self.validation.accumulate_errors = value;
            self
        }
        pub fn abort_siblings_on_error(mut self, value: bool) -> Self {
            self.validation.abort_siblings_on_error = value;
            self
        }
        pub fn adapter(mut self, adapter: impl ValidatorAdapter + 'static) -> Self {
            let adapter: Rc<dyn ValidatorAdapter> = Rc::new(adapter);
            self.adapter = Some(adapter);
            self
        }
    };
}

macro_rules! submit_setter {
    () => {
        /// Sets the callback invoked with the data of a valid submission.
        pub fn on_submit<Fut>(mut self, f: impl Fn(Value, ErrorSink) -> Fut + 'static) -> Self
        where
            Fut: std::future::Future<Output = Result<(), SubmitError>> + 'static,
        {
            self.on_submit = Some(SubmitHandler::new(f));
            self
        }
    };
}

#[derive(Clone, Default)]
pub struct FormOptions {
    pub default_values: Value,
    pub validators: Vec<SyncValidator>,
    pub async_validators: Vec<AsyncValidator>,
    pub validation: ValidationOptions,
    /// Used for schema validators of the form and of every field and group without an adapter of their own.
    pub adapter: Option<Rc<dyn ValidatorAdapter>>,
    pub on_submit: Option<SubmitHandler>,
}
impl FormOptions {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn default_values(mut self, values: impl Into<Value>) -> Self {
        self.default_values = values.into();
        self
    }
    validator_setters!();
    submit_setter!();
}

#[derive(Clone, Default)]
pub struct FieldOptions {
    /// Overrides the form's default value for this path.
    pub default_value: Option<Value>,
    pub validators: Vec<SyncValidator>,
    pub async_validators: Vec<AsyncValidator>,
    pub validation: ValidationOptions,
    pub adapter: Option<Rc<dyn ValidatorAdapter>>,
    /// Paths whose values are passed to the validators along with the field's own value.
    pub mixins: Vec<Path>,
    pub unmount: UnmountBehavior,
}
impl FieldOptions {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }
    pub fn mixin(mut self, path: impl Into<Path>) -> Self {
        self.mixins.push(path.into());
        self
    }
    pub fn unmount(mut self, behavior: UnmountBehavior) -> Self {
        self.unmount = behavior;
        self
    }
    validator_setters!();
}

#[derive(Clone, Default)]
pub struct FieldGroupOptions {
    pub validators: Vec<SyncValidator>,
    pub async_validators: Vec<AsyncValidator>,
    pub validation: ValidationOptions,
    pub adapter: Option<Rc<dyn ValidatorAdapter>>,
    pub mixins: Vec<Path>,
    pub on_submit: Option<SubmitHandler>,
}
impl FieldGroupOptions {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn mixin(mut self, path: impl Into<Path>) -> Self {
        self.mixins.push(path.into());
        self
    }
    validator_setters!();
    submit_setter!();
}
