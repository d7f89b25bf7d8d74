use std::{
    future::Future,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use futures::{future::LocalBoxFuture, FutureExt};
use parse_display::Display;

use crate::{FormError, Value};

use super::{Schema, ValidationEvent, ValidatorAdapter};

pub type SyncValidateFn = Rc<dyn Fn(&Value) -> Option<String>>;
pub type AsyncValidateFn = Rc<dyn Fn(Value) -> LocalBoxFuture<'static, Option<String>>>;

static NEXT_VALIDATOR_KEY: AtomicU64 = AtomicU64::new(0);

/// Identity of a validator, used as the slot of its errors.
///
/// Assigned once at construction and kept by clones, so a validator must be built once and reused
/// rather than rebuilt every time it is passed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display("#{0}")]
pub struct ValidatorKey(u64);

impl ValidatorKey {
    fn new() -> Self {
        Self(NEXT_VALIDATOR_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

/// Events a configured validator reacts to. `OnSubmit` is always enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorConfig {
    pub on_change: bool,
    /// Restrict `on_change` to fields that have been touched.
    pub on_change_after_touched: bool,
    pub on_blur: bool,
    pub on_mount: bool,
}
impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            on_change: true,
            on_change_after_touched: false,
            on_blur: true,
            on_mount: false,
        }
    }
}

fn is_eligible(config: Option<&ValidatorConfig>, event: ValidationEvent, is_touched: bool) -> bool {
    let Some(config) = config else {
        return event != ValidationEvent::OnMount;
    };
    match event {
        ValidationEvent::OnSubmit => true,
        ValidationEvent::OnMount => config.on_mount,
        ValidationEvent::OnBlur => config.on_blur,
        ValidationEvent::OnChange => {
            config.on_change && (!config.on_change_after_touched || is_touched)
        }
    }
}

#[derive(Clone)]
enum Source<F> {
    Fn(F),
    Schema(Schema),
}

macro_rules! config_setters {
    () => {
        fn config_mut(&mut self) -> &mut ValidatorConfig {
            self.config.get_or_insert_with(ValidatorConfig::default)
        }
        pub fn config(mut self, config: ValidatorConfig) -> Self {
            self.config = Some(config);
            self
        }
        pub fn on_change(mut self, value: bool) -> Self {
            self.config_mut().on_change = value;
            self
        }
        pub fn on_change_after_touched(mut self, value: bool) -> Self {
            self.config_mut().on_change_after_touched = value;
            self
        }
        pub fn on_blur(mut self, value: bool) -> Self {
            self.config_mut().on_blur = value;
            self
        }
        pub fn on_mount(mut self, value: bool) -> Self {
            self.config_mut().on_mount = value;
            self
        }
        pub fn key(&self) -> ValidatorKey {
            self.key
        }
    };
}

/// A synchronous validator: a function from the value to an optional error message.
///
/// Without an explicit event configuration the validator runs on every event except mount.
#[derive(Clone)]
pub struct SyncValidator {
    key: ValidatorKey,
    config: Option<ValidatorConfig>,
    source: Source<SyncValidateFn>,
}

impl SyncValidator {
    pub fn new(f: impl Fn(&Value) -> Option<String> + 'static) -> Self {
        Self {
            key: ValidatorKey::new(),
            config: None,
            source: Source::Fn(Rc::new(f)),
        }
    }

    /// A validator described by a schema, turned into a function by a [`ValidatorAdapter`] on mount.
    pub fn schema(schema: Schema) -> Self {
        Self {
            key: ValidatorKey::new(),
            config: None,
            source: Source::Schema(schema),
        }
    }

    config_setters!();

    pub(crate) fn resolve(
        &self,
        adapter: Option<&dyn ValidatorAdapter>,
    ) -> Result<ResolvedSync, FormError> {
        let f = match &self.source {
            Source::Fn(f) => f.clone(),
            Source::Schema(schema) => adapter
                .and_then(|a| a.sync(schema))
                .ok_or(FormError::SyncValidatorNotFunction)?,
        };
        Ok(ResolvedSync {
            key: self.key,
            config: self.config,
            f,
        })
    }
}

/// An asynchronous validator.
///
/// A newer call for the same validator cancels the older one. With a debounce interval the work
/// starts only after the interval passed without a newer call.
#[derive(Clone)]
pub struct AsyncValidator {
    key: ValidatorKey,
    config: Option<ValidatorConfig>,
    debounce: Option<Duration>,
    source: Source<AsyncValidateFn>,
}

impl AsyncValidator {
    pub fn new<Fut>(f: impl Fn(Value) -> Fut + 'static) -> Self
    where
        Fut: Future<Output = Option<String>> + 'static,
    {
        Self {
            key: ValidatorKey::new(),
            config: None,
            debounce: None,
            source: Source::Fn(Rc::new(move |value| f(value).boxed_local())),
        }
    }
    pub fn schema(schema: Schema) -> Self {
        Self {
            key: ValidatorKey::new(),
            config: None,
            debounce: None,
            source: Source::Schema(schema),
        }
    }

    pub fn debounce(mut self, interval: Duration) -> Self {
        self.debounce = Some(interval);
        self
    }

    config_setters!();

    pub(crate) fn resolve(
        &self,
        adapter: Option<&dyn ValidatorAdapter>,
    ) -> Result<ResolvedAsync, FormError> {
        let f = match &self.source {
            Source::Fn(f) => f.clone(),
            Source::Schema(schema) => adapter
                .and_then(|a| a.async_(schema))
                .ok_or(FormError::AsyncValidatorNotFunction)?,
        };
        Ok(ResolvedAsync {
            key: self.key,
            config: self.config,
            debounce: self.debounce,
            f,
        })
    }
}

pub(crate) struct ResolvedSync {
    pub key: ValidatorKey,
    config: Option<ValidatorConfig>,
    pub f: SyncValidateFn,
}
impl ResolvedSync {
    pub fn is_eligible(&self, event: ValidationEvent, is_touched: bool) -> bool {
        is_eligible(self.config.as_ref(), event, is_touched)
    }
}

pub(crate) struct ResolvedAsync {
    pub key: ValidatorKey,
    config: Option<ValidatorConfig>,
    pub debounce: Option<Duration>,
    pub f: AsyncValidateFn,
}
impl ResolvedAsync {
    pub fn is_eligible(&self, event: ValidationEvent, is_touched: bool) -> bool {
        is_eligible(self.config.as_ref(), event, is_touched)
    }
}
