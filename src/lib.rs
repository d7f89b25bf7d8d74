//! Reactive form state.
//!
//! A [`Form`] keeps its data as a tree of reactive containers ([`DeepSignal`]), so a write only
//! notifies readers of the subtree it touches. [`Field`]s and [`FieldGroup`]s are views on paths
//! of that tree and carry their own touched, dirty and validation state. Validators run on
//! lifecycle events; async validators are debounced and cancelled when superseded.
//!
//! Everything is single-threaded. Async validation started from a write is driven with
//! [`tokio::task::spawn_local`], so forms with async validators must live inside a
//! [`tokio::task::LocalSet`].

pub mod core;
mod deep_signal;
mod diff;
mod effect_fn;
mod error;
mod field;
mod field_group;
mod form;
mod options;
mod path;
mod signal;
mod state;
mod submit;
mod subscription;
pub mod validation;
mod value;

pub use crate::core::{batch, flush, untracked, SignalContext};
pub use deep_signal::*;
pub use diff::*;
pub use effect_fn::*;
pub use error::*;
pub use field::*;
pub use field_group::*;
pub use form::*;
pub use options::*;
pub use path::*;
pub use signal::*;
pub use state::*;
pub use submit::*;
pub use subscription::*;
pub use validation::{
    AsyncValidateFn, AsyncValidator, ErrorSource, FieldErrors, Schema, SyncValidateFn,
    SyncValidator, ValidationEvent, ValidationOptions, ValidationPhase, ValidatorAdapter,
    ValidatorConfig, ValidatorKey,
};
pub use value::*;
