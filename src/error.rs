use std::error::Error;

use parse_display::Display;

/// Errors returned by [`Form`](crate::Form), [`Field`](crate::Field) and [`FieldGroup`](crate::FieldGroup).
#[derive(Display, Debug)]
pub enum FormError {
    /// A schema sync validator was given, but no adapter could turn it into a function.
    #[display("the sync validator must be a function")]
    SyncValidatorNotFunction,
    #[display("the async validator must be a function")]
    AsyncValidatorNotFunction,
    /// The submit callback escalated a failure.
    #[display("{0}")]
    Submit(Box<dyn Error>),
}

impl Error for FormError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FormError::Submit(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}
