use std::{any::Any, fmt, rc::Rc};

use super::{AsyncValidateFn, SyncValidateFn};

/// An opaque validation schema from an external library.
#[derive(Clone)]
pub struct Schema(Rc<dyn Any>);

impl Schema {
    pub fn new<T: Any>(schema: T) -> Self {
        Self(Rc::new(schema))
    }
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}
impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Schema(..)")
    }
}

/// Turns schemas into validator functions.
///
/// Returning `None` means the adapter does not understand the schema; mounting the owner then fails.
pub trait ValidatorAdapter {
    fn sync(&self, schema: &Schema) -> Option<SyncValidateFn>;
    fn async_(&self, schema: &Schema) -> Option<AsyncValidateFn>;
}
