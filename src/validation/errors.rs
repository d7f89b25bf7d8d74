use std::collections::BTreeMap;

use parse_display::Display;

use super::ValidatorKey;

/// The lifecycle event that triggered a validation round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display(style = "camelCase")]
pub enum ValidationEvent {
    OnMount,
    OnChange,
    OnBlur,
    OnSubmit,
}

/// Who wrote an error.
///
/// Each validator owns the slot under its key; `General` holds errors written from outside a validator,
/// such as the errors routed back from a submit callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSource {
    General,
    Validator(ValidatorKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationPhase {
    Sync,
    Async,
}

type EventErrors = BTreeMap<ValidationEvent, BTreeMap<ErrorSource, String>>;

/// The error slot of a field, a field group or a form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    sync: EventErrors,
    async_: EventErrors,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    fn phase_mut(&mut self, phase: ValidationPhase) -> &mut EventErrors {
        match phase {
            ValidationPhase::Sync => &mut self.sync,
            ValidationPhase::Async => &mut self.async_,
        }
    }

    pub fn get(
        &self,
        phase: ValidationPhase,
        event: ValidationEvent,
        source: ErrorSource,
    ) -> Option<&str> {
        let errors = match phase {
            ValidationPhase::Sync => &self.sync,
            ValidationPhase::Async => &self.async_,
        };
        Some(errors.get(&event)?.get(&source)?.as_str())
    }

    /// Stores or clears one error. Empty messages count as no error.
    ///
    /// Returns `true` if the slot changed.
    pub fn set(
        &mut self,
        phase: ValidationPhase,
        event: ValidationEvent,
        source: ErrorSource,
        error: Option<String>,
    ) -> bool {
        let errors = self.phase_mut(phase);
        match error.filter(|e| !e.is_empty()) {
            Some(error) => {
                let slot = errors.entry(event).or_default();
                if slot.get(&source) == Some(&error) {
                    return false;
                }
                slot.insert(source, error);
                true
            }
            None => {
                let Some(slot) = errors.get_mut(&event) else {
                    return false;
                };
                let removed = slot.remove(&source).is_some();
                if slot.is_empty() {
                    errors.remove(&event);
                }
                removed
            }
        }
    }

    /// Removes every error recorded for `event`. Returns `true` if anything was removed.
    pub fn clear_event(&mut self, event: ValidationEvent) -> bool {
        let sync = self.sync.remove(&event).is_some();
        let async_ = self.async_.remove(&event).is_some();
        sync || async_
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.is_empty();
        self.sync.clear();
        self.async_.clear();
        changed
    }

    pub fn is_empty(&self) -> bool {
        self.sync.is_empty() && self.async_.is_empty()
    }

    /// Every message, sync errors first, each phase ordered by event and then by source.
    pub fn messages(&self) -> Vec<String> {
        self.sync
            .values()
            .chain(self.async_.values())
            .flat_map(|slot| slot.values().cloned())
            .collect()
    }
}
