//! Form-state container
//!
//! `FormState` is a per-form registry of controlled fields. Each registered
//! field owns its current value, its dirty/touched flags and its last
//! validation error. All writes go through the container (usually via the
//! field adapters in `form::field`) so that dirty and validation tracking
//! stay consistent.
//!
//! Lifecycle flags:
//!
//! * pristine -> dirty on the first change that alters a value
//! * untouched -> touched on the first blur
//! * idle -> submitting -> idle around each submission
//!
//! There is no terminal state; a container is reset by building a new one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::form::validation::Validator;
use crate::form::{FieldErrors, FormError, FormValue, FormValues, Result};

/// When field validators run, besides on submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    OnChange,
    OnBlur,
    OnSubmit,
}

/// Normalizer applied to a text value when its field loses focus.
pub type BlurTransform = fn(&str) -> String;

/// Registration options for one field.
#[derive(Clone)]
pub struct FieldOptions {
    default: FormValue,
    validators: Vec<Validator>,
    blur_transform: Option<BlurTransform>,
    disabled_when: Option<String>,
}

impl FieldOptions {
    pub fn text(default: impl Into<String>) -> FieldOptions {
        FieldOptions {
            default: FormValue::Text(default.into()),
            validators: Vec::new(),
            blur_transform: None,
            disabled_when: None,
        }
    }

    pub fn checkbox(default: bool) -> FieldOptions {
        FieldOptions {
            default: FormValue::Bool(default),
            validators: Vec::new(),
            blur_transform: None,
            disabled_when: None,
        }
    }

    pub fn validate(mut self, validator: Validator) -> FieldOptions {
        self.validators.push(validator);
        self
    }

    /// Commits `transform(value)` as a change whenever the field is blurred.
    pub fn on_blur(mut self, transform: BlurTransform) -> FieldOptions {
        self.blur_transform = Some(transform);
        self
    }

    /// Disables this field while the named boolean field is `true`.
    /// The value is kept while disabled.
    pub fn disabled_when(mut self, controller: impl Into<String>) -> FieldOptions {
        self.disabled_when = Some(controller.into());
        self
    }
}

static NEXT_FORM_ID: AtomicUsize = AtomicUsize::new(0);

/// Read by accessors given a handle that names no field of the form.
static MISSING_VALUE: FormValue = FormValue::Text(String::new());

/// Bound accessor token returned by `FormState::register`. A handle taken
/// from another form is resolved by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldHandle {
    form_id: usize,
    index: usize,
    name: String,
}

impl FieldHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

struct FieldSlot {
    name: String,
    value: FormValue,
    validators: Vec<Validator>,
    blur_transform: Option<BlurTransform>,
    disabled_when: Option<String>,
    dirty: bool,
    touched: bool,
    error: Option<&'static str>,
}

impl FieldSlot {
    fn run_validators(&self) -> Option<&'static str> {
        self.validators.iter().find_map(|validate| validate(&self.value))
    }
}

/// Outcome of a submission attempt.
#[derive(Debug, PartialEq)]
pub enum Submission<T> {
    /// Every validator passed and the submit handler ran.
    Submitted(T),
    /// At least one validator failed; the handler did not run.
    Invalid(FieldErrors),
    /// A previous submission is still in flight.
    Blocked,
}

impl<T> Submission<T> {
    pub fn is_submitted(&self) -> bool {
        matches!(self, Submission::Submitted(_))
    }
}

/// Proof of an in-flight submission, holding the submitted values.
#[derive(Debug)]
pub struct SubmitTicket {
    values: FormValues,
}

impl SubmitTicket {
    pub fn values(&self) -> &FormValues {
        &self.values
    }
}

pub struct FormState {
    id: usize,
    mode: ValidationMode,
    seed: FormValues,
    fields: Vec<FieldSlot>,
    index: HashMap<String, usize>,
    submitting: bool,
    submit_count: u32,
}

impl FormState {
    pub fn new(mode: ValidationMode) -> FormState {
        FormState::with_defaults(mode, FormValues::new())
    }

    /// Values in `defaults` take precedence over the per-field defaults
    /// given at registration.
    pub fn with_defaults(mode: ValidationMode, defaults: FormValues) -> FormState {
        FormState {
            id: NEXT_FORM_ID.fetch_add(1, Ordering::Relaxed),
            mode,
            seed: defaults,
            fields: Vec::new(),
            index: HashMap::new(),
            submitting: false,
            submit_count: 0,
        }
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    pub fn register(&mut self, name: &str, options: FieldOptions) -> Result<FieldHandle> {
        if self.index.contains_key(name) {
            return Err(FormError::DuplicateField(name.to_string()));
        }

        let value = self.seed.get(name).cloned().unwrap_or(options.default);
        let index = self.fields.len();
        self.fields.push(FieldSlot {
            name: name.to_string(),
            value,
            validators: options.validators,
            blur_transform: options.blur_transform,
            disabled_when: options.disabled_when,
            dirty: false,
            touched: false,
            error: None,
        });
        self.index.insert(name.to_string(), index);

        Ok(FieldHandle {
            form_id: self.id,
            index,
            name: name.to_string(),
        })
    }

    pub fn handle(&self, name: &str) -> Result<FieldHandle> {
        self.index
            .get(name)
            .map(|&index| FieldHandle {
                form_id: self.id,
                index,
                name: name.to_string(),
            })
            .ok_or_else(|| FormError::UnknownField(name.to_string()))
    }

    /// Slot index of `field` in this form, or `None` for a handle naming
    /// no field here.
    fn slot_index(&self, field: &FieldHandle) -> Option<usize> {
        if field.form_id == self.id {
            Some(field.index)
        } else {
            self.index.get(&field.name).copied()
        }
    }

    /// Value of `field`; blank text for a handle naming no field here.
    pub fn value(&self, field: &FieldHandle) -> &FormValue {
        match self.slot_index(field) {
            Some(index) => &self.fields[index].value,
            None => &MISSING_VALUE,
        }
    }

    /// Current value of a field by name, for conditional rendering.
    pub fn watch(&self, name: &str) -> Option<&FormValue> {
        self.index.get(name).map(|&index| &self.fields[index].value)
    }

    pub fn watch_bool(&self, name: &str) -> bool {
        self.watch(name).and_then(FormValue::as_bool).unwrap_or(false)
    }

    pub fn is_enabled(&self, field: &FieldHandle) -> bool {
        match self.slot_index(field).map(|index| &self.fields[index].disabled_when) {
            Some(Some(controller)) => !self.watch_bool(controller),
            Some(None) => true,
            None => false,
        }
    }

    /// Applies a user edit. Returns `false` when the field is disabled and
    /// the edit was ignored.
    pub fn change(&mut self, field: &FieldHandle, value: impl Into<FormValue>) -> bool {
        if !self.is_enabled(field) {
            log::debug!("Ignoring change to disabled or unknown field {}", field.name);
            return false;
        }

        let index = match self.slot_index(field) {
            Some(index) => index,
            None => return false,
        };

        let revalidate = self.mode == ValidationMode::OnChange || self.submit_count > 0;
        self.commit(index, value.into(), revalidate);
        true
    }

    /// Marks the field touched and applies its blur normalizer, if any.
    pub fn blur(&mut self, field: &FieldHandle) {
        let index = match self.slot_index(field) {
            Some(index) => index,
            None => return,
        };
        let enabled = self.is_enabled(field);
        let slot = &mut self.fields[index];
        slot.touched = true;

        if !enabled {
            return;
        }

        let normalized = match (&slot.value, slot.blur_transform) {
            (FormValue::Text(text), Some(transform)) => Some(transform(text)),
            _ => None,
        };

        let revalidate = self.mode == ValidationMode::OnBlur
            || self.submit_count > 0
            || self.fields[index].error.is_some();

        match normalized {
            Some(text) => self.commit(index, FormValue::Text(text), revalidate),
            None if revalidate => self.validate_slot(index),
            None => {}
        }
    }

    /// Programmatic write; does not mark the field dirty.
    pub fn set_value(&mut self, field: &FieldHandle, value: impl Into<FormValue>, should_validate: bool) {
        if let Some(index) = self.slot_index(field) {
            self.fields[index].value = value.into();
            if should_validate {
                self.validate_slot(index);
            }
        }
    }

    fn commit(&mut self, index: usize, value: FormValue, revalidate: bool) {
        let slot = &mut self.fields[index];
        if slot.value != value {
            slot.value = value;
            slot.dirty = true;
        }

        // A visible error is always re-checked so it clears once fixed.
        if revalidate || slot.error.is_some() {
            self.validate_slot(index);
        }
    }

    fn validate_slot(&mut self, index: usize) {
        let slot = &mut self.fields[index];
        slot.error = slot.run_validators();
    }

    pub fn error(&self, field: &FieldHandle) -> Option<&'static str> {
        self.slot_index(field).and_then(|index| self.fields[index].error)
    }

    pub fn errors(&self) -> FieldErrors {
        self.fields
            .iter()
            .filter_map(|slot| slot.error.map(|err| (slot.name.clone(), err)))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.fields.iter().any(|slot| slot.dirty)
    }

    pub fn is_dirty_field(&self, field: &FieldHandle) -> bool {
        self.slot_index(field).map_or(false, |index| self.fields[index].dirty)
    }

    pub fn is_touched(&self, field: &FieldHandle) -> bool {
        self.slot_index(field).map_or(false, |index| self.fields[index].touched)
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn submit_count(&self) -> u32 {
        self.submit_count
    }

    /// Whether every validator currently passes. Leaves error state alone.
    pub fn is_valid(&self) -> bool {
        self.fields.iter().all(|slot| slot.run_validators().is_none())
    }

    pub fn values(&self) -> FormValues {
        self.fields
            .iter()
            .map(|slot| (slot.name.clone(), slot.value.clone()))
            .collect()
    }

    /// Validates every field, records the errors and starts a submission.
    pub fn begin_submit(&mut self) -> Submission<SubmitTicket> {
        if self.submitting {
            log::debug!("Submission blocked: previous submission still in flight");
            return Submission::Blocked;
        }

        self.submit_count += 1;
        for index in 0..self.fields.len() {
            self.validate_slot(index);
        }

        let errors = self.errors();
        if !errors.is_empty() {
            return Submission::Invalid(errors);
        }

        self.submitting = true;
        Submission::Submitted(SubmitTicket {
            values: self.values(),
        })
    }

    pub fn finish_submit(&mut self, ticket: SubmitTicket) {
        drop(ticket);
        self.submitting = false;
    }

    /// Runs `on_valid` with the current values when every validator passes.
    pub fn handle_submit<T, F>(&mut self, on_valid: F) -> Submission<T>
    where
        F: FnOnce(&FormValues) -> T,
    {
        match self.begin_submit() {
            Submission::Submitted(ticket) => {
                let output = on_valid(ticket.values());
                self.finish_submit(ticket);
                Submission::Submitted(output)
            }
            Submission::Invalid(errors) => Submission::Invalid(errors),
            Submission::Blocked => Submission::Blocked,
        }
    }
}
