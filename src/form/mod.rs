use std::collections::{BTreeMap, HashMap};

use derive_more::Display;
use serde_derive::{Deserialize, Serialize};

pub mod field;
pub mod state;
pub mod validation;

pub use field::{Checkbox, FieldAdapter, FieldView, TextInput, Textarea};
pub use state::{
    FieldHandle, FieldOptions, FormState, Submission, SubmitTicket, ValidationMode,
};

/// Value held by one form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    Text(String),
    Bool(bool),
}

impl FormValue {
    pub fn text(value: impl Into<String>) -> FormValue {
        FormValue::Text(value.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FormValue::Text(s) => Some(s.as_str()),
            FormValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FormValue::Bool(b) => Some(*b),
            FormValue::Text(_) => None,
        }
    }

    /// Empty text or `false`.
    pub fn is_blank(&self) -> bool {
        match self {
            FormValue::Text(s) => s.trim().is_empty(),
            FormValue::Bool(b) => !b,
        }
    }
}

impl From<&str> for FormValue {
    fn from(value: &str) -> Self {
        FormValue::Text(value.to_string())
    }
}

impl From<String> for FormValue {
    fn from(value: String) -> Self {
        FormValue::Text(value)
    }
}

impl From<bool> for FormValue {
    fn from(value: bool) -> Self {
        FormValue::Bool(value)
    }
}

/// Field name to value, for the lifetime of one form.
pub type FormValues = BTreeMap<String, FormValue>;

/// Raw values of a submitted HTML form, field name to text.
pub type PostedValues = HashMap<String, String>;

/// Field name to error message key.
pub type FieldErrors = BTreeMap<String, &'static str>;

/// Reads a text value, treating a missing or boolean slot as empty.
pub fn text_value<'a>(values: &'a FormValues, name: &str) -> &'a str {
    values.get(name).and_then(FormValue::as_str).unwrap_or("")
}

/// Reads a boolean value, treating a missing or text slot as `false`.
pub fn bool_value(values: &FormValues, name: &str) -> bool {
    values.get(name).and_then(FormValue::as_bool).unwrap_or(false)
}

#[derive(Debug, Display, Clone, PartialEq)]
pub enum FormError {
    #[display(fmt = "field '{}' is already registered", _0)]
    DuplicateField(String),
    #[display(fmt = "field '{}' is not registered", _0)]
    UnknownField(String),
}

impl std::error::Error for FormError {}

pub type Result<T> = std::result::Result<T, FormError>;
