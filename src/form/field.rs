//! Field adapters
//!
//! Each adapter binds one input primitive (text box, checkbox, textarea) to
//! one slot of a `FormState`. Adapters forward edits and blurs to the
//! container and produce a serializable `FieldView` for the templates.

use serde_derive::Serialize;

use crate::form::validation::error_message;
use crate::form::{FieldHandle, FormState, FormValue};

/// Everything a template needs to draw one input.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldView {
    pub name: String,
    pub id: String,
    pub kind: &'static str,
    pub label: String,
    pub placeholder: String,
    pub value: String,
    pub checked: bool,
    pub disabled: bool,
    pub readonly: bool,
    pub autocomplete: Option<&'static str>,
    pub error: Option<&'static str>,
    pub test_id: String,
}

/// Common surface of the adapters.
pub trait FieldAdapter {
    fn handle(&self) -> &FieldHandle;

    /// Replays a browser submission of this field: the posted value is
    /// applied as a change followed by a blur. Disabled inputs are not
    /// posted by browsers, so disabled fields are left untouched.
    fn apply_posted(&self, form: &mut FormState, posted: Option<&str>);

    /// `disabled` adds an external reason (an in-flight request) on top of
    /// the field's own `disabled_when` rule.
    fn view(&self, form: &FormState, disabled: bool) -> FieldView;
}

fn base_view(form: &FormState, field: &FieldHandle, kind: &'static str, disabled: bool) -> FieldView {
    let (value, checked) = match form.value(field) {
        FormValue::Text(text) => (text.clone(), false),
        FormValue::Bool(flag) => (String::new(), *flag),
    };

    FieldView {
        name: field.name().to_string(),
        id: field.name().replace('.', "_"),
        kind,
        label: String::new(),
        placeholder: String::new(),
        value,
        checked,
        disabled: disabled || !form.is_enabled(field),
        readonly: false,
        autocomplete: None,
        error: form.error(field).map(error_message),
        test_id: field.name().replace('.', "_"),
    }
}

/// Single-line text box.
pub struct TextInput {
    field: FieldHandle,
    label: String,
    placeholder: String,
    password: bool,
    autocomplete: Option<&'static str>,
}

impl TextInput {
    pub fn new(field: FieldHandle) -> TextInput {
        TextInput {
            field,
            label: String::new(),
            placeholder: String::new(),
            password: false,
            autocomplete: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> TextInput {
        self.label = label.into();
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> TextInput {
        self.placeholder = placeholder.into();
        self
    }

    pub fn password(mut self) -> TextInput {
        self.password = true;
        self
    }

    pub fn autocomplete(mut self, hint: &'static str) -> TextInput {
        self.autocomplete = Some(hint);
        self
    }

    pub fn on_input(&self, form: &mut FormState, raw: &str) -> bool {
        form.change(&self.field, raw)
    }

    pub fn on_blur(&self, form: &mut FormState) {
        form.blur(&self.field)
    }
}

impl FieldAdapter for TextInput {
    fn handle(&self) -> &FieldHandle {
        &self.field
    }

    fn apply_posted(&self, form: &mut FormState, posted: Option<&str>) {
        if !form.is_enabled(&self.field) {
            return;
        }
        if let Some(raw) = posted {
            self.on_input(form, raw);
            self.on_blur(form);
        }
    }

    fn view(&self, form: &FormState, disabled: bool) -> FieldView {
        let mut view = base_view(
            form,
            &self.field,
            if self.password { "password" } else { "text" },
            disabled,
        );
        view.label = self.label.clone();
        view.placeholder = self.placeholder.clone();
        view.autocomplete = self.autocomplete;
        // Passwords are never echoed back into the page
        if self.password {
            view.value.clear();
        }
        view
    }
}

/// Multi-line text area. Blur normalizers come from the field's options.
pub struct Textarea {
    field: FieldHandle,
    label: String,
    placeholder: String,
}

impl Textarea {
    pub fn new(field: FieldHandle) -> Textarea {
        Textarea {
            field,
            label: String::new(),
            placeholder: String::new(),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Textarea {
        self.label = label.into();
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Textarea {
        self.placeholder = placeholder.into();
        self
    }

    pub fn on_input(&self, form: &mut FormState, raw: &str) -> bool {
        form.change(&self.field, raw)
    }

    pub fn on_blur(&self, form: &mut FormState) {
        form.blur(&self.field)
    }
}

impl FieldAdapter for Textarea {
    fn handle(&self) -> &FieldHandle {
        &self.field
    }

    fn apply_posted(&self, form: &mut FormState, posted: Option<&str>) {
        if !form.is_enabled(&self.field) {
            return;
        }
        if let Some(raw) = posted {
            self.on_input(form, raw);
            self.on_blur(form);
        }
    }

    fn view(&self, form: &FormState, disabled: bool) -> FieldView {
        let mut view = base_view(form, &self.field, "textarea", disabled);
        view.label = self.label.clone();
        view.placeholder = self.placeholder.clone();
        view
    }
}

/// Boolean checkbox.
pub struct Checkbox {
    field: FieldHandle,
    title: String,
}

impl Checkbox {
    pub fn new(field: FieldHandle) -> Checkbox {
        Checkbox {
            field,
            title: String::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Checkbox {
        self.title = title.into();
        self
    }

    pub fn on_toggle(&self, form: &mut FormState, checked: bool) -> bool {
        form.change(&self.field, checked)
    }
}

impl FieldAdapter for Checkbox {
    fn handle(&self) -> &FieldHandle {
        &self.field
    }

    /// Browsers post checked boxes only, so absence means unchecked.
    fn apply_posted(&self, form: &mut FormState, posted: Option<&str>) {
        if !form.is_enabled(&self.field) {
            return;
        }
        self.on_toggle(form, posted.is_some());
        form.blur(&self.field);
    }

    fn view(&self, form: &FormState, disabled: bool) -> FieldView {
        let mut view = base_view(form, &self.field, "checkbox", disabled);
        view.label = self.title.clone();
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::validation::{remove_empty_lines, validate_required_value};
    use crate::form::{FieldOptions, ValidationMode};

    #[test]
    fn test_text_input_view_surfaces_error() {
        let mut form = FormState::new(ValidationMode::OnChange);
        let handle = form
            .register("username", FieldOptions::text("").validate(validate_required_value))
            .unwrap();
        let input = TextInput::new(handle).label("Username");

        input.on_input(&mut form, "admin");
        input.on_input(&mut form, "");

        let view = input.view(&form, false);
        assert_eq!(view.kind, "text");
        assert_eq!(view.label, "Username");
        assert_eq!(view.error, Some("Required field"));
    }

    #[test]
    fn test_password_value_not_rendered() {
        let mut form = FormState::new(ValidationMode::OnChange);
        let handle = form.register("password", FieldOptions::text("")).unwrap();
        let input = TextInput::new(handle).password();

        input.on_input(&mut form, "secret");

        let view = input.view(&form, false);
        assert_eq!(view.kind, "password");
        assert!(view.value.is_empty());
        assert_eq!(form.watch("password"), Some(&FormValue::text("secret")));
    }

    #[test]
    fn test_textarea_posted_value_is_normalized() {
        let mut form = FormState::new(ValidationMode::OnBlur);
        let handle = form
            .register("upstreams", FieldOptions::text("").on_blur(remove_empty_lines))
            .unwrap();
        let area = Textarea::new(handle);

        area.apply_posted(&mut form, Some("1.1.1.1\r\n\r\n8.8.8.8"));

        assert_eq!(form.watch("upstreams"), Some(&FormValue::text("1.1.1.1\n8.8.8.8")));
        assert!(form.is_dirty());
    }

    #[test]
    fn test_checkbox_absent_means_unchecked() {
        let mut form = FormState::new(ValidationMode::OnChange);
        let handle = form.register("enabled", FieldOptions::checkbox(true)).unwrap();
        let checkbox = Checkbox::new(handle);

        checkbox.apply_posted(&mut form, None);
        assert!(!form.watch_bool("enabled"));

        checkbox.apply_posted(&mut form, Some("on"));
        assert!(form.watch_bool("enabled"));
    }

    #[test]
    fn test_external_disable_flag() {
        let mut form = FormState::new(ValidationMode::OnChange);
        let handle = form.register("domain", FieldOptions::text("")).unwrap();
        let input = TextInput::new(handle);

        assert!(!input.view(&form, false).disabled);
        assert!(input.view(&form, true).disabled);
    }
}
