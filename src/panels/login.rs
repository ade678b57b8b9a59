//! Login form

use serde_derive::Serialize;

use crate::form::validation::validate_required_value;
use crate::form::{
    self, text_value, FieldAdapter, FieldOptions, FieldView, FormState, PostedValues, TextInput,
    ValidationMode,
};
use crate::panels::SubmitOutcome;
use crate::store::{self, Action, ConsoleStore, Flag};

const HOSTED_DOMAIN: [&str; 2] = ["adguardprivate", "com"];

/// `alice.adguardprivate.com` -> `Some("alice")`. Other hosts yield `None`.
pub fn extract_subdomain(hostname: &str) -> Option<&str> {
    let hostname = hostname.split(':').next().unwrap_or(hostname);
    let parts: Vec<&str> = hostname.split('.').collect();
    if parts.len() < 3 {
        return None;
    }

    let tail = &parts[parts.len() - 2..];
    if tail == &HOSTED_DOMAIN[..] && !parts[0].is_empty() {
        Some(parts[0])
    } else {
        None
    }
}

pub struct LoginForm {
    pub state: FormState,
    username: TextInput,
    password: TextInput,
}

impl LoginForm {
    /// The username is pre-filled from the hosted-service subdomain of
    /// `hostname`, when there is one.
    pub fn new(hostname: &str) -> form::Result<LoginForm> {
        let mut state = FormState::new(ValidationMode::OnChange);
        let username = state.register(
            "username",
            FieldOptions::text("").validate(validate_required_value),
        )?;
        let password = state.register(
            "password",
            FieldOptions::text("").validate(validate_required_value),
        )?;

        if let Some(subdomain) = extract_subdomain(hostname) {
            state.set_value(&username, subdomain, true);
        }

        Ok(LoginForm {
            state,
            username: TextInput::new(username)
                .label("Username")
                .placeholder("Enter username")
                .autocomplete("username"),
            password: TextInput::new(password)
                .label("Password")
                .placeholder("Enter password")
                .password()
                .autocomplete("current-password"),
        })
    }

    pub fn apply_posted(&mut self, posted: &PostedValues) {
        for field in [&self.username, &self.password].iter() {
            let value = posted.get(field.handle().name()).map(String::as_str);
            field.apply_posted(&mut self.state, value);
        }
    }

    pub fn username(&self) -> &str {
        self.state.value(self.username.handle()).as_str().unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginView {
    pub fields: Vec<FieldView>,
    pub processing: bool,
    pub submit_disabled: bool,
}

pub struct LoginPanel {
    store: ConsoleStore,
}

impl LoginPanel {
    pub fn new(store: ConsoleStore) -> LoginPanel {
        LoginPanel { store }
    }

    pub fn can_submit(&self, form: &LoginForm) -> bool {
        !self.store.is_processing(Flag::Login) && form.state.is_valid()
    }

    pub fn submit(&self, form: &mut LoginForm) -> store::Result<SubmitOutcome> {
        if self.store.is_processing(Flag::Login) {
            return Ok(SubmitOutcome::Suppressed);
        }

        let store = &self.store;
        let submission = form.state.handle_submit(|values| {
            store.dispatch(Action::Login {
                name: text_value(values, "username").trim().to_string(),
                password: text_value(values, "password").to_string(),
            })
        });

        SubmitOutcome::from_submission(submission)
    }

    pub fn view(&self, form: &LoginForm) -> LoginView {
        let processing = self.store.is_processing(Flag::Login);
        LoginView {
            fields: vec![
                form.username.view(&form.state, processing),
                form.password.view(&form.state, processing),
            ],
            processing,
            submit_disabled: !self.can_submit(form),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_subdomain() {
        assert_eq!(extract_subdomain("alice.adguardprivate.com"), Some("alice"));
        assert_eq!(extract_subdomain("alice.adguardprivate.com:8443"), Some("alice"));
        assert_eq!(extract_subdomain("a.b.adguardprivate.com"), Some("a"));
        assert_eq!(extract_subdomain("adguardprivate.com"), None);
        assert_eq!(extract_subdomain("alice.example.com"), None);
        assert_eq!(extract_subdomain("localhost"), None);
        assert_eq!(extract_subdomain(""), None);
    }

    #[test]
    fn test_autofill_is_validated_not_dirty() {
        let form = LoginForm::new("alice.adguardprivate.com").unwrap();
        let username = form.state.handle("username").unwrap();

        assert_eq!(form.username(), "alice");
        assert_eq!(form.state.error(&username), None);
        assert!(!form.state.is_dirty());
    }

    #[test]
    fn test_no_autofill_for_other_hosts() {
        let form = LoginForm::new("192.168.1.1:3000").unwrap();
        assert_eq!(form.username(), "");
        assert!(!form.state.is_valid());
    }
}
