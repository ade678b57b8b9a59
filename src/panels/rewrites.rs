//! DNS rewrites panel and its DDNS helper
//!
//! The rewrite list lives in the store; the add/edit modal owns a short-lived
//! `RewriteForm` seeded from the modal's current entry.

use serde_derive::Serialize;

use crate::ddns::{self, DdnsOs};
use crate::form::validation::{validate_answer, validate_domain, validate_required_value};
use crate::form::{
    self, text_value, FieldAdapter, FieldOptions, FieldView, FormState, PostedValues, TextInput,
    ValidationMode,
};
use crate::panels::{mount, Confirm, DeleteOutcome, SubmitOutcome};
use crate::store::{self, Action, ConsoleStore, Flag, ModalKind, Rewrite};

pub struct RewriteForm {
    pub state: FormState,
    domain: TextInput,
    answer: TextInput,
}

impl RewriteForm {
    /// Edit forms start from `initial`, add forms start empty.
    pub fn new(initial: Option<&Rewrite>) -> form::Result<RewriteForm> {
        let mut state = FormState::new(ValidationMode::OnChange);
        let (domain, answer) = initial
            .map(|r| (r.domain.as_str(), r.answer.as_str()))
            .unwrap_or(("", ""));

        let domain = state.register(
            "domain",
            FieldOptions::text(domain)
                .validate(validate_required_value)
                .validate(validate_domain),
        )?;
        let answer = state.register(
            "answer",
            FieldOptions::text(answer)
                .validate(validate_required_value)
                .validate(validate_answer),
        )?;

        Ok(RewriteForm {
            state,
            domain: TextInput::new(domain)
                .label("Domain")
                .placeholder("example.org or *.example.org"),
            answer: TextInput::new(answer)
                .label("Answer")
                .placeholder("IP address or domain name"),
        })
    }

    pub fn apply_posted(&mut self, posted: &PostedValues) {
        for field in [&self.domain, &self.answer].iter() {
            let value = posted.get(field.handle().name()).map(String::as_str);
            field.apply_posted(&mut self.state, value);
        }
    }

    pub fn fields(&self, disabled: bool) -> Vec<FieldView> {
        vec![
            self.domain.view(&self.state, disabled),
            self.answer.view(&self.state, disabled),
        ]
    }

    fn rewrite(values: &form::FormValues) -> Rewrite {
        Rewrite::new(
            text_value(values, "domain").trim(),
            text_value(values, "answer").trim(),
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModalView {
    pub kind: ModalKind,
    pub title: &'static str,
    pub fields: Vec<FieldView>,
    pub submit_disabled: bool,
    /// Entry being edited, so the form can post it back.
    pub current: Option<Rewrite>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RewritesView {
    pub list: Vec<Rewrite>,
    pub loaded: bool,
    pub processing: bool,
    pub processing_delete: bool,
    pub add_disabled: bool,
    pub modal: Option<ModalView>,
    pub ddns: DdnsView,
}

pub struct RewritesPanel {
    store: ConsoleStore,
}

impl RewritesPanel {
    pub fn new(store: ConsoleStore) -> RewritesPanel {
        RewritesPanel { store }
    }

    pub fn mount(&self, force: bool) -> store::Result<()> {
        mount(&self.store, |s| s.rewrites.loaded, force, Action::FetchRewrites)
    }

    pub fn open_add(&self) -> store::Result<()> {
        self.open(ModalKind::AddRewrite, None)
    }

    pub fn open_edit(&self, rewrite: Rewrite) -> store::Result<()> {
        self.open(ModalKind::EditRewrite, Some(rewrite))
    }

    fn open(&self, kind: ModalKind, current: Option<Rewrite>) -> store::Result<()> {
        let (is_open, open_kind, open_current) = self.store.select(|s| {
            let modal = &s.rewrites.modal;
            (modal.is_open, modal.kind, modal.current.clone())
        });

        if is_open {
            if open_kind == kind && open_current == current {
                return Ok(());
            }
            self.store.dispatch(Action::ToggleRewritesModal(None))?;
        }
        self.store
            .dispatch(Action::ToggleRewritesModal(Some((kind, current))))?;
        Ok(())
    }

    pub fn close_modal(&self) -> store::Result<()> {
        if self.store.select(|s| s.rewrites.modal.is_open) {
            self.store.dispatch(Action::ToggleRewritesModal(None))?;
        }
        Ok(())
    }

    /// Form for the open modal, seeded from the entry being edited.
    pub fn form(&self) -> form::Result<RewriteForm> {
        let current = self.store.select(|s| match s.rewrites.modal.kind {
            ModalKind::EditRewrite => s.rewrites.modal.current.clone(),
            ModalKind::AddRewrite => None,
        });
        RewriteForm::new(current.as_ref())
    }

    pub fn submit(&self, form: &mut RewriteForm) -> store::Result<SubmitOutcome> {
        let (kind, current) = self.store.select(|s| {
            (s.rewrites.modal.kind, s.rewrites.modal.current.clone())
        });
        let store = &self.store;

        let submission = form.state.handle_submit(|values| {
            let rewrite = RewriteForm::rewrite(values);
            match (kind, current) {
                (ModalKind::EditRewrite, Some(target)) => store.dispatch(Action::UpdateRewrite {
                    target,
                    update: rewrite,
                }),
                _ => store.dispatch(Action::AddRewrite(rewrite)),
            }
        });

        SubmitOutcome::from_submission(submission)
    }

    pub fn delete_prompt(rewrite: &Rewrite) -> String {
        format!(
            "Are you sure you want to delete DNS rewrite for \"{}\"?",
            rewrite.domain
        )
    }

    pub fn delete(&self, rewrite: &Rewrite, confirm: &dyn Confirm) -> store::Result<DeleteOutcome> {
        if !confirm.confirm(&RewritesPanel::delete_prompt(rewrite)) {
            return Ok(DeleteOutcome::Declined);
        }
        self.store
            .dispatch(Action::DeleteRewrite(rewrite.clone()))
            .map(DeleteOutcome::from)
    }

    pub fn view(&self, form: Option<&RewriteForm>, ddns: &DdnsPanel) -> RewritesView {
        self.store.select(|s| {
            let slice = &s.rewrites;
            let busy = slice.processing_add || slice.processing_update;

            let modal = match (slice.modal.is_open, form) {
                (true, Some(form)) => Some(ModalView {
                    kind: slice.modal.kind,
                    title: match slice.modal.kind {
                        ModalKind::AddRewrite => "Add DNS rewrite",
                        ModalKind::EditRewrite => "Edit DNS rewrite",
                    },
                    fields: form.fields(busy),
                    submit_disabled: busy || form.state.is_submitting(),
                    current: slice.modal.current.clone(),
                }),
                _ => None,
            };

            RewritesView {
                list: slice.list.clone(),
                loaded: slice.loaded,
                processing: slice.processing,
                processing_delete: slice.processing_delete,
                add_disabled: s.is_processing(Flag::RewriteAdd),
                modal,
                ddns: ddns.view(),
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DdnsButton {
    pub os: &'static str,
    pub title: &'static str,
    pub url: Option<String>,
    pub disabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DdnsView {
    pub domain: FieldView,
    pub buttons: Vec<DdnsButton>,
}

/// Panel-local domain field plus one download button per OS.
pub struct DdnsPanel {
    pub state: FormState,
    domain: TextInput,
}

impl DdnsPanel {
    pub fn new(default_domain: &str) -> form::Result<DdnsPanel> {
        let mut state = FormState::new(ValidationMode::OnChange);
        let domain = state.register("ddns_domain", FieldOptions::text(default_domain))?;
        Ok(DdnsPanel {
            state,
            domain: TextInput::new(domain)
                .label("Domain")
                .placeholder(ddns::DEFAULT_DOMAIN),
        })
    }

    pub fn set_domain(&mut self, raw: &str) {
        self.domain.on_input(&mut self.state, raw);
    }

    pub fn domain(&self) -> &str {
        self.state.value(self.domain.handle()).as_str().unwrap_or("")
    }

    pub fn buttons(&self) -> Vec<DdnsButton> {
        let domain = self.domain();
        DdnsOs::ALL
            .iter()
            .map(|&os| {
                let url = ddns::script_url(os, domain);
                DdnsButton {
                    os: os.as_str(),
                    title: os.title(),
                    disabled: url.is_none(),
                    url,
                }
            })
            .collect()
    }

    pub fn view(&self) -> DdnsView {
        DdnsView {
            domain: self.domain.view(&self.state, false),
            buttons: self.buttons(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::store::memory::MemoryControlApi;

    fn panel_with(rewrites: Vec<Rewrite>) -> (RewritesPanel, ConsoleStore) {
        let api = MemoryControlApi::new().with_rewrites(rewrites);
        let store = ConsoleStore::new(Arc::new(api));
        (RewritesPanel::new(store.clone()), store)
    }

    #[test]
    fn test_edit_form_seeds_from_current() {
        let entry = Rewrite::new("nas.home", "192.168.1.10");
        let (panel, _) = panel_with(vec![entry.clone()]);
        panel.open_edit(entry).unwrap();

        let form = panel.form().unwrap();
        let values = form.state.values();
        assert_eq!(text_value(&values, "domain"), "nas.home");
        assert_eq!(text_value(&values, "answer"), "192.168.1.10");
    }

    #[test]
    fn test_add_form_starts_empty() {
        let (panel, _) = panel_with(vec![]);
        panel.open_add().unwrap();

        let form = panel.form().unwrap();
        assert_eq!(text_value(&form.state.values(), "domain"), "");
    }

    #[test]
    fn test_open_twice_keeps_modal_open() {
        let (panel, store) = panel_with(vec![]);
        panel.open_add().unwrap();
        panel.open_add().unwrap();
        assert!(store.select(|s| s.rewrites.modal.is_open));

        panel.close_modal().unwrap();
        panel.close_modal().unwrap();
        assert!(!store.select(|s| s.rewrites.modal.is_open));
    }

    #[test]
    fn test_invalid_answer_is_reported() {
        let (panel, _) = panel_with(vec![]);
        panel.open_add().unwrap();
        let mut form = panel.form().unwrap();

        let mut posted = PostedValues::new();
        posted.insert("domain".to_string(), "example.org".to_string());
        posted.insert("answer".to_string(), "not an answer".to_string());
        form.apply_posted(&posted);

        match panel.submit(&mut form).unwrap() {
            SubmitOutcome::Invalid(errors) => assert!(errors.contains_key("answer")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_ddns_buttons() {
        let mut ddns = DdnsPanel::new(ddns::DEFAULT_DOMAIN).unwrap();
        let buttons = ddns.buttons();
        assert_eq!(buttons.len(), 3);
        assert_eq!(
            buttons[1].url.as_deref(),
            Some("/control/ddns/script/linux?domain=nas.home")
        );
        assert!(buttons.iter().all(|b| !b.disabled));

        ddns.set_domain("");
        assert!(ddns.buttons().iter().all(|b| b.disabled && b.url.is_none()));
    }

    #[test]
    fn test_ddns_buttons_use_raw_domain() {
        let mut ddns = DdnsPanel::new(ddns::DEFAULT_DOMAIN).unwrap();
        ddns.set_domain("  ");
        let buttons = ddns.buttons();
        assert!(buttons.iter().all(|b| !b.disabled));
        assert_eq!(
            buttons[2].url.as_deref(),
            Some("/control/ddns/script/macos?domain=%20%20")
        );
    }
}
