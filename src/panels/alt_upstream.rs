//! Alternate upstream servers panel
//!
//! Edits `upstream_alternate_dns` and `upstream_alternate_rulesets` of the
//! DNS configuration. When the server reads its upstreams from a file the
//! DNS list is shown as read-only text and never sent back.

use serde_derive::Serialize;

use crate::form::validation::{remove_empty_lines, split_lines, validate_ruleset_urls};
use crate::form::{
    self, text_value, FieldAdapter, FieldOptions, FieldView, FormState, FormValue, FormValues,
    PostedValues, Textarea, ValidationMode,
};
use crate::panels::{mount, SubmitOutcome};
use crate::store::{self, Action, ConsoleStore, Dispatched, DnsConfig, DnsConfigUpdate, Flag};

pub const FIELD_DNS: &str = "upstream_alternate_dns";
pub const FIELD_RULESETS: &str = "upstream_alternate_rulesets";

pub fn file_message(path: &str) -> String {
    format!("Upstreams are configured in file {}", path)
}

/// Initial form values for a fetched configuration.
pub fn initial_values(config: &DnsConfig) -> FormValues {
    let dns = if config.upstream_dns_file.is_empty() {
        config.upstream_alternate_dns.join("\n")
    } else {
        file_message(&config.upstream_dns_file)
    };

    let mut values = FormValues::new();
    values.insert(FIELD_DNS.to_string(), FormValue::Text(dns));
    values.insert(
        FIELD_RULESETS.to_string(),
        FormValue::Text(config.upstream_alternate_rulesets.join("\n")),
    );
    values
}

/// Backend update for submitted values. The DNS list is left out while it
/// is managed by `upstream_dns_file`.
pub fn payload(values: &FormValues, upstream_dns_file: &str) -> DnsConfigUpdate {
    let upstream_alternate_dns = if upstream_dns_file.is_empty() {
        Some(split_lines(text_value(values, FIELD_DNS)))
    } else {
        None
    };

    DnsConfigUpdate {
        upstream_alternate_dns,
        upstream_alternate_rulesets: Some(split_lines(text_value(values, FIELD_RULESETS))),
    }
}

pub struct AltUpstreamForm {
    pub state: FormState,
    dns: Textarea,
    rulesets: Textarea,
    upstream_dns_file: String,
}

impl AltUpstreamForm {
    pub fn new(config: &DnsConfig) -> form::Result<AltUpstreamForm> {
        let mut state = FormState::with_defaults(ValidationMode::OnBlur, initial_values(config));
        let dns = state.register(FIELD_DNS, FieldOptions::text("").on_blur(remove_empty_lines))?;
        let rulesets = state.register(
            FIELD_RULESETS,
            FieldOptions::text("")
                .on_blur(remove_empty_lines)
                .validate(validate_ruleset_urls),
        )?;

        Ok(AltUpstreamForm {
            state,
            dns: Textarea::new(dns)
                .label("Alternate DNS servers")
                .placeholder("Enter one server address per line"),
            rulesets: Textarea::new(rulesets)
                .label("Alternate rulesets")
                .placeholder("Enter one ruleset URL per line"),
            upstream_dns_file: config.upstream_dns_file.clone(),
        })
    }

    pub fn is_file_managed(&self) -> bool {
        !self.upstream_dns_file.is_empty()
    }

    pub fn dns(&self) -> &Textarea {
        &self.dns
    }

    pub fn rulesets(&self) -> &Textarea {
        &self.rulesets
    }

    pub fn apply_posted(&mut self, posted: &PostedValues) {
        if !self.is_file_managed() {
            self.dns
                .apply_posted(&mut self.state, posted.get(FIELD_DNS).map(String::as_str));
        }
        self.rulesets
            .apply_posted(&mut self.state, posted.get(FIELD_RULESETS).map(String::as_str));
    }

    pub fn fields(&self, disabled: bool) -> Vec<FieldView> {
        let mut dns = self.dns.view(&self.state, disabled);
        dns.readonly = self.is_file_managed();
        vec![dns, self.rulesets.view(&self.state, disabled)]
    }

    /// Upstreams the "test" button would check.
    pub fn upstreams(&self) -> Vec<String> {
        if self.is_file_managed() {
            return Vec::new();
        }
        split_lines(self.state.value(self.dns.handle()).as_str().unwrap_or(""))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpstreamTestResult {
    pub upstream: String,
    pub verdict: String,
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AltUpstreamView {
    pub loaded: bool,
    pub fields: Vec<FieldView>,
    pub file_managed: bool,
    pub submit_disabled: bool,
    pub test_disabled: bool,
    pub processing_set_config: bool,
    pub processing_test_upstream: bool,
    pub test_results: Vec<UpstreamTestResult>,
}

pub struct AltUpstreamPanel {
    store: ConsoleStore,
}

impl AltUpstreamPanel {
    pub fn new(store: ConsoleStore) -> AltUpstreamPanel {
        AltUpstreamPanel { store }
    }

    pub fn mount(&self, force: bool) -> store::Result<()> {
        mount(&self.store, |s| s.dns_config.loaded, force, Action::FetchDnsConfig)
    }

    pub fn form(&self) -> form::Result<AltUpstreamForm> {
        let config = self.store.select(|s| s.dns_config.config.clone());
        AltUpstreamForm::new(&config)
    }

    fn busy(&self) -> bool {
        self.store.select(|s| {
            s.is_processing(Flag::DnsConfigSet) || s.is_processing(Flag::TestUpstream)
        })
    }

    pub fn submit_disabled(&self, form: &AltUpstreamForm) -> bool {
        form.state.is_submitting() || !form.state.is_dirty() || self.busy()
    }

    /// Sends the changed settings. A pristine form or a busy panel sends
    /// nothing.
    pub fn submit(&self, form: &mut AltUpstreamForm) -> store::Result<SubmitOutcome> {
        if self.submit_disabled(form) {
            log::debug!("Alternate upstream submit suppressed");
            return Ok(SubmitOutcome::Suppressed);
        }

        let store = &self.store;
        let upstream_dns_file = form.upstream_dns_file.clone();
        let submission = form.state.handle_submit(|values| {
            store.dispatch(Action::SetDnsConfig(payload(values, &upstream_dns_file)))
        });

        SubmitOutcome::from_submission(submission)
    }

    pub fn test_upstreams(&self, form: &AltUpstreamForm) -> store::Result<Dispatched> {
        let upstreams = form.upstreams();
        if upstreams.is_empty() || self.busy() {
            return Ok(Dispatched::Suppressed);
        }
        self.store.dispatch(Action::TestUpstream(upstreams))
    }

    pub fn view(&self, form: &AltUpstreamForm) -> AltUpstreamView {
        let submit_disabled = self.submit_disabled(form);
        self.store.select(|s| {
            let busy = s.is_processing(Flag::DnsConfigSet) || s.is_processing(Flag::TestUpstream);
            AltUpstreamView {
                loaded: s.dns_config.loaded,
                fields: form.fields(busy),
                file_managed: form.is_file_managed(),
                submit_disabled,
                test_disabled: busy || form.upstreams().is_empty(),
                processing_set_config: s.dns_config.processing_set_config,
                processing_test_upstream: s.settings.processing_test_upstream,
                test_results: s
                    .settings
                    .test_upstream
                    .iter()
                    .map(|(upstream, verdict)| UpstreamTestResult {
                        upstream: upstream.clone(),
                        verdict: verdict.clone(),
                        ok: verdict == "OK",
                    })
                    .collect(),
            }
        })
    }
}
