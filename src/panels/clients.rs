//! Persistent clients panel
//!
//! The client policy form has two kinds of conditional fields:
//!
//! * the protection toggles and safe-search toggles are disabled while
//!   `use_global_settings` is on, keeping their values;
//! * some toggle groups only apply to higher service tiers and are left out
//!   of the rendered form for other tiers.
//!
//! Tier gating is declarative: every toggle carries the tiers it requires
//! and `visible_for` filters them once per render.

use serde_derive::Serialize;

use crate::form::validation::{remove_empty_lines, split_lines, validate_required_value};
use crate::form::{
    self, bool_value, text_value, Checkbox, FieldAdapter, FieldOptions, FieldView, FormState,
    FormValues, PostedValues, TextInput, Textarea, ValidationMode,
};
use crate::panels::{capitalize_words, mount, Confirm, DeleteOutcome, SubmitOutcome};
use crate::store::api::SafeSearchConfig;
use crate::store::{self, Action, Client, ConsoleStore, Flag, ServiceType};

pub const USE_GLOBAL_SETTINGS: &str = "use_global_settings";

const PAID_TIERS: &[ServiceType] = &[ServiceType::Family, ServiceType::Enterprise];

/// Safe-search engines offered when no client reports its own list.
pub const DEFAULT_SAFE_SEARCH_SERVICES: &[&str] =
    &["bing", "duckduckgo", "google", "pixabay", "yandex", "youtube"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleGroup {
    Protection,
    SafeSearch,
    Logs,
}

/// One checkbox of the policy form with its tier requirement.
pub struct Toggle {
    pub group: ToggleGroup,
    pub required_tiers: &'static [ServiceType],
    checkbox: Checkbox,
}

impl Toggle {
    /// Toggles without a requirement are always shown; others need a known
    /// tier from the list.
    pub fn visible_for(&self, tier: Option<ServiceType>) -> bool {
        self.required_tiers.is_empty()
            || tier.map_or(false, |tier| self.required_tiers.contains(&tier))
    }

    pub fn name(&self) -> &str {
        self.checkbox.handle().name()
    }
}

fn safe_search_field(service: &str) -> String {
    format!("safe_search.{}", service)
}

pub struct ClientForm {
    pub state: FormState,
    name: TextInput,
    ids: Textarea,
    toggles: Vec<Toggle>,
    services: Vec<String>,
    /// Backend fields the form does not edit, sent back unchanged.
    extra: serde_json::Map<String, serde_json::Value>,
}

impl ClientForm {
    /// `services` lists the safe-search engines rendered as toggles.
    pub fn new(client: &Client, services: &[String]) -> form::Result<ClientForm> {
        let mut state = FormState::new(ValidationMode::OnChange);

        let name = state.register(
            "name",
            FieldOptions::text(client.name.as_str()).validate(validate_required_value),
        )?;
        let ids = state.register(
            "ids",
            FieldOptions::text(client.ids.join("\n"))
                .on_blur(remove_empty_lines)
                .validate(validate_required_value),
        )?;

        let mut toggles = Vec::new();
        let mut add = |state: &mut FormState,
                       name: &str,
                       title: &str,
                       checked: bool,
                       group: ToggleGroup,
                       required_tiers: &'static [ServiceType],
                       gated_by_global: bool|
         -> form::Result<()> {
            let mut options = FieldOptions::checkbox(checked);
            if gated_by_global {
                options = options.disabled_when(USE_GLOBAL_SETTINGS);
            }
            let handle = state.register(name, options)?;
            toggles.push(Toggle {
                group,
                required_tiers,
                checkbox: Checkbox::new(handle).title(title),
            });
            Ok(())
        };

        use ToggleGroup::*;
        add(&mut state, USE_GLOBAL_SETTINGS, "Use global settings", client.use_global_settings, Protection, PAID_TIERS, false)?;
        add(&mut state, "filtering_enabled", "Use filtering", client.filtering_enabled, Protection, PAID_TIERS, true)?;
        add(&mut state, "safebrowsing_enabled", "Use browsing security", client.safebrowsing_enabled, Protection, PAID_TIERS, true)?;
        add(&mut state, "parental_enabled", "Use parental control", client.parental_enabled, Protection, PAID_TIERS, true)?;
        add(&mut state, "safe_search.enabled", "Enforce safe search", client.safe_search.enabled, SafeSearch, PAID_TIERS, true)?;
        for service in services {
            let checked = client.safe_search.services.get(service).copied().unwrap_or(false);
            add(&mut state, &safe_search_field(service), &capitalize_words(service), checked, SafeSearch, PAID_TIERS, true)?;
        }
        add(&mut state, "ignore_querylog", "Ignore client in query log", client.ignore_querylog, Logs, &[], false)?;
        add(&mut state, "ignore_statistics", "Ignore client in statistics", client.ignore_statistics, Logs, &[], false)?;

        Ok(ClientForm {
            state,
            name: TextInput::new(name).label("Client name"),
            ids: Textarea::new(ids)
                .label("Identifiers")
                .placeholder("IP, CIDR, MAC or ClientID, one per line"),
            toggles,
            services: services.to_vec(),
            extra: client.extra.clone(),
        })
    }

    pub fn toggles(&self) -> &[Toggle] {
        &self.toggles
    }

    /// Replays a browser post. The global-settings switch goes first so
    /// its dependents see the posted enabled state. Toggles hidden for
    /// `tier` were never rendered and keep their seeded values.
    pub fn apply_posted(&mut self, posted: &PostedValues, tier: Option<ServiceType>) {
        let get = |name: &str| posted.get(name).map(String::as_str);

        self.name.apply_posted(&mut self.state, get(self.name.handle().name()));
        self.ids.apply_posted(&mut self.state, get(self.ids.handle().name()));

        let (global, rest): (Vec<&Toggle>, Vec<&Toggle>) = self
            .toggles
            .iter()
            .filter(|toggle| toggle.visible_for(tier))
            .partition(|toggle| toggle.name() == USE_GLOBAL_SETTINGS);
        for toggle in global.into_iter().chain(rest) {
            toggle
                .checkbox
                .apply_posted(&mut self.state, get(toggle.name()));
        }
    }

    pub fn set_toggle(&mut self, name: &str, checked: bool) -> form::Result<bool> {
        let handle = self.state.handle(name)?;
        Ok(self.state.change(&handle, checked))
    }

    pub fn to_client(&self) -> Client {
        Client {
            extra: self.extra.clone(),
            ..to_client(&self.state.values(), &self.services)
        }
    }

    fn section(&self, group: ToggleGroup, tier: Option<ServiceType>, disabled: bool) -> Vec<FieldView> {
        self.toggles
            .iter()
            .filter(|toggle| toggle.group == group && toggle.visible_for(tier))
            .map(|toggle| toggle.checkbox.view(&self.state, disabled))
            .collect()
    }
}

/// Builds the backend client from submitted values.
pub fn to_client(values: &FormValues, services: &[String]) -> Client {
    Client {
        name: text_value(values, "name").trim().to_string(),
        ids: split_lines(text_value(values, "ids")),
        use_global_settings: bool_value(values, USE_GLOBAL_SETTINGS),
        filtering_enabled: bool_value(values, "filtering_enabled"),
        safebrowsing_enabled: bool_value(values, "safebrowsing_enabled"),
        parental_enabled: bool_value(values, "parental_enabled"),
        safe_search: SafeSearchConfig {
            enabled: bool_value(values, "safe_search.enabled"),
            services: services
                .iter()
                .map(|service| (service.clone(), bool_value(values, &safe_search_field(service))))
                .collect(),
        },
        ignore_querylog: bool_value(values, "ignore_querylog"),
        ignore_statistics: bool_value(values, "ignore_statistics"),
        extra: Default::default(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientFormView {
    /// Name of the client being edited; `None` when adding.
    pub editing: Option<String>,
    pub name: FieldView,
    pub ids: FieldView,
    pub protection: Vec<FieldView>,
    pub safe_search: Vec<FieldView>,
    pub logs: Vec<FieldView>,
    pub submit_disabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientsView {
    pub list: Vec<Client>,
    pub loaded: bool,
    pub processing: bool,
    pub processing_deleting: bool,
    pub service_type: Option<ServiceType>,
    pub form: Option<ClientFormView>,
}

pub struct ClientsPanel {
    store: ConsoleStore,
}

impl ClientsPanel {
    pub fn new(store: ConsoleStore) -> ClientsPanel {
        ClientsPanel { store }
    }

    /// Fetches the client list and, for the tier, the server status.
    pub fn mount(&self, force: bool) -> store::Result<()> {
        mount(&self.store, |s| s.clients.loaded, force, Action::FetchClients)?;
        mount(&self.store, |s| s.dashboard.loaded, force, Action::FetchStatus)
    }

    /// Safe-search engines of `client`, else of the first loaded client,
    /// else the built-in list.
    pub fn safe_search_services(&self, client: Option<&Client>) -> Vec<String> {
        let from_client = |c: &Client| -> Vec<String> { c.safe_search.services.keys().cloned().collect() };

        if let Some(services) = client.map(from_client).filter(|s| !s.is_empty()) {
            return services;
        }
        let first = self
            .store
            .select(|s| s.clients.list.first().map(from_client))
            .filter(|s| !s.is_empty());
        first.unwrap_or_else(|| {
            DEFAULT_SAFE_SEARCH_SERVICES
                .iter()
                .map(|s| s.to_string())
                .collect()
        })
    }

    /// Tier the form is rendered for.
    pub fn service_type(&self) -> Option<ServiceType> {
        self.store.select(|s| s.dashboard.service_type)
    }

    pub fn find(&self, name: &str) -> Option<Client> {
        self.store
            .select(|s| s.clients.list.iter().find(|c| c.name == name).cloned())
    }

    /// Form for `editing`, or a blank one using global settings.
    pub fn form(&self, editing: Option<&Client>) -> form::Result<ClientForm> {
        let services = self.safe_search_services(editing);
        match editing {
            Some(client) => ClientForm::new(client, &services),
            None => ClientForm::new(
                &Client {
                    use_global_settings: true,
                    ..Default::default()
                },
                &services,
            ),
        }
    }

    pub fn submit(&self, form: &mut ClientForm, editing: Option<&str>) -> store::Result<SubmitOutcome> {
        let store = &self.store;
        let services = form.services.clone();
        let extra = form.extra.clone();

        let submission = form.state.handle_submit(|values| {
            let data = Client {
                extra,
                ..to_client(values, &services)
            };
            match editing {
                Some(name) => store.dispatch(Action::UpdateClient {
                    name: name.to_string(),
                    data,
                }),
                None => store.dispatch(Action::AddClient(data)),
            }
        });

        SubmitOutcome::from_submission(submission)
    }

    pub fn delete_prompt(name: &str) -> String {
        format!("Are you sure you want to delete client \"{}\"?", name)
    }

    pub fn delete(&self, name: &str, confirm: &dyn Confirm) -> store::Result<DeleteOutcome> {
        if !confirm.confirm(&ClientsPanel::delete_prompt(name)) {
            return Ok(DeleteOutcome::Declined);
        }
        self.store
            .dispatch(Action::DeleteClient(name.to_string()))
            .map(DeleteOutcome::from)
    }

    pub fn view(&self, form: Option<(&ClientForm, Option<&str>)>) -> ClientsView {
        self.store.select(|s| {
            let tier = s.dashboard.service_type;
            let busy = s.is_processing(Flag::ClientAdd) || s.is_processing(Flag::ClientUpdate);

            let form = form.map(|(form, editing)| ClientFormView {
                editing: editing.map(str::to_string),
                name: form.name.view(&form.state, busy),
                ids: form.ids.view(&form.state, busy),
                protection: form.section(ToggleGroup::Protection, tier, busy),
                safe_search: form.section(ToggleGroup::SafeSearch, tier, busy),
                logs: form.section(ToggleGroup::Logs, tier, busy),
                submit_disabled: busy || form.state.is_submitting(),
            });

            ClientsView {
                list: s.clients.list.clone(),
                loaded: s.clients.loaded,
                processing: s.clients.processing,
                processing_deleting: s.clients.processing_deleting,
                service_type: tier,
                form,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn services() -> Vec<String> {
        vec!["google".to_string(), "youtube".to_string()]
    }

    fn client() -> Client {
        let mut client = Client {
            name: "laptop".to_string(),
            ids: vec!["192.168.1.30".to_string()],
            use_global_settings: false,
            filtering_enabled: true,
            ..Default::default()
        };
        client.safe_search.services.insert("google".to_string(), true);
        client
    }

    #[test]
    fn test_visible_for() {
        let form = ClientForm::new(&client(), &services()).unwrap();
        let visible = |tier| {
            form.toggles()
                .iter()
                .filter(|t| t.visible_for(tier))
                .map(|t| t.name().to_string())
                .collect::<Vec<_>>()
        };

        assert_eq!(visible(None), vec!["ignore_querylog", "ignore_statistics"]);
        assert_eq!(
            visible(Some(ServiceType::Personal)),
            vec!["ignore_querylog", "ignore_statistics"]
        );
        assert_eq!(visible(Some(ServiceType::Family)).len(), 9);
        assert_eq!(visible(Some(ServiceType::Enterprise)).len(), 9);
    }

    #[test]
    fn test_to_client_round_trips_form_values() {
        let form = ClientForm::new(&client(), &services()).unwrap();
        let built = form.to_client();

        assert_eq!(built.name, "laptop");
        assert_eq!(built.ids, vec!["192.168.1.30".to_string()]);
        assert!(built.filtering_enabled);
        assert_eq!(built.safe_search.services.get("google"), Some(&true));
        assert_eq!(built.safe_search.services.get("youtube"), Some(&false));
    }

    #[test]
    fn test_service_titles_are_capitalized() {
        let form = ClientForm::new(&client(), &services()).unwrap();
        let titles: Vec<String> = form
            .section(ToggleGroup::SafeSearch, Some(ServiceType::Family), false)
            .into_iter()
            .map(|view| view.label)
            .collect();
        assert_eq!(titles, vec!["Enforce safe search", "Google", "Youtube"]);
    }

    #[test]
    fn test_logs_toggles_ignore_global_settings() {
        let mut form = ClientForm::new(&client(), &services()).unwrap();
        form.set_toggle(USE_GLOBAL_SETTINGS, true).unwrap();

        assert!(!form.set_toggle("filtering_enabled", false).unwrap());
        assert!(form.set_toggle("ignore_querylog", true).unwrap());
    }

    #[test]
    fn test_hidden_toggles_keep_seeded_values() {
        let mut seeded = client();
        seeded.parental_enabled = true;
        let mut form = ClientForm::new(&seeded, &services()).unwrap();

        let mut posted = PostedValues::new();
        posted.insert("name".to_string(), "laptop".to_string());
        posted.insert("ids".to_string(), "10.0.0.9".to_string());
        posted.insert("ignore_querylog".to_string(), "on".to_string());
        form.apply_posted(&posted, Some(ServiceType::Personal));

        let built = form.to_client();
        assert!(built.filtering_enabled);
        assert!(built.parental_enabled);
        assert_eq!(built.safe_search.services.get("google"), Some(&true));
        assert!(built.ignore_querylog);
        assert_eq!(built.ids, vec!["10.0.0.9".to_string()]);

        // Rendered toggles left unchecked by the browser are cleared
        form.apply_posted(&posted, Some(ServiceType::Family));
        assert!(!form.to_client().filtering_enabled);
    }

    #[test]
    fn test_to_client_keeps_extra_fields() {
        let mut seeded = client();
        seeded
            .extra
            .insert("tags".to_string(), serde_json::json!(["device_laptop"]));
        let form = ClientForm::new(&seeded, &services()).unwrap();

        assert_eq!(form.to_client().extra, seeded.extra);
    }
}
