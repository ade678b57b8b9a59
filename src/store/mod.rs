//! External store
//!
//! Process-wide container for fetched server configuration and in-flight
//! request flags. Panels read it through `select` and change it only by
//! dispatching an `Action`; they never hold a private copy of server state
//! beyond the initial values of their forms.
//!
//! Remote actions follow one cycle: the matching `Flag` is set under the
//! lock, the request runs with the lock released, then the result is
//! applied and the flag cleared under the lock again. A dispatch that finds
//! its flag already set is suppressed rather than sent twice.

use std::sync::Arc;

use derive_more::Display;
use parking_lot::RwLock;

pub mod api;
pub mod memory;
pub mod state;

pub use api::{Client, ControlApi, DnsConfig, DnsConfigUpdate, Rewrite, StatusInfo};
pub use state::{ConsoleState, Flag, ModalKind, Notification, NotificationLevel, ServiceType};

use crate::store::api::ApiError;

#[derive(Debug, Display)]
pub enum StoreError {
    Api(ApiError),
}

impl From<ApiError> for StoreError {
    fn from(err: ApiError) -> Self {
        StoreError::Api(err)
    }
}

impl std::error::Error for StoreError {}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Whether a dispatched action ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Completed,
    /// The same operation was already in flight.
    Suppressed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    FetchRewrites,
    AddRewrite(Rewrite),
    UpdateRewrite { target: Rewrite, update: Rewrite },
    DeleteRewrite(Rewrite),
    /// Flips the rewrite modal. With a payload the modal kind and current
    /// entry are replaced as well.
    ToggleRewritesModal(Option<(ModalKind, Option<Rewrite>)>),

    FetchDnsConfig,
    SetDnsConfig(DnsConfigUpdate),
    TestUpstream(Vec<String>),

    FetchStatus,

    FetchClients,
    AddClient(Client),
    UpdateClient { name: String, data: Client },
    DeleteClient(String),

    Login { name: String, password: String },

    DismissNotifications,
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::FetchRewrites => "fetch_rewrites",
            Action::AddRewrite(_) => "add_rewrite",
            Action::UpdateRewrite { .. } => "update_rewrite",
            Action::DeleteRewrite(_) => "delete_rewrite",
            Action::ToggleRewritesModal(_) => "toggle_rewrites_modal",
            Action::FetchDnsConfig => "fetch_dns_config",
            Action::SetDnsConfig(_) => "set_dns_config",
            Action::TestUpstream(_) => "test_upstream",
            Action::FetchStatus => "fetch_status",
            Action::FetchClients => "fetch_clients",
            Action::AddClient(_) => "add_client",
            Action::UpdateClient { .. } => "update_client",
            Action::DeleteClient(_) => "delete_client",
            Action::Login { .. } => "login",
            Action::DismissNotifications => "dismiss_notifications",
        }
    }
}

#[derive(Clone)]
pub struct ConsoleStore {
    state: Arc<RwLock<ConsoleState>>,
    api: Arc<dyn ControlApi>,
    service_type_override: Option<ServiceType>,
}

impl ConsoleStore {
    pub fn new(api: Arc<dyn ControlApi>) -> ConsoleStore {
        ConsoleStore {
            state: Arc::new(RwLock::new(ConsoleState::default())),
            api,
            service_type_override: None,
        }
    }

    /// Pins the service tier regardless of what the backend reports.
    pub fn with_service_type(mut self, service_type: Option<ServiceType>) -> ConsoleStore {
        self.service_type_override = service_type;
        self.state.write().dashboard.service_type = service_type;
        self
    }

    /// Read-only projection of the current state.
    pub fn select<R, F>(&self, selector: F) -> R
    where
        F: FnOnce(&ConsoleState) -> R,
    {
        let state = self.state.read();
        selector(&state)
    }

    pub fn is_processing(&self, flag: Flag) -> bool {
        self.select(|state| state.is_processing(flag))
    }

    /// Removes and returns pending notifications.
    pub fn take_notifications(&self) -> Vec<Notification> {
        std::mem::take(&mut self.state.write().notifications)
    }

    pub fn dispatch(&self, action: Action) -> Result<Dispatched> {
        log::debug!("dispatch {}", action.name());

        match action {
            Action::FetchRewrites => self.run(
                Flag::RewritesFetch,
                |api| api.rewrite_list(),
                |state, list| {
                    state.rewrites.list = list;
                    state.rewrites.loaded = true;
                },
            ),
            Action::AddRewrite(rewrite) => self.run(
                Flag::RewriteAdd,
                |api| {
                    api.rewrite_add(&rewrite)?;
                    api.rewrite_list().map(|list| (rewrite, list))
                },
                |state, (rewrite, list)| {
                    state.rewrites.list = list;
                    state.rewrites.loaded = true;
                    state.rewrites.modal.is_open = false;
                    state.notify(
                        NotificationLevel::Success,
                        format!("Rewrite for {} added", rewrite.domain),
                    );
                },
            ),
            Action::UpdateRewrite { target, update } => self.run(
                Flag::RewriteUpdate,
                |api| {
                    api.rewrite_update(&target, &update)?;
                    api.rewrite_list().map(|list| (update, list))
                },
                |state, (update, list)| {
                    state.rewrites.list = list;
                    state.rewrites.loaded = true;
                    state.rewrites.modal.is_open = false;
                    state.rewrites.modal.current = None;
                    state.notify(
                        NotificationLevel::Success,
                        format!("Rewrite for {} updated", update.domain),
                    );
                },
            ),
            Action::DeleteRewrite(rewrite) => self.run(
                Flag::RewriteDelete,
                |api| {
                    api.rewrite_delete(&rewrite)?;
                    api.rewrite_list().map(|list| (rewrite, list))
                },
                |state, (rewrite, list)| {
                    state.rewrites.list = list;
                    state.rewrites.loaded = true;
                    state.notify(
                        NotificationLevel::Success,
                        format!("Rewrite for {} deleted", rewrite.domain),
                    );
                },
            ),
            Action::ToggleRewritesModal(payload) => {
                let mut state = self.state.write();
                let modal = &mut state.rewrites.modal;
                modal.is_open = !modal.is_open;
                if let Some((kind, current)) = payload {
                    modal.kind = kind;
                    modal.current = current;
                }
                Ok(Dispatched::Completed)
            }

            Action::FetchDnsConfig => self.run(
                Flag::DnsConfigFetch,
                |api| api.dns_info(),
                |state, config| {
                    state.dns_config.config = config;
                    state.dns_config.loaded = true;
                },
            ),
            Action::SetDnsConfig(update) => self.run(
                Flag::DnsConfigSet,
                |api| api.set_dns_config(&update).map(|_| update),
                |state, update| {
                    update.apply_to(&mut state.dns_config.config);
                    state.notify(NotificationLevel::Success, "DNS settings saved");
                },
            ),
            Action::TestUpstream(upstreams) => self.run(
                Flag::TestUpstream,
                |api| api.test_upstream_dns(&upstreams),
                |state, results| {
                    let failed: Vec<&String> = results
                        .iter()
                        .filter(|(_, verdict)| verdict.as_str() != "OK")
                        .map(|(upstream, _)| upstream)
                        .collect();

                    if failed.is_empty() {
                        state.notify(NotificationLevel::Success, "Specified DNS servers are working correctly");
                    } else {
                        let names: Vec<&str> = failed.iter().map(|s| s.as_str()).collect();
                        let message = format!("Server \"{}\": could not be used", names.join(", "));
                        state.notify(NotificationLevel::Error, message);
                    }
                    state.settings.test_upstream = results;
                },
            ),

            Action::FetchStatus => {
                let service_type_override = self.service_type_override;
                self.run(
                    Flag::StatusFetch,
                    |api| api.status(),
                    move |state, StatusInfo { version, service_type, .. }| {
                        state.dashboard.loaded = true;
                        state.dashboard.dns_version = Some(version).filter(|v| !v.is_empty());
                        state.dashboard.service_type = service_type_override.or_else(|| {
                            service_type.as_deref().and_then(|s| s.parse().ok())
                        });
                    },
                )
            }

            Action::FetchClients => self.run(
                Flag::ClientsFetch,
                |api| api.clients(),
                |state, list| {
                    state.clients.list = list;
                    state.clients.loaded = true;
                },
            ),
            Action::AddClient(client) => self.run(
                Flag::ClientAdd,
                |api| {
                    api.client_add(&client)?;
                    api.clients().map(|list| (client.name, list))
                },
                |state, (name, list)| {
                    state.clients.list = list;
                    state.clients.loaded = true;
                    state.notify(NotificationLevel::Success, format!("Client \"{}\" added", name));
                },
            ),
            Action::UpdateClient { name, data } => self.run(
                Flag::ClientUpdate,
                |api| {
                    api.client_update(&name, &data)?;
                    api.clients().map(|list| (data.name, list))
                },
                |state, (name, list)| {
                    state.clients.list = list;
                    state.clients.loaded = true;
                    state.notify(NotificationLevel::Success, format!("Client \"{}\" updated", name));
                },
            ),
            Action::DeleteClient(name) => self.run(
                Flag::ClientDelete,
                |api| {
                    api.client_delete(&name)?;
                    api.clients().map(|list| (name, list))
                },
                |state, (name, list)| {
                    state.clients.list = list;
                    state.clients.loaded = true;
                    state.notify(NotificationLevel::Success, format!("Client \"{}\" deleted", name));
                },
            ),

            Action::Login { name, password } => self.run(
                Flag::Login,
                |api| api.login(&name, &password),
                |state, _| {
                    state.login.authenticated = true;
                },
            ),

            Action::DismissNotifications => {
                self.state.write().notifications.clear();
                Ok(Dispatched::Completed)
            }
        }
    }

    fn run<T, F, A>(&self, flag: Flag, request: F, apply: A) -> Result<Dispatched>
    where
        F: FnOnce(&dyn ControlApi) -> api::Result<T>,
        A: FnOnce(&mut ConsoleState, T),
    {
        {
            let mut state = self.state.write();
            let in_flight = state.flag_mut(flag);
            if *in_flight {
                log::debug!("{:?} already in flight, suppressing", flag);
                return Ok(Dispatched::Suppressed);
            }
            *in_flight = true;
        }

        let result = request(self.api.as_ref());

        let mut state = self.state.write();
        *state.flag_mut(flag) = false;

        match result {
            Ok(value) => {
                apply(&mut state, value);
                Ok(Dispatched::Completed)
            }
            Err(err) => {
                log::warn!("{:?} failed: {}", flag, err);
                state.notify(NotificationLevel::Error, err.to_string());
                Err(StoreError::Api(err))
            }
        }
    }
}
