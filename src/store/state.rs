//! Slices held by the console store.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde_derive::Serialize;

use crate::store::api::{Client, DnsConfig, Rewrite};

/// Subscription tier of the hosted service. Gates optional field groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Personal,
    Family,
    Enterprise,
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "personal" => Ok(ServiceType::Personal),
            "family" => Ok(ServiceType::Family),
            "enterprise" => Ok(ServiceType::Enterprise),
            other => Err(format!("unknown service type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModalKind {
    AddRewrite,
    EditRewrite,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewriteModal {
    pub is_open: bool,
    pub kind: ModalKind,
    pub current: Option<Rewrite>,
}

impl Default for RewriteModal {
    fn default() -> Self {
        RewriteModal {
            is_open: false,
            kind: ModalKind::AddRewrite,
            current: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RewritesState {
    pub list: Vec<Rewrite>,
    pub loaded: bool,
    pub processing: bool,
    pub processing_add: bool,
    pub processing_update: bool,
    pub processing_delete: bool,
    pub modal: RewriteModal,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DnsConfigState {
    pub config: DnsConfig,
    pub loaded: bool,
    pub processing_get_config: bool,
    pub processing_set_config: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SettingsState {
    pub processing_test_upstream: bool,
    /// Result of the last upstream test, upstream to `"OK"` or an error.
    pub test_upstream: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClientsState {
    pub list: Vec<Client>,
    pub loaded: bool,
    pub processing: bool,
    pub processing_adding: bool,
    pub processing_updating: bool,
    pub processing_deleting: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardState {
    pub loaded: bool,
    pub processing: bool,
    pub dns_version: Option<String>,
    pub service_type: Option<ServiceType>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoginState {
    pub processing: bool,
    pub authenticated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// Message for the global notification area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

/// In-flight request flags, one per remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    RewritesFetch,
    RewriteAdd,
    RewriteUpdate,
    RewriteDelete,
    DnsConfigFetch,
    DnsConfigSet,
    TestUpstream,
    StatusFetch,
    ClientsFetch,
    ClientAdd,
    ClientUpdate,
    ClientDelete,
    Login,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsoleState {
    pub rewrites: RewritesState,
    pub dns_config: DnsConfigState,
    pub settings: SettingsState,
    pub clients: ClientsState,
    pub dashboard: DashboardState,
    pub login: LoginState,
    pub notifications: Vec<Notification>,
}

impl ConsoleState {
    pub fn flag_mut(&mut self, flag: Flag) -> &mut bool {
        match flag {
            Flag::RewritesFetch => &mut self.rewrites.processing,
            Flag::RewriteAdd => &mut self.rewrites.processing_add,
            Flag::RewriteUpdate => &mut self.rewrites.processing_update,
            Flag::RewriteDelete => &mut self.rewrites.processing_delete,
            Flag::DnsConfigFetch => &mut self.dns_config.processing_get_config,
            Flag::DnsConfigSet => &mut self.dns_config.processing_set_config,
            Flag::TestUpstream => &mut self.settings.processing_test_upstream,
            Flag::StatusFetch => &mut self.dashboard.processing,
            Flag::ClientsFetch => &mut self.clients.processing,
            Flag::ClientAdd => &mut self.clients.processing_adding,
            Flag::ClientUpdate => &mut self.clients.processing_updating,
            Flag::ClientDelete => &mut self.clients.processing_deleting,
            Flag::Login => &mut self.login.processing,
        }
    }

    pub fn is_processing(&self, flag: Flag) -> bool {
        match flag {
            Flag::RewritesFetch => self.rewrites.processing,
            Flag::RewriteAdd => self.rewrites.processing_add,
            Flag::RewriteUpdate => self.rewrites.processing_update,
            Flag::RewriteDelete => self.rewrites.processing_delete,
            Flag::DnsConfigFetch => self.dns_config.processing_get_config,
            Flag::DnsConfigSet => self.dns_config.processing_set_config,
            Flag::TestUpstream => self.settings.processing_test_upstream,
            Flag::StatusFetch => self.dashboard.processing,
            Flag::ClientsFetch => self.clients.processing,
            Flag::ClientAdd => self.clients.processing_adding,
            Flag::ClientUpdate => self.clients.processing_updating,
            Flag::ClientDelete => self.clients.processing_deleting,
            Flag::Login => self.login.processing,
        }
    }

    pub fn notify(&mut self, level: NotificationLevel, message: impl Into<String>) {
        self.notifications.push(Notification {
            level,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_type_parse() {
        assert_eq!("family".parse::<ServiceType>(), Ok(ServiceType::Family));
        assert_eq!(" Enterprise ".parse::<ServiceType>(), Ok(ServiceType::Enterprise));
        assert!("gold".parse::<ServiceType>().is_err());
    }

    #[test]
    fn test_flags_are_independent() {
        let mut state = ConsoleState::default();
        *state.flag_mut(Flag::RewriteAdd) = true;

        assert!(state.is_processing(Flag::RewriteAdd));
        assert!(state.rewrites.processing_add);
        assert!(!state.is_processing(Flag::RewriteDelete));
        assert!(!state.is_processing(Flag::RewritesFetch));
    }
}
