//! In-memory `ControlApi`, used by the console's demo mode and by tests.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::store::api::{
    ApiError, Client, ControlApi, DnsConfig, DnsConfigUpdate, Result, Rewrite, StatusInfo,
};

#[derive(Default)]
struct Backend {
    rewrites: Vec<Rewrite>,
    dns_config: DnsConfig,
    clients: Vec<Client>,
    status: StatusInfo,
    credentials: Option<(String, String)>,
    fail_next: Option<String>,
    calls: Vec<String>,
}

#[derive(Default)]
pub struct MemoryControlApi {
    backend: Mutex<Backend>,
}

impl MemoryControlApi {
    pub fn new() -> MemoryControlApi {
        MemoryControlApi::default()
    }

    /// Backend pre-filled with a few entries, for `--demo`.
    pub fn demo() -> MemoryControlApi {
        let api = MemoryControlApi::new()
            .with_rewrites(vec![
                Rewrite::new("nas.home", "192.168.1.10"),
                Rewrite::new("*.lab.home", "192.168.1.20"),
            ])
            .with_dns_config(DnsConfig {
                upstream_dns: vec!["https://dns10.quad9.net/dns-query".to_string()],
                bootstrap_dns: vec!["9.9.9.10".to_string()],
                upstream_alternate_dns: vec!["223.5.5.5".to_string()],
                ..Default::default()
            })
            .with_status(StatusInfo {
                version: "v0.107.43".to_string(),
                running: true,
                protection_enabled: true,
                service_type: Some("family".to_string()),
            });

        let mut services = BTreeMap::new();
        for service in &["bing", "duckduckgo", "google", "pixabay", "yandex", "youtube"] {
            services.insert(service.to_string(), true);
        }
        api.backend.lock().clients.push(Client {
            name: "laptop".to_string(),
            ids: vec!["192.168.1.30".to_string()],
            use_global_settings: true,
            filtering_enabled: true,
            safe_search: crate::store::api::SafeSearchConfig {
                enabled: false,
                services,
            },
            ..Default::default()
        });
        api
    }

    pub fn with_rewrites(self, rewrites: Vec<Rewrite>) -> MemoryControlApi {
        self.backend.lock().rewrites = rewrites;
        self
    }

    pub fn with_dns_config(self, config: DnsConfig) -> MemoryControlApi {
        self.backend.lock().dns_config = config;
        self
    }

    pub fn with_clients(self, clients: Vec<Client>) -> MemoryControlApi {
        self.backend.lock().clients = clients;
        self
    }

    pub fn with_status(self, status: StatusInfo) -> MemoryControlApi {
        self.backend.lock().status = status;
        self
    }

    pub fn with_credentials(self, name: &str, password: &str) -> MemoryControlApi {
        self.backend.lock().credentials = Some((name.to_string(), password.to_string()));
        self
    }

    /// Makes the next call named `operation` fail with a rejection.
    pub fn fail_next(&self, operation: &str) {
        self.backend.lock().fail_next = Some(operation.to_string());
    }

    /// Names of the operations called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.backend.lock().calls.clone()
    }

    pub fn dns_config(&self) -> DnsConfig {
        self.backend.lock().dns_config.clone()
    }

    fn call<T, F>(&self, operation: &str, handler: F) -> Result<T>
    where
        F: FnOnce(&mut Backend) -> Result<T>,
    {
        let mut backend = self.backend.lock();
        backend.calls.push(operation.to_string());

        if backend.fail_next.as_deref() == Some(operation) {
            backend.fail_next = None;
            return Err(ApiError::Rejected(format!("{} failed", operation)));
        }

        handler(&mut backend)
    }
}

impl ControlApi for MemoryControlApi {
    fn rewrite_list(&self) -> Result<Vec<Rewrite>> {
        self.call("rewrite_list", |backend| Ok(backend.rewrites.clone()))
    }

    fn rewrite_add(&self, rewrite: &Rewrite) -> Result<()> {
        self.call("rewrite_add", |backend| {
            if backend.rewrites.contains(rewrite) {
                return Err(ApiError::Rejected("rewrite already exists".to_string()));
            }
            backend.rewrites.push(rewrite.clone());
            Ok(())
        })
    }

    fn rewrite_update(&self, target: &Rewrite, update: &Rewrite) -> Result<()> {
        self.call("rewrite_update", |backend| {
            match backend.rewrites.iter_mut().find(|r| *r == target) {
                Some(entry) => {
                    *entry = update.clone();
                    Ok(())
                }
                None => Err(ApiError::Rejected("rewrite not found".to_string())),
            }
        })
    }

    fn rewrite_delete(&self, rewrite: &Rewrite) -> Result<()> {
        self.call("rewrite_delete", |backend| {
            let before = backend.rewrites.len();
            backend.rewrites.retain(|r| r != rewrite);
            if backend.rewrites.len() == before {
                return Err(ApiError::Rejected("rewrite not found".to_string()));
            }
            Ok(())
        })
    }

    fn dns_info(&self) -> Result<DnsConfig> {
        self.call("dns_info", |backend| Ok(backend.dns_config.clone()))
    }

    fn set_dns_config(&self, update: &DnsConfigUpdate) -> Result<()> {
        self.call("set_dns_config", |backend| {
            update.apply_to(&mut backend.dns_config);
            Ok(())
        })
    }

    fn test_upstream_dns(&self, upstreams: &[String]) -> Result<BTreeMap<String, String>> {
        self.call("test_upstream_dns", |_| {
            Ok(upstreams
                .iter()
                .map(|upstream| {
                    let verdict = if upstream.contains("invalid") {
                        format!("couldn't communicate with upstream {}", upstream)
                    } else {
                        "OK".to_string()
                    };
                    (upstream.clone(), verdict)
                })
                .collect())
        })
    }

    fn status(&self) -> Result<StatusInfo> {
        self.call("status", |backend| Ok(backend.status.clone()))
    }

    fn clients(&self) -> Result<Vec<Client>> {
        self.call("clients", |backend| Ok(backend.clients.clone()))
    }

    fn client_add(&self, client: &Client) -> Result<()> {
        self.call("client_add", |backend| {
            if backend.clients.iter().any(|c| c.name == client.name) {
                return Err(ApiError::Rejected(format!("client {} already exists", client.name)));
            }
            backend.clients.push(client.clone());
            Ok(())
        })
    }

    fn client_update(&self, name: &str, data: &Client) -> Result<()> {
        self.call("client_update", |backend| {
            match backend.clients.iter_mut().find(|c| c.name == name) {
                Some(entry) => {
                    *entry = data.clone();
                    Ok(())
                }
                None => Err(ApiError::Rejected(format!("client {} not found", name))),
            }
        })
    }

    fn client_delete(&self, name: &str) -> Result<()> {
        self.call("client_delete", |backend| {
            let before = backend.clients.len();
            backend.clients.retain(|c| c.name != name);
            if backend.clients.len() == before {
                return Err(ApiError::Rejected(format!("client {} not found", name)));
            }
            Ok(())
        })
    }

    fn login(&self, name: &str, password: &str) -> Result<()> {
        self.call("login", |backend| match &backend.credentials {
            Some((user, pass)) if user == name && pass == password => Ok(()),
            Some(_) => Err(ApiError::Unauthorized),
            None => Ok(()),
        })
    }
}
