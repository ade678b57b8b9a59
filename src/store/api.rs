//! Backend transport for the appliance `/control` REST API.

use std::collections::BTreeMap;
use std::time::Duration;

use derive_more::Display;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// One DNS rewrite rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rewrite {
    pub domain: String,
    pub answer: String,
}

impl Rewrite {
    pub fn new(domain: impl Into<String>, answer: impl Into<String>) -> Rewrite {
        Rewrite {
            domain: domain.into(),
            answer: answer.into(),
        }
    }
}

/// DNS settings as returned by `/control/dns_info`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsConfig {
    #[serde(default)]
    pub upstream_dns: Vec<String>,
    /// Non-empty when upstreams are managed through a file on the server.
    #[serde(default)]
    pub upstream_dns_file: String,
    #[serde(default)]
    pub bootstrap_dns: Vec<String>,
    #[serde(default)]
    pub upstream_alternate_dns: Vec<String>,
    #[serde(default)]
    pub upstream_alternate_rulesets: Vec<String>,
}

/// Partial update for `/control/dns_config`. Absent keys are left alone by
/// the server and are omitted from the JSON body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DnsConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_alternate_dns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_alternate_rulesets: Option<Vec<String>>,
}

impl DnsConfigUpdate {
    /// Merges the present keys into a fetched configuration.
    pub fn apply_to(&self, config: &mut DnsConfig) {
        if let Some(dns) = &self.upstream_alternate_dns {
            config.upstream_alternate_dns = dns.clone();
        }
        if let Some(rulesets) = &self.upstream_alternate_rulesets {
            config.upstream_alternate_rulesets = rulesets.clone();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SafeSearchConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Per search engine toggles, e.g. `google`, `youtube`.
    #[serde(flatten)]
    pub services: BTreeMap<String, bool>,
}

/// A persistent client and its protection policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub name: String,
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub use_global_settings: bool,
    #[serde(default)]
    pub filtering_enabled: bool,
    #[serde(default)]
    pub safebrowsing_enabled: bool,
    #[serde(default)]
    pub parental_enabled: bool,
    #[serde(default)]
    pub safe_search: SafeSearchConfig,
    #[serde(default)]
    pub ignore_querylog: bool,
    #[serde(default)]
    pub ignore_statistics: bool,
    /// Fields the console does not model (tags, upstreams, blocked
    /// services, ...). The update endpoint replaces the whole record, so
    /// they are kept and sent back as received.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ClientsResponse {
    #[serde(default)]
    clients: Vec<Client>,
}

/// Subset of `/control/status` the console uses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusInfo {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub protection_enabled: bool,
    /// Subscription tier of the hosted service, when the backend reports one.
    #[serde(default)]
    pub service_type: Option<String>,
}

#[derive(Debug, Display)]
pub enum ApiError {
    #[display(fmt = "request failed: {}", _0)]
    Http(reqwest::Error),
    #[display(fmt = "backend returned {}: {}", code, body)]
    Status { code: u16, body: String },
    #[display(fmt = "invalid backend payload: {}", _0)]
    Serialization(serde_json::Error),
    #[display(fmt = "not authorized")]
    Unauthorized,
    #[display(fmt = "{}", _0)]
    Rejected(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Http(err)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Serialization(err)
    }
}

impl std::error::Error for ApiError {}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Operations the console performs against the appliance.
pub trait ControlApi: Send + Sync {
    fn rewrite_list(&self) -> Result<Vec<Rewrite>>;
    fn rewrite_add(&self, rewrite: &Rewrite) -> Result<()>;
    fn rewrite_update(&self, target: &Rewrite, update: &Rewrite) -> Result<()>;
    fn rewrite_delete(&self, rewrite: &Rewrite) -> Result<()>;

    fn dns_info(&self) -> Result<DnsConfig>;
    fn set_dns_config(&self, update: &DnsConfigUpdate) -> Result<()>;
    /// Upstream address to `"OK"` or an error description.
    fn test_upstream_dns(&self, upstreams: &[String]) -> Result<BTreeMap<String, String>>;

    fn status(&self) -> Result<StatusInfo>;

    fn clients(&self) -> Result<Vec<Client>>;
    fn client_add(&self, client: &Client) -> Result<()>;
    fn client_update(&self, name: &str, data: &Client) -> Result<()>;
    fn client_delete(&self, name: &str) -> Result<()>;

    fn login(&self, name: &str, password: &str) -> Result<()>;
}

/// `ControlApi` over HTTP. The session cookie set by `/control/login` is
/// kept in the client's cookie store and sent on later requests.
pub struct HttpControlApi {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpControlApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<HttpControlApi> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()?;

        Ok(HttpControlApi {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/control/{}", self.base_url, path)
    }

    fn check(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized);
        }

        let body = response.text().unwrap_or_default();
        Err(ApiError::Status {
            code: status.as_u16(),
            body: body.trim().to_string(),
        })
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        log::debug!("GET {}", path);
        let response = Self::check(self.client.get(self.url(path)).send()?)?;
        let body = response.text()?;
        Ok(serde_json::from_str(&body)?)
    }

    fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::blocking::Response> {
        log::debug!("POST {}", path);
        Self::check(self.client.post(self.url(path)).json(body).send()?)
    }

    fn put<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::blocking::Response> {
        log::debug!("PUT {}", path);
        Self::check(self.client.put(self.url(path)).json(body).send()?)
    }
}

impl ControlApi for HttpControlApi {
    fn rewrite_list(&self) -> Result<Vec<Rewrite>> {
        self.get_json("rewrite/list")
    }

    fn rewrite_add(&self, rewrite: &Rewrite) -> Result<()> {
        self.post("rewrite/add", rewrite).map(|_| ())
    }

    fn rewrite_update(&self, target: &Rewrite, update: &Rewrite) -> Result<()> {
        let body = json!({ "target": target, "update": update });
        self.put("rewrite/update", &body).map(|_| ())
    }

    fn rewrite_delete(&self, rewrite: &Rewrite) -> Result<()> {
        self.post("rewrite/delete", rewrite).map(|_| ())
    }

    fn dns_info(&self) -> Result<DnsConfig> {
        self.get_json("dns_info")
    }

    fn set_dns_config(&self, update: &DnsConfigUpdate) -> Result<()> {
        self.post("dns_config", update).map(|_| ())
    }

    fn test_upstream_dns(&self, upstreams: &[String]) -> Result<BTreeMap<String, String>> {
        let body = json!({ "upstream_dns": upstreams });
        let response = self.post("test_upstream_dns", &body)?;
        let text = response.text()?;
        Ok(serde_json::from_str(&text)?)
    }

    fn status(&self) -> Result<StatusInfo> {
        self.get_json("status")
    }

    fn clients(&self) -> Result<Vec<Client>> {
        let response: ClientsResponse = self.get_json("clients")?;
        Ok(response.clients)
    }

    fn client_add(&self, client: &Client) -> Result<()> {
        self.post("clients/add", client).map(|_| ())
    }

    fn client_update(&self, name: &str, data: &Client) -> Result<()> {
        let body = json!({ "name": name, "data": data });
        self.post("clients/update", &body).map(|_| ())
    }

    fn client_delete(&self, name: &str) -> Result<()> {
        let body = json!({ "name": name });
        self.post("clients/delete", &body).map(|_| ())
    }

    fn login(&self, name: &str, password: &str) -> Result<()> {
        let body = json!({ "name": name, "password": password });
        self.post("login", &body).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dns_config_update_omits_absent_keys() {
        let update = DnsConfigUpdate {
            upstream_alternate_dns: None,
            upstream_alternate_rulesets: Some(vec!["https://lists.example.org/cn.txt".to_string()]),
        };

        let value = serde_json::to_value(&update).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("upstream_alternate_dns"));
        assert!(object.contains_key("upstream_alternate_rulesets"));
    }

    #[test]
    fn test_dns_config_update_apply() {
        let mut config = DnsConfig {
            upstream_alternate_dns: vec!["1.1.1.1".to_string()],
            ..Default::default()
        };

        DnsConfigUpdate {
            upstream_alternate_dns: None,
            upstream_alternate_rulesets: Some(vec!["https://a.example/list".to_string()]),
        }
        .apply_to(&mut config);

        assert_eq!(config.upstream_alternate_dns, vec!["1.1.1.1".to_string()]);
        assert_eq!(config.upstream_alternate_rulesets, vec!["https://a.example/list".to_string()]);
    }

    #[test]
    fn test_client_deserialize_with_safe_search_services() {
        let raw = r#"{
            "name": "laptop",
            "ids": ["192.168.1.20"],
            "use_global_settings": false,
            "filtering_enabled": true,
            "safe_search": {"enabled": true, "google": true, "youtube": false}
        }"#;

        let client: Client = serde_json::from_str(raw).unwrap();
        assert_eq!(client.name, "laptop");
        assert!(client.filtering_enabled);
        assert!(!client.parental_enabled);
        assert!(client.safe_search.enabled);
        assert_eq!(client.safe_search.services.get("google"), Some(&true));
        assert_eq!(client.safe_search.services.get("youtube"), Some(&false));
        assert!(!client.safe_search.services.contains_key("enabled"));
    }

    #[test]
    fn test_status_without_service_type() {
        let status: StatusInfo = serde_json::from_str(r#"{"version": "v0.107.43", "running": true}"#).unwrap();
        assert_eq!(status.version, "v0.107.43");
        assert_eq!(status.service_type, None);
    }

    #[test]
    fn test_client_keeps_unmodeled_fields() {
        let raw = r#"{
            "name": "nas",
            "ids": ["192.168.1.5"],
            "filtering_enabled": true,
            "tags": ["device_nas"],
            "upstreams": ["9.9.9.9"]
        }"#;

        let client: Client = serde_json::from_str(raw).unwrap();
        assert!(client.filtering_enabled);
        assert_eq!(client.extra.get("tags"), Some(&json!(["device_nas"])));

        let value = serde_json::to_value(&client).unwrap();
        assert_eq!(value["upstreams"], json!(["9.9.9.9"]));
        assert_eq!(value["name"], "nas");
    }
}
