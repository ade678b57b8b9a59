//! Page handlers
//!
//! Each handler replays one browser request against a panel and answers
//! with a `Reply`. Rendering and socket I/O stay in `web::server`, so the
//! handlers can be driven directly from tests.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::json;
use tiny_http::Method;

use crate::ddns::{DdnsOs, DdnsScript, ScriptRenderer, ScriptRequest};
use crate::form::PostedValues;
use crate::panels::alt_upstream::AltUpstreamPanel;
use crate::panels::clients::ClientsPanel;
use crate::panels::login::{LoginForm, LoginPanel};
use crate::panels::rewrites::{DdnsPanel, RewritesPanel};
use crate::panels::version::version_view;
use crate::panels::SubmitOutcome;
use crate::store::{self, Action, ConsoleStore, Rewrite};
use crate::web::util::split_url;
use crate::web::{Result, WebError};

/// A decoded HTTP request.
#[derive(Debug, Clone)]
pub struct ConsoleRequest {
    pub method: Method,
    pub path: String,
    pub query: PostedValues,
    pub form: PostedValues,
    headers: HashMap<String, String>,
}

impl ConsoleRequest {
    pub fn new(method: Method, url: &str) -> ConsoleRequest {
        let (path, query) = split_url(url);
        ConsoleRequest {
            method,
            path,
            query,
            form: PostedValues::new(),
            headers: HashMap::new(),
        }
    }

    pub fn get(url: &str) -> ConsoleRequest {
        ConsoleRequest::new(Method::Get, url)
    }

    pub fn post(url: &str, fields: &[(&str, &str)]) -> ConsoleRequest {
        let mut request = ConsoleRequest::new(Method::Post, url);
        request.form = fields
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        request
    }

    pub fn with_header(mut self, name: &str, value: &str) -> ConsoleRequest {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn host(&self) -> &str {
        self.header("Host").unwrap_or("localhost")
    }

    pub fn json_output(&self) -> bool {
        self.header("Accept")
            .map_or(false, |accept| accept.contains("application/json"))
    }

    fn query_value(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    fn query_flag(&self, name: &str) -> bool {
        matches!(self.query_value(name), Some("1") | Some("true"))
    }

    fn form_value(&self, name: &'static str) -> Result<&str> {
        self.form
            .get(name)
            .map(String::as_str)
            .ok_or(WebError::MissingField(name))
    }
}

#[derive(Debug)]
pub enum Reply {
    Page {
        template: &'static str,
        data: serde_json::Value,
    },
    Redirect(String),
    Download(DdnsScript),
}

/// Remote failures already sit in the notification list; the page is
/// rendered again so they show up.
fn settle<T>(result: store::Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("Remote operation failed: {}", err);
            None
        }
    }
}

fn redirect(location: &str) -> Result<Reply> {
    Ok(Reply::Redirect(location.to_string()))
}

pub struct Pages<'a> {
    store: ConsoleStore,
    scripts: ScriptRenderer<'a>,
    ddns_default_domain: String,
}

impl<'a> Pages<'a> {
    pub fn new(store: ConsoleStore, ddns_default_domain: &str) -> Pages<'a> {
        Pages {
            store,
            scripts: ScriptRenderer::new(ddns_default_domain),
            ddns_default_domain: ddns_default_domain.to_string(),
        }
    }

    pub fn store(&self) -> &ConsoleStore {
        &self.store
    }

    pub fn route(&self, request: &ConsoleRequest) -> Result<Reply> {
        let path = request.path.clone();
        let url_parts: Vec<&str> = path.split('/').filter(|x| !x.is_empty()).collect();

        match (&request.method, url_parts.as_slice()) {
            (Method::Get, []) => self.index(request),

            (Method::Get, ["login"]) => self.login_page(request),
            (Method::Post, ["login"]) => self.login(request),

            (Method::Get, ["filters", "rewrites"]) => self.rewrites_page(request),
            (Method::Post, ["filters", "rewrites"]) => self.rewrite_submit(request),
            (Method::Post, ["filters", "rewrites", "delete"]) => self.rewrite_delete(request),

            (Method::Get, ["settings", "dns"]) => self.dns_page(request),
            (Method::Post, ["settings", "dns"]) => self.dns_submit(request),

            (Method::Get, ["settings", "clients"]) => self.clients_page(request),
            (Method::Post, ["settings", "clients"]) => self.client_submit(request),
            (Method::Post, ["settings", "clients", "delete"]) => self.client_delete(request),

            (Method::Get, ["control", "ddns", "script", os]) => self.ddns_script(request, os),

            (Method::Post, ["notifications", "dismiss"]) => {
                self.store.dispatch(Action::DismissNotifications)?;
                redirect("/")
            }

            (_, _) => Err(WebError::NotFound),
        }
    }

    fn page<T: Serialize>(&self, template: &'static str, title: &str, view: T) -> Result<Reply> {
        let data = json!({
            "title": title,
            "notifications": self.store.take_notifications(),
            "version": version_view(&self.store),
            "page": serde_json::to_value(view)?,
        });
        Ok(Reply::Page { template, data })
    }

    fn index(&self, request: &ConsoleRequest) -> Result<Reply> {
        if request.query_flag("refresh") || !self.store.select(|s| s.dashboard.loaded) {
            settle(self.store.dispatch(Action::FetchStatus));
        }

        let view = self.store.select(|s| {
            json!({
                "loaded": s.dashboard.loaded,
                "service_type": s.dashboard.service_type,
                "rewrites": s.rewrites.list.len(),
                "clients": s.clients.list.len(),
                "authenticated": s.login.authenticated,
            })
        });
        self.page("index", "Overview", view)
    }

    fn login_page(&self, request: &ConsoleRequest) -> Result<Reply> {
        let panel = LoginPanel::new(self.store.clone());
        let form = LoginForm::new(request.host())?;
        self.page("login", "Login", panel.view(&form))
    }

    fn login(&self, request: &ConsoleRequest) -> Result<Reply> {
        let panel = LoginPanel::new(self.store.clone());
        let mut form = LoginForm::new(request.host())?;
        form.apply_posted(&request.form);

        match settle(panel.submit(&mut form)) {
            Some(SubmitOutcome::Submitted) => {
                log::info!("Signed in as {}", form.username());
                redirect("/")
            }
            _ => self.page("login", "Login", panel.view(&form)),
        }
    }

    fn rewrites_page(&self, request: &ConsoleRequest) -> Result<Reply> {
        let panel = RewritesPanel::new(self.store.clone());
        settle(panel.mount(request.query_flag("refresh")));

        match request.query_value("modal") {
            Some("add") => panel.open_add()?,
            Some("edit") => {
                let domain = request.query_value("domain").ok_or(WebError::MissingField("domain"))?;
                let answer = request.query_value("answer").ok_or(WebError::MissingField("answer"))?;
                panel.open_edit(Rewrite::new(domain, answer))?
            }
            Some("close") => panel.close_modal()?,
            _ => {}
        }

        let form = if self.store.select(|s| s.rewrites.modal.is_open) {
            Some(panel.form()?)
        } else {
            None
        };

        let mut ddns = DdnsPanel::new(&self.ddns_default_domain)?;
        if let Some(domain) = request.query_value("ddns_domain") {
            ddns.set_domain(domain);
        }

        self.page("rewrites", "DNS rewrites", panel.view(form.as_ref(), &ddns))
    }

    fn rewrite_submit(&self, request: &ConsoleRequest) -> Result<Reply> {
        let panel = RewritesPanel::new(self.store.clone());
        if !self.store.select(|s| s.rewrites.modal.is_open) {
            panel.open_add()?;
        }

        let mut form = panel.form()?;
        form.apply_posted(&request.form);

        match settle(panel.submit(&mut form)) {
            Some(SubmitOutcome::Submitted) | Some(SubmitOutcome::Suppressed) => {
                redirect("/filters/rewrites")
            }
            Some(SubmitOutcome::Invalid(_)) | None => {
                let ddns = DdnsPanel::new(&self.ddns_default_domain)?;
                self.page("rewrites", "DNS rewrites", panel.view(Some(&form), &ddns))
            }
        }
    }

    fn rewrite_delete(&self, request: &ConsoleRequest) -> Result<Reply> {
        let rewrite = Rewrite::new(
            request.form_value("domain")?,
            request.form_value("answer")?,
        );

        match request.form.get("confirm") {
            None => self.page(
                "confirm",
                "Delete DNS rewrite",
                json!({
                    "prompt": RewritesPanel::delete_prompt(&rewrite),
                    "action": "/filters/rewrites/delete",
                    "back": "/filters/rewrites",
                    "fields": [
                        { "name": "domain", "value": rewrite.domain },
                        { "name": "answer", "value": rewrite.answer },
                    ],
                }),
            ),
            Some(answer) => {
                let confirmed = answer == "yes";
                let panel = RewritesPanel::new(self.store.clone());
                settle(panel.delete(&rewrite, &|_: &str| confirmed));
                redirect("/filters/rewrites")
            }
        }
    }

    fn dns_page(&self, request: &ConsoleRequest) -> Result<Reply> {
        let panel = AltUpstreamPanel::new(self.store.clone());
        settle(panel.mount(request.query_flag("refresh")));

        let form = panel.form()?;
        self.page("dns", "Alternate upstream servers", panel.view(&form))
    }

    fn dns_submit(&self, request: &ConsoleRequest) -> Result<Reply> {
        let panel = AltUpstreamPanel::new(self.store.clone());
        let mut form = panel.form()?;
        form.apply_posted(&request.form);

        if request.form.get("action").map(String::as_str) == Some("test") {
            settle(panel.test_upstreams(&form));
            return self.page("dns", "Alternate upstream servers", panel.view(&form));
        }

        match settle(panel.submit(&mut form)) {
            Some(SubmitOutcome::Submitted) | Some(SubmitOutcome::Suppressed) => {
                redirect("/settings/dns")
            }
            Some(SubmitOutcome::Invalid(_)) | None => {
                self.page("dns", "Alternate upstream servers", panel.view(&form))
            }
        }
    }

    fn clients_page(&self, request: &ConsoleRequest) -> Result<Reply> {
        let panel = ClientsPanel::new(self.store.clone());
        settle(panel.mount(request.query_flag("refresh")));

        let view = match (request.query_value("edit"), request.query_flag("add")) {
            (Some(name), _) => {
                let client = panel.find(name).ok_or(WebError::NotFound)?;
                let form = panel.form(Some(&client))?;
                panel.view(Some((&form, Some(name))))
            }
            (None, true) => {
                let form = panel.form(None)?;
                panel.view(Some((&form, None)))
            }
            (None, false) => panel.view(None),
        };
        self.page("clients", "Persistent clients", view)
    }

    fn client_submit(&self, request: &ConsoleRequest) -> Result<Reply> {
        let panel = ClientsPanel::new(self.store.clone());
        let editing = request
            .form
            .get("editing")
            .map(String::as_str)
            .filter(|name| !name.is_empty());

        let existing = match editing {
            Some(name) => Some(panel.find(name).ok_or(WebError::NotFound)?),
            None => None,
        };

        let mut form = panel.form(existing.as_ref())?;
        form.apply_posted(&request.form, panel.service_type());

        match settle(panel.submit(&mut form, editing)) {
            Some(SubmitOutcome::Submitted) | Some(SubmitOutcome::Suppressed) => {
                redirect("/settings/clients")
            }
            Some(SubmitOutcome::Invalid(_)) | None => self.page(
                "clients",
                "Persistent clients",
                panel.view(Some((&form, editing))),
            ),
        }
    }

    fn client_delete(&self, request: &ConsoleRequest) -> Result<Reply> {
        let name = request.form_value("name")?;

        match request.form.get("confirm") {
            None => self.page(
                "confirm",
                "Delete client",
                json!({
                    "prompt": ClientsPanel::delete_prompt(name),
                    "action": "/settings/clients/delete",
                    "back": "/settings/clients",
                    "fields": [{ "name": "name", "value": name }],
                }),
            ),
            Some(answer) => {
                let confirmed = answer == "yes";
                let panel = ClientsPanel::new(self.store.clone());
                settle(panel.delete(name, &|_: &str| confirmed));
                redirect("/settings/clients")
            }
        }
    }

    fn ddns_script(&self, request: &ConsoleRequest, os: &str) -> Result<Reply> {
        let os: DdnsOs = os.parse().map_err(|_| WebError::NotFound)?;
        let script = self.scripts.render(
            os,
            &ScriptRequest {
                domain: request.query_value("domain"),
                host: request.host(),
                forwarded_proto: request.header("X-Forwarded-Proto"),
                cookie_header: request.header("Cookie"),
            },
        )?;
        Ok(Reply::Download(script))
    }
}
