//! DDNS helper scripts
//!
//! The rewrites panel links to `/control/ddns/script/{os}?domain=...`. The
//! handler renders a small shell or PowerShell script that keeps a rewrite
//! for `domain` pointed at the machine running it.

use std::fmt;
use std::str::FromStr;

use derive_more::Display;
use handlebars::Handlebars;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::json;

use crate::form::validation::validate_domain;
use crate::form::FormValue;

pub const DEFAULT_DOMAIN: &str = "nas.home";

const SESSION_COOKIE: &str = "agh_session";

/// Characters `encodeURIComponent` leaves alone besides alphanumerics.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdnsOs {
    Windows,
    Linux,
    Macos,
}

impl DdnsOs {
    pub const ALL: [DdnsOs; 3] = [DdnsOs::Windows, DdnsOs::Linux, DdnsOs::Macos];

    pub fn as_str(&self) -> &'static str {
        match self {
            DdnsOs::Windows => "windows",
            DdnsOs::Linux => "linux",
            DdnsOs::Macos => "macos",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            DdnsOs::Windows => "Windows",
            DdnsOs::Linux => "Linux",
            DdnsOs::Macos => "macOS",
        }
    }

    fn template_name(&self) -> &'static str {
        match self {
            DdnsOs::Windows => "windows.ps1",
            DdnsOs::Linux | DdnsOs::Macos => "unix.sh",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            DdnsOs::Windows => "ddns-script.ps1",
            DdnsOs::Linux | DdnsOs::Macos => "ddns-script.sh",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            DdnsOs::Windows => "application/octet-stream",
            DdnsOs::Linux | DdnsOs::Macos => "application/x-sh",
        }
    }
}

impl fmt::Display for DdnsOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DdnsOs {
    type Err = DdnsError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "windows" => Ok(DdnsOs::Windows),
            "linux" => Ok(DdnsOs::Linux),
            "macos" => Ok(DdnsOs::Macos),
            other => Err(DdnsError::UnknownOs(other.to_string())),
        }
    }
}

#[derive(Debug, Display)]
pub enum DdnsError {
    #[display(fmt = "unsupported operating system '{}'", _0)]
    UnknownOs(String),
    #[display(fmt = "invalid domain '{}'", _0)]
    InvalidDomain(String),
    #[display(fmt = "invalid host '{}'", _0)]
    InvalidHost(String),
    #[display(fmt = "template error: {}", _0)]
    Template(handlebars::RenderError),
}

impl From<handlebars::RenderError> for DdnsError {
    fn from(err: handlebars::RenderError) -> Self {
        DdnsError::Template(err)
    }
}

impl std::error::Error for DdnsError {}

pub type Result<T> = std::result::Result<T, DdnsError>;

/// Percent-encodes `value` the way a browser's `encodeURIComponent` does.
pub fn encode_uri_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

/// Download link for one OS button, or `None` while the domain is empty.
pub fn script_url(os: DdnsOs, domain: &str) -> Option<String> {
    if domain.is_empty() {
        return None;
    }
    Some(format!(
        "/control/ddns/script/{}?domain={}",
        os,
        encode_uri_component(domain)
    ))
}

fn is_host_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']')
}

fn is_cookie_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '=' | '-' | '_' | '.' | '%')
}

/// Base URL of the console as seen by the requesting browser.
pub fn server_url(host: &str, forwarded_proto: Option<&str>) -> String {
    let scheme = match forwarded_proto.map(str::trim) {
        Some("https") => "https",
        _ => "http",
    };
    format!("{}://{}", scheme, host)
}

/// Keeps only the session cookie pairs of a `Cookie` header.
pub fn session_cookies(cookie_header: Option<&str>) -> String {
    cookie_header
        .unwrap_or("")
        .split(';')
        .map(str::trim)
        .filter(|pair| {
            pair.split('=').next() == Some(SESSION_COOKIE) && pair.chars().all(is_cookie_char)
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// A rendered script ready to be sent as an attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct DdnsScript {
    pub file_name: &'static str,
    pub content_type: &'static str,
    pub body: String,
}

/// Request data the script is rendered from.
#[derive(Debug, Clone, Default)]
pub struct ScriptRequest<'a> {
    pub domain: Option<&'a str>,
    pub host: &'a str,
    pub forwarded_proto: Option<&'a str>,
    pub cookie_header: Option<&'a str>,
}

pub struct ScriptRenderer<'a> {
    registry: Handlebars<'a>,
    default_domain: String,
}

impl<'a> ScriptRenderer<'a> {
    pub fn new(default_domain: &str) -> ScriptRenderer<'a> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry.set_strict_mode(true);
        for (name, source) in &[
            ("unix.sh", include_str!("templates/unix.sh")),
            ("windows.ps1", include_str!("templates/windows.ps1")),
        ] {
            if let Err(err) = registry.register_template_string(name, *source) {
                log::error!("Failed to register script template {}: {}", name, err);
            }
        }

        let default_domain = if default_domain.is_empty() {
            DEFAULT_DOMAIN
        } else {
            default_domain
        };

        ScriptRenderer {
            registry,
            default_domain: default_domain.to_string(),
        }
    }

    pub fn render(&self, os: DdnsOs, request: &ScriptRequest) -> Result<DdnsScript> {
        let domain = request
            .domain
            .map(str::trim)
            .filter(|domain| !domain.is_empty())
            .unwrap_or(self.default_domain.as_str());

        // The domain lands inside a script, so it must be a plain DNS name
        if validate_domain(&FormValue::text(domain)).is_some() {
            return Err(DdnsError::InvalidDomain(domain.to_string()));
        }
        if request.host.is_empty() || !request.host.chars().all(is_host_char) {
            return Err(DdnsError::InvalidHost(request.host.to_string()));
        }

        let data = json!({
            "server_name": server_url(request.host, request.forwarded_proto),
            "username": "",
            "password": "",
            "domain": domain,
            "cookies": session_cookies(request.cookie_header),
        });

        let body = self.registry.render(os.template_name(), &data)?;
        log::info!("Rendered {} DDNS script for {}", os, domain);

        Ok(DdnsScript {
            file_name: os.file_name(),
            content_type: os.content_type(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_url() {
        assert_eq!(
            script_url(DdnsOs::Linux, "nas.home"),
            Some("/control/ddns/script/linux?domain=nas.home".to_string())
        );
        assert_eq!(
            script_url(DdnsOs::Windows, "my nas&co"),
            Some("/control/ddns/script/windows?domain=my%20nas%26co".to_string())
        );
        assert_eq!(script_url(DdnsOs::Macos, ""), None);
    }

    #[test]
    fn test_encode_uri_component_keeps_unreserved() {
        assert_eq!(encode_uri_component("a-b_c.d!e~f*g'h(i)"), "a-b_c.d!e~f*g'h(i)");
        assert_eq!(encode_uri_component("a/b?c=d"), "a%2Fb%3Fc%3Dd");
        assert_eq!(encode_uri_component("é"), "%C3%A9");
    }

    #[test]
    fn test_os_parse() {
        assert_eq!("windows".parse::<DdnsOs>().unwrap(), DdnsOs::Windows);
        assert_eq!("macos".parse::<DdnsOs>().unwrap(), DdnsOs::Macos);
        assert!("plan9".parse::<DdnsOs>().is_err());
    }

    #[test]
    fn test_server_url() {
        assert_eq!(server_url("console.lan:8080", None), "http://console.lan:8080");
        assert_eq!(server_url("console.lan", Some("https")), "https://console.lan");
        assert_eq!(server_url("console.lan", Some("")), "http://console.lan");
    }

    #[test]
    fn test_session_cookies() {
        assert_eq!(
            session_cookies(Some("theme=dark; agh_session=abc123; lang=en")),
            "agh_session=abc123"
        );
        assert_eq!(session_cookies(Some("theme=dark")), "");
        assert_eq!(session_cookies(Some("agh_session=\"$(id)\"")), "");
        assert_eq!(session_cookies(None), "");
    }

    #[test]
    fn test_render_unix_script() {
        let renderer = ScriptRenderer::new(DEFAULT_DOMAIN);
        let script = renderer
            .render(
                DdnsOs::Linux,
                &ScriptRequest {
                    domain: Some("media.home"),
                    host: "console.lan",
                    forwarded_proto: Some("https"),
                    cookie_header: Some("agh_session=abc; other=1"),
                },
            )
            .unwrap();

        assert_eq!(script.file_name, "ddns-script.sh");
        assert_eq!(script.content_type, "application/x-sh");
        assert!(script.body.starts_with("#!/bin/sh"));
        assert!(script.body.contains("SERVER=\"https://console.lan\""));
        assert!(script.body.contains("DOMAIN=\"media.home\""));
        assert!(script.body.contains("COOKIE=\"agh_session=abc\""));
    }

    #[test]
    fn test_render_windows_script_defaults_domain() {
        let renderer = ScriptRenderer::new(DEFAULT_DOMAIN);
        let script = renderer
            .render(
                DdnsOs::Windows,
                &ScriptRequest {
                    domain: Some(""),
                    host: "console.lan",
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(script.file_name, "ddns-script.ps1");
        assert_eq!(script.content_type, "application/octet-stream");
        assert!(script.body.contains("$Domain = \"nas.home\""));
    }

    #[test]
    fn test_render_rejects_unsafe_domain() {
        let renderer = ScriptRenderer::new(DEFAULT_DOMAIN);
        let result = renderer.render(
            DdnsOs::Linux,
            &ScriptRequest {
                domain: Some("x\"; rm -rf ~"),
                host: "console.lan",
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(DdnsError::InvalidDomain(_))));

        let result = renderer.render(
            DdnsOs::Linux,
            &ScriptRequest {
                domain: Some("nas.home"),
                host: "evil\"host",
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(DdnsError::InvalidHost(_))));
    }
}
