//! Validation helpers for console forms
//!
//! Every validator is a pure function of the field value: `None` when the
//! value passes, otherwise the key of a human-readable message. They run
//! synchronously on every change or blur.

use std::net::IpAddr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::form::FormValue;

lazy_static! {
    /// Valid DNS label pattern (RFC 1035)
    static ref DNS_LABEL_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9_]([a-zA-Z0-9\-_]{0,61}[a-zA-Z0-9_])?$").expect("Failed to compile DNS label regex");
}

const MAX_DNS_NAME_LENGTH: usize = 253;

pub const ERR_REQUIRED: &str = "form_error_required";
pub const ERR_DOMAIN_FORMAT: &str = "form_error_domain_format";
pub const ERR_ANSWER_FORMAT: &str = "form_error_answer_format";
pub const ERR_RULESET_URL: &str = "form_error_ruleset_url";

/// Signature shared by all field validators.
pub type Validator = fn(&FormValue) -> Option<&'static str>;

/// Built-in English text for a message key.
pub fn error_message(key: &str) -> &'static str {
    match key {
        ERR_REQUIRED => "Required field",
        ERR_DOMAIN_FORMAT => "Invalid domain name",
        ERR_ANSWER_FORMAT => "Answer must be an IP address, a domain name, A or AAAA",
        ERR_RULESET_URL => "Each ruleset must be an http:// or https:// URL",
        _ => "Invalid value",
    }
}

/// Rejects empty or whitespace-only text.
pub fn validate_required_value(value: &FormValue) -> Option<&'static str> {
    match value {
        FormValue::Text(s) if s.trim().is_empty() => Some(ERR_REQUIRED),
        _ => None,
    }
}

/// Rewrite domain: a DNS name, optionally starting with a `*.` wildcard.
pub fn validate_domain(value: &FormValue) -> Option<&'static str> {
    let domain = value.as_str().unwrap_or("").trim();
    if domain.is_empty() {
        return None;
    }

    let domain = domain.strip_prefix("*.").unwrap_or(domain);
    if is_dns_name(domain) {
        None
    } else {
        Some(ERR_DOMAIN_FORMAT)
    }
}

/// Rewrite answer: an IP address, a domain name, or the `A` / `AAAA` keywords.
pub fn validate_answer(value: &FormValue) -> Option<&'static str> {
    let answer = value.as_str().unwrap_or("").trim();
    if answer.is_empty() || answer == "A" || answer == "AAAA" {
        return None;
    }

    if answer.parse::<IpAddr>().is_ok() || is_dns_name(answer) {
        None
    } else {
        Some(ERR_ANSWER_FORMAT)
    }
}

/// Every non-comment line of a ruleset list must be an http(s) URL.
pub fn validate_ruleset_urls(value: &FormValue) -> Option<&'static str> {
    let text = value.as_str().unwrap_or("");
    let all_allowed = text
        .lines()
        .filter(|line| !is_comment_or_empty(line))
        .all(|line| is_url_allowed(line.trim()));

    if all_allowed {
        None
    } else {
        Some(ERR_RULESET_URL)
    }
}

fn is_url_allowed(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));

    match rest {
        Some(rest) => !rest.is_empty() && !rest.contains(char::is_whitespace),
        None => false,
    }
}

fn is_dns_name(name: &str) -> bool {
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() || name.len() > MAX_DNS_NAME_LENGTH {
        return false;
    }

    name.split('.').all(|label| DNS_LABEL_REGEX.is_match(label))
}

/// Blank or `#`-commented line.
pub fn is_comment_or_empty(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with('#')
}

/// Drops lines that are empty or whitespace-only.
pub fn remove_empty_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Non-blank lines of a textarea value, trimmed, as sent to the backend.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_value() {
        assert_eq!(validate_required_value(&"".into()), Some(ERR_REQUIRED));
        assert_eq!(validate_required_value(&"   ".into()), Some(ERR_REQUIRED));
        assert_eq!(validate_required_value(&"admin".into()), None);
        assert_eq!(validate_required_value(&false.into()), None);
    }

    #[test]
    fn test_domain() {
        assert_eq!(validate_domain(&"example.org".into()), None);
        assert_eq!(validate_domain(&"*.example.org".into()), None);
        assert_eq!(validate_domain(&"nas.home".into()), None);
        assert_eq!(validate_domain(&"bad domain".into()), Some(ERR_DOMAIN_FORMAT));
        assert_eq!(validate_domain(&"-leading.org".into()), Some(ERR_DOMAIN_FORMAT));
        assert_eq!(validate_domain(&"a..b".into()), Some(ERR_DOMAIN_FORMAT));
        // Emptiness is validate_required_value's concern
        assert_eq!(validate_domain(&"".into()), None);
    }

    #[test]
    fn test_answer() {
        assert_eq!(validate_answer(&"192.168.1.10".into()), None);
        assert_eq!(validate_answer(&"::1".into()), None);
        assert_eq!(validate_answer(&"target.example.org".into()), None);
        assert_eq!(validate_answer(&"A".into()), None);
        assert_eq!(validate_answer(&"AAAA".into()), None);
        assert_eq!(validate_answer(&"not an answer".into()), Some(ERR_ANSWER_FORMAT));
    }

    #[test]
    fn test_ruleset_urls() {
        let ok = "https://example.org/list.txt\n# comment\n\nhttp://lists.example.net/a";
        assert_eq!(validate_ruleset_urls(&ok.into()), None);

        let bad = "https://example.org/list.txt\nftp://example.org/list.txt";
        assert_eq!(validate_ruleset_urls(&bad.into()), Some(ERR_RULESET_URL));

        assert_eq!(validate_ruleset_urls(&"https://".into()), Some(ERR_RULESET_URL));
        assert_eq!(validate_ruleset_urls(&"".into()), None);
    }

    #[test]
    fn test_remove_empty_lines() {
        assert_eq!(remove_empty_lines("1.1.1.1\n\n  \n8.8.8.8\n"), "1.1.1.1\n8.8.8.8");
        assert_eq!(remove_empty_lines(""), "");
        assert_eq!(remove_empty_lines("\n\n"), "");
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(
            split_lines(" tls://dns.example \n\n# keep\n"),
            vec!["tls://dns.example".to_string(), "# keep".to_string()]
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(error_message(ERR_REQUIRED), "Required field");
        assert_eq!(error_message("unknown"), "Invalid value");
    }
}
