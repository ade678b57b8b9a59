use std::collections::HashMap;
use std::io::Read;

use percent_encoding::percent_decode_str;

use crate::form::PostedValues;
use crate::web::{Result, WebError};

/// Decodes one `application/x-www-form-urlencoded` component.
pub fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Parses `a=1&b=2` pairs. Repeated keys keep their last value.
pub fn parse_pairs(raw: &str) -> PostedValues {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next().unwrap_or("");
            let value = parts.next().unwrap_or("");
            (decode_component(key), decode_component(value))
        })
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

pub fn parse_formdata<R: Read>(reader: &mut R) -> Result<PostedValues> {
    let mut data = String::new();
    reader.read_to_string(&mut data)?;
    Ok(parse_pairs(data.trim_end()))
}

/// Flattens a JSON object body into posted form values. `true` becomes a
/// checked box, `false` and `null` are left out like unchecked boxes, and
/// arrays become one line per element.
pub fn parse_json_body<R: Read>(reader: &mut R) -> Result<PostedValues> {
    let body: HashMap<String, serde_json::Value> = serde_json::from_reader(reader)?;

    let mut posted = PostedValues::new();
    for (key, value) in body {
        let text = match value {
            serde_json::Value::Null | serde_json::Value::Bool(false) => continue,
            serde_json::Value::Bool(true) => "on".to_string(),
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join("\n"),
            serde_json::Value::Object(_) => return Err(WebError::InvalidRequest),
        };
        posted.insert(key, text);
    }
    Ok(posted)
}

/// Splits a request URL into its path segments and query values.
pub fn split_url(url: &str) -> (String, PostedValues) {
    match url.find('?') {
        Some(idx) => (url[..idx].to_string(), parse_pairs(&url[idx + 1..])),
        None => (url.to_string(), PostedValues::new()),
    }
}
