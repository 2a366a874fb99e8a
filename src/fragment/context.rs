//! Outbound request context derived from the inbound request.
//!
//! # Responsibilities
//! - Filter inbound cookies through a whitelist into one `Cookie` header
//! - Turn `x-<name>|<variable>` parameters into template variables
//! - Render `{{name:variable}}` tokens in a target URL template
//!
//! # Design Decisions
//! - Cookie parsing is lenient: a malformed pair is skipped, never an error
//! - An empty whitelist forwards the inbound header untouched
//! - Unknown template tokens render as empty strings

use std::collections::BTreeMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

const VARIABLE_PREFIX: &str = "x-";

/// Join whitelisted `name=value` pairs with `"; "`, preserving input order.
pub fn filter_cookies<'a, I>(cookies: I, whitelist: &[String]) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    cookies
        .into_iter()
        .filter(|(name, _)| whitelist.is_empty() || whitelist.iter().any(|w| w.as_str() == *name))
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Split a raw `Cookie` header into `(name, value)` pairs.
///
/// Pairs without `=` or with an empty name are dropped.
pub fn parse_cookie_header(raw: &str) -> Vec<(&str, &str)> {
    raw.split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name, value.trim()))
        })
        .collect()
}

/// Build the outbound `Cookie` header for a backend call.
pub fn outbound_cookie_header(raw: &str, whitelist: &[String]) -> String {
    if whitelist.is_empty() {
        return raw.to_string();
    }
    filter_cookies(parse_cookie_header(raw), whitelist)
}

/// Collect template variables from `x-<name>|<variable>` parameters.
///
/// Each parameter yields `<name>:<variable>` with the raw value and
/// `<name>:<variable>:encoded` with the URI-encoded value.
pub fn template_variables<'a, I>(params: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut variables = BTreeMap::new();
    for (key, value) in params {
        let Some(stripped) = key.strip_prefix(VARIABLE_PREFIX) else {
            continue;
        };
        let (name, variable) = stripped.split_once('|').unwrap_or((stripped, stripped));
        variables.insert(format!("{}:{}", name, variable), value.to_string());
        variables.insert(format!("{}:{}:encoded", name, variable), encode_uri(value));
    }
    variables
}

/// Substitute `{{token}}` occurrences in `template` from `variables`.
pub fn render_url_template(template: &str, variables: &BTreeMap<String, String>) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        rendered.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        match after_open.find("}}") {
            Some(close) => {
                let token = after_open[..close].trim();
                if let Some(value) = variables.get(token) {
                    rendered.push_str(value);
                }
                rest = &after_open[close + 2..];
            }
            None => {
                rendered.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    rendered.push_str(rest);
    rendered
}

/// `encodeURI`: reserved and unreserved characters pass through, everything
/// else is UTF-8 percent-encoded.
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'#')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn encode_uri(value: &str) -> String {
    utf8_percent_encode(value, URI_ENCODE_SET).to_string()
}
