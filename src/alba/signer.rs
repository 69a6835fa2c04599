//! Request signing
//!
//! Every signed Alba request carries a `check` field: base64 of an HMAC-SHA256
//! over a canonical four-line string
//!
//! ```text
//! METHOD
//! host[:port]
//! /path/
//! key=value&key=value
//! ```
//!
//! The remote side rebuilds the same string, so every step here must match
//! it byte for byte. The legacy MD5 checks (payment type listing and
//! callback notifications) live here too.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::Sha256;
use std::cmp::Ordering;

use crate::alba::types::RequestParams;

type HmacSha256 = Hmac<Sha256>;

/// Everything except RFC 3986 unreserved characters is escaped
const RFC3986: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Callback fields covered by the notification check, in hashing order
pub const CALLBACK_FIELDS: [&str; 18] = [
    "tid",
    "name",
    "comment",
    "partner_id",
    "service_id",
    "order_id",
    "type",
    "cost",
    "income_total",
    "income",
    "partner_income",
    "system_income",
    "command",
    "phone_number",
    "email",
    "resultStr",
    "date_created",
    "version",
];

/// Key ordering used for signing.
///
/// Keys compare case-insensitively first; byte order breaks ties so the
/// ordering stays total.
pub fn collate(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| a.cmp(b))
}

/// Sign a request.
///
/// `url` is the request URL without query string. With
/// `skip_non_standard_port` a port other than 80 is left out of the signed host.
pub fn sign(
    method: &str,
    url: &str,
    params: &RequestParams,
    secret: &str,
    skip_non_standard_port: bool,
) -> String {
    let data = canonical_string(method, url, params, skip_non_standard_port);

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data.as_bytes());

    STANDARD.encode(mac.finalize().into_bytes())
}

/// The exact text that [`sign`] feeds into the HMAC
pub fn canonical_string(
    method: &str,
    url: &str,
    params: &RequestParams,
    skip_non_standard_port: bool,
) -> String {
    let url = url.to_ascii_lowercase();
    let parts = UrlParts::parse(&url);

    let path = match parts.path {
        Some(path) => format!("{}/", path.trim_end_matches(['/', '\\'])),
        None => String::new(),
    };

    let mut host = parts.host;
    if let Some(port) = parts.port {
        if port != 80 && !skip_non_standard_port {
            host.push_str(&format!(":{}", port));
        }
    }

    [method.to_uppercase(), host, path, encode_params(params)].join("\n")
}

/// `key=value` pairs in signing order, values percent-encoded per RFC 3986
pub fn encode_params(params: &RequestParams) -> String {
    params
        .sorted()
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, utf8_percent_encode(value, RFC3986)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Check token of the payment type listing: md5(service_id . secret)
pub fn pay_types_check(service_id: u64, secret: &str) -> String {
    md5_hex(format!("{}{}", service_id, secret).as_bytes())
}

/// Check token of a callback notification.
///
/// Values of [`CALLBACK_FIELDS`] present in the notification are concatenated
/// in list order, the secret is appended and the result is MD5-hashed.
pub fn callback_check<'a, F>(field: F, secret: &str) -> String
where
    F: Fn(&str) -> Option<&'a str>,
{
    let mut data: String = CALLBACK_FIELDS.iter().filter_map(|name| field(*name)).collect();
    data.push_str(secret);
    md5_hex(data.as_bytes())
}

fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Constant-time string comparison
pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Host, port and path exactly as written in the URL.
///
/// Nothing is normalized: dot segments, spaces and non-ASCII bytes reach the
/// signature untouched.
#[derive(Debug, Default)]
struct UrlParts {
    host: String,
    port: Option<u16>,
    path: Option<String>,
}

impl UrlParts {
    /// Never fails: an authority that cannot be read yields empty parts.
    ///
    /// Without `scheme://` or `//` the whole input up to the query is a path.
    fn parse(url: &str) -> Self {
        let after_scheme = match url.split_once("://") {
            Some((scheme, rest)) if is_scheme(scheme) => Some(rest),
            _ => url.strip_prefix("//"),
        };

        let Some(rest) = after_scheme else {
            return Self {
                path: non_empty(strip_query(url)),
                ..Self::default()
            };
        };

        let split = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let (authority, tail) = rest.split_at(split);

        match split_authority(authority) {
            Some((host, port)) => Self {
                host: host.to_string(),
                port,
                path: non_empty(strip_query(tail)),
            },
            None => Self::default(),
        }
    }
}

fn is_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or_default()
}

fn non_empty(path: &str) -> Option<String> {
    (!path.is_empty()).then(|| path.to_string())
}

/// `[user[:pass]@]host[:port]`, `None` when the port is not a valid number
fn split_authority(authority: &str) -> Option<(&str, Option<u16>)> {
    let host_port = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host_port)| host_port);

    // an IPv6 literal keeps its colons inside the brackets
    let port_sep = match host_port.rfind(']') {
        Some(close) => host_port[close..].find(':').map(|idx| close + idx),
        None => host_port.rfind(':'),
    };

    match port_sep {
        Some(idx) => {
            let (host, port) = (&host_port[..idx], &host_port[idx + 1..]);
            if port.is_empty() {
                return Some((host, None));
            }
            port.parse().ok().map(|port| (host, Some(port)))
        }
        None => Some((host_port, None)),
    }
}
