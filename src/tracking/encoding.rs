//! Request URL construction and query-string encoding.

use url::form_urlencoded;

/// Encode a query value the way the search endpoint expects.
///
/// Everything outside `[A-Za-z0-9_.-]` and space becomes uppercase `%XX`;
/// space becomes `+`.
#[must_use]
pub fn encode_param(value: &str) -> String {
    // byte_serialize also leaves '*' bare, which the endpoint wants escaped.
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('*', "%2A")
}

/// Build the full request URL: `start`, `hl` and `q` first, then any extras.
#[must_use]
pub fn build_url(endpoint: &str, params: &[(&str, &str)]) -> String {
    let query = params
        .iter()
        .map(|(key, value)| format!("{key}={}", encode_param(value)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{endpoint}?{query}")
}

/// Lowercase, hyphenated, filename-safe form of a query.
#[must_use]
pub fn slugify(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}
