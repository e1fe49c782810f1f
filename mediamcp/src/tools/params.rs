//! Parameter checks shared by several tools.

use url::Url;

use crate::errors::{Error, Result};

/// Reject anything that is not an absolute `http://` or `https://` URL.
pub fn require_http_url(field: &str, value: &str) -> Result<()> {
    let value = value.trim();
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(Error::invalid_input(format!("{field} must start with http:// or https://")));
    }
    Url::parse(value).map_err(|e| Error::invalid_input(format!("{field} is not a valid URL: {e}")))?;
    Ok(())
}

pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::invalid_input(format!("{field} must not be empty")));
    }
    Ok(())
}

/// The trimmed value of an optional string field, treating blank as absent.
pub fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Last path segment of `url` without its extension, or `output` when there is none.
pub fn url_stem(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            let segment = u.path_segments()?.next_back()?.to_string();
            let stem = match segment.rsplit_once('.') {
                Some((stem, _)) => stem.to_string(),
                None => segment,
            };
            (!stem.is_empty()).then_some(stem)
        })
        .unwrap_or_else(|| "output".to_string())
}
