//! Driver construction parameters.
//!
//! Parameters are an untyped bag handed to a backend constructor. Each
//! backend validates the keys it needs once, when it is built or
//! reconfigured, and never at call time.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::{DriverError, DriverResult};

pub const DEFAULT_READ_PAGE_SIZE: usize = 512;
pub const DEFAULT_MAX_PAGES: usize = 10_000;

/// Option name to value mapping used to build a driver
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Parameters(HashMap<String, Value>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Value rendered as text; numbers and booleans are stringified
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Parameters
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// ============================================================================
// Engine Config
// ============================================================================

/// Validated settings for the remote registry engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Normalised registry base URL
    pub api_url: Url,
    pub read_page_size: usize,
    /// Upper bound on pages fetched by a single collection read
    pub max_pages: usize,
}

impl EngineConfig {
    /// Parse `apiurl`, `readpagesize` and `maxpages`.
    ///
    /// `apiurl` is mandatory. The numeric keys fall back to their defaults
    /// when absent or non-numeric. Zero also falls back: a zero page size
    /// would never advance the scan and a zero page bound would fail every
    /// read, so neither is accepted as configured.
    pub fn from_parameters(parameters: &Parameters) -> DriverResult<Self> {
        let raw = parameters
            .get_str("apiurl")
            .ok_or_else(|| DriverError::construction("apiurl", "missing"))?;

        Ok(Self {
            api_url: normalize_api_url(&raw)?,
            read_page_size: positive_or(parameters, "readpagesize", DEFAULT_READ_PAGE_SIZE),
            max_pages: positive_or(parameters, "maxpages", DEFAULT_MAX_PAGES),
        })
    }
}

fn positive_or(parameters: &Parameters, key: &str, default: usize) -> usize {
    parameters
        .get_str(key)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

/// Default the scheme to `http`, clean the path, keep the query.
pub fn normalize_api_url(raw: &str) -> DriverResult<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(DriverError::construction("apiurl", "empty"));
    }

    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    let mut url = Url::parse(&candidate)
        .map_err(|e| DriverError::construction("apiurl", format!("{raw}: {e}")))?;

    if url.host_str().is_none_or(str::is_empty) {
        return Err(DriverError::construction("apiurl", format!("{raw}: no host")));
    }

    let cleaned = clean_path(url.path());
    url.set_path(&cleaned);
    url.set_fragment(None);
    Ok(url)
}

/// Lexical path cleanup: collapse repeated slashes, drop `.`, resolve `..`
/// and strip the trailing slash.
fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    format!("/{}", parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Parameters {
        Parameters::new().with("apiurl", "http://registry.local:8985/cloudtask/v2/")
    }

    #[test]
    fn defaults_apply() {
        let config = EngineConfig::from_parameters(&base()).unwrap();
        assert_eq!(config.read_page_size, DEFAULT_READ_PAGE_SIZE);
        assert_eq!(config.max_pages, DEFAULT_MAX_PAGES);
        assert_eq!(
            config.api_url.as_str(),
            "http://registry.local:8985/cloudtask/v2"
        );
    }

    #[test]
    fn page_size_from_string_or_number() {
        let text = EngineConfig::from_parameters(&base().with("readpagesize", "100")).unwrap();
        assert_eq!(text.read_page_size, 100);

        let number = EngineConfig::from_parameters(&base().with("readpagesize", 64)).unwrap();
        assert_eq!(number.read_page_size, 64);
    }

    #[test]
    fn bad_page_size_falls_back() {
        let config = EngineConfig::from_parameters(&base().with("readpagesize", "lots")).unwrap();
        assert_eq!(config.read_page_size, DEFAULT_READ_PAGE_SIZE);

        let config = EngineConfig::from_parameters(&base().with("readpagesize", 0)).unwrap();
        assert_eq!(config.read_page_size, DEFAULT_READ_PAGE_SIZE);
    }

    #[test]
    fn zero_bounds_fall_back() {
        let config = EngineConfig::from_parameters(
            &base().with("readpagesize", "0").with("maxpages", 0),
        )
        .unwrap();
        assert_eq!(config.read_page_size, DEFAULT_READ_PAGE_SIZE);
        assert_eq!(config.max_pages, DEFAULT_MAX_PAGES);

        let config = EngineConfig::from_parameters(&base().with("maxpages", "25")).unwrap();
        assert_eq!(config.max_pages, 25);
    }

    #[test]
    fn missing_api_url_is_rejected() {
        let err = EngineConfig::from_parameters(&Parameters::new().with("hosts", "etcd:2379"))
            .unwrap_err();
        assert!(matches!(err, DriverError::Construction { key: "apiurl", .. }));
    }

    #[test]
    fn unparsable_api_url_is_rejected() {
        for raw in ["", "http://", "http://exa mple.com/"] {
            let err = EngineConfig::from_parameters(&Parameters::new().with("apiurl", raw));
            assert!(err.is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn url_normalization() {
        let url = normalize_api_url("registry.local//api/./v1/../v2/?token=abc").unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.path(), "/api/v2");
        assert_eq!(url.query(), Some("token=abc"));

        let root = normalize_api_url("https://registry.local").unwrap();
        assert_eq!(root.path(), "/");
    }

    #[test]
    fn collects_from_iterator() {
        let params: Parameters = [("hosts", "a:2379"), ("apiurl", "http://r")]
            .into_iter()
            .collect();
        assert_eq!(params.len(), 2);
        assert_eq!(params.get_str("hosts").as_deref(), Some("a:2379"));
    }
}
