use std::collections::{BTreeMap, HashMap};

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};

use crate::error::{ConsoleError, ConsoleResult};

/// What a handler sees of an incoming HTTP request.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    params: HashMap<String, String>,
}

impl ActionRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            params: HashMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Invalid header names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Later pairs win over earlier ones with the same name.
    pub fn with_params<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in pairs {
            self.params.insert(name.into(), value.into());
        }
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw parameter value, blank or not.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Trimmed value, `None` when absent or blank.
    pub fn non_blank(&self, name: &str) -> Option<&str> {
        self.param(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn required(&self, name: &str) -> ConsoleResult<&str> {
        self.non_blank(name)
            .ok_or_else(|| ConsoleError::bad_request(format!("parameter `{name}` is required")))
    }

    /// Blank means absent; anything else must parse as an integer.
    pub fn numeric(&self, name: &str) -> ConsoleResult<Option<i64>> {
        self.non_blank(name)
            .map(|raw| {
                raw.parse::<i64>().map_err(|_| {
                    ConsoleError::bad_request(format!("parameter `{name}` must be numeric, got `{raw}`"))
                })
            })
            .transpose()
    }

    /// Checkbox style flag: `on`, `true`, `1` and `yes` count as set.
    pub fn flag(&self, name: &str) -> bool {
        self.non_blank(name).is_some_and(|value| {
            matches!(
                value.to_ascii_lowercase().as_str(),
                "on" | "true" | "1" | "yes"
            )
        })
    }

    /// Collects `<prefix>.<n>` parameters ordered by `n`.
    pub fn indexed(&self, prefix: &str) -> BTreeMap<usize, &str> {
        self.params
            .iter()
            .filter_map(|(name, value)| {
                let index = name.strip_prefix(prefix)?.strip_prefix('.')?;
                Some((index.parse::<usize>().ok()?, value.as_str()))
            })
            .collect()
    }
}
