use std::collections::HashMap;

use serde_json::Value;

use crate::foundation::error::{PresetError, PresetResult};

/// External data source reachable from preset functions via `fetch(url, body)`.
///
/// Calls block until the result is available; the merge step for the calling preset runs only
/// after its function has returned.
pub trait Fetcher {
    fn fetch(&self, url: &str, body: &Value) -> PresetResult<Value>;
}

/// Rejects every request. Used when the host wires no data source.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFetcher;

impl Fetcher for NoFetcher {
    fn fetch(&self, url: &str, _body: &Value) -> PresetResult<Value> {
        Err(PresetError::fetch(format!("no fetcher configured for '{url}'")))
    }
}

/// Serves canned responses keyed by url; the request body is ignored.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    responses: HashMap<String, Value>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, response: Value) -> Self {
        self.responses.insert(url.into(), response);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, response: Value) {
        self.responses.insert(url.into(), response);
    }
}

impl FromIterator<(String, Value)> for StaticFetcher {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            responses: iter.into_iter().collect(),
        }
    }
}

impl Fetcher for StaticFetcher {
    fn fetch(&self, url: &str, _body: &Value) -> PresetResult<Value> {
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| PresetError::fetch(format!("no response registered for '{url}'")))
    }
}

impl<F> Fetcher for F
where
    F: Fn(&str, &Value) -> PresetResult<Value>,
{
    fn fetch(&self, url: &str, body: &Value) -> PresetResult<Value> {
        self(url, body)
    }
}
