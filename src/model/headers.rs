use serde::{Deserialize, Serialize};

/// Ordered header list. Order is preserved because it participates in
/// endpoint identity: two calls for "the same" target must hash equally
/// for in-flight deduplication to trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Headers {
    pub items: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Headers::default()
    }

    /// Inserts a header, replacing any existing value for the same
    /// (case-insensitive) name.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) {
        let key = key.as_ref();
        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            existing.1 = value.as_ref().to_string();
        } else {
            self.items.push((key.to_string(), value.as_ref().to_string()));
        }
    }

    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.items
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Merges `other` into `self`; values from `other` win on conflict.
    pub fn merge(&mut self, other: &Headers) {
        for (k, v) in &other.items {
            self.insert(k, v);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<Vec<(String, String)>> for Headers {
    fn from(items: Vec<(String, String)>) -> Self {
        let mut headers = Headers::new();
        for (k, v) in items {
            headers.insert(k, v);
        }
        headers
    }
}
