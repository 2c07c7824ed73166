//! Request steps, chains of steps, and the per-traversal value cache

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Method;
use std::borrow::Cow;
use std::collections::HashMap;

/// Token in a step URL that is replaced by a value extracted from the
/// previous step's response.
pub const PLACEHOLDER: &str = "%s";

/// One HTTP request step.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub method: Method,
    /// May contain a single [`PLACEHOLDER`].
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Target {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: reqwest::header::HeaderName, value: reqwest::header::HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// URL to send for this step given what earlier steps extracted.
    pub fn resolve_url<'a>(&'a self, cache: &ValueCache, field: &str) -> Cow<'a, str> {
        substitute_placeholder(&self.url, cache.get(field))
    }
}

/// Steps executed head to tail as one unit of work, producing one result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetChain {
    steps: Vec<Target>,
}

impl TargetChain {
    pub fn new(head: Target) -> Self {
        Self { steps: vec![head] }
    }

    /// Append a step to the end of the chain.
    pub fn then(mut self, next: Target) -> Self {
        self.steps.push(next);
        self
    }

    pub fn push(&mut self, step: Target) {
        self.steps.push(step);
    }

    pub fn head(&self) -> Option<&Target> {
        self.steps.first()
    }

    pub fn steps(&self) -> &[Target] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Target> {
        self.steps.iter()
    }
}

impl FromIterator<Target> for TargetChain {
    fn from_iter<I: IntoIterator<Item = Target>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a TargetChain {
    type Item = &'a Target;
    type IntoIter = std::slice::Iter<'a, Target>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

/// Values extracted from responses during one chain traversal.
#[derive(Debug, Clone, Default)]
pub struct ValueCache {
    values: HashMap<String, String>,
}

impl ValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.values.insert(field.into(), value.into());
    }

    /// Pull `field` out of a JSON object response body.
    ///
    /// Bodies that are not a JSON object, or objects without the field, leave
    /// the cache untouched. Returns whether a value was stored.
    pub fn extract(&mut self, field: &str, body: &[u8]) -> bool {
        let Ok(serde_json::Value::Object(object)) = serde_json::from_slice::<serde_json::Value>(body) else {
            return false;
        };
        let value = match object.get(field) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(v @ serde_json::Value::Number(_)) | Some(v @ serde_json::Value::Bool(_)) => v.to_string(),
            _ => return false,
        };
        self.insert(field, value);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Replace the first [`PLACEHOLDER`] in `url` with `value`.
///
/// Every other `%` in the URL, such as a percent-encoded `%20`, is kept
/// verbatim. Without a value the URL is returned unchanged, placeholder
/// included.
pub fn substitute_placeholder<'a>(url: &'a str, value: Option<&str>) -> Cow<'a, str> {
    match (value, url.find(PLACEHOLDER)) {
        (Some(value), Some(at)) => {
            let mut resolved = String::with_capacity(url.len() + value.len());
            resolved.push_str(&url[..at]);
            resolved.push_str(value);
            resolved.push_str(&url[at + PLACEHOLDER.len()..]);
            Cow::Owned(resolved)
        }
        _ => Cow::Borrowed(url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_single_placeholder() {
        assert_eq!(
            substitute_placeholder("http://api/resource/%s", Some("abc123")),
            "http://api/resource/abc123"
        );
    }

    #[test]
    fn test_only_first_placeholder_is_replaced() {
        assert_eq!(substitute_placeholder("/a/%s/b/%s", Some("x")), "/a/x/b/%s");
    }

    #[test]
    fn test_literal_percent_is_untouched() {
        let url = "http://api/search?q=100%25&name=a%20b";
        assert_eq!(substitute_placeholder(url, Some("abc")), url);
        assert!(matches!(substitute_placeholder(url, Some("abc")), Cow::Borrowed(_)));
    }

    #[test]
    fn test_percent_encoding_survives_next_to_placeholder() {
        assert_eq!(
            substitute_placeholder("/items/%s?tag=a%2Fb", Some("7")),
            "/items/7?tag=a%2Fb"
        );
    }

    #[test]
    fn test_placeholder_without_value_is_kept() {
        assert_eq!(substitute_placeholder("/resource/%s", None), "/resource/%s");
    }

    #[test]
    fn test_extract_string_field() {
        let mut cache = ValueCache::new();
        assert!(cache.extract("id", br#"{"id":"abc123","other":"x"}"#));
        assert_eq!(cache.get("id"), Some("abc123"));
    }

    #[test]
    fn test_extract_number_field() {
        let mut cache = ValueCache::new();
        assert!(cache.extract("id", br#"{"id": 42}"#));
        assert_eq!(cache.get("id"), Some("42"));
    }

    #[test]
    fn test_extract_ignores_non_objects() {
        let mut cache = ValueCache::new();
        assert!(!cache.extract("id", b"not json"));
        assert!(!cache.extract("id", br#"["id"]"#));
        assert!(!cache.extract("id", br#"{"name":"x"}"#));
        assert!(!cache.extract("id", br#"{"id":{"nested":true}}"#));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_extract_keeps_previous_value_on_miss() {
        let mut cache = ValueCache::new();
        cache.insert("id", "first");
        assert!(!cache.extract("id", b""));
        assert_eq!(cache.get("id"), Some("first"));
    }

    #[test]
    fn test_resolve_url_uses_cache() {
        let step = Target::new(Method::GET, "http://api/txn/%s");
        let mut cache = ValueCache::new();
        assert_eq!(step.resolve_url(&cache, "id"), "http://api/txn/%s");
        cache.insert("id", "t-1");
        assert_eq!(step.resolve_url(&cache, "id"), "http://api/txn/t-1");
        // The step itself is never rewritten.
        assert_eq!(step.url, "http://api/txn/%s");
    }

    #[test]
    fn test_chain_building() {
        let chain = TargetChain::new(Target::new(Method::POST, "http://api/txn"))
            .then(Target::new(Method::GET, "http://api/txn/%s"));
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.head().map(|t| &t.method), Some(&Method::POST));
        let urls: Vec<_> = chain.iter().map(|t| t.url.as_str()).collect();
        assert_eq!(urls, ["http://api/txn", "http://api/txn/%s"]);
        assert!(TargetChain::default().is_empty());
    }
}
