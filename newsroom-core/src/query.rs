//! Keeping UI state in the URL query string.

use std::borrow::Cow;

use serde_json::Value;

/// The host's session history: read the current query, push a new one.
pub trait History {
    /// Current query string, with or without the leading `?`.
    fn query(&self) -> String;
    /// Add a history entry for `url` (a query string starting with `?`)
    /// without navigating, carrying `state`.
    fn push_state(&mut self, state: Option<Value>, url: &str);
}

/// Ordered query parameters, decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn parse(query: &str) -> Self {
        let pairs = query
            .trim_start_matches('?')
            .split('&')
            .filter(|part| !part.is_empty())
            .map(|part| {
                let (key, value) = part.split_once('=').unwrap_or((part, ""));
                (decode(key), decode(value))
            })
            .collect();
        Self { pairs }
    }

    /// First value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// Replace the first `key` and drop its duplicates, or append.
    pub fn set(&mut self, key: &str, value: &str) {
        match self.pairs.iter().position(|(k, _)| k == key) {
            Some(first) => {
                self.pairs[first].1 = value.to_string();
                let mut index = 0;
                self.pairs.retain(|(k, _)| {
                    let keep = k != key || index == first;
                    index += 1;
                    keep
                });
            }
            None => self.pairs.push((key.to_string(), value.to_string())),
        }
    }

    /// Remove every `key`.
    pub fn delete(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Form-encoded query without the leading `?`; spaces become `+`.
    pub fn to_query_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned(),
    }
}

fn encode(raw: &str) -> String {
    match urlencoding::encode(raw) {
        Cow::Borrowed(s) => s.to_string(),
        Cow::Owned(s) => s.replace("%20", "+"),
    }
}

/// Requested parameter changes: `Some` non-empty values set, `None` or
/// empty values delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryUpdateSet {
    updates: Vec<(String, Option<String>)>,
}

impl QueryUpdateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: &str) -> Self {
        self.updates.push((key.to_string(), Some(value.to_string())));
        self
    }

    pub fn unset(mut self, key: &str) -> Self {
        self.updates.push((key.to_string(), None));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.updates
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_deref().filter(|v| !v.is_empty())))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, Option<V>)> for QueryUpdateSet {
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        Self {
            updates: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.map(Into::into)))
                .collect(),
        }
    }
}

/// Apply `updates` to the current query and push one history entry if anything changed.
///
/// Returns whether history advanced. Repeating a call with the same
/// updates is a no-op.
pub fn sync_query_params<H: History + ?Sized>(
    history: &mut H,
    updates: &QueryUpdateSet,
    state: Option<Value>,
) -> bool {
    let mut params = QueryParams::parse(&history.query());
    let mut dirty = false;

    for (key, value) in updates.iter() {
        match value {
            Some(value) => {
                if params.get(key) != Some(value) {
                    params.set(key, value);
                    dirty = true;
                }
            }
            None => {
                if params.contains(key) {
                    params.delete(key);
                    dirty = true;
                }
            }
        }
    }

    if dirty {
        let url = format!("?{}", params.to_query_string());
        log::debug!("query changed: {url}");
        history.push_state(state, &url);
    }
    dirty
}

/// Add `value` to `items`, or remove it if already there.
pub fn toggle_value<T: PartialEq + Clone>(items: &[T], value: &T) -> Vec<T> {
    if items.contains(value) {
        items.iter().filter(|item| *item != value).cloned().collect()
    } else {
        let mut toggled = items.to_vec();
        toggled.push(value.clone());
        toggled
    }
}

/// One pushed history entry.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub url: String,
    pub state: Option<Value>,
}

/// In-process session history rooted at a fixed path.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryHistory {
    path: String,
    entries: Vec<HistoryEntry>,
}

impl MemoryHistory {
    /// Start at `url`, e.g. `/wire?q=news`.
    pub fn new(url: &str) -> Self {
        let path = url.split_once('?').map_or(url, |(path, _)| path).to_string();
        Self {
            path,
            entries: vec![HistoryEntry {
                url: url.to_string(),
                state: None,
            }],
        }
    }

    /// Current location.
    pub fn location(&self) -> &str {
        self.entries.last().map_or(self.path.as_str(), |e| e.url.as_str())
    }

    /// All entries, initial location first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }
}

impl History for MemoryHistory {
    fn query(&self) -> String {
        self.location()
            .split_once('?')
            .map(|(_, query)| query.to_string())
            .unwrap_or_default()
    }

    fn push_state(&mut self, state: Option<Value>, url: &str) {
        self.entries.push(HistoryEntry {
            url: format!("{}{}", self.path, url),
            state,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_parse_and_encode() {
        let params = QueryParams::parse("?q=world+news&topic=a%26b&empty=&flag");
        assert_eq!(params.get("q"), Some("world news"));
        assert_eq!(params.get("topic"), Some("a&b"));
        assert_eq!(params.get("empty"), Some(""));
        assert_eq!(params.get("flag"), Some(""));
        assert_eq!(params.get("missing"), None);
        assert_eq!(params.to_query_string(), "q=world+news&topic=a%26b&empty=&flag=");
    }

    #[test]
    fn test_params_set_replaces_first_and_drops_duplicates() {
        let mut params = QueryParams::parse("a=1&b=2&a=3");
        params.set("a", "9");
        assert_eq!(params.to_query_string(), "a=9&b=2");
        params.set("c", "x y");
        assert_eq!(params.to_query_string(), "a=9&b=2&c=x+y");
        params.delete("b");
        assert_eq!(params.to_query_string(), "a=9&c=x+y");
    }

    #[test]
    fn test_sync_sets_value_once() {
        let mut history = MemoryHistory::new("/wire");
        let updates = QueryUpdateSet::new().set("q", "news");

        assert!(sync_query_params(&mut history, &updates, None));
        assert!(!sync_query_params(&mut history, &updates, None));
        assert_eq!(history.entries().len(), 2);
        assert_eq!(history.location(), "/wire?q=news");
    }

    #[test]
    fn test_sync_empty_value_for_absent_key_is_noop() {
        let mut history = MemoryHistory::new("/wire?topic=1");
        let updates = QueryUpdateSet::new().set("q", "");
        assert!(!sync_query_params(&mut history, &updates, None));
        assert_eq!(history.entries().len(), 1);
    }

    #[test]
    fn test_sync_deletes_present_key() {
        let mut history = MemoryHistory::new("/wire?q=news&topic=1");
        let updates = QueryUpdateSet::new().unset("q");
        assert!(sync_query_params(&mut history, &updates, None));
        assert_eq!(history.location(), "/wire?topic=1");

        let updates = QueryUpdateSet::new().set("topic", "");
        assert!(sync_query_params(&mut history, &updates, None));
        assert_eq!(history.location(), "/wire?");
    }

    #[test]
    fn test_sync_applies_all_changes_in_one_entry() {
        let mut history = MemoryHistory::new("/agenda?q=old&created=2024");
        let updates: QueryUpdateSet = [
            ("q", Some("new")),
            ("created", None),
            ("navigation", Some("abc")),
        ]
        .into_iter()
        .collect();
        let state = json!({ "activeQuery": "new" });

        assert!(sync_query_params(&mut history, &updates, Some(state.clone())));
        assert_eq!(history.entries().len(), 2);
        let entry = &history.entries()[1];
        assert_eq!(entry.url, "/agenda?q=new&navigation=abc");
        assert_eq!(entry.state, Some(state));
    }

    #[test]
    fn test_sync_unchanged_value_is_noop() {
        let mut history = MemoryHistory::new("/wire?q=world+news");
        let updates = QueryUpdateSet::new().set("q", "world news").unset("missing");
        assert!(!sync_query_params(&mut history, &updates, Some(json!(1))));
        assert_eq!(history.entries().len(), 1);
    }

    #[test]
    fn test_toggle_value() {
        let items = vec!["a".to_string(), "b".to_string()];
        assert_eq!(toggle_value(&items, &"b".to_string()), vec!["a".to_string()]);
        assert_eq!(toggle_value(&items, &"c".to_string()).len(), 3);
        assert_eq!(toggle_value::<u8>(&[], &1), vec![1]);
    }
}
