//! Translation lookup with `{{ name }}` parameter interpolation.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::config::{ClientConfig, TRANSLATIONS_NAMESPACE};

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("valid regex"))
}

/// Mapping from literal source strings to localized strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Translations {
    strings: HashMap<String, String>,
}

impl Translations {
    /// No translations: every lookup returns its source string.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(strings: HashMap<String, String>) -> Self {
        Self { strings }
    }

    /// Read the `translations` namespace. Non-string entries are skipped.
    pub fn from_config(config: &ClientConfig) -> Self {
        let strings = match config.namespace(TRANSLATIONS_NAMESPACE) {
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect(),
            _ => HashMap::new(),
        };
        Self { strings }
    }

    /// Translate `text`, then substitute `{{ name }}` placeholders from `params`.
    ///
    /// Placeholders without a matching parameter become empty.
    pub fn gettext(&self, text: &str, params: &[(&str, &str)]) -> String {
        let translated = self.strings.get(text).map(String::as_str).unwrap_or(text);
        if !translated.contains("{{") {
            return translated.to_string();
        }

        placeholder()
            .replace_all(translated, |caps: &Captures| {
                params
                    .iter()
                    .find(|(name, _)| *name == &caps[1])
                    .map(|(_, value)| value.to_string())
                    .unwrap_or_default()
            })
            .into_owned()
    }
}
