//! Client configuration: named namespaces of nested values with dotted-path lookup.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::error::{Error, Result};
use crate::paths::AppPaths;

const APP_NAME: &str = "newsroom";

/// Namespace consulted when callers don't name one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Namespace holding the translation table.
pub const TRANSLATIONS_NAMESPACE: &str = "translations";

/// Well-known keys of the default namespace.
pub mod keys {
    pub const TIME_FORMAT: &str = "time_format";
    pub const DATE_FORMAT: &str = "date_format";
    pub const COVERAGE_DATE_FORMAT: &str = "coverage_date_format";
    pub const TIMEZONE: &str = "timezone";
    pub const LOCALE: &str = "locale";
    pub const WEBSOCKET: &str = "websocket";
}

/// Read-only configuration supplied by the host at load time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientConfig {
    namespaces: BTreeMap<String, Value>,
}

impl ClientConfig {
    /// An empty configuration: every lookup falls back to its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration with a single `default` namespace.
    pub fn from_default_namespace(value: Value) -> Self {
        Self::new().with_namespace(DEFAULT_NAMESPACE, value)
    }

    /// Add or replace a namespace.
    pub fn with_namespace(mut self, name: &str, value: Value) -> Self {
        self.namespaces.insert(name.to_string(), value);
        self
    }

    /// Get the raw value of a whole namespace.
    pub fn namespace(&self, name: &str) -> Option<&Value> {
        self.namespaces.get(name)
    }

    /// Look up `key` inside `namespace`.
    ///
    /// Keys may be dotted paths (`"site.title"`) resolving through nested
    /// mappings; array elements are addressed by index (`"items.0"`).
    /// Returns `None` when the namespace or any segment is missing.
    pub fn get_value(&self, key: &str, namespace: &str) -> Option<&Value> {
        let root = self.namespaces.get(namespace)?;
        resolve_path(root, key)
    }

    /// Look up `key` in `namespace`, returning `default` when absent.
    pub fn get_config(&self, key: &str, default: Option<Value>, namespace: &str) -> Option<Value> {
        self.get_value(key, namespace).cloned().or(default)
    }

    /// String lookup in the default namespace.
    ///
    /// Non-string scalars are rendered as text; missing keys and
    /// non-scalar values yield `default`.
    pub fn get_str(&self, key: &str, default: &str) -> String {
        match self.get_value(key, DEFAULT_NAMESPACE) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => default.to_string(),
        }
    }

    /// Typed lookup in the default namespace.
    ///
    /// Values that don't deserialize into `T` are treated as absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_value(key, DEFAULT_NAMESPACE)?;
        serde_json::from_value(value.clone()).ok()
    }

    /// Load configuration from paths with environment overlay.
    ///
    /// Top-level tables of the merged sources become namespaces.
    pub fn load(paths: &AppPaths) -> Result<Self> {
        let env_prefix = env_prefix();
        let mut builder = Config::builder()
            .add_source(
                File::from(paths.global_config.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                File::from(paths.local_config.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            );

        if let Some(cli_cfg) = &paths.cli_config {
            builder = builder.add_source(
                File::from(cli_cfg.as_path())
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder
            .add_source(Environment::with_prefix(&env_prefix).separator("__"))
            .set_default("default.date_format", "DD-MM-YYYY")?
            .set_default("default.time_format", "HH:mm")?
            .set_default("default.coverage_date_format", "HH:mm DD/MM")?
            .set_default("default.timezone", "UTC")?
            .set_default("default.locale", "en_US")?;

        let namespaces: BTreeMap<String, Value> = builder.build()?.try_deserialize()?;
        log::debug!(
            "configuration namespaces: {}",
            namespaces.keys().cloned().collect::<Vec<_>>().join(", ")
        );
        Ok(Self { namespaces })
    }

    /// Write default config to a path.
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("creating config directory {parent:?}: {e}")))?;
        }
        let toml = toml::to_string_pretty(&default_document())
            .map_err(|e| Error::Config(format!("serializing default config: {e}")))?;
        let mut content = String::new();
        content.push_str("# newsroom configuration\n");
        content.push_str(
            "# Place this file at $XDG_CONFIG_HOME/newsroom/config.toml (or ~/.config/newsroom/config.toml)\n",
        );
        content.push_str("# Formats use moment-style tokens, e.g. DD-MM-YYYY or HH:mm.\n\n");
        content.push_str(&toml);
        content.push('\n');
        fs::write(path, content)
            .map_err(|e| Error::Config(format!("writing config file to {}: {e}", path.display())))
    }

    /// Ensure default config exists, creating it if necessary.
    pub fn ensure_default(path: &Path) -> Result<()> {
        if path.exists() {
            return Ok(());
        }
        Self::write_default(path)
    }
}

fn resolve_path<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    if let Value::Object(map) = root
        && let Some(direct) = map.get(key)
    {
        return Some(direct);
    }

    key.split('.').try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn default_document() -> Value {
    let mut doc = Map::new();
    doc.insert(
        DEFAULT_NAMESPACE.to_string(),
        json!({
            "time_format": "HH:mm",
            "date_format": "DD-MM-YYYY",
            "coverage_date_format": "HH:mm DD/MM",
            "timezone": "UTC",
            "locale": "en_US",
            "websocket": "",
        }),
    );
    doc.insert(TRANSLATIONS_NAMESPACE.to_string(), json!({}));
    Value::Object(doc)
}

/// Generate environment variable prefix from app name.
fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sample() -> ClientConfig {
        ClientConfig::from_default_namespace(json!({
            "date_format": "DD/MM/YYYY",
            "site": { "title": "Newshub", "menu": ["wire", "agenda"] },
            "flag": true,
            "count": 3,
        }))
        .with_namespace("other", json!({ "date_format": "YYYY" }))
    }

    fn paths_for(dir: &Path, cli: Option<PathBuf>) -> AppPaths {
        AppPaths {
            global_config: dir.join("missing-global.toml"),
            local_config: dir.join("missing-local.toml"),
            cli_config: cli,
        }
    }

    #[test]
    fn test_get_config_top_level_key() {
        let cfg = sample();
        assert_eq!(
            cfg.get_config("date_format", None, DEFAULT_NAMESPACE),
            Some(json!("DD/MM/YYYY"))
        );
    }

    #[test]
    fn test_get_config_dotted_path() {
        let cfg = sample();
        assert_eq!(
            cfg.get_config("site.title", None, DEFAULT_NAMESPACE),
            Some(json!("Newshub"))
        );
        assert_eq!(
            cfg.get_config("site.menu.1", None, DEFAULT_NAMESPACE),
            Some(json!("agenda"))
        );
    }

    #[test]
    fn test_get_config_missing_segment_uses_default() {
        let cfg = sample();
        assert_eq!(
            cfg.get_config("site.logo.url", Some(json!("x.png")), DEFAULT_NAMESPACE),
            Some(json!("x.png"))
        );
        assert_eq!(cfg.get_config("flag.nested", None, DEFAULT_NAMESPACE), None);
    }

    #[test]
    fn test_get_config_missing_namespace_uses_default() {
        let cfg = sample();
        assert_eq!(
            cfg.get_config("date_format", Some(json!("D")), "absent"),
            Some(json!("D"))
        );
        assert_eq!(cfg.get_config("date_format", None, "absent"), None);
    }

    #[test]
    fn test_get_config_namespaces_are_separate() {
        let cfg = sample();
        assert_eq!(
            cfg.get_config("date_format", None, "other"),
            Some(json!("YYYY"))
        );
    }

    #[test]
    fn test_get_str_and_get_as() {
        let cfg = sample();
        assert_eq!(cfg.get_str("site.title", "x"), "Newshub");
        assert_eq!(cfg.get_str("count", "x"), "3");
        assert_eq!(cfg.get_str("site", "fallback"), "fallback");
        assert_eq!(cfg.get_as::<u32>("count"), Some(3));
        assert_eq!(cfg.get_as::<u32>("site.title"), None);
        assert_eq!(cfg.get_as::<Vec<String>>("site.menu").unwrap().len(), 2);
    }

    #[test]
    fn test_load_applies_defaults() {
        let temp = TempDir::new().unwrap();
        let cfg = ClientConfig::load(&paths_for(temp.path(), None)).unwrap();
        assert_eq!(cfg.get_str(keys::DATE_FORMAT, ""), "DD-MM-YYYY");
        assert_eq!(cfg.get_str(keys::TIME_FORMAT, ""), "HH:mm");
        assert_eq!(cfg.get_str(keys::TIMEZONE, ""), "UTC");
    }

    #[test]
    fn test_load_reads_cli_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("cli.toml");
        fs::write(
            &file,
            "[default]\ndate_format = \"YYYY/MM/DD\"\nwebsocket = \"ws://localhost:5100\"\n\n[default.site]\ntitle = \"Wire\"\n",
        )
        .unwrap();
        let cfg = ClientConfig::load(&paths_for(temp.path(), Some(file))).unwrap();
        assert_eq!(cfg.get_str(keys::DATE_FORMAT, ""), "YYYY/MM/DD");
        assert_eq!(cfg.get_str(keys::TIME_FORMAT, ""), "HH:mm");
        assert_eq!(cfg.get_str(keys::WEBSOCKET, ""), "ws://localhost:5100");
        assert_eq!(cfg.get_str("site.title", ""), "Wire");
    }

    #[test]
    fn test_load_missing_cli_file_fails() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.toml");
        assert!(ClientConfig::load(&paths_for(temp.path(), Some(missing))).is_err());
    }

    #[test]
    fn test_write_default_config() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("nested").join("config.toml");
        ClientConfig::ensure_default(&config_path).unwrap();
        assert!(config_path.exists());
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("date_format"));
        assert!(content.contains("[default]"));
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(env_prefix(), "NEWSROOM");
    }
}
