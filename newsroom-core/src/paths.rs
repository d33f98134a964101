//! Where the client looks for its TOML configuration.

use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

const APP_NAME: &str = "newsroom";

/// The config files merged by [`ClientConfig::load`](crate::ClientConfig::load), in merge order.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Per-user defaults, `<config dir>/newsroom/config.toml`. Written on first run.
    pub global_config: PathBuf,
    /// `config.toml` in the working directory, read if present.
    pub local_config: PathBuf,
    /// Explicit `--config` file; must exist when given.
    pub cli_config: Option<PathBuf>,
}

impl AppPaths {
    /// Resolve the three locations. `cli_config` gets `~` and `$VAR` expansion.
    pub fn discover(cli_config: Option<PathBuf>) -> Result<Self> {
        let global_config = default_config_dir()?.join("config.toml");
        let local_config = env::current_dir()
            .map_err(|e| Error::Path(format!("determining current directory: {e}")))?
            .join("config.toml");
        let cli_config = cli_config.map(expand_path).transpose()?;

        Ok(Self {
            global_config,
            local_config,
            cli_config,
        })
    }
}

/// [`expand_str_path`] for UTF-8 paths; other paths pass through untouched.
pub fn expand_path(path: PathBuf) -> Result<PathBuf> {
    if let Some(text) = path.to_str() {
        expand_str_path(text)
    } else {
        Ok(path)
    }
}

pub fn expand_str_path(text: &str) -> Result<PathBuf> {
    let expanded =
        shellexpand::full(text).map_err(|e| Error::Path(format!("expanding path: {e}")))?;
    Ok(PathBuf::from(expanded.to_string()))
}

/// `$XDG_CONFIG_HOME/newsroom`, else the platform config dir, else `~/.config/newsroom`.
pub fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        let mut path = PathBuf::from(dir);
        path.push(APP_NAME);
        return Ok(path);
    }
    if let Some(mut dir) = dirs::config_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| Error::Path("unable to determine configuration directory".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_paths_discover() {
        let paths = AppPaths::discover(None).unwrap();
        assert!(paths.global_config.ends_with("newsroom/config.toml"));
        assert!(paths.local_config.ends_with("config.toml"));
        assert!(paths.cli_config.is_none());
    }

    #[test]
    fn test_cli_config_is_expanded() {
        let paths = AppPaths::discover(Some(PathBuf::from("~/newsroom.toml"))).unwrap();
        let cli = paths.cli_config.unwrap();
        assert!(!cli.to_string_lossy().contains('~'));
        assert!(cli.ends_with("newsroom.toml"));
    }

    #[test]
    fn test_expand_path_keeps_plain_paths() {
        let plain = PathBuf::from("/srv/newsroom/config.toml");
        assert_eq!(expand_path(plain.clone()).unwrap(), plain);
        assert!(expand_str_path("$NEWSROOM_SURELY_UNSET_VAR/x").is_err());
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_str_path("~/test").unwrap();
        assert!(!expanded.to_string_lossy().contains('~'));
    }
}
