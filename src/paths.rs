//! XDG Base Directory Specification compliant path resolution.
//!
//! Every directory is resolved through a three-level fallback:
//! 1. Tool-specific env var (SANDBOX_BOOTSTRAP_CONFIG_DIR, etc.)
//! 2. XDG env var (XDG_CONFIG_HOME, etc.) via `etcetera`
//! 3. Platform default (~/.config, etc.)
//!
//! All paths are absolute. Relative paths from env vars are ignored per XDG spec.

use anyhow::Result;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "sandbox-bootstrap";

/// Resolved directory paths for the application.
///
/// Created once at startup, threaded through Config.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Config directory: config.toml lives here
    pub config_dir: PathBuf,

    /// Data directory root: holds the default sandbox root
    pub data_dir: PathBuf,

    /// Default sandbox root. May be overridden via SANDBOX_BOOTSTRAP_SANDBOX.
    pub sandbox_root: PathBuf,
}

impl Paths {
    /// Resolve all paths using real environment variables.
    pub fn resolve() -> Result<Self> {
        Self::resolve_with_env(|key| std::env::var(key))
    }

    /// Resolve paths with a custom env var lookup (for testing).
    pub fn resolve_with_env<F>(env_fn: F) -> Result<Self>
    where
        F: Fn(&str) -> std::result::Result<String, std::env::VarError>,
    {
        use etcetera::BaseStrategy;

        let strategy = etcetera::choose_base_strategy()
            .map_err(|e| anyhow::anyhow!("Failed to determine base directories: {}", e))?;

        let config_dir = env_or(&env_fn, "SANDBOX_BOOTSTRAP_CONFIG_DIR", || {
            strategy.config_dir().join(APP_NAME)
        });

        let data_dir = env_or(&env_fn, "SANDBOX_BOOTSTRAP_DATA_DIR", || {
            strategy.data_dir().join(APP_NAME)
        });

        let sandbox_root = resolve_sandbox_root(&env_fn, &data_dir);

        Ok(Self {
            config_dir,
            data_dir,
            sandbox_root,
        })
    }

    /// Config file: config_dir/config.toml
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::resolve().unwrap_or_else(|_| {
            let home = etcetera::home_dir().unwrap_or_else(|_| PathBuf::from("."));
            let data_dir = home.join(".local").join("share").join(APP_NAME);
            Self {
                config_dir: home.join(".config").join(APP_NAME),
                sandbox_root: data_dir.join("sandbox"),
                data_dir,
            }
        })
    }
}

/// Resolve an env var with fallback. Ignores empty and relative paths per XDG spec.
fn env_or<F>(env_fn: &F, var: &str, default: impl FnOnce() -> PathBuf) -> PathBuf
where
    F: Fn(&str) -> std::result::Result<String, std::env::VarError>,
{
    env_fn(var)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .filter(|p| p.is_absolute())
        .unwrap_or_else(default)
}

/// Sandbox root: SANDBOX_BOOTSTRAP_SANDBOX (tilde-expanded, absolute) or data_dir/sandbox.
fn resolve_sandbox_root<F>(env_fn: &F, data_dir: &Path) -> PathBuf
where
    F: Fn(&str) -> std::result::Result<String, std::env::VarError>,
{
    if let Ok(root) = env_fn("SANDBOX_BOOTSTRAP_SANDBOX") {
        let trimmed = root.trim();
        if !trimmed.is_empty() {
            let path = PathBuf::from(shellexpand::tilde(trimmed).to_string());
            if path.is_absolute() {
                return path;
            }
        }
    }

    data_dir.join("sandbox")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn make_env(
        map: HashMap<&str, &str>,
    ) -> impl Fn(&str) -> std::result::Result<String, std::env::VarError> {
        move |key: &str| {
            map.get(key)
                .map(|v| v.to_string())
                .ok_or(std::env::VarError::NotPresent)
        }
    }

    #[test]
    fn default_paths_are_xdg_compliant() {
        let paths = Paths::resolve_with_env(make_env(HashMap::new())).unwrap();

        assert!(paths.config_dir.ends_with(APP_NAME), "{:?}", paths.config_dir);
        assert!(paths.data_dir.ends_with(APP_NAME), "{:?}", paths.data_dir);
        assert_eq!(paths.sandbox_root, paths.data_dir.join("sandbox"));
        assert!(paths.config_file().ends_with("config.toml"));
    }

    #[test]
    fn env_vars_override_xdg() {
        let mut env: HashMap<&str, &str> = HashMap::new();
        env.insert("SANDBOX_BOOTSTRAP_CONFIG_DIR", "/custom/config");
        env.insert("SANDBOX_BOOTSTRAP_DATA_DIR", "/custom/data");

        let paths = Paths::resolve_with_env(make_env(env)).unwrap();
        assert_eq!(paths.config_dir, PathBuf::from("/custom/config"));
        assert_eq!(paths.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(paths.sandbox_root, PathBuf::from("/custom/data/sandbox"));
    }

    #[test]
    fn relative_and_empty_paths_are_ignored() {
        let mut env: HashMap<&str, &str> = HashMap::new();
        env.insert("SANDBOX_BOOTSTRAP_CONFIG_DIR", "relative/path");
        env.insert("SANDBOX_BOOTSTRAP_DATA_DIR", "");

        let paths = Paths::resolve_with_env(make_env(env)).unwrap();
        assert!(paths.config_dir.is_absolute());
        assert!(paths.data_dir.is_absolute());
        assert!(paths.data_dir.ends_with(APP_NAME));
    }

    #[test]
    fn sandbox_override_independent_of_data_dir() {
        let mut env: HashMap<&str, &str> = HashMap::new();
        env.insert("SANDBOX_BOOTSTRAP_SANDBOX", "/srv/pyodide-root");

        let paths = Paths::resolve_with_env(make_env(env)).unwrap();
        assert_eq!(paths.sandbox_root, PathBuf::from("/srv/pyodide-root"));
        assert!(paths.data_dir.ends_with(APP_NAME));
    }
}
