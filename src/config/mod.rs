use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::BootstrapError;
use crate::paths::Paths;

/// Project-local config file, checked before the XDG config file.
pub const LOCAL_CONFIG_FILE: &str = "bootstrap.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Resolved XDG-compliant paths (not serialized)
    #[serde(skip)]
    pub paths: Paths,

    /// File this config was read from, if any (not serialized)
    #[serde(skip)]
    pub loaded_from: Option<PathBuf>,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub sandbox: SandboxConfig,

    #[serde(default)]
    pub entry: EntryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Extra trees copied verbatim next to the source tree
    #[serde(default)]
    pub assets: Vec<AssetConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Logical directory name, resolved against the cwd then its parent
    #[serde(default = "default_source_dir")]
    pub dir: String,

    /// Only files with this extension are materialized
    #[serde(default = "default_source_extension")]
    pub extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    pub dir: String,
}

/// How file operations reach the sandbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxChannel {
    /// Structured calls against a host directory
    #[default]
    Direct,
    /// Every operation rendered as an interpreter script
    Script,
}

impl fmt::Display for SandboxChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SandboxChannel::Direct => f.write_str("direct"),
            SandboxChannel::Script => f.write_str("script"),
        }
    }
}

impl FromStr for SandboxChannel {
    type Err = BootstrapError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "direct" => Ok(SandboxChannel::Direct),
            "script" => Ok(SandboxChannel::Script),
            other => Err(BootstrapError::Config(format!(
                "unknown sandbox channel '{}' (expected direct or script)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Host directory acting as the sandbox root (default: data_dir/sandbox)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,

    #[serde(default)]
    pub channel: SandboxChannel,

    /// Interpreter used by the script channel
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryConfig {
    /// Program and arguments started inside the sandbox root
    #[serde(default = "default_entry_command")]
    pub command: Vec<String>,

    /// Host file copied into the sandbox root before the entry point starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    /// Environment for the entry point. Kept as written; `${VAR}` values are
    /// expanded by `resolved_env` when the entry point starts.
    #[serde(default = "default_entry_env")]
    pub env: BTreeMap<String, String>,
}

impl EntryConfig {
    /// Entry environment with `$VAR` / `${VAR}` values taken from the host.
    pub fn resolved_env(&self) -> BTreeMap<String, String> {
        self.env
            .iter()
            .map(|(name, value)| (name.clone(), expand_env(value)))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_source_dir() -> String {
    "virtual_shell".to_string()
}
fn default_source_extension() -> String {
    "py".to_string()
}
fn default_interpreter() -> String {
    "python3".to_string()
}
fn default_entry_command() -> Vec<String> {
    ["python3", "-u", "-m", "virtual_shell.pyodide_main"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_entry_env() -> BTreeMap<String, String> {
    [
        ("PYTHONPATH", "./virtual_shell"),
        ("HOME", "/home/pyodide"),
        ("USER", "pyodide"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            dir: default_source_dir(),
            extension: default_source_extension(),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            root: None,
            channel: SandboxChannel::default(),
            interpreter: default_interpreter(),
        }
    }
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            command: default_entry_command(),
            script: None,
            env: default_entry_env(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// Lookup order: `explicit` (the `--config` flag or
    /// `SANDBOX_BOOTSTRAP_CONFIG`), then `./bootstrap.toml`, then
    /// `<config_dir>/config.toml`. With none present, defaults apply and
    /// nothing is written to disk.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let paths = Paths::resolve()?;
        Self::load_with_paths(explicit, paths)
    }

    pub fn load_with_paths(explicit: Option<&Path>, paths: Paths) -> Result<Self> {
        let Some(path) = locate(explicit, &paths)? else {
            return Ok(Config {
                paths,
                ..Config::default()
            });
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.paths = paths;
        config.loaded_from = Some(path);

        config.validate()?;

        Ok(config)
    }

    /// Write the current settings back to the file they came from, or to the
    /// XDG config file.
    pub fn save(&self) -> Result<()> {
        let path = self.target_path();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;

        Ok(())
    }

    /// Write the commented default template to the XDG config file.
    pub fn save_with_template(&self, force: bool) -> Result<PathBuf> {
        let path = self.paths.config_file();
        if path.exists() && !force {
            anyhow::bail!(
                "Config already exists at {} (use --force to overwrite)",
                path.display()
            );
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
        Ok(path)
    }

    /// Where `save` writes.
    pub fn target_path(&self) -> PathBuf {
        self.loaded_from
            .clone()
            .unwrap_or_else(|| self.paths.config_file())
    }

    pub fn validate(&self) -> std::result::Result<(), BootstrapError> {
        if self.source.dir.trim().is_empty() {
            return Err(BootstrapError::Config("source.dir must not be empty".into()));
        }
        if self.source.extension.trim_start_matches('.').is_empty() {
            return Err(BootstrapError::Config(
                "source.extension must not be empty".into(),
            ));
        }
        if self.entry.command.is_empty() {
            return Err(BootstrapError::Config(
                "entry.command needs at least a program name".into(),
            ));
        }
        if let Some(asset) = self.assets.iter().find(|a| a.dir.trim().is_empty()) {
            return Err(BootstrapError::Config(format!(
                "asset entry has an empty dir: {:?}",
                asset
            )));
        }
        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Result<String> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["source", "dir"] => Ok(self.source.dir.clone()),
            ["source", "extension"] => Ok(self.source.extension.clone()),
            ["sandbox", "root"] => Ok(self.sandbox_root().display().to_string()),
            ["sandbox", "channel"] => Ok(self.sandbox.channel.to_string()),
            ["sandbox", "interpreter"] => Ok(self.sandbox.interpreter.clone()),
            ["entry", "command"] => Ok(self.entry.command.join(" ")),
            ["entry", "script"] => Ok(self.entry.script.clone().unwrap_or_default()),
            ["entry", "env", name] => self
                .entry
                .env
                .get(*name)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("entry.env.{} is not set", name)),
            ["logging", "level"] => Ok(self.logging.level.clone()),
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["source", "dir"] => self.source.dir = value.to_string(),
            ["source", "extension"] => self.source.extension = value.to_string(),
            ["sandbox", "root"] => self.sandbox.root = Some(value.to_string()),
            ["sandbox", "channel"] => self.sandbox.channel = value.parse()?,
            ["sandbox", "interpreter"] => self.sandbox.interpreter = value.to_string(),
            ["entry", "command"] => {
                self.entry.command = value.split_whitespace().map(String::from).collect();
            }
            ["entry", "script"] => self.entry.script = Some(value.to_string()),
            ["entry", "env", name] => {
                self.entry.env.insert(name.to_string(), value.to_string());
            }
            ["logging", "level"] => self.logging.level = value.to_string(),
            _ => anyhow::bail!("Unknown config key: {}", key),
        }

        self.validate()?;
        Ok(())
    }

    /// Host directory acting as the sandbox root.
    pub fn sandbox_root(&self) -> PathBuf {
        match self.sandbox.root.as_deref().map(str::trim) {
            Some(root) if !root.is_empty() => PathBuf::from(shellexpand::tilde(root).to_string()),
            _ => self.paths.sandbox_root.clone(),
        }
    }
}

fn locate(explicit: Option<&Path>, paths: &Paths) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).to_string());
        if !expanded.is_file() {
            anyhow::bail!("Config file not found: {}", expanded.display());
        }
        return Ok(Some(expanded));
    }

    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Ok(Some(local));
    }

    let global = paths.config_file();
    Ok(global.is_file().then_some(global))
}

fn expand_env(s: &str) -> String {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).unwrap_or_else(|_| s.to_string())
    } else if let Some(var_name) = s.strip_prefix('$') {
        std::env::var(var_name).unwrap_or_else(|_| s.to_string())
    } else {
        s.to_string()
    }
}

/// Default config template with helpful comments (written by `config init`)
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# sandbox-bootstrap configuration

[source]
# Directory mirrored into the sandbox. Looked up in the working directory,
# then in its parent.
dir = "virtual_shell"
# Only files with this extension are copied
extension = "py"

[sandbox]
# Host directory acting as the sandbox root
# Default: XDG data dir (~/.local/share/sandbox-bootstrap/sandbox)
# Override with SANDBOX_BOOTSTRAP_SANDBOX=/path/to/root
# root = "~/pyodide-root"

# direct = write files into the root directly
# script = send every operation to the interpreter as a script
channel = "direct"
interpreter = "python3"

[entry]
command = ["python3", "-u", "-m", "virtual_shell.pyodide_main"]
# Host file copied into the sandbox root before the entry point starts
# script = "pyodide_main.py"

[entry.env]
PYTHONPATH = "./virtual_shell"
HOME = "/home/pyodide"
USER = "pyodide"

[logging]
level = "info"

# Extra trees copied verbatim (all files, raw bytes)
# [[assets]]
# dir = "data"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn test_paths(dir: &Path) -> Paths {
        let config_dir = dir.join("config");
        let data_dir = dir.join("data");
        let env: HashMap<&str, String> = HashMap::from([
            (
                "SANDBOX_BOOTSTRAP_CONFIG_DIR",
                config_dir.display().to_string(),
            ),
            ("SANDBOX_BOOTSTRAP_DATA_DIR", data_dir.display().to_string()),
        ]);
        Paths::resolve_with_env(move |key| {
            env.get(key)
                .cloned()
                .ok_or(std::env::VarError::NotPresent)
        })
        .unwrap()
    }

    #[test]
    fn template_parses_to_defaults() {
        let config: Config = toml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.source.dir, "virtual_shell");
        assert_eq!(config.source.extension, "py");
        assert_eq!(config.sandbox.channel, SandboxChannel::Direct);
        assert_eq!(config.entry.command, default_entry_command());
        assert_eq!(config.entry.env, default_entry_env());
        assert!(config.assets.is_empty());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [sandbox]
            channel = "script"

            [[assets]]
            dir = "data"
            "#,
        )
        .unwrap();
        assert_eq!(config.sandbox.channel, SandboxChannel::Script);
        assert_eq!(config.sandbox.interpreter, "python3");
        assert_eq!(config.source.dir, "virtual_shell");
        assert_eq!(config.assets.len(), 1);
        assert_eq!(config.assets[0].dir, "data");
    }

    #[test]
    fn missing_files_yield_defaults_without_writing() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = test_paths(tmp.path());
        Config::load_with_paths(None, paths.clone()).unwrap();

        assert!(!paths.config_file().exists());
    }

    #[test]
    fn explicit_file_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("custom.toml");
        fs::write(&file, "[source]\ndir = \"shell\"\nextension = \".py\"\n").unwrap();

        let config = Config::load_with_paths(Some(&file), test_paths(tmp.path())).unwrap();
        assert_eq!(config.source.dir, "shell");
        assert_eq!(config.loaded_from, Some(file));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope.toml");
        assert!(Config::load_with_paths(Some(&missing), test_paths(tmp.path())).is_err());
    }

    #[test]
    fn empty_command_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("bad.toml");
        fs::write(&file, "[entry]\ncommand = []\n").unwrap();

        let err = Config::load_with_paths(Some(&file), test_paths(tmp.path())).unwrap_err();
        assert!(err.to_string().contains("entry.command"), "{err:#}");
    }

    #[test]
    fn get_and_set_values() {
        let mut config = Config::default();
        config.set_value("sandbox.channel", "script").unwrap();
        config.set_value("entry.env.DEBUG", "1").unwrap();
        config.set_value("source.extension", "pyw").unwrap();

        assert_eq!(config.get_value("sandbox.channel").unwrap(), "script");
        assert_eq!(config.get_value("entry.env.DEBUG").unwrap(), "1");
        assert_eq!(config.get_value("source.extension").unwrap(), "pyw");
        assert!(config.set_value("sandbox.channel", "ipc").is_err());
        assert!(config.set_value("entry.command", "   ").is_err());
        assert!(config.get_value("agent.model").is_err());
    }

    #[test]
    fn entry_command_set_and_get_agree() {
        let mut config = Config::default();
        config.set_value("entry.command", "python3  -u shell.py").unwrap();
        assert_eq!(config.entry.command, vec!["python3", "-u", "shell.py"]);
        assert_eq!(config.get_value("entry.command").unwrap(), "python3 -u shell.py");
    }

    #[test]
    fn sandbox_root_expands_tilde() {
        let mut config = Config::default();
        config.sandbox.root = Some("~/pyodide-root".into());
        let root = config.sandbox_root();
        assert!(root.ends_with("pyodide-root"));
        assert!(!root.starts_with("~"));

        config.sandbox.root = None;
        assert_eq!(config.sandbox_root(), config.paths.sandbox_root);
    }

    #[test]
    fn save_then_load_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = test_paths(tmp.path());
        let mut config = Config {
            paths: paths.clone(),
            ..Config::default()
        };
        config.assets.push(AssetConfig { dir: "data".into() });
        config.entry.script = Some("pyodide_main.py".into());
        config.save().unwrap();

        let file = paths.config_file();
        let loaded = Config::load_with_paths(Some(&file), paths).unwrap();
        assert_eq!(loaded.assets.len(), 1);
        assert_eq!(loaded.entry.script.as_deref(), Some("pyodide_main.py"));
    }

    #[test]
    fn template_refuses_to_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            paths: test_paths(tmp.path()),
            ..Config::default()
        };
        let path = config.save_with_template(false).unwrap();
        assert!(path.exists());
        assert!(config.save_with_template(false).is_err());
        assert!(config.save_with_template(true).is_ok());
    }

    #[test]
    fn env_placeholders_survive_set_and_save() {
        // SAFETY: test-local variable name
        unsafe { std::env::set_var("SANDBOX_BOOTSTRAP_TEST_API_KEY", "hunter2") };
        let tmp = tempfile::tempdir().unwrap();
        let paths = test_paths(tmp.path());
        let file = tmp.path().join("bootstrap.toml");
        fs::write(
            &file,
            "[entry.env]\nAPI_KEY = \"${SANDBOX_BOOTSTRAP_TEST_API_KEY}\"\n",
        )
        .unwrap();

        let mut config = Config::load_with_paths(Some(&file), paths).unwrap();
        assert_eq!(
            config.entry.resolved_env().get("API_KEY").map(String::as_str),
            Some("hunter2")
        );
        config.set_value("logging.level", "debug").unwrap();
        config.save().unwrap();

        let written = fs::read_to_string(&file).unwrap();
        assert!(written.contains("${SANDBOX_BOOTSTRAP_TEST_API_KEY}"), "{written}");
        assert!(!written.contains("hunter2"), "{written}");
        assert!(written.contains("debug"));
    }

    #[test]
    fn env_values_expand() {
        // SAFETY: test-local variable name
        unsafe { std::env::set_var("SANDBOX_BOOTSTRAP_TEST_TOKEN", "secret") };
        assert_eq!(expand_env("${SANDBOX_BOOTSTRAP_TEST_TOKEN}"), "secret");
        assert_eq!(
            expand_env("${SANDBOX_BOOTSTRAP_TEST_UNSET}"),
            "${SANDBOX_BOOTSTRAP_TEST_UNSET}"
        );
        assert_eq!(expand_env("plain"), "plain");
    }
}
