use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub workspaces: WorkspacesConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Directory holding a browser frontend. `GET /` serves its
    /// `index.html` (or `frontend.html`); other paths not matched by the API
    /// fall through to the directory.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
            static_dir: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3001".to_string()
}
fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkspacesConfig {
    #[serde(default = "default_workspaces_root")]
    pub root: PathBuf,
    #[serde(default = "default_listing")]
    pub listing: String,
}

impl Default for WorkspacesConfig {
    fn default() -> Self {
        Self {
            root: default_workspaces_root(),
            listing: default_listing(),
        }
    }
}

fn default_workspaces_root() -> PathBuf {
    PathBuf::from("./workspaces")
}
fn default_listing() -> String {
    "walk".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_index_backend")]
    pub backend: String,
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default = "default_index_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: default_index_backend(),
            path: default_index_path(),
            include_globs: default_include_globs(),
            timeout_secs: default_index_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_index_backend() -> String {
    "sqlite".to_string()
}
fn default_index_path() -> PathBuf {
    PathBuf::from("./data/workspaces.sqlite")
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.mdx".to_string()]
}
fn default_index_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    #[serde(default = "default_assistant_binary")]
    pub binary: String,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    #[serde(default = "default_allowed_tools")]
    pub allowed_tools: Vec<String>,
    #[serde(default = "default_assistant_timeout_secs")]
    pub timeout_secs: u64,
    /// Credential passed to the assistant process. Never read from the TOML
    /// file; populated from `ANTHROPIC_API_KEY`.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            binary: default_assistant_binary(),
            max_turns: default_max_turns(),
            allowed_tools: default_allowed_tools(),
            timeout_secs: default_assistant_timeout_secs(),
            api_key: None,
        }
    }
}

fn default_assistant_binary() -> String {
    "claude".to_string()
}
fn default_max_turns() -> u32 {
    5
}
fn default_allowed_tools() -> Vec<String> {
    ["Read", "Write", "Edit", "Bash", "Grep", "Glob"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_assistant_timeout_secs() -> u64 {
    300
}

impl IndexConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled && self.backend != "disabled"
    }
}

impl Config {
    /// Defaults for every section, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Applies `ANTHROPIC_API_KEY`, `PORT` and `DEVSPACE_WORKSPACES_DIR`.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("ANTHROPIC_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.assistant.api_key = Some(key);
        }
        if let Some(port) = lookup("PORT").filter(|p| !p.trim().is_empty()) {
            let host = self
                .server
                .bind
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "127.0.0.1".to_string());
            self.server.bind = format!("{}:{}", host, port.trim());
        }
        if let Some(dir) = lookup("DEVSPACE_WORKSPACES_DIR").filter(|d| !d.trim().is_empty()) {
            self.workspaces.root = PathBuf::from(dir);
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Loads the config file if present, otherwise falls back to
/// [`Config::minimal`]. Environment overrides are applied either way.
pub fn load_or_default(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        load_config(path)?
    } else {
        Config::minimal()
    };
    config.apply_env();
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    match config.workspaces.listing.as_str() {
        "walk" | "index" => {}
        other => anyhow::bail!(
            "Unknown workspaces.listing: '{}'. Must be walk or index.",
            other
        ),
    }

    match config.index.backend.as_str() {
        "sqlite" | "memory" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown index backend: '{}'. Must be sqlite, memory, or disabled.",
            other
        ),
    }

    if config.workspaces.listing == "index" && !config.index.is_enabled() {
        anyhow::bail!("workspaces.listing = \"index\" requires an enabled index");
    }

    if config.index.timeout_secs == 0 {
        anyhow::bail!("index.timeout_secs must be > 0");
    }

    if config.assistant.max_turns == 0 {
        anyhow::bail!("assistant.max_turns must be > 0");
    }

    if config.assistant.timeout_secs == 0 {
        anyhow::bail!("assistant.timeout_secs must be > 0");
    }

    if config.server.max_upload_bytes == 0 {
        anyhow::bail!("server.max_upload_bytes must be > 0");
    }

    if let Some(dir) = &config.server.static_dir {
        if !dir.is_dir() {
            anyhow::bail!("server.static_dir is not a directory: {}", dir.display());
        }
    }

    Ok(())
}
