//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.layoutsmith.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name.
pub const CONFIG_FILE: &str = ".layoutsmith.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Data storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path. Empty prints to stdout.
    #[serde(default)]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Output format (json, markdown).
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: String::new(),
            verbose: false,
            format: default_format(),
        }
    }
}

fn default_format() -> String {
    "json".to_string()
}

/// Remote data settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// URI scheme of data references.
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// The single bucket data references may point into.
    #[serde(default = "default_bucket")]
    pub allowed_bucket: String,

    /// S3-compatible HTTP endpoint serving `<endpoint>/<bucket>/<key>`.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Local directory serving `<local_root>/<bucket>/<key>`. Wins over `endpoint`.
    #[serde(default)]
    pub local_root: Option<String>,

    /// Per-object fetch timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            allowed_bucket: default_bucket(),
            endpoint: None,
            local_root: None,
            fetch_timeout_seconds: default_fetch_timeout(),
        }
    }
}

fn default_scheme() -> String {
    "s3".to_string()
}

fn default_bucket() -> String {
    "kizukai-ds-tmp".to_string()
}

fn default_fetch_timeout() -> u64 {
    30
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Default model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-call request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Decision rounds allowed per request.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,

    /// Decision engine: "agent" (Ollama tool calling) or "heuristic" (offline).
    #[serde(default = "default_planner")]
    pub planner: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            max_tool_rounds: default_max_tool_rounds(),
            planner: default_planner(),
        }
    }
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_timeout() -> u64 {
    120
}

fn default_max_tool_rounds() -> usize {
    12
}

fn default_planner() -> String {
    "agent".to_string()
}

/// Report document settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Authorship tag written into every document.
    #[serde(default = "default_created_by")]
    pub created_by: String,

    /// Rows returned by dataset previews.
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,

    /// Deadline for one whole request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            created_by: default_created_by(),
            preview_rows: default_preview_rows(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_created_by() -> String {
    "agent_generated".to_string()
}

fn default_preview_rows() -> usize {
    20
}

fn default_request_timeout() -> u64 {
    300
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Load `CONFIG_FILE` from `dir` if it exists.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(CONFIG_FILE);

        if path.exists() {
            let config = Self::load(&path)
                .with_context(|| format!("Failed to load {}", CONFIG_FILE))?;
            Ok(Some(config))
        } else {
            Ok(None)
        }
    }

    /// The explicit config file, else `CONFIG_FILE` in `dir`, else defaults.
    ///
    /// A file that exists but cannot be read or parsed is an error; defaults
    /// apply only when there is no file. Returns the file actually used.
    pub fn resolve(explicit: Option<&Path>, dir: &Path) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }

        match Self::load_from_dir(dir)? {
            Some(config) => Ok((config, Some(dir.join(CONFIG_FILE)))),
            None => Ok((Self::default(), None)),
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.model.ollama_url = url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if let Some(rounds) = args.max_tool_rounds {
            self.model.max_tool_rounds = rounds;
        }
        if let Some(planner) = args.planner {
            self.model.planner = planner.as_str().to_string();
        }

        if let Some(ref bucket) = args.allowed_bucket {
            self.storage.allowed_bucket = bucket.clone();
        }
        if let Some(ref endpoint) = args.storage_endpoint {
            self.storage.endpoint = Some(endpoint.clone());
        }
        if let Some(ref root) = args.local_storage {
            self.storage.local_root = Some(root.display().to_string());
        }

        if let Some(rows) = args.preview_rows {
            self.report.preview_rows = rows;
        }
        if let Some(timeout) = args.request_timeout {
            self.report.request_timeout_seconds = timeout;
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.general.format = format.as_str().to_string();
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.report.request_timeout_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.storage.fetch_timeout_seconds)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
