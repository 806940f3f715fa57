//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::ReportRequest;
use clap::Parser;
use std::path::PathBuf;

/// Layoutsmith - report layout synthesis from natural-language requests
///
/// Turns a reporting request plus S3 data references into a validated
/// report layout: which components to render and what feeds each one.
///
/// Examples:
///   layoutsmith -r "Monthly sales report by category" -d s3://kizukai-ds-tmp/sales.csv
///   layoutsmith --request-file request.json --format markdown
///   layoutsmith -r "KPI summary" -d s3://kizukai-ds-tmp/kpi.json --planner heuristic --local-storage ./buckets
///   layoutsmith -r "Sales report" -d s3://kizukai-ds-tmp/sales.csv --dry-run
///   layoutsmith --list-components
///   layoutsmith --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Natural-language reporting request
    #[arg(
        short,
        long,
        value_name = "TEXT",
        required_unless_present_any = ["request_file", "init_config", "list_components"]
    )]
    pub request: Option<String>,

    /// Data reference the report may draw on (repeatable)
    ///
    /// Must start with s3://<allowed bucket>/.
    #[arg(short = 'd', long = "data-path", value_name = "URI")]
    pub data_paths: Vec<String>,

    /// Read the request from a JSON file
    ///
    /// Accepts {"userRequest": ..., "dataPaths": [...]} or
    /// {"user_request": ..., "s3_paths": [...]}.
    #[arg(long, value_name = "FILE", conflicts_with = "request")]
    pub request_file: Option<PathBuf>,

    /// Output file path for the layout (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (json, markdown)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<FormatArg>,

    /// Decision engine (agent, heuristic)
    ///
    /// "agent" plans with an Ollama model; "heuristic" plans offline from
    /// request keywords.
    #[arg(long, value_name = "ENGINE")]
    pub planner: Option<PlannerKind>,

    /// Ollama model to plan with
    #[arg(short, long, env = "LAYOUTSMITH_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Temperature for LLM responses (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Per-call model timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Decision rounds allowed per request
    #[arg(long, value_name = "COUNT")]
    pub max_tool_rounds: Option<usize>,

    /// The only bucket data references may point into
    #[arg(long, value_name = "BUCKET", env = "ALLOWED_S3_BUCKET")]
    pub allowed_bucket: Option<String>,

    /// S3-compatible HTTP endpoint serving <endpoint>/<bucket>/<key>
    #[arg(long, value_name = "URL")]
    pub storage_endpoint: Option<String>,

    /// Serve buckets from a local directory (<dir>/<bucket>/<key>)
    #[arg(long, value_name = "DIR")]
    pub local_storage: Option<PathBuf>,

    /// Rows returned by dataset previews
    #[arg(long, value_name = "ROWS")]
    pub preview_rows: Option<usize>,

    /// Deadline for the whole request in seconds
    #[arg(long, value_name = "SECS")]
    pub request_timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .layoutsmith.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: validate paths and preview each dataset without planning
    #[arg(long)]
    pub dry_run: bool,

    /// Print the component registry and exit
    #[arg(long)]
    pub list_components: bool,

    /// Generate a default .layoutsmith.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FormatArg {
    Json,
    Markdown,
}

impl FormatArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatArg::Json => "json",
            FormatArg::Markdown => "markdown",
        }
    }
}

/// Decision engine selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PlannerKind {
    Agent,
    Heuristic,
}

impl PlannerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlannerKind::Agent => "agent",
            PlannerKind::Heuristic => "heuristic",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for standalone commands
        if self.init_config || self.list_components {
            return Ok(());
        }

        if let Some(ref request) = self.request {
            if request.trim().is_empty() {
                return Err("Request text must not be empty".to_string());
            }
        }

        if let Some(ref path) = self.request_file {
            if !path.is_file() {
                return Err(format!("Request file does not exist: {}", path.display()));
            }
        }

        // Validate Ollama URL format (not needed for dry-run)
        if !self.dry_run {
            if let Some(ref url) = self.ollama_url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
                }
            }
        }

        if let Some(ref endpoint) = self.storage_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err("Storage endpoint must start with 'http://' or 'https://'".to_string());
            }
        }

        // Validate temperature range
        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        if self.max_tool_rounds == Some(0) {
            return Err("Max tool rounds must be at least 1".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.timeout == Some(0) || self.request_timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        // Validate local storage directory if provided
        if let Some(ref local_path) = self.local_storage {
            if !local_path.is_dir() {
                return Err(format!(
                    "Local storage directory does not exist: {}",
                    local_path.display()
                ));
            }
        }

        Ok(())
    }

    /// The request given inline with --request and --data-path.
    pub fn inline_request(&self) -> Option<ReportRequest> {
        self.request
            .as_ref()
            .map(|text| ReportRequest::new(text.trim(), self.data_paths.clone()))
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is the config file's `general.verbose`; `--quiet` wins over it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            request: Some("Monthly sales report".to_string()),
            data_paths: vec!["s3://kizukai-ds-tmp/sales.csv".to_string()],
            request_file: None,
            output: None,
            format: None,
            planner: None,
            model: None,
            ollama_url: None,
            temperature: None,
            timeout: None,
            max_tool_rounds: None,
            allowed_bucket: None,
            storage_endpoint: None,
            local_storage: None,
            preview_rows: None,
            request_timeout: None,
            config: None,
            verbose: false,
            quiet: false,
            dry_run: false,
            list_components: false,
            init_config: false,
        }
    }

    #[test]
    fn test_valid_args() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.ollama_url = Some("localhost:11434".to_string());
        assert!(args.validate().is_err());

        args.dry_run = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_ranges() {
        let mut args = make_args();
        args.temperature = Some(1.5);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.max_tool_rounds = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.request_timeout = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_inline_request() {
        let mut args = make_args();
        args.request = Some("  Monthly sales report  ".to_string());
        let request = args.inline_request().unwrap();
        assert_eq!(request.user_request, "Monthly sales report");
        assert_eq!(request.data_paths.len(), 1);
    }

    #[test]
    fn test_parse_repeated_data_paths() {
        let args = Args::try_parse_from([
            "layoutsmith",
            "-r",
            "report",
            "-d",
            "s3://b/a.csv",
            "--data-path",
            "s3://b/b.json",
            "--planner",
            "heuristic",
        ])
        .unwrap();
        assert_eq!(args.data_paths, vec!["s3://b/a.csv", "s3://b/b.json"]);
        assert_eq!(args.planner, Some(PlannerKind::Heuristic));
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(false), tracing::Level::INFO);
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(false), tracing::Level::ERROR);
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }
}
