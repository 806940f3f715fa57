//! Layoutsmith - report layout synthesis CLI
//!
//! Plans a report layout for a natural-language request over S3 datasets,
//! using Ollama with tool-calling or the offline heuristic planner.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, connection, engine failure, schema violation, timeout)
//!   2 - Request rejected: a data path is outside the allowed bucket
//!   3 - Data error (unavailable, malformed, missing field, nothing to aggregate)

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use layoutsmith::agent::{AgentConfig, DecisionEngine, HeuristicEngine, LayoutAgent};
use layoutsmith::analysis::{read_dataset, ReadOptions};
use layoutsmith::cli::Args;
use layoutsmith::config::{Config, CONFIG_FILE};
use layoutsmith::layout::registry::{Component, ComponentFamily};
use layoutsmith::layout::{render, write_output, OutputFormat};
use layoutsmith::models::{ReportRequest, Source};
use layoutsmith::storage::{HttpObjectStore, LocalObjectStore, ObjectStore, PathValidator};
use layoutsmith::{LayoutSynthesizer, SynthesisError, SynthesisSettings};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Path-style endpoint used when neither an endpoint nor a local root is configured.
const DEFAULT_S3_ENDPOINT: &str = "https://s3.amazonaws.com";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle standalone commands early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }
    if args.list_components {
        print_components();
        return Ok(());
    }

    // Load configuration before logging so `general.verbose` applies.
    // A config file that exists but cannot be loaded stops the run.
    let (mut config, config_source) =
        match Config::resolve(args.config.as_deref(), Path::new(".")) {
            Ok(resolved) => resolved,
            Err(e) => {
                eprintln!("❌ Error: {:#}", e);
                std::process::exit(1);
            }
        };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(args.log_level(config.general.verbose));

    info!("Layoutsmith v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match config_source {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Synthesis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .layoutsmith.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the allowed bucket, storage endpoint, model, and more.");
    Ok(())
}

/// Handle --list-components: print the registry.
fn print_components() {
    for (label, family) in [
        ("Header components", ComponentFamily::Header),
        ("Main components", ComponentFamily::Main),
    ] {
        println!("{}:", label);
        for component in Component::in_family(family) {
            let required = component.required_props();
            if required.is_empty() {
                println!("  {}", component);
            } else {
                println!("  {} (required props: {})", component, required.join(", "));
            }
        }
        println!();
    }

    println!("Data sources:");
    println!("  {}  literal value rendered as-is", Source::Text);
    println!("  {}    data path the renderer loads itself", Source::S3);
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run one synthesis. Returns the process exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let request = load_request(&args)?;
    let format: OutputFormat = config
        .general
        .format
        .parse()
        .map_err(anyhow::Error::msg)?;

    let paths = Arc::new(
        PathValidator::new(&config.storage.scheme, &config.storage.allowed_bucket)
            .map_err(anyhow::Error::msg)
            .context("Invalid storage allow-list")?,
    );
    let store = build_store(&config)?;

    if args.dry_run {
        return handle_dry_run(&request, &paths, store.as_ref(), config.report.preview_rows).await;
    }

    let mut engine = build_engine(&config)?;

    eprintln!("🧭 Planning report layout...");
    eprintln!("   Request: {}", request.user_request);
    eprintln!("   Data paths: {}", request.data_paths.len());
    eprintln!("   Allowed root: {}", paths.root());
    eprintln!("   Planner: {}", engine.name());
    if engine.name() == "agent" {
        eprintln!("   Model: {} @ {}", config.model.name, config.model.ollama_url);
    }

    let settings = SynthesisSettings {
        created_by: config.report.created_by.clone(),
        request_timeout: config.request_timeout(),
        max_tool_rounds: config.model.max_tool_rounds,
        preview_rows: config.report.preview_rows,
    };
    let synthesizer = LayoutSynthesizer::new(Arc::clone(&paths), store, settings);

    let spinner = (!args.quiet).then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("synthesizing");
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    });

    let result = synthesizer.synthesize(&request, engine.as_mut()).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let output = match result {
        Ok(output) => output,
        Err(e) => return Ok(report_failure(&e)),
    };

    if output.dropped_sections > 0 {
        warn!(
            "{} main sections beyond the limit were dropped",
            output.dropped_sections
        );
    }

    let rendered = render(&output.document, format)?;
    if config.general.output.is_empty() {
        println!("{}", rendered);
    } else {
        let path = Path::new(&config.general.output);
        write_output(&rendered, path)
            .with_context(|| format!("Failed to write layout to {}", path.display()))?;
    }

    let failed_calls = output.invocations.iter().filter(|i| !i.ok).count();
    eprintln!("\n📊 Layout Summary:");
    eprintln!("   Report: {}", output.document.report_id);
    eprintln!("   Title: {}", output.document.title);
    eprintln!(
        "   Sections: {} header, {} main",
        output.document.sections.header.len(),
        output.document.sections.main.len()
    );
    eprintln!(
        "   Tool calls: {} ({} failed)",
        output.invocations.len(),
        failed_calls
    );
    eprintln!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
    if !config.general.output.is_empty() {
        eprintln!("\n✅ Layout saved to: {}", config.general.output);
    }

    Ok(0)
}

/// Print a synthesis failure and map it to an exit code.
fn report_failure(err: &SynthesisError) -> i32 {
    error!("Synthesis failed ({}): {}", err.kind(), err);
    eprintln!("\n❌ {}: {}", err.kind(), err);
    if let SynthesisError::SchemaViolation(violations) = err {
        for violation in violations {
            eprintln!("   - {}", violation);
        }
    }
    err.exit_code()
}

/// Handle --dry-run: validate paths and preview each dataset, no planning.
async fn handle_dry_run(
    request: &ReportRequest,
    paths: &PathValidator,
    store: &dyn ObjectStore,
    preview_rows: usize,
) -> Result<i32> {
    eprintln!("\n🔍 Dry run: checking data paths (no model call)...\n");

    let references = match paths.validate_all(&request.data_paths) {
        Ok(references) => references,
        Err(e) => return Ok(report_failure(&e)),
    };

    if references.is_empty() {
        eprintln!("   No data paths supplied.");
    }

    for reference in &references {
        match read_dataset(store, reference, &ReadOptions::preview(preview_rows)).await {
            Ok(dataset) => {
                eprintln!(
                    "     📄 {} ({}, {} records)",
                    reference, dataset.format, dataset.total_records
                );
                for field in &dataset.fields {
                    eprintln!("        - {}: {}", field.name, field.field_type);
                }
            }
            Err(e) => return Ok(report_failure(&e)),
        }
    }

    eprintln!("\n✅ Dry run complete. No model calls were made.");
    Ok(0)
}

/// The request from --request-file or from --request/--data-path.
fn load_request(args: &Args) -> Result<ReportRequest> {
    if let Some(ref path) = args.request_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file: {}", path.display()))?;
        let mut request: ReportRequest = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse request file: {}", path.display()))?;
        request.data_paths.extend(args.data_paths.iter().cloned());
        return Ok(request);
    }

    args.inline_request()
        .context("No request given: use --request or --request-file")
}

fn build_store(config: &Config) -> Result<Arc<dyn ObjectStore>> {
    if let Some(ref root) = config.storage.local_root {
        info!("Serving buckets from local directory: {}", root);
        return Ok(Arc::new(LocalObjectStore::new(root)));
    }

    let endpoint = config
        .storage
        .endpoint
        .as_deref()
        .unwrap_or(DEFAULT_S3_ENDPOINT);
    info!("Reading objects from {}", endpoint);

    let store = HttpObjectStore::new(endpoint, config.fetch_timeout())
        .context("Failed to create storage client")?;
    Ok(Arc::new(store))
}

fn build_engine(config: &Config) -> Result<Box<dyn DecisionEngine>> {
    match config.model.planner.as_str() {
        "heuristic" => Ok(Box::new(HeuristicEngine::new())),
        "agent" => {
            let agent_config = AgentConfig {
                ollama_url: config.model.ollama_url.clone(),
                model_name: config.model.name.clone(),
                temperature: config.model.temperature,
                timeout_seconds: config.model.timeout_seconds,
                ..AgentConfig::default()
            };
            Ok(Box::new(LayoutAgent::new(agent_config)?))
        }
        other => anyhow::bail!("Unknown planner '{}': expected agent or heuristic", other),
    }
}
