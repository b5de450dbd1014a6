//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use classweave_core::pipeline::{self, EnhanceConfig, ProgressReporter, RunSummary};
use classweave_enhancers::EnhancerCatalog;
use classweave_shared::{
    AppConfig, BinaryName, EligibilityClass, config_file_path, init_config, load_layered,
    load_layered_or_default,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// classweave: rewrite compiled classes through a chain of enhancers.
#[derive(Parser)]
#[command(
    name = "classweave",
    version,
    about = "Post-compilation bytecode enhancement for JVM class directories.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.classweave/classweave.toml).
    #[arg(long, global = true, env = "CLASSWEAVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Profile overlay to apply on top of the config file (repeatable).
    #[arg(long = "profile", global = true)]
    pub profiles: Vec<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Enhance every eligible class under the classes directory, in place.
    Enhance {
        /// Classes directory (overrides `build.classes_dir`).
        #[arg(long)]
        classes: Option<PathBuf>,

        /// Dependency directory or jar (repeatable, appended to `build.classpath`).
        #[arg(long)]
        classpath: Vec<PathBuf>,

        /// Only enhance classes directly inside the classes directory.
        #[arg(long)]
        no_recurse: bool,

        /// Encoding handed to enhancers (overrides `defaults.encoding`).
        #[arg(long)]
        encoding: Option<String>,

        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
///
/// Without `-v` the level comes from `defaults.log_level` of `config`, if it
/// loaded. `RUST_LOG` wins over both.
pub(crate) fn init_tracing(cli: &Cli, config: Option<&AppConfig>) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => format!(
            "classweave={}",
            config
                .and_then(configured_log_level)
                .unwrap_or_else(|| "info".into())
        ),
        1 => "classweave=debug".into(),
        _ => "classweave=trace".into(),
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

fn configured_log_level(config: &AppConfig) -> Option<String> {
    let level = config.defaults.log_level.trim();
    (!level.is_empty()).then(|| level.to_string())
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
///
/// `config` is resolved once before tracing starts. A load error is reported
/// here, by the commands that need the config.
pub(crate) fn run(cli: Cli, config: Result<AppConfig>) -> Result<()> {
    match &cli.command {
        Command::Enhance {
            classes,
            classpath,
            no_recurse,
            encoding,
            json,
        } => {
            let mut enhance = EnhanceConfig::from(&config?);
            if let Some(classes) = classes {
                enhance.classes_dir = classes.clone();
            }
            enhance.classpath.extend(classpath.iter().cloned());
            if *no_recurse {
                enhance.recurse = false;
            }
            if let Some(encoding) = encoding.as_ref().filter(|e| !e.trim().is_empty()) {
                enhance.encoding = encoding.clone();
            }
            cmd_enhance(&enhance, *json)
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config?),
        },
    }
}

/// `--config` if given, else the default file if present, else defaults.
/// Profile overlays apply on top of whichever was chosen.
pub(crate) fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let (path, config) = match &cli.config {
        Some(path) => (path.clone(), load_layered(path, &cli.profiles)),
        None => {
            let path = config_file_path()?;
            let config = load_layered_or_default(&path, &cli.profiles);
            (path, config)
        }
    };
    config.wrap_err_with(|| format!("failed to load config from {}", path.display()))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_enhance(config: &EnhanceConfig, json: bool) -> Result<()> {
    info!(
        classes = %config.classes_dir.display(),
        dependencies = config.classpath.len(),
        enhancers = config.enhancers.len(),
        "enhancing classes"
    );

    let catalog = EnhancerCatalog::with_builtins();
    let summary = if json {
        pipeline::run(config, &catalog, &pipeline::SilentProgress)
    } else {
        pipeline::run(config, &catalog, &CliProgress::new())
    }
    .wrap_err("enhancement run failed")?;

    for lost in summary.lost_writes() {
        warn!(class = %lost.class_name, path = %lost.path.display(), "{lost}");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!("  Enhancement complete.");
    println!("  Run:       {}", summary.run_id);
    println!("  Classes:   {}", summary.classes_dir.display());
    println!("  Visited:   {}", summary.visited);
    println!("  Enhanced:  {}", summary.enhanced);
    println!("  Skipped:   {}", summary.skipped_total());
    println!("  Writes:    {}", summary.writes);
    if summary.source_files_skipped > 0 {
        println!("  Sources:   {} ignored", summary.source_files_skipped);
    }
    let lost = summary.lost_writes().count();
    if lost > 0 {
        println!("  Lost:      {lost} write(s) did not reach disk");
    }
    println!("  Time:      {:.1}s", summary.elapsed_ms as f64 / 1000.0);
    println!();

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn artifact_started(&self, name: &BinaryName, index: usize) {
        self.spinner.set_message(format!("Enhancing [{index}] {name}"));
    }

    fn artifact_skipped(&self, _name: &BinaryName, _eligibility: EligibilityClass) {}

    fn artifact_enhanced(&self, _name: &BinaryName, _writes: usize) {}

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}
