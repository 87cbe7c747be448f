//! Typelint CLI
//!
//! Lints resolved unit files (`*.unit.json`) produced by a front-end.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use glob::glob;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use typelint::baseline::Baseline;
use typelint::config::{ColorMode, Config, OutputFormat};
use typelint::engine::{Engine, LintResult};
use typelint::output::formatter_for;
use typelint::registry::Registry;
use typelint::rule::RuleStability;

#[derive(Parser)]
#[command(
    name = "typelint",
    version,
    about = "Type-aware linter",
    long_about = "Runs type-aware lint rules over resolved syntax trees."
)]
struct Cli {
    /// Files, directories or glob patterns to lint
    files: Vec<String>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Disable specific rules (comma-separated)
    #[arg(long, value_delimiter = ',')]
    disable: Option<Vec<String>>,

    /// Only enable specific rules (comma-separated)
    #[arg(long, value_delimiter = ',')]
    select: Option<Vec<String>>,

    /// Enable preview rules
    #[arg(long)]
    preview: bool,

    /// Use baseline file to ignore existing findings (creates if not found)
    #[arg(long)]
    baseline: Option<PathBuf>,

    /// Replace the baseline with the current findings
    #[arg(long, requires = "baseline")]
    update_baseline: bool,

    /// Show per-rule timing statistics
    #[arg(long)]
    timing: bool,

    /// Exit with 0 even if findings are reported
    #[arg(long)]
    exit_zero: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List every registered rule and the diagnostic kinds it can emit
    Rules {
        /// Print the vocabulary as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{}: {:#}", "error".red().bold(), err);
            std::process::exit(2);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load_default().unwrap_or_else(|err| {
            log::warn!("ignoring default configuration: {}", err);
            Config::default()
        }),
    };

    if cli.preview {
        config.preview = true;
    }
    config.merge_cli(
        cli.format.map(OutputFormat::from),
        Some(cli.verbose),
        cli.jobs,
        cli.disable.clone(),
        cli.select.clone(),
    );

    let use_color = !cli.no_color
        && match config.output.color {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => std::env::var_os("NO_COLOR").is_none(),
        };
    colored::control::set_override(use_color);

    let engine = Engine::new(config).context("failed to register rules")?;

    if let Some(Commands::Rules { json }) = &cli.command {
        print_rules(engine.registry(), *json)?;
        return Ok(0);
    }

    let files = collect_files(&cli.files, engine.config())?;
    if files.is_empty() {
        bail!("no files found to lint");
    }
    if engine.config().output.verbose {
        eprintln!("Linting {} files...", files.len());
    }

    let mut result = engine.lint(&files);

    if let Some(baseline_path) = &cli.baseline {
        apply_baseline(baseline_path, cli.update_baseline, &mut result)?;
    }

    let formatter = formatter_for(engine.config().output.format, use_color);
    print!("{}", formatter.format(&result));

    if cli.timing {
        eprintln!();
        eprintln!("{}", result.format_timings());
    }

    Ok(if cli.exit_zero { 0 } else { result.exit_code() })
}

/// Expand arguments into unit files. Directories are searched with the
/// configured include patterns; exclude patterns apply to everything.
fn collect_files(args: &[String], config: &Config) -> Result<Vec<PathBuf>> {
    let excludes = build_globset(&config.files.exclude)?;
    let mut patterns = Vec::new();

    let args: Vec<String> = if args.is_empty() {
        vec![".".to_string()]
    } else {
        args.to_vec()
    };
    for arg in &args {
        if Path::new(arg).is_dir() {
            for include in &config.files.include {
                patterns.push(format!("{}/{}", arg.trim_end_matches('/'), include));
            }
        } else {
            patterns.push(arg.clone());
        }
    }

    let mut files = Vec::new();
    for pattern in &patterns {
        let paths = glob(pattern).with_context(|| format!("invalid pattern '{}'", pattern))?;
        for entry in paths.flatten() {
            if entry.is_file() && !excludes.is_match(&entry) && !files.contains(&entry) {
                files.push(entry);
            }
        }
    }
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("invalid pattern '{}'", pattern))?);
    }
    Ok(builder.build()?)
}

fn apply_baseline(path: &Path, update: bool, result: &mut LintResult) -> Result<()> {
    if update || !path.exists() {
        let mut baseline = match Baseline::load(path) {
            Ok(baseline) => baseline,
            Err(_) => Baseline::new().with_base_path(path.parent().unwrap_or(Path::new("."))),
        };
        baseline.update(&result.findings);
        baseline
            .save(path)
            .with_context(|| format!("failed to save baseline {}", path.display()))?;
        eprintln!(
            "Wrote baseline with {} issues to {}",
            baseline.issue_count(),
            path.display()
        );
    }

    let baseline =
        Baseline::load(path).with_context(|| format!("failed to load baseline {}", path.display()))?;
    let before = result.findings.len();
    result.findings = baseline.filter_findings(std::mem::take(&mut result.findings));
    result.recount();
    log::info!(
        "filtered out {} baselined findings",
        before - result.findings.len()
    );
    Ok(())
}

fn print_rules(registry: &Registry, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&registry.vocabulary())?);
        return Ok(());
    }

    for (index, rule) in registry.rules().iter().enumerate() {
        let descriptor = rule.descriptor();
        let marker = match descriptor.stability {
            RuleStability::Preview => " [preview]".yellow(),
            RuleStability::Deprecated => " [deprecated]".red(),
            RuleStability::Stable => "".normal(),
        };
        let disabled = if registry.is_enabled(index) {
            "".normal()
        } else {
            " (disabled)".dimmed()
        };
        println!(
            "{} ({}){}{}",
            descriptor.name.cyan(),
            descriptor.category,
            marker,
            disabled
        );
        println!("    {}", descriptor.description);
        for kind in descriptor.kinds {
            println!("    {} [{}] {}", kind.id, kind.severity, kind.message);
        }
    }
    Ok(())
}
