mod config;
mod pipeline;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};

use kvtrace_core::{OrphanPolicy, ParseMode, Section, UnansweredCount};

use config::{Config, OutputFormat};

#[derive(Parser)]
#[command(
    name = "kvtrace",
    version,
    about = "Reconcile requests and responses in a key-value store test log"
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print counts, unanswered and repeated sets, and PUT latency
    Report {
        #[command(flatten)]
        args: ReportArgs,

        /// Report section
        #[arg(short, long)]
        section: Option<CliSection>,
    },

    /// Print only counts, unanswered and repeated sets
    Failures {
        #[command(flatten)]
        args: ReportArgs,
    },

    /// Print only PUT latency and redirects
    Times {
        #[command(flatten)]
        args: ReportArgs,
    },

    /// Show how a single line is classified and parsed
    Classify {
        /// Raw log line
        line: String,

        /// Field extraction mode
        #[arg(short, long)]
        mode: Option<CliMode>,
    },

    /// Show the effective configuration
    Config,
}

#[derive(Args)]
struct ReportArgs {
    /// Log file (default: input.path from config, else output.txt)
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Output format
    #[arg(short, long)]
    format: Option<CliFormat>,

    /// Field extraction mode
    #[arg(short, long)]
    mode: Option<CliMode>,

    /// What to do with a PUT completion whose id was never issued
    #[arg(long)]
    on_orphan: Option<CliOrphan>,

    /// How unanswered counts are computed
    #[arg(long)]
    unanswered: Option<CliUnanswered>,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliSection {
    All,
    Failures,
    Times,
}

impl From<CliSection> for Section {
    fn from(val: CliSection) -> Self {
        match val {
            CliSection::All => Section::All,
            CliSection::Failures => Section::Failures,
            CliSection::Times => Section::Times,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CliFormat {
    Text,
    Json,
}

impl From<CliFormat> for OutputFormat {
    fn from(val: CliFormat) -> Self {
        match val {
            CliFormat::Text => OutputFormat::Text,
            CliFormat::Json => OutputFormat::Json,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CliMode {
    /// Fixed columns: timestamp at 1..8, 16-char id after the label
    Fixed,
    /// Whitespace tokens: first token is the timestamp, id is the token after the label
    Tokenized,
}

impl From<CliMode> for ParseMode {
    fn from(val: CliMode) -> Self {
        match val {
            CliMode::Fixed => ParseMode::Fixed,
            CliMode::Tokenized => ParseMode::Tokenized,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CliOrphan {
    /// Abort on the first unknown completion
    Fail,
    /// Warn and continue
    Skip,
}

impl From<CliOrphan> for OrphanPolicy {
    fn from(val: CliOrphan) -> Self {
        match val {
            CliOrphan::Fail => OrphanPolicy::Fail,
            CliOrphan::Skip => OrphanPolicy::Skip,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CliUnanswered {
    /// requests - responses
    Subtraction,
    /// Number of request ids never answered
    SetDifference,
}

impl From<CliUnanswered> for UnansweredCount {
    fn from(val: CliUnanswered) -> Self {
        match val {
            CliUnanswered::Subtraction => UnansweredCount::Subtraction,
            CliUnanswered::SetDifference => UnansweredCount::SetDifference,
        }
    }
}

impl Commands {
    /// Report arguments and the section this subcommand forces, if any.
    fn report(&self) -> Option<(&ReportArgs, Option<Section>)> {
        match self {
            Commands::Report { args, section } => Some((args, section.map(Into::into))),
            Commands::Failures { args } => Some((args, Some(Section::Failures))),
            Commands::Times { args } => Some((args, Some(Section::Times))),
            Commands::Classify { .. } | Commands::Config => None,
        }
    }
}

impl ReportArgs {
    /// Flags take precedence over the config file.
    fn apply(&self, cfg: &mut Config) {
        if let Some(file) = &self.file {
            cfg.input.path = file.clone();
        }
        if let Some(format) = self.format {
            cfg.output.format = format.into();
        }
        if let Some(mode) = self.mode {
            cfg.parse.mode = mode.into();
        }
        if let Some(policy) = self.on_orphan {
            cfg.reconcile.on_orphan = policy.into();
        }
        if let Some(unanswered) = self.unanswered {
            cfg.reconcile.unanswered_count = unanswered.into();
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Classify { line, mode } => {
            if let Some(mode) = *mode {
                cfg.parse.mode = mode.into();
            }
            cmd_classify(&cfg, line)
        }
        Commands::Config => cmd_config(&cfg, cli.config.as_deref()),
        command => {
            if let Some((args, section)) = command.report() {
                apply_report_flags(&mut cfg, args, section);
            }
            cmd_report(&cfg)
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn apply_report_flags(cfg: &mut Config, args: &ReportArgs, section: Option<Section>) {
    args.apply(cfg);
    if let Some(section) = section {
        cfg.output.section = section;
    }
}

fn cmd_report(cfg: &Config) -> Result<()> {
    let reconciler = cfg.reconciler()?;
    let report =
        pipeline::build_report(&reconciler, &cfg.input.path, cfg.reconcile.unanswered_count)?;
    pipeline::write_report(
        &report,
        cfg.output.format,
        cfg.output.section,
        std::io::stdout().lock(),
    )
}

fn cmd_classify(cfg: &Config, line: &str) -> Result<()> {
    let reconciler = cfg.reconciler()?;
    for (key, value) in pipeline::describe_line(&reconciler, line)? {
        println!("{key:<10} {value}");
    }
    Ok(())
}

fn cmd_config(cfg: &Config, explicit: Option<&Path>) -> Result<()> {
    println!("Config: {}", config::show_config_path(explicit));
    println!();
    println!("[input]");
    println!("  path = {}", cfg.input.path.display());
    println!();
    println!("[parse]");
    println!("  mode = {:?}", cfg.parse.mode);
    println!("  id_label = {:?}", cfg.parse.id_label);
    println!("  id_len = {}", cfg.parse.id_len);
    println!(
        "  timestamp = {}..{}",
        cfg.parse.timestamp_start, cfg.parse.timestamp_end
    );
    println!();
    println!("[reconcile]");
    println!("  on_orphan = {:?}", cfg.reconcile.on_orphan);
    println!("  unanswered_count = {:?}", cfg.reconcile.unanswered_count);
    println!();
    println!("[output]");
    println!("  format = {:?}", cfg.output.format);
    println!("  section = {:?}", cfg.output.section);
    println!();
    println!("[[markers]]");
    for marker in &cfg.markers {
        println!("  {:<20} -> {}", format!("{:?}", marker.text), marker.category);
    }
    Ok(())
}
