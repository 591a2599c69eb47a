use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use gedwiki::pipeline::{self, FileReport, PipelineConfig};
use gedwiki::resolve::OrphanRepositoryPolicy;
use gedwiki::schema::Schema;
use gedwiki::stats::{ConversionStats, StatsSnapshot};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "gedwiki")]
#[command(about = "Convert GEDCOM family trees into wiki-page XML")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert GEDCOM files (.ged or .ged.bz2) into page XML
    Convert(ConvertArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum OrphanRepositories {
    /// Log and drop repositories no source cites
    Drop,
    /// Emit them as pages of their own
    Page,
}

impl From<OrphanRepositories> for OrphanRepositoryPolicy {
    fn from(value: OrphanRepositories) -> Self {
        match value {
            OrphanRepositories::Drop => OrphanRepositoryPolicy::Drop,
            OrphanRepositories::Page => OrphanRepositoryPolicy::Page,
        }
    }
}

#[derive(Args)]
struct ConvertArgs {
    /// GEDCOM input files
    #[arg(short, long, required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Output directory for generated XML files
    #[arg(short, long)]
    output: PathBuf,

    /// Tree id stamped on every page
    #[arg(long, default_value = "1")]
    tree_id: String,

    /// Extra custom tags, CSV with context,tag,label columns
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Potential duplicates, CSV with id,matches columns
    #[arg(long)]
    matches: Option<PathBuf>,

    /// Person to flag as primary (defaults to the first person in each file)
    #[arg(long)]
    primary: Option<String>,

    /// Record ids to flag as excluded
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Also exclude people inferred to be living
    #[arg(long)]
    exclude_living: bool,

    /// People born before this year are flagged beforeCutoff
    #[arg(long, default_value_t = gedwiki::config::DEFAULT_CUTOFF_YEAR)]
    cutoff_year: i32,

    /// Year the living test counts back from (defaults to the current year)
    #[arg(long)]
    reference_year: Option<i32>,

    /// Keep text of unrecognized tags as notes instead of discarding it
    #[arg(long)]
    keep_unrecognized: bool,

    /// What to do with repositories no source cites
    #[arg(long, value_enum, default_value_t = OrphanRepositories::Drop)]
    orphan_repositories: OrphanRepositories,

    /// Write a JSON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[derive(Serialize)]
struct RunReport<'a> {
    totals: StatsSnapshot,
    files: &'a [FileReport],
}

fn load_schema(path: Option<&Path>) -> Result<Schema> {
    let mut schema = Schema::with_defaults();
    if let Some(path) = path {
        schema
            .load_file(path)
            .with_context(|| format!("Failed to load schema: {}", path.display()))?;
    }
    Ok(schema)
}

fn run_convert(args: ConvertArgs) -> Result<()> {
    fs::create_dir_all(&args.output).with_context(|| {
        format!("Failed to create output directory: {}", args.output.display())
    })?;

    let schema = load_schema(args.schema.as_deref())?;
    let matches = match &args.matches {
        Some(path) => pipeline::load_matches(path)
            .with_context(|| format!("Failed to load matches: {}", path.display()))?,
        None => Default::default(),
    };

    let mut config = PipelineConfig {
        tree_id: args.tree_id,
        primary_id: args.primary,
        exclude_ids: args.exclude.into_iter().collect(),
        exclude_living: args.exclude_living,
        cutoff_year: args.cutoff_year,
        keep_unrecognized_text: args.keep_unrecognized,
        orphan_repositories: args.orphan_repositories.into(),
        matches,
        ..Default::default()
    };
    if let Some(year) = args.reference_year {
        config.reference_year = year;
    }

    info!(files = args.input.len(), schema_entries = schema.len(), "Starting conversion");
    let start = Instant::now();
    let stats = ConversionStats::new();
    let reports = pipeline::convert_files(
        &args.input,
        &args.output,
        &schema,
        &config,
        &stats,
        !args.no_progress,
    );
    let duration = start.elapsed();

    if let Some(path) = &args.report {
        let run = RunReport {
            totals: stats.snapshot(),
            files: &reports,
        };
        let json = serde_json::to_string_pretty(&run)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
    }

    let totals = stats.snapshot();
    println!();
    println!("=== Summary ===");
    println!("Conversion time:     {:.2}s", duration.as_secs_f64());
    println!();
    println!("Files converted:     {}", totals.files_converted);
    println!("Files failed:        {}", totals.files_failed);
    println!("Lines read:          {}", totals.lines_read);
    println!("Records defined:     {}", totals.records_defined);
    println!("Pages written:       {}", totals.pages_written);
    println!("Objects skipped:     {}", totals.pages_failed);
    println!("Ignored tags:        {}", totals.ignored_tags);
    println!("Unrecognized tags:   {}", totals.unrecognized_tags);
    println!("Schema events:       {}", totals.schema_events);
    println!("Duplicate records:   {}", totals.duplicate_records);
    println!("Merged repositories: {}", totals.merged_repositories);
    println!("Orphan repositories: {}", totals.orphan_repositories);

    for report in reports.iter().filter(|r| !r.failed.is_empty()) {
        println!();
        println!("{}: {} object(s) skipped", report.input, report.failed.len());
        for failed in &report.failed {
            println!("  {}: {}", failed.id, failed.reason);
        }
    }

    if totals.files_converted == 0 {
        bail!("No file could be converted");
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let result = match cli.command {
        Commands::Convert(args) => run_convert(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
