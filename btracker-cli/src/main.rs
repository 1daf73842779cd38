//! btracker CLI — update, merge, check, and analyze commands.
//!
//! Commands:
//! - `update` — fetch recent daily bars from Yahoo Finance and merge them into the table file
//! - `merge` — merge a window file into a table file, offline
//! - `check` — load a table file and report its size, range, and order
//! - `analyze` — print the yearly summary and daily-move histogram, export per-day metrics

use anyhow::{Context, Result};
use btracker_core::analytics::{
    day_change_histogram, day_metrics, export_day_metrics_csv, export_yearly_summary_csv,
    yearly_summary, HistogramBucket, YearSummary,
};
use btracker_core::config::UpdateConfig;
use btracker_core::data::{ColumnLayout, Delimiter, FileTableStore, TableCodec, TableStore};
use btracker_core::{merge, run_update, FetchWindow, MergeReport, SortOrder, UpdateOptions, UpdateSummary};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "btracker", about = "btracker CLI — keep a daily price history file current")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch recent bars and merge them into the table file.
    Update {
        /// TOML config file. Flags below override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Ticker symbol (e.g., BTC-USD, AAPL).
        #[arg(long)]
        symbol: Option<String>,

        /// Table file to update.
        #[arg(long)]
        table: Option<PathBuf>,

        /// IANA time zone for calendar days. Defaults to the exchange's zone.
        #[arg(long)]
        timezone: Option<String>,

        #[command(flatten)]
        format: FormatArgs,

        /// Merge and report, but do not write the table.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Merge a window file into a table file without network access.
    Merge {
        /// Table file to merge into.
        #[arg(long)]
        table: PathBuf,

        /// Window file, in the same format as the table.
        #[arg(long)]
        window: PathBuf,

        /// Write the result here instead of back to --table.
        #[arg(long)]
        output: Option<PathBuf>,

        /// IANA time zone for datetime cells. Defaults to UTC.
        #[arg(long)]
        timezone: Option<String>,

        #[command(flatten)]
        format: FormatArgs,
    },
    /// Load and validate a table file.
    Check {
        /// Table file to check.
        #[arg(long)]
        table: PathBuf,

        /// IANA time zone for datetime cells. Defaults to UTC.
        #[arg(long)]
        timezone: Option<String>,

        #[command(flatten)]
        format: FormatArgs,
    },
    /// Compute price analytics for a table file.
    Analyze {
        /// Table file to analyze.
        #[arg(long)]
        table: PathBuf,

        /// Write per-day metrics (200-week average, changes, swing) as CSV.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write the yearly summary as CSV.
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Histogram bucket width, in percent.
        #[arg(long, default_value = "1")]
        bucket_pct: Decimal,

        /// IANA time zone for datetime cells. Defaults to UTC.
        #[arg(long)]
        timezone: Option<String>,

        #[command(flatten)]
        format: FormatArgs,
    },
}

#[derive(Args)]
struct FormatArgs {
    /// Column delimiter.
    #[arg(long, value_enum)]
    delimiter: Option<DelimiterArg>,

    /// Column layout.
    #[arg(long, value_enum)]
    layout: Option<LayoutArg>,

    /// Row order of the table.
    #[arg(long, value_enum)]
    order: Option<OrderArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum DelimiterArg {
    Tab,
    Pipe,
    Comma,
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    SplitDate,
    IsoDate,
}

#[derive(Clone, Copy, ValueEnum)]
enum OrderArg {
    NewestFirst,
    OldestFirst,
}

impl From<DelimiterArg> for Delimiter {
    fn from(arg: DelimiterArg) -> Self {
        match arg {
            DelimiterArg::Tab => Delimiter::Tab,
            DelimiterArg::Pipe => Delimiter::Pipe,
            DelimiterArg::Comma => Delimiter::Comma,
        }
    }
}

impl From<LayoutArg> for ColumnLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::SplitDate => ColumnLayout::SplitDate,
            LayoutArg::IsoDate => ColumnLayout::IsoDate,
        }
    }
}

impl From<OrderArg> for SortOrder {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::NewestFirst => SortOrder::NewestFirst,
            OrderArg::OldestFirst => SortOrder::OldestFirst,
        }
    }
}

impl FormatArgs {
    /// Apply any flags given on the command line over `config`.
    fn apply(&self, config: &mut UpdateConfig) {
        if let Some(d) = self.delimiter {
            config.format.delimiter = d.into();
        }
        if let Some(l) = self.layout {
            config.format.layout = l.into();
        }
        if let Some(o) = self.order {
            config.format.order = o.into();
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Update {
            config,
            symbol,
            table,
            timezone,
            format,
            dry_run,
        } => run_update_cmd(config, symbol, table, timezone, format, dry_run),
        Commands::Merge {
            table,
            window,
            output,
            timezone,
            format,
        } => run_merge_cmd(table, window, output, timezone, format),
        Commands::Check {
            table,
            timezone,
            format,
        } => run_check_cmd(table, timezone, format),
        Commands::Analyze {
            table,
            output,
            summary,
            bucket_pct,
            timezone,
            format,
        } => run_analyze_cmd(table, output, summary, bucket_pct, timezone, format),
    }
}

fn run_update_cmd(
    config_path: Option<PathBuf>,
    symbol: Option<String>,
    table: Option<PathBuf>,
    timezone: Option<String>,
    format: FormatArgs,
    dry_run: bool,
) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => UpdateConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => UpdateConfig::default(),
    };
    if let Some(s) = symbol {
        config.symbol = s;
    }
    if let Some(t) = table {
        config.table_path = t;
    }
    if timezone.is_some() {
        config.timezone = timezone;
    }
    format.apply(&mut config);
    config.validate()?;

    let store = config.store()?;
    let provider = config.provider()?;
    let today = config.today()?;

    let summary = run_update(&provider, &store, &config.symbol, today, UpdateOptions { dry_run })
        .with_context(|| format!("update of {} failed", config.table_path.display()))?;

    print_summary(&summary, dry_run);
    Ok(())
}

fn run_merge_cmd(
    table_path: PathBuf,
    window_path: PathBuf,
    output: Option<PathBuf>,
    timezone: Option<String>,
    format: FormatArgs,
) -> Result<()> {
    let config = file_config(&table_path, timezone, &format)?;

    let store = config.store()?;
    let table = store
        .load()
        .with_context(|| format!("failed to load table {}", table_path.display()))?;

    let codec = config.codec()?;
    let window_text = std::fs::read_to_string(&window_path)
        .with_context(|| format!("failed to read window {}", window_path.display()))?;
    let window = FetchWindow::new(
        window_path.display().to_string(),
        codec.parse(&window_text)?,
    );

    let merged = merge(&table, &window)?;
    print_report(&merged.report);

    let out_store = match output {
        Some(path) => FileTableStore::new(path, Box::new(codec), config.format.order),
        None => store,
    };
    if merged.report.changed() || out_store.path() != table_path.as_path() {
        out_store.save(&merged.table)?;
        println!("Saved {} rows to {}", merged.table.len(), out_store.path().display());
    } else {
        println!("Table unchanged: {}", table_path.display());
    }
    Ok(())
}

/// Config for the offline commands, which take everything from flags.
fn file_config(table_path: &Path, timezone: Option<String>, format: &FormatArgs) -> Result<UpdateConfig> {
    let mut config = UpdateConfig {
        table_path: table_path.to_path_buf(),
        timezone,
        ..UpdateConfig::default()
    };
    format.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn run_check_cmd(table_path: PathBuf, timezone: Option<String>, format: FormatArgs) -> Result<()> {
    let config = file_config(&table_path, timezone, &format)?;

    let table = config
        .store()?
        .load()
        .with_context(|| format!("table {} failed validation", table_path.display()))?;

    println!("Table:  {}", table_path.display());
    println!("Rows:   {}", table.len());
    println!("Order:  {}", table.order());
    match table.date_range() {
        Some((oldest, newest)) => println!("Range:  {oldest} to {newest}"),
        None => println!("Range:  (empty)"),
    }
    Ok(())
}

fn run_analyze_cmd(
    table_path: PathBuf,
    output: Option<PathBuf>,
    summary: Option<PathBuf>,
    bucket_pct: Decimal,
    timezone: Option<String>,
    format: FormatArgs,
) -> Result<()> {
    let config = file_config(&table_path, timezone, &format)?;
    let table = config
        .store()?
        .load()
        .with_context(|| format!("failed to load table {}", table_path.display()))?;

    let days = day_metrics(&table);
    let years = yearly_summary(&table);
    let histogram = day_change_histogram(&days, bucket_pct)?;

    print_years(&years);
    print_histogram(&histogram);

    if let Some(path) = output {
        std::fs::write(&path, export_day_metrics_csv(&days)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Per-day metrics written to {}", path.display());
    }
    if let Some(path) = summary {
        std::fs::write(&path, export_yearly_summary_csv(&years)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Yearly summary written to {}", path.display());
    }
    Ok(())
}

fn print_years(years: &[YearSummary]) {
    println!(
        "{:<6} {:>5} {:>14} {:>14} {:>14} {:>14} {:>9}",
        "Year", "Days", "Open", "High", "Low", "Close", "Change"
    );
    for y in years {
        let pct = y
            .change
            .percent
            .map(|p| format!("{}%", p.round_dp(2)))
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<6} {:>5} {:>14} {:>14} {:>14} {:>14} {:>9}",
            y.year,
            y.days,
            y.open.round_dp(2),
            y.high.round_dp(2),
            y.low.round_dp(2),
            y.close.round_dp(2),
            pct
        );
    }
}

fn print_histogram(buckets: &[HistogramBucket]) {
    if buckets.is_empty() {
        return;
    }
    println!();
    println!("1-day % change histogram:");
    for b in buckets {
        println!("  [{:>6}%, {:>6}%)  {}", b.lower, b.upper, b.count);
    }
    let total: usize = buckets.iter().map(|b| b.count).sum();
    println!("  total: {total}");
}

fn print_report(report: &MergeReport) {
    println!("Newest before:  {}", report.newest_before);
    println!("Newest after:   {}", report.newest_after);
    println!("Skipped:        {}", report.skipped);
    println!("Replaced:       {} ({} revised)", report.replaced, report.revised);
    println!("Inserted:       {}", report.inserted);
    if let Some(gap) = report.gap_days {
        println!("WARNING: {gap} day(s) missing between table and fetched window");
    }
}

fn print_summary(summary: &UpdateSummary, dry_run: bool) {
    println!();
    println!("=== Update: {} ===", summary.symbol);
    println!("Provider:       {}", summary.provider);
    println!("Lookback:       {} day(s)", summary.lookback_days);
    println!("Fetched:        {} bar(s)", summary.fetched);
    print_report(&summary.report);
    println!("Rows:           {}", summary.rows);
    if dry_run {
        println!("Dry run — table not written.");
    } else if summary.saved {
        println!("Table saved.");
    } else {
        println!("Table unchanged.");
    }
}
