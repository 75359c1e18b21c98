//! flipscan CLI - Idena flip wrongWords scans and grade-score leaderboards.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use flipscan::client::ThrottleStats;
use flipscan::pipeline::{HistoryStats, LeaderboardStats, WrongWordsStats};
use flipscan::report::summarize_dir;
use flipscan::{
    Config, IdenaClient, LeaderboardOptions, LeaderboardPipeline, ProgressObserver, ScanObserver,
    TracingObserver, WrongWordsPipeline,
};
use std::path::{Path, PathBuf};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "flipscan")]
#[command(version)]
#[command(about = "Idena flip wrongWords scans and grade-score leaderboards")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log progress lines instead of drawing a progress bar
    #[arg(long, global = true)]
    no_progress: bool,

    #[command(flatten)]
    overrides: Overrides,
}

/// Command-line overrides applied on top of the config file.
#[derive(Args)]
struct Overrides {
    /// Idena API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Items per list page (1-100)
    #[arg(long, global = true)]
    page_size: Option<u32>,

    /// Delay between list pages, in milliseconds
    #[arg(long, global = true)]
    page_delay_ms: Option<u64>,

    /// Delay between flip detail lookups, in milliseconds
    #[arg(long, global = true)]
    item_delay_ms: Option<u64>,

    /// Attempts per request
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// Output directory
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,
}

impl Overrides {
    fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.base_url {
            config.api.base_url = url.clone();
        }
        if let Some(n) = self.page_size {
            config.scan.page_size = n;
        }
        if let Some(ms) = self.page_delay_ms {
            config.scan.page_delay_ms = ms;
        }
        if let Some(ms) = self.item_delay_ms {
            config.scan.item_delay_ms = ms;
        }
        if let Some(n) = self.max_retries {
            config.api.max_retries = n;
        }
        if let Some(dir) = &self.out_dir {
            config.output.dir = dir.clone();
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Count wrongWords flips per author for one epoch
    Wrongwords {
        /// Epoch to scan (default: last finished epoch)
        epoch: Option<u64>,

        /// Also report authors without flagged flips
        #[arg(long)]
        include_clean: bool,

        /// Authors to print to the console
        #[arg(long, default_value = "50")]
        top: usize,
    },

    /// Scan several past epochs and write a master summary
    History {
        /// Number of epochs to scan
        #[arg(long, default_value = "50")]
        epochs_back: usize,

        /// First (newest) epoch to scan (default: last finished epoch)
        #[arg(long)]
        from_epoch: Option<u64>,
    },

    /// Rank flips and identities by grade score, excluding wrong-words authors
    Leaderboard {
        /// Epoch (default: last finished epoch)
        #[arg(long)]
        epoch: Option<u64>,

        /// Keep only flips with this status (repeatable)
        #[arg(long = "status")]
        statuses: Vec<String>,

        /// Keep flips with a grade score of zero or below
        #[arg(long)]
        include_zero: bool,

        /// Rows to print per leaderboard
        #[arg(long, default_value = "100")]
        top: usize,

        /// Also write the identity leaderboard as JSONL
        #[arg(long)]
        jsonl: bool,
    },

    /// Summarize earlier wrongWords reports: one vs. multiple flagged flips
    Summarize {
        /// Directory holding the reports (default: output directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: a tracing subscriber was already installed");
    }
}

fn print_example_config() {
    let example = r#"# flipscan configuration file

[api]
# Can also be set with IDENA_API_URL; ${VAR} placeholders are expanded
base_url = "https://api.idena.io/api"
timeout_secs = 30
max_retries = 6
# Linear backoff: attempt n waits n * backoff_unit_ms
backoff_unit_ms = 1500

[scan]
page_size = 100      # 1-100
page_delay_ms = 100  # between list pages
item_delay_ms = 50   # between flip detail lookups

[output]
dir = "./out"
explorer_url = "https://scan.idena.io"
"#;
    println!("{example}");
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("Failed to load config from {path:?}"),
        None => "Failed to build default config".to_string(),
    })?;
    cli.overrides.apply(&mut config);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn observer(no_progress: bool) -> Box<dyn ScanObserver> {
    if no_progress {
        Box::new(TracingObserver::default())
    } else {
        Box::new(ProgressObserver::new())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match &cli.command {
        Commands::Example => {
            print_example_config();
            return Ok(());
        }

        Commands::Validate => {
            let config = load_config(&cli)?;

            info!("Configuration is valid");
            info!("  API:        {}", config.api.base_url);
            info!(
                "  Retries:    {} attempts, {}ms backoff unit",
                config.api.max_retries, config.api.backoff_unit_ms
            );
            info!(
                "  Paging:     {} per page, {}ms / {}ms delays",
                config.scan.page_size, config.scan.page_delay_ms, config.scan.item_delay_ms
            );
            info!("  Output:     {:?}", config.output.dir);
            return Ok(());
        }

        Commands::Summarize { dir } => {
            let config = load_config(&cli)?;
            let dir = dir.clone().unwrap_or_else(|| config.output.dir.clone());
            print_summary(&config, &dir)?;
        }

        Commands::Wrongwords {
            epoch,
            include_clean,
            top,
        } => {
            let config = load_config(&cli)?;
            let client = IdenaClient::from_config(&config.api).context("Failed to build API client")?;
            let observer = observer(cli.no_progress);

            let stats = WrongWordsPipeline::new(&client, &config, observer.as_ref())
                .run(*epoch, *include_clean)
                .await?;

            print_wrongwords(&stats, *top);
            print_throttle(&client.throttle().stats());
        }

        Commands::History {
            epochs_back,
            from_epoch,
        } => {
            let config = load_config(&cli)?;
            let client = IdenaClient::from_config(&config.api).context("Failed to build API client")?;
            let observer = observer(cli.no_progress);

            let stats = WrongWordsPipeline::new(&client, &config, observer.as_ref())
                .run_history(*epochs_back, *from_epoch)
                .await?;

            print_history(&stats);
            print_throttle(&client.throttle().stats());
        }

        Commands::Leaderboard {
            epoch,
            statuses,
            include_zero,
            top,
            jsonl,
        } => {
            let config = load_config(&cli)?;
            let client = IdenaClient::from_config(&config.api).context("Failed to build API client")?;

            let options = LeaderboardOptions {
                statuses: statuses.clone(),
                include_zero: *include_zero,
                jsonl: *jsonl,
            };
            let stats = LeaderboardPipeline::new(&client, &config)
                .run(*epoch, &options)
                .await?;

            print_leaderboard(&stats, *top);
            print_throttle(&client.throttle().stats());
        }
    }

    Ok(())
}

fn print_wrongwords(stats: &WrongWordsStats, top: usize) {
    println!("\n=== wrongWords Epoch {} ===", stats.epoch);
    println!("Flips:       {}", stats.flips_listed);
    println!("Fetched:     {}", stats.flips_fetched);
    println!("Failed:      {}", stats.flips_failed);
    println!("Flagged:     {}", stats.flagged_flips);
    println!("Authors:     {}", stats.authors.len());
    println!("Repeat:      {}", stats.repeat_offenders());
    println!("Runtime:     {:.1}s", stats.runtime_secs);
    println!("Output:      {:?}", stats.csv_path);

    if top > 0 && !stats.authors.is_empty() {
        println!("\n{:<44} wrongWordsCount", "address");
        println!("{}", "-".repeat(60));
        for author in stats.authors.iter().take(top) {
            let marker = if author.wrong_words_count > 1 { "  **>1**" } else { "" };
            println!("{:<44} {}{marker}", author.address, author.wrong_words_count);
        }
    }
}

fn print_history(stats: &HistoryStats) {
    println!("\n=== wrongWords History ===");
    for epoch in &stats.epochs {
        println!(
            "Epoch {:>4}:  {:>5} flips  {:>4} flagged  {:>4} authors  {:>3} failed",
            epoch.epoch,
            epoch.flips_listed,
            epoch.flagged_flips,
            epoch.authors.len(),
            epoch.flips_failed
        );
    }
    println!("Epochs:      {}", stats.epochs.len());
    println!("Rows:        {}", stats.summary_rows);
    println!("Runtime:     {:.1}s", stats.runtime_secs);
    println!("Summary:     {:?}", stats.summary_path);
}

fn print_leaderboard(stats: &LeaderboardStats, top: usize) {
    if top > 0 {
        println!("\n=== TOP FLIPS (by gradeScore) ===");
        for (i, flip) in stats.flips.iter().take(top).enumerate() {
            let grade = flip.grade.map(|g| g.to_string()).unwrap_or_default();
            println!(
                "{:4}  {:10.4}  grade={grade:<2}  status={:<16}  {}  {}",
                i + 1,
                flip.grade_score,
                flip.status,
                flip.author,
                flip.cid
            );
        }

        println!("\n=== TOP IDENTITIES (sum gradeScore) ===");
        for (i, id) in stats.identities.iter().take(top).enumerate() {
            println!(
                "{:4}  {:12.4}  flips={:3}  avg={:8.4}  max={:8.4}  {}",
                i + 1,
                id.total_score,
                id.flip_count,
                id.avg_score(),
                id.max_score,
                id.address
            );
        }
    }

    println!("\n=== Leaderboard Epoch {} ===", stats.epoch);
    println!("Listed:      {}", stats.flips_listed);
    println!("Kept:        {}", stats.flips.len());
    println!("Identities:  {}", stats.identities.len());
    println!("Excluded:    {} bad authors", stats.bad_authors);
    println!("Runtime:     {:.1}s", stats.runtime_secs);
    println!("Flips:       {:?}", stats.flips_path);
    println!("Identities:  {:?}", stats.identities_path);
    if let Some(path) = &stats.identities_jsonl_path {
        println!("JSONL:       {path:?}");
    }
}

fn print_summary(config: &Config, dir: &Path) -> Result<()> {
    let tallies =
        summarize_dir(dir).with_context(|| format!("Failed to summarize reports in {dir:?}"))?;

    println!("Epoch Summary: One vs. Multiple Reported Flips\n");
    if tallies.is_empty() {
        println!("No wrongwords_epoch_<n>_authors.csv files in {dir:?}");
        return Ok(());
    }

    for tally in &tallies {
        println!("Epoch {}:", tally.epoch);
        println!("  One reported flip: {}", tally.single);
        println!("  Multiple reported flips: {}", tally.multiple);
        if !tally.repeat_offenders.is_empty() {
            println!("  Addresses with 2+ reported flips:");
            for (address, count) in &tally.repeat_offenders {
                println!(
                    "    - {address} ({count} flips) -> {}",
                    config.output.address_url(address)
                );
            }
        }
        println!("{}", "-".repeat(60));
    }
    Ok(())
}

fn print_throttle(stats: &ThrottleStats) {
    println!("Requests:    {}", stats.total_requests);
    println!("Retries:     {}", stats.total_retries);
    println!(
        "429s:        {} ({:.1}%)",
        stats.total_429s,
        stats.rate_limit_ratio * 100.0
    );
    println!("Waited:      {:.1}s", stats.total_wait_secs);
}
