//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use welfarebridge_catalog::{
    SortOrder, life_stage_code, parse_cards, target_group_code, theme_code,
};
use welfarebridge_core::Services;
use welfarebridge_core::ingest::{IngestOptions, IngestReport, ItemOutcome, ProgressReporter};
use welfarebridge_estimate::{EstimateOutcome, IncomeProfile, StaticReferences, extract_json_object};
use welfarebridge_shared::{
    AppConfig, IngestPolicy, config_file_path, expand_home, generation_api_key, init_config,
    load_config, service_key,
};
use welfarebridge_storage::{
    FieldSpec, INCOME_REQUEST_FIELDS, INCOME_SNAPSHOT_FIELDS, Storage, TableSchema, TableSpec,
    WELFARE_FIELDS,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// welfarebridge — welfare listing ingestion and income estimates.
#[derive(Parser)]
#[command(
    name = "welfarebridge",
    version,
    about = "Ingest the welfare program listing and extract structured income estimates.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

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
    /// Fetch one listing page and persist its cards.
    Ingest {
        /// Province / metropolitan city name (ctpvNm), also stored as `city`.
        #[arg(long)]
        city: String,

        /// District name (sggNm).
        #[arg(long)]
        district: Option<String>,

        /// Life-stage label, e.g. 청년, 노년.
        #[arg(long)]
        life_stage: Option<String>,

        /// Target-group label, e.g. 저소득, 장애인.
        #[arg(long)]
        target: Option<String>,

        /// Interest-theme label, e.g. 주거, 일자리.
        #[arg(long)]
        theme: Option<String>,

        /// Free-text search word.
        #[arg(long)]
        keyword: Option<String>,

        /// Most-viewed programs first.
        #[arg(long)]
        popular: bool,

        /// Page number (defaults to config).
        #[arg(long)]
        page: Option<u32>,

        /// Page size (defaults to config).
        #[arg(long)]
        rows: Option<u32>,

        /// Record failing cards and keep going instead of stopping.
        #[arg(long)]
        continue_on_error: bool,

        /// Parse and check cards without writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Parse a saved listing XML file and print the cards as JSON.
    Parse {
        /// Path to the XML payload.
        file: PathBuf,
    },

    /// Extract the JSON object from a saved model reply.
    Extract {
        /// Path to the reply text.
        file: PathBuf,
    },

    /// Estimate the income bracket for a household profile.
    Estimate {
        /// TOML file describing the household.
        #[arg(long)]
        profile: PathBuf,

        /// Reference passage file (repeatable).
        #[arg(long)]
        reference: Vec<PathBuf>,

        /// Persist the estimate.
        #[arg(long)]
        save: bool,
    },

    /// Show how canonical fields bind to a table's live columns.
    Columns {
        /// Table name (defaults to the welfare table).
        #[arg(long)]
        table: Option<String>,
    },

    /// Check configuration, secrets and database reachability.
    Status,

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
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "welfarebridge=info",
        1 => "welfarebridge=debug",
        _ => "welfarebridge=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

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

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Ingest {
            city,
            district,
            life_stage,
            target,
            theme,
            keyword,
            popular,
            page,
            rows,
            continue_on_error,
            dry_run,
        } => {
            let filters = IngestFilters {
                city,
                district,
                life_stage,
                target,
                theme,
                keyword,
                popular,
                page,
                rows,
            };
            cmd_ingest(&filters, continue_on_error, dry_run).await
        }
        Command::Parse { file } => cmd_parse(&file),
        Command::Extract { file } => cmd_extract(&file),
        Command::Estimate {
            profile,
            reference,
            save,
        } => cmd_estimate(&profile, &reference, save).await,
        Command::Columns { table } => cmd_columns(table.as_deref()).await,
        Command::Status => cmd_status().await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// ingest
// ---------------------------------------------------------------------------

struct IngestFilters {
    city: String,
    district: Option<String>,
    life_stage: Option<String>,
    target: Option<String>,
    theme: Option<String>,
    keyword: Option<String>,
    popular: bool,
    page: Option<u32>,
    rows: Option<u32>,
}

async fn cmd_ingest(filters: &IngestFilters, continue_on_error: bool, dry_run: bool) -> Result<()> {
    let config = load_config()?;
    // Fail on a missing service key before touching the database.
    service_key(&config)?;

    let services = Services::open(&config).await?;
    let mut query = services.listing_query()?.city(&filters.city);

    if let Some(d) = &filters.district {
        query = query.district(d);
    }
    if let Some(label) = &filters.life_stage {
        if life_stage_code(label).is_none() {
            warn!(label, "unknown life stage, keeping configured default");
        }
        query = query.life_stage(label);
    }
    if let Some(label) = &filters.target {
        if target_group_code(label).is_none() {
            warn!(label, "unknown target group, filter omitted");
        }
        query = query.target_group(label);
    }
    if let Some(label) = &filters.theme {
        if theme_code(label).is_none() {
            warn!(label, "unknown theme, filter omitted");
        }
        query = query.theme(label);
    }
    if let Some(word) = &filters.keyword {
        query = query.keyword(word);
    }
    if filters.popular {
        query = query.sort(SortOrder::Popular);
    }
    if let Some(p) = filters.page {
        query.page_no = p;
    }
    if let Some(r) = filters.rows {
        query.num_of_rows = r;
    }

    let options = IngestOptions {
        city: filters.city.clone(),
        policy: if continue_on_error {
            IngestPolicy::ContinueOnError
        } else {
            config.ingest.policy
        },
        dry_run,
    };

    info!(city = %options.city, policy = ?options.policy, dry_run, "ingesting welfare listing");

    let reporter = CliProgress::new();
    let result = services.ingest(&query, &options, &reporter).await;
    reporter.spinner.finish_and_clear();
    let report = result?;

    print_report(&report);
    services.close();

    if !report.is_complete() {
        return Err(eyre!("{} card(s) failed to persist", report.failures.len()));
    }
    Ok(())
}

fn print_report(report: &IngestReport) {
    println!();
    if report.dry_run {
        println!("  Dry run: nothing was written.");
    } else {
        println!("  Ingestion finished.");
    }
    println!("  Run:       {}", report.run_id);
    println!("  City:      {}", report.city);
    println!("  Parsed:    {}", report.parsed);
    println!("  Persisted: {}", report.persisted.len());
    println!("  Failed:    {}", report.failures.len());
    println!("  Payload:   sha256:{}", report.payload_sha256);
    println!("  Time:      {:.1}s", report.elapsed_ms as f64 / 1000.0);
    for f in &report.failures {
        println!("    #{} {:?}: {}", f.index, f.title, f.error);
    }
    println!();
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
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn card(&self, outcome: &ItemOutcome, current: usize, total: usize) {
        let msg = match outcome {
            ItemOutcome::Persisted { id, .. } => format!("Persisted [{current}/{total}] row {id}"),
            ItemOutcome::Skipped { .. } => format!("Checked [{current}/{total}]"),
            ItemOutcome::Failed(f) => format!("Failed [{current}/{total}] {}", f.error),
        };
        self.spinner.set_message(msg);
    }

    fn done(&self, _report: &IngestReport) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// parse / extract
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| eyre!("cannot read {}: {e}", path.display()))
}

fn cmd_parse(file: &Path) -> Result<()> {
    let cards = parse_cards(&read_file(file)?)?;
    info!(cards = cards.len(), "listing parsed");
    println!("{}", serde_json::to_string_pretty(&cards)?);
    Ok(())
}

fn cmd_extract(file: &Path) -> Result<()> {
    let object = extract_json_object(&read_file(file)?)?;
    println!("{}", serde_json::to_string_pretty(&object)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// estimate
// ---------------------------------------------------------------------------

async fn cmd_estimate(profile_path: &Path, references: &[PathBuf], save: bool) -> Result<()> {
    let config = load_config()?;
    // Surface a missing key as a clear error rather than after opening storage.
    generation_api_key(&config)?;

    let profile: IncomeProfile = toml::from_str(&read_file(profile_path)?)
        .map_err(|e| eyre!("invalid profile {}: {e}", profile_path.display()))?;

    let passages = references
        .iter()
        .map(|p| read_file(p))
        .collect::<Result<Vec<_>>>()?;

    let services = Services::open(&config)
        .await?
        .with_retriever(Arc::new(StaticReferences::new(passages)));

    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Estimating income bracket");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    let result = services.estimate(&profile, save).await;
    spinner.finish_and_clear();
    let run = result?;

    match &run.outcome {
        EstimateOutcome::Structured(estimate) => {
            println!("{}", serde_json::to_string_pretty(estimate)?);
            if let Some(saved) = run.saved {
                println!(
                    "\n  Saved: request {} / snapshot {}",
                    saved.request_id, saved.snapshot_id
                );
            }
        }
        EstimateOutcome::Unparsed { raw_text, reason } => {
            eprintln!("  Could not extract a JSON object: {reason}");
            eprintln!("  Raw reply:\n{raw_text}");
            if save {
                eprintln!("  Nothing was saved.");
            }
        }
    }

    services.close();
    Ok(())
}

// ---------------------------------------------------------------------------
// columns / status
// ---------------------------------------------------------------------------

/// Field set used to resolve `table`, chosen by the configured table names.
fn fields_for(config: &AppConfig, table: &str) -> &'static [FieldSpec] {
    if table == config.storage.income_request_table {
        INCOME_REQUEST_FIELDS
    } else if table == config.storage.income_snapshot_table {
        INCOME_SNAPSHOT_FIELDS
    } else {
        WELFARE_FIELDS
    }
}

async fn cmd_columns(table: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let table = table.unwrap_or(&config.storage.welfare_table);
    let spec = TableSpec::new(table, fields_for(&config, table))?;

    let storage = Storage::from_config(&config.storage).await?;
    let schema = TableSchema::resolve(&spec, storage.table_columns(spec.table()).await?);

    if !schema.exists() {
        return Err(eyre!(
            "table {table} not found in {}",
            storage.path().display()
        ));
    }

    println!();
    println!("  Table:   {}", schema.table());
    println!("  Columns: {}", schema.columns().join(", "));
    println!();
    for b in schema.bindings() {
        match &b.column {
            Some(col) => println!("  {:<14} -> {col}", b.field),
            None => println!("  {:<14} -> (missing, values dropped)", b.field),
        }
    }
    println!();
    Ok(())
}

async fn cmd_status() -> Result<()> {
    let config = load_config()?;
    let config_path = config_file_path()?;
    let db_path = expand_home(&config.storage.path)?;

    println!();
    println!(
        "  Config:      {}{}",
        config_path.display(),
        if config_path.exists() { "" } else { " (defaults)" }
    );
    println!("  Listing URL: {}", config.catalog.base_url);
    println!(
        "  Service key: {}",
        secret_status(service_key(&config).is_ok(), &config.catalog.service_key_env)
    );
    println!(
        "  Model:       {} @ {}",
        config.generation.model, config.generation.base_url
    );
    println!(
        "  API key:     {}",
        secret_status(
            generation_api_key(&config).is_ok(),
            &config.generation.api_key_env
        )
    );

    let db_state = match Storage::from_config(&config.storage).await {
        Ok(storage) => match storage.ping().await {
            Ok(()) => "ok".to_string(),
            Err(e) => format!("WARN unreachable ({e})"),
        },
        Err(e) => format!("WARN unavailable ({e})"),
    };
    println!("  Database:    {} [{db_state}]", db_path.display());
    println!();
    Ok(())
}

fn secret_status(present: bool, var: &str) -> String {
    if present {
        format!("set (${var})")
    } else {
        format!("missing (${var})")
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
