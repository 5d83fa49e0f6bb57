use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use dental_claims::cookbook;
use dental_claims::prelude::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "claimcli")]
#[command(version, about = "Dental Claims CLI - Ingest claim batches and report on provider revenue", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the per-user config file)
    #[arg(short, long, global = true, env = "CLAIMS_CONFIG")]
    config: Option<PathBuf>,

    /// Claim store file, overriding the configured one
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a claim batch from a JSON or CSV file
    Ingest(IngestArgs),
    /// Rank providers by summed net fee
    TopProviders(TopProvidersArgs),
    /// Show summary statistics for the store
    Stats,
    /// Export stored claims to JSON, CSV, or SQL
    Export(ExportArgs),
    /// Print the SQL schema for the claim table
    Schema(SchemaArgs),
}

#[derive(Args)]
struct IngestArgs {
    /// Batch file (.json array of objects or .csv with a header row)
    input: PathBuf,
    /// Print the persisted claims as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct TopProvidersArgs {
    /// Number of providers; zero or negative means the configured default
    #[arg(short, long, allow_negative_numbers = true)]
    limit: Option<i64>,
    /// Print the ranking as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ExportArgs {
    /// Output file path
    #[arg(short, long)]
    output: PathBuf,
    /// Export format (defaults to the configured one)
    #[arg(long, value_enum)]
    format: Option<ExportFormatOpt>,
}

#[derive(Args)]
struct SchemaArgs {
    /// SQL dialect
    #[arg(long, value_enum, default_value_t = SqlDialectOpt::Postgres)]
    dialect: SqlDialectOpt,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum ExportFormatOpt {
    Json,
    Jsonl,
    Csv,
    Sql,
}

impl From<ExportFormatOpt> for ExportFormat {
    fn from(opt: ExportFormatOpt) -> Self {
        match opt {
            ExportFormatOpt::Json => ExportFormat::Json,
            ExportFormatOpt::Jsonl => ExportFormat::JsonLines,
            ExportFormatOpt::Csv => ExportFormat::Csv,
            ExportFormatOpt::Sql => ExportFormat::Sql,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum SqlDialectOpt {
    Postgres,
    Sqlite,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        match e.downcast_ref::<ClaimsError>() {
            Some(claims_error) => eprintln!("Error: {}", claims_error.user_message()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ClaimsConfig::load(cli.config.as_deref())?;
    if let Some(store) = cli.store {
        config.store_path = Some(store);
    }
    init_tracing(&config);

    match cli.command {
        Commands::Ingest(args) => cmd_ingest(args, &config),
        Commands::TopProviders(args) => cmd_top_providers(args, &config),
        Commands::Stats => cmd_stats(&config),
        Commands::Export(args) => cmd_export(args, &config),
        Commands::Schema(args) => cmd_schema(args),
    }
}

fn init_tracing(config: &ClaimsConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open_store(config: &ClaimsConfig) -> anyhow::Result<Box<dyn ClaimStore>> {
    if config.store_path.is_none() {
        tracing::warn!("no store file configured, claims are kept in memory only");
    }
    Ok(cookbook::open_store(config)?)
}

fn cmd_ingest(args: IngestArgs, config: &ClaimsConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let claims = cookbook::ingest_file(&args.input, store.as_ref(), config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&claims)?);
    } else if let Some(first) = claims.first() {
        println!("Ingested {} claims as batch {}", claims.len(), first.unique_claim_id);
    } else {
        println!("Batch was empty, nothing ingested");
    }
    Ok(())
}

fn cmd_top_providers(args: TopProvidersArgs, config: &ClaimsConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let ranking = cookbook::top_providers(store.as_ref(), config, args.limit)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ranking)?);
        return Ok(());
    }

    for (rank, entry) in ranking.iter().enumerate() {
        println!("{:>3} | {} | {}", rank + 1, entry.provider_npi, entry.total_net_fee);
    }
    println!("Total providers: {}", ranking.len());
    Ok(())
}

fn cmd_stats(config: &ClaimsConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let claims = store.all_claims()?;
    ClaimAnalytics::new(&claims).stats()?.print_summary();
    Ok(())
}

fn cmd_export(args: ExportArgs, config: &ClaimsConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let claims = store.all_claims()?;
    let format = args.format.map(ExportFormat::from).unwrap_or(config.default_export_format);

    dental_claims::export::export_claims(&claims, &args.output, format, config.pretty_json)
        .with_context(|| format!("exporting {} claims", claims.len()))?;
    println!("Exported {} claims to {}", claims.len(), args.output.display());
    Ok(())
}

fn cmd_schema(args: SchemaArgs) -> anyhow::Result<()> {
    let dialect = match args.dialect {
        SqlDialectOpt::Postgres => SqlDialect::PostgreSQL,
        SqlDialectOpt::Sqlite => SqlDialect::SQLite,
    };
    print!("{}", SqlExporter::new().with_dialect(dialect).schema_sql());
    Ok(())
}
