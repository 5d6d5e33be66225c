use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use fieldmatch_cache::{FileStore, SystemClock};
use fieldmatch_engine::{
    Collaborators, ConfidenceThresholdGate, EnvSettings, FillDecision, MatchCoordinator,
    MatcherConfig, ProfileStore, StaticProfile, ENV_ORACLE_KEY,
};
use fieldmatch_protocol::{serialize_json, serialize_json_pretty, FieldSignals, MatchResult};
use fieldmatch_remote::{MatchOracleClient, ReqwestTransport};
use fieldmatch_signals::{
    field_signature, form_signature, profile_signature, DetectedField, DomContext, SignalExtractor,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::input::{read_json, KeyArgs};
use crate::shared_server::{router, SharedCacheService, CACHE_ROUTE};

mod http_api;
mod input;
pub mod shared_server;

/// Config file used when `--config` is absent.
pub const ENV_CONFIG: &str = "FIELDMATCH_CONFIG";

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serialize_json_pretty(value)?
    } else {
        serialize_json(value)?
    };
    print_stdout(&text)
}

#[derive(Parser)]
#[command(name = "fieldmatch")]
#[command(about = "Match form fields to profile keys", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// TOML config file (falls back to $FIELDMATCH_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the local and batch caches
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract field signals from a detected field and its DOM context
    Extract(ExtractArgs),

    /// Compute cache signatures
    #[command(subcommand)]
    Signature(SignatureCommand),

    /// Resolve one field to a profile key
    Match(MatchArgs),

    /// Resolve every field of a form
    Batch(BatchArgs),

    /// Inspect or reset the local caches
    #[command(subcommand)]
    Cache(CacheCommand),

    /// Serve the shared cache protocol over HTTP (POST /cache)
    #[command(name = "serve-shared-cache")]
    ServeSharedCache(ServeArgs),

    /// Print the JSON schema of a wire type
    Schema(SchemaArgs),
}

#[derive(Args)]
struct ExtractArgs {
    /// JSON `{ "field": ..., "context": ... }`, or `-` for stdin
    #[arg(long, default_value = "-")]
    input: String,
}

#[derive(Deserialize)]
struct ExtractInput {
    field: DetectedField,
    #[serde(default)]
    context: DomContext,
}

#[derive(Subcommand)]
enum SignatureCommand {
    /// Signature of one field
    Field {
        /// FieldSignals JSON, or `-` for stdin
        #[arg(long, default_value = "-")]
        signals: String,
    },
    /// Signature of a whole form on a page
    Form {
        /// JSON array of FieldSignals, or `-` for stdin
        #[arg(long, default_value = "-")]
        fields: String,

        #[arg(long)]
        page_url: String,

        /// Clock override in unix milliseconds
        #[arg(long)]
        now_ms: Option<u64>,
    },
    /// Signature of the available key set
    Profile(KeyArgs),
}

#[derive(Args)]
struct MatchArgs {
    /// FieldSignals JSON, or `-` for stdin
    #[arg(long, default_value = "-")]
    signals: String,

    #[command(flatten)]
    keys: KeyArgs,

    /// Override the fill threshold
    #[arg(long)]
    min_confidence: Option<u8>,
}

#[derive(Args)]
struct BatchArgs {
    /// JSON array of FieldSignals, or `-` for stdin
    #[arg(long, default_value = "-")]
    fields: String,

    #[arg(long)]
    page_url: String,

    #[command(flatten)]
    keys: KeyArgs,

    /// Override the fill threshold
    #[arg(long)]
    min_confidence: Option<u8>,
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Drop both local tiers
    Clear,
    /// Drop every local mapping onto a profile key
    Invalidate {
        #[arg(long)]
        key: String,
    },
    /// Entry counts
    Stats,
}

#[derive(Args)]
struct ServeArgs {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1:8787")]
    bind: String,

    /// Oracle used to resolve misses that carry field context
    #[arg(long)]
    oracle_url: Option<String>,

    /// Mappings below this confidence are refused
    #[arg(long)]
    min_store_confidence: Option<u8>,
}

#[derive(Args)]
struct SchemaArgs {
    #[arg(value_enum)]
    kind: SchemaKind,
}

#[derive(Clone, Copy, ValueEnum)]
enum SchemaKind {
    Signals,
    Result,
    OracleRequest,
    OracleBatchRequest,
    SharedRequest,
}

#[derive(Serialize)]
struct Resolution {
    result: MatchResult,
    decision: FillDecision,
}

#[derive(Serialize)]
struct IndexedResolution {
    index: usize,
    #[serde(flatten)]
    resolution: Resolution,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let pretty = cli.pretty;
    match &cli.command {
        Commands::Extract(args) => {
            let input: ExtractInput = read_json(&args.input)?;
            let signals = SignalExtractor::new().extract(&input.field, &input.context);
            print_json(&signals, pretty)
        }
        Commands::Signature(command) => run_signature(command, pretty),
        Commands::Schema(args) => print_json(&schema_of(args.kind), true),
        Commands::Match(args) => run_match(&cli, args).await,
        Commands::Batch(args) => run_batch(&cli, args).await,
        Commands::Cache(command) => run_cache(&cli, command).await,
        Commands::ServeSharedCache(args) => serve_shared_cache(&cli, args).await,
    }
}

fn load_config(cli: &Cli) -> Result<MatcherConfig> {
    let path = cli
        .config
        .clone()
        .or_else(|| env::var_os(ENV_CONFIG).map(PathBuf::from));
    let mut config = match &path {
        Some(path) => MatcherConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => MatcherConfig::default(),
    };
    config
        .apply_env()
        .context("Invalid FIELDMATCH_* environment override")?;
    Ok(config)
}

fn cache_dir(cli: &Cli) -> Result<PathBuf> {
    if let Some(dir) = &cli.cache_dir {
        return Ok(dir.clone());
    }
    dirs::cache_dir()
        .map(|dir| dir.join("fieldmatch"))
        .context("No cache directory for this platform; pass --cache-dir")
}

fn build_coordinator(
    cli: &Cli,
    config: &MatcherConfig,
    profile: Arc<dyn ProfileStore>,
) -> Result<MatchCoordinator> {
    let timeout = config.oracle.deadline().max(config.shared_cache.deadline());
    let transport = ReqwestTransport::new(timeout).context("Failed to build HTTP client")?;
    let coordinator = MatchCoordinator::new(
        config,
        Collaborators {
            store: Arc::new(FileStore::new(cache_dir(cli)?)),
            clock: Arc::new(SystemClock),
            transport: Arc::new(transport),
            settings: Arc::new(EnvSettings),
            profile,
        },
    )?;
    Ok(coordinator)
}

fn threshold_gate(
    config: &MatcherConfig,
    min_confidence: Option<u8>,
) -> Result<ConfidenceThresholdGate> {
    let min = min_confidence.unwrap_or(config.gate.min_confidence);
    if min > 100 {
        anyhow::bail!("--min-confidence must be 0-100, got {min}");
    }
    Ok(ConfidenceThresholdGate::new(min))
}

fn run_signature(command: &SignatureCommand, pretty: bool) -> Result<()> {
    let signature = match command {
        SignatureCommand::Field { signals } => {
            let signals: FieldSignals = read_json(signals)?;
            field_signature(&signals)
        }
        SignatureCommand::Form {
            fields,
            page_url,
            now_ms,
        } => {
            let fields: Vec<FieldSignals> = read_json(fields)?;
            let now_ms = now_ms.unwrap_or_else(fieldmatch_cache::unix_ms_now);
            form_signature(&fields, page_url, now_ms)
        }
        SignatureCommand::Profile(keys) => profile_signature(keys.load()?.keys()),
    };
    print_json(&serde_json::json!({ "signature": signature }), pretty)
}

async fn run_match(cli: &Cli, args: &MatchArgs) -> Result<()> {
    let config = load_config(cli)?;
    let gate = threshold_gate(&config, args.min_confidence)?;
    let signals: FieldSignals = read_json(&args.signals)?;
    let profile = Arc::new(args.keys.load()?);
    let coordinator = build_coordinator(cli, &config, profile.clone())?;

    let result = coordinator.resolve(&signals, profile.keys()).await;
    let decision = gate.decide(&result);
    print_json(&Resolution { result, decision }, cli.pretty)
}

async fn run_batch(cli: &Cli, args: &BatchArgs) -> Result<()> {
    let config = load_config(cli)?;
    let gate = threshold_gate(&config, args.min_confidence)?;
    let fields: Vec<FieldSignals> = read_json(&args.fields)?;
    let profile = Arc::new(args.keys.load()?);
    let coordinator = build_coordinator(cli, &config, profile.clone())?;

    let results = coordinator
        .resolve_batch(&fields, &args.page_url, profile.keys())
        .await;
    let resolutions: Vec<IndexedResolution> = results
        .into_iter()
        .map(|(index, result)| IndexedResolution {
            index,
            resolution: Resolution {
                decision: gate.decide(&result),
                result,
            },
        })
        .collect();
    print_json(&resolutions, cli.pretty)
}

async fn run_cache(cli: &Cli, command: &CacheCommand) -> Result<()> {
    let config = load_config(cli)?;
    let coordinator = build_coordinator(cli, &config, Arc::new(StaticProfile::default()))?;
    match command {
        CacheCommand::Clear => {
            coordinator.clear_caches().await;
            print_json(&coordinator.cache_stats().await, cli.pretty)
        }
        CacheCommand::Invalidate { key } => {
            let removed = coordinator.invalidate_key(key).await;
            print_json(&serde_json::json!({ "removed": removed }), cli.pretty)
        }
        CacheCommand::Stats => print_json(&coordinator.cache_stats().await, cli.pretty),
    }
}

async fn serve_shared_cache(cli: &Cli, args: &ServeArgs) -> Result<()> {
    let mut config = load_config(cli)?;
    if let Some(url) = &args.oracle_url {
        config.oracle.endpoint = Some(url.clone());
    }
    let min_store = args
        .min_store_confidence
        .unwrap_or(config.cache.storage_threshold);

    let mut service = SharedCacheService::new(min_store);
    if config.oracle.endpoint.is_some() {
        let transport = ReqwestTransport::new(config.oracle.deadline())
            .context("Failed to build HTTP client")?;
        let credential = env::var(ENV_ORACLE_KEY)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        service = service.with_oracle(
            MatchOracleClient::new(Arc::new(transport), &config.oracle),
            credential,
        );
    }
    let app = router(Arc::new(service));

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    let local_addr = listener.local_addr()?;
    let base_url = format!("http://{local_addr}");

    print_stdout(&format!("Serving shared cache: {base_url}{CACHE_ROUTE}"))?;
    print_stdout(&format!("Health endpoint: {base_url}/health"))?;
    if let Some(url) = &config.oracle.endpoint {
        print_stdout(&format!("Misses with field context resolve via {url}"))?;
    }
    print_stdout(&format!(
        "Try: curl -X POST {base_url}{CACHE_ROUTE} -d '{{\"action\":\"get\",\"fieldSignature\":\"...\"}}'"
    ))?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn schema_of(kind: SchemaKind) -> schemars::Schema {
    use fieldmatch_protocol::oracle::{OracleBatchRequest, OracleFieldRequest};
    use fieldmatch_protocol::shared::SharedCacheRequest;

    match kind {
        SchemaKind::Signals => schemars::schema_for!(FieldSignals),
        SchemaKind::Result => schemars::schema_for!(MatchResult),
        SchemaKind::OracleRequest => schemars::schema_for!(OracleFieldRequest),
        SchemaKind::OracleBatchRequest => schemars::schema_for!(OracleBatchRequest),
        SchemaKind::SharedRequest => schemars::schema_for!(SharedCacheRequest),
    }
}
