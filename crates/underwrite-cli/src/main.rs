//! # underwrite CLI
//!
//! Offline tooling over the deterministic core (chunking, check batches,
//! keyword classification, aggregation) plus model-backed extraction and
//! evaluation when a provider is compiled in and configured.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use underwrite_core::{
    merge_checks, validate_checks, Aggregator, AggregatorConfig, CheckBatch, CheckResult,
    CheckSummary, Chunker, ChunkerConfig, FieldMap, RelevanceScorer, SizeMetric,
};
use underwrite_runtime::{
    CheckStore, CompliancePipeline, DocumentParser, EvaluationRequest, JsonFileStore,
    PlainTextParser, RuntimeConfig, StaticGraph,
};

/// Policy compliance checks: extract them from policy text, evaluate
/// documents against them.
#[derive(Parser, Debug)]
#[command(name = "underwrite", version, about, long_about = None)]
struct Cli {
    /// Verbose output. Repeat for more (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Runtime configuration (YAML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Split a policy document into extraction-sized chunks.
    Chunk(ChunkArgs),

    /// Work with check batch files and the check store.
    #[command(subcommand)]
    Checks(ChecksCommand),

    /// Classify a document by keywords alone (no model call).
    Classify(DocumentArgs),

    /// Fold a results file into an assessment.
    Aggregate(AggregateArgs),

    /// Extract checks from a policy document with the configured model.
    Extract(ExtractArgs),

    /// Evaluate a document against a set of checks.
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug)]
struct ChunkArgs {
    file: PathBuf,

    /// Target chunk size.
    #[arg(long)]
    target: Option<usize>,

    /// Measure size in characters instead of approximate tokens.
    #[arg(long)]
    chars: bool,
}

#[derive(Subcommand, Debug)]
enum ChecksCommand {
    /// Validate a batch and report errors, warnings and suggestions.
    Validate { file: PathBuf },

    /// Merge and deduplicate several batches.
    Merge {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Counts by kind, priority and domain, plus data requirements.
    Summary { file: PathBuf },

    /// List saved policies.
    List(StoreArgs),

    /// Print a saved policy's checks.
    Show {
        id: String,
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Delete a saved policy.
    Delete {
        id: String,
        #[command(flatten)]
        store: StoreArgs,
    },
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// Check store directory.
    #[arg(long, default_value = ".underwrite")]
    store: PathBuf,
}

#[derive(Args, Debug)]
struct DocumentArgs {
    document: PathBuf,
}

#[derive(Args, Debug)]
struct AggregateArgs {
    /// JSON list of results, or an object with a `results` list.
    results: PathBuf,

    /// High-priority failures tolerated before denial.
    #[arg(long)]
    max_high_failures: Option<usize>,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    policy: PathBuf,

    /// Domain hint passed to the model and recorded on checks.
    #[arg(long)]
    domain: Option<String>,

    /// Save the checks to the store under this name.
    #[arg(long)]
    save: Option<String>,

    #[command(flatten)]
    store: StoreArgs,

    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    document: PathBuf,

    /// Check batch file.
    #[arg(long, conflicts_with = "policy_id", required_unless_present = "policy_id")]
    checks: Option<PathBuf>,

    /// Saved policy id from the store.
    #[arg(long)]
    policy_id: Option<String>,

    #[command(flatten)]
    store: StoreArgs,

    /// Applicant-supplied values (JSON object); these override the document.
    #[arg(long)]
    applicant: Option<PathBuf>,

    /// Give agents the requirements of checks sharing their data fields.
    #[arg(long)]
    link_related: bool,

    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: u8, json: bool) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Chunk(args) => run_chunk(&args, &config),
        Commands::Checks(command) => run_checks(command),
        Commands::Classify(args) => run_classify(&args, &config),
        Commands::Aggregate(args) => run_aggregate(&args, &config),
        Commands::Extract(args) => run_extract(args, config).await,
        Commands::Evaluate(args) => run_evaluate(args, config).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => std::fs::write(path, text + "\n")
            .with_context(|| format!("writing {}", path.display()))?,
        None => println!("{text}"),
    }
    Ok(())
}

fn read_document(path: &Path) -> Result<String> {
    let parser = PlainTextParser;
    if !parser.supports(path) {
        bail!("unsupported document type: {}", path.display());
    }
    Ok(parser.parse(path)?.full_text())
}

fn load_batch(path: &Path) -> Result<CheckBatch> {
    CheckBatch::from_file(path).with_context(|| format!("loading checks from {}", path.display()))
}

fn run_chunk(args: &ChunkArgs, config: &RuntimeConfig) -> Result<u8> {
    let mut chunker_config: ChunkerConfig = config.chunker.clone();
    if let Some(target) = args.target {
        chunker_config.target_size = target;
        chunker_config.min_size = chunker_config.min_size.min(target / 2);
    }
    if args.chars {
        chunker_config.metric = SizeMetric::Chars;
    }

    let text = read_document(&args.file)?;
    let chunks = Chunker::new(chunker_config).chunk(&text);
    tracing::info!(chunks = chunks.len(), "Chunked document");
    emit(&chunks, None)?;
    Ok(0)
}

fn run_checks(command: ChecksCommand) -> Result<u8> {
    match command {
        ChecksCommand::Validate { file } => {
            let batch = load_batch(&file)?;
            let report = validate_checks(&batch.checks);
            emit(&report, None)?;
            Ok(if report.is_valid { 0 } else { 2 })
        }
        ChecksCommand::Merge { files, output } => {
            let batches = files
                .iter()
                .map(|f| load_batch(f).map(|b| b.checks))
                .collect::<Result<Vec<_>>>()?;
            let merged = CheckBatch::new(merge_checks(batches));
            tracing::info!(checks = merged.checks.len(), "Merged check batches");
            emit(&merged, output.as_deref())?;
            Ok(0)
        }
        ChecksCommand::Summary { file } => {
            let batch = load_batch(&file)?;
            emit(&CheckSummary::from_checks(&batch.checks), None)?;
            Ok(0)
        }
        ChecksCommand::List(store) => {
            let store = JsonFileStore::open(&store.store)?;
            emit(&store.list()?, None)?;
            Ok(0)
        }
        ChecksCommand::Show { id, store } => {
            let store = JsonFileStore::open(&store.store)?;
            match store.load(&id)? {
                Some(checks) => {
                    emit(&CheckBatch::new(checks), None)?;
                    Ok(0)
                }
                None => bail!("no saved policy with id {id}"),
            }
        }
        ChecksCommand::Delete { id, store } => {
            let store = JsonFileStore::open(&store.store)?;
            if store.delete(&id)? {
                Ok(0)
            } else {
                bail!("no saved policy with id {id}")
            }
        }
    }
}

fn run_classify(args: &DocumentArgs, config: &RuntimeConfig) -> Result<u8> {
    let text = read_document(&args.document)?;
    let scorer = RelevanceScorer::new(config.relevance.clone());
    emit(&scorer.classify_by_keywords(&text), None)?;
    Ok(0)
}

fn parse_results(text: &str) -> Result<Vec<CheckResult>> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let list = match value {
        serde_json::Value::Object(mut map) => map
            .remove("results")
            .context("results file has no `results` list")?,
        other => other,
    };
    Ok(serde_json::from_value(list)?)
}

fn run_aggregate(args: &AggregateArgs, config: &RuntimeConfig) -> Result<u8> {
    let text = std::fs::read_to_string(&args.results)
        .with_context(|| format!("reading {}", args.results.display()))?;
    let results = parse_results(&text)?;

    let mut aggregator_config: AggregatorConfig = config.aggregation.clone();
    if let Some(max) = args.max_high_failures {
        aggregator_config.max_high_failures = max;
    }
    emit(&Aggregator::new(aggregator_config).aggregate(&results), None)?;
    Ok(0)
}

async fn run_extract(args: ExtractArgs, config: RuntimeConfig) -> Result<u8> {
    let text = read_document(&args.policy)?;
    let pipeline = CompliancePipeline::from_config(config)?;
    let outcome = pipeline.extract_checks(&text, args.domain.as_deref()).await?;

    if outcome.chunks_failed > 0 {
        tracing::warn!(
            failed = outcome.chunks_failed,
            total = outcome.chunks_total,
            "Some chunks were dropped"
        );
    }

    let batch = CheckBatch {
        policy_name: outcome.title.clone(),
        domain: outcome.domain.clone().or(args.domain.clone()),
        checks: outcome.checks,
    };

    if let Some(name) = &args.save {
        let store = JsonFileStore::open(&args.store.store)?;
        let mut metadata = BTreeMap::new();
        metadata.insert("source".to_string(), args.policy.display().to_string());
        if let Some(domain) = &batch.domain {
            metadata.insert("domain".to_string(), domain.clone());
        }
        match store.save(name, &batch.checks, metadata) {
            Ok(record) => eprintln!("saved as {}", record.id),
            Err(e) => tracing::warn!(error = %e, "Could not save checks"),
        }
    }

    emit(&batch, args.output.as_deref())?;
    Ok(0)
}

async fn run_evaluate(args: EvaluateArgs, config: RuntimeConfig) -> Result<u8> {
    let document_text = read_document(&args.document)?;
    let checks = match (&args.checks, &args.policy_id) {
        (Some(path), _) => load_batch(path)?.checks,
        (None, Some(id)) => JsonFileStore::open(&args.store.store)?
            .load(id)?
            .with_context(|| format!("no saved policy with id {id}"))?,
        (None, None) => bail!("either --checks or --policy-id is required"),
    };
    let applicant_fields: FieldMap = match &args.applicant {
        Some(path) => serde_json::from_str(
            &std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?,
        )?,
        None => FieldMap::new(),
    };

    let mut pipeline = CompliancePipeline::from_config(config)?;
    if args.link_related {
        pipeline = pipeline.with_graph(Arc::new(StaticGraph::from_shared_fields(&checks)));
    }

    let report = pipeline
        .evaluate(EvaluationRequest {
            document_text,
            checks,
            applicant_fields,
        })
        .await;
    emit(&report, args.output.as_deref())?;
    Ok(0)
}
