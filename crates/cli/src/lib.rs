use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use filemap_indexer::{
    MapConfig, MapIndexer, StreamingIndexer, StreamingIndexerConfig, TsneConfig,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub mod generate;
pub mod http_api;
pub mod logging;

use generate::{GeneratorConfig, SampleType};
use logging::{LogFormat, LogOptions};

fn print_stdout(text: &str) -> Result<()> {
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

#[derive(Parser)]
#[command(name = "filemap")]
#[command(about = "Live 2-D map of the documents in a directory", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log record format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Also append log records to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the data directory and serve the map over HTTP
    Serve(ServeArgs),

    /// Map the files already in the data directory, write the snapshot and exit
    Index(IndexArgs),

    /// Write a sample corpus to try the map with
    Generate(GenerateArgs),
}

#[derive(Args)]
struct CorpusArgs {
    /// Directory whose files make up the map
    #[arg(long, env = "FILEMAP_ROOT", default_value = "./data")]
    root: PathBuf,

    /// Snapshot file rewritten after every update
    #[arg(long, env = "FILEMAP_SNAPSHOT", default_value = "./data.json")]
    snapshot: PathBuf,

    /// Seed for the layout's random initialization
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Perplexity ceiling; the effective value is min(this, documents - 1)
    #[arg(long, default_value_t = 30.0, value_parser = parse_perplexity)]
    max_perplexity: f64,
}

impl CorpusArgs {
    async fn open(&self) -> Result<MapIndexer> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("create data directory {}", self.root.display()))?;
        let tsne = TsneConfig {
            seed: self.seed,
            max_perplexity: self.max_perplexity,
            ..TsneConfig::default()
        };
        let config = MapConfig::new(&self.root)
            .with_snapshot_path(&self.snapshot)
            .with_tsne(tsne);
        MapIndexer::new(config)
            .await
            .with_context(|| format!("open data directory {}", self.root.display()))
    }
}

fn parse_perplexity(raw: &str) -> std::result::Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|err| format!("not a number: {err}"))?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("must be a finite number above zero, got {raw}"))
    }
}

#[derive(Args)]
struct ServeArgs {
    #[command(flatten)]
    corpus: CorpusArgs,

    /// Bind address, e.g. 127.0.0.1:5000
    #[arg(long, env = "FILEMAP_BIND", default_value = "0.0.0.0:5000")]
    bind: String,

    /// Wait this long after a file appears before reading it
    #[arg(long, default_value_t = 250)]
    debounce_ms: u64,
}

#[derive(Args)]
struct IndexArgs {
    #[command(flatten)]
    corpus: CorpusArgs,
}

#[derive(Args)]
struct GenerateArgs {
    /// Output directory
    #[arg(long, default_value = "./data")]
    out: PathBuf,

    /// Files per type
    #[arg(long, default_value_t = 10)]
    count: usize,

    /// Comma-separated file types
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_values_t = SampleType::ALL
    )]
    types: Vec<SampleType>,

    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogOptions {
        verbose: cli.verbose,
        quiet: cli.quiet,
        format: cli.log_format,
        file: cli.log_file.clone(),
    })?;

    match cli.command {
        Commands::Serve(args) => serve(args).await?,
        Commands::Index(args) => run_index(args).await?,
        Commands::Generate(args) => run_generate(&args)?,
    }

    Ok(())
}

async fn serve(args: ServeArgs) -> Result<()> {
    let indexer = Arc::new(args.corpus.open().await?);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("bind {}", args.bind))?;
    let local_addr = listener.local_addr()?;

    let streamer = StreamingIndexer::start(
        indexer.clone(),
        StreamingIndexerConfig {
            debounce: Duration::from_millis(args.debounce_ms),
            ..StreamingIndexerConfig::default()
        },
    )?;

    let app = http_api::router(indexer.clone(), local_addr.port());
    log::info!("Starting server on http://{local_addr}");
    print_stdout(&format!("Serving map: http://{local_addr}/data"))?;
    print_stdout(&format!("Live updates: http://{local_addr}/events"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    streamer.shutdown().await?;
    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown requested");
}

async fn run_index(args: IndexArgs) -> Result<()> {
    let started = Instant::now();
    let indexer = args.corpus.open().await?;
    let indexed = indexer.index_existing().await?;

    let summary = serde_json::json!({
        "documents": indexer.snapshot().len(),
        "indexed": indexed,
        "duration_ms": u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "snapshot": indexer.snapshot_path(),
    });
    print_stdout(&serde_json::to_string_pretty(&summary)?)?;
    Ok(())
}

fn run_generate(args: &GenerateArgs) -> Result<()> {
    let created = generate::create_sample_files(&GeneratorConfig {
        out: args.out.clone(),
        count: args.count,
        types: args.types.clone(),
        seed: args.seed,
    })?;
    for path in created {
        print_stdout(&format!("Created: {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perplexity_must_be_positive_and_finite() {
        assert_eq!(parse_perplexity("30"), Ok(30.0));
        assert_eq!(parse_perplexity("0.5"), Ok(0.5));
        for bad in ["0", "-5", "NaN", "inf", "thirty"] {
            assert!(parse_perplexity(bad).is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn cli_rejects_zero_perplexity() {
        let parsed = Cli::try_parse_from(["filemap", "index", "--max-perplexity", "0"]);
        assert!(parsed.is_err());

        let parsed = Cli::try_parse_from(["filemap", "index", "--max-perplexity", "12.5"]);
        match parsed.map(|cli| cli.command) {
            Ok(Commands::Index(args)) => assert_eq!(args.corpus.max_perplexity, 12.5),
            _ => panic!("index with a valid perplexity should parse"),
        }
    }
}
