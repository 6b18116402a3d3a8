//! chaind: queue signed transactions and dispatch them to a node.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use chaind_adapter::{
    open_adapter, AdapterError, BlockFilter, ChaindConfig, DispatchProcessor, DynAdapter,
};
use chaind_types::{BlockRef, ChainSpec, ObservedTx, TxHash};
use chaind_utils::LogFormat;
use clap::{Parser, ValueEnum};

#[derive(Parser)]
#[command(name = "chaind", about = "Transactional dispatch queue for chain nodes")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "CHAIND_CONFIG")]
    config: Option<PathBuf>,

    /// Chain spec: "arch:fork:network_id[:common_name]".
    #[arg(long, env = "CHAIND_CHAIN")]
    chain: Option<ChainSpec>,

    /// Parent directory of the per-chain stores.
    #[arg(long, env = "CHAIND_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Store backend: "fs" or "lmdb".
    #[arg(long, env = "CHAIND_BACKEND")]
    backend: Option<String>,

    /// Dispatcher: "json-rpc" or "log".
    #[arg(long, env = "CHAIND_DISPATCHER")]
    dispatcher: Option<String>,

    /// Node JSON-RPC endpoint.
    #[arg(long, env = "CHAIND_RPC_URL")]
    rpc_url: Option<String>,

    /// Repair the store (stale locks, indexes) before running the command.
    #[arg(long, env = "CHAIND_STORE_SYNC")]
    store_sync: bool,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "CHAIND_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "CHAIND_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Store signed transactions (hex) and queue them for sending.
    Submit {
        /// Hex-encoded signed payloads, with or without 0x.
        #[arg(required = true)]
        payloads: Vec<String>,

        /// Store without queuing.
        #[arg(long)]
        hold: bool,
    },
    /// Print a record as JSON.
    Show { hash: TxHash },
    /// List record hashes in one view of the queue.
    List {
        #[arg(value_enum, default_value_t = ListKind::Pending)]
        kind: ListKind,

        /// For `upcoming`: maximum records in flight (0 = no limit).
        #[arg(long, default_value_t = 0)]
        limit: usize,
    },
    /// Dispatch queued records until interrupted.
    Run {
        /// Run a single pass and exit.
        #[arg(long)]
        once: bool,

        /// Override the configured in-flight limit.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Retire records a block included.
    Settle {
        /// Block number.
        #[arg(long)]
        block: u64,

        /// Transactions that succeeded, as HASH[:INDEX].
        #[arg(long = "ok", value_name = "HASH[:INDEX]")]
        succeeded: Vec<String>,

        /// Transactions that reverted, as HASH[:INDEX].
        #[arg(long = "reverted", value_name = "HASH[:INDEX]")]
        reverted: Vec<String>,
    },
    /// Purge settled records left behind by an interrupted settle.
    Reap,
    /// Print the effective configuration.
    Config,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ListKind {
    Pending,
    Upcoming,
    Deferred,
    Failed,
    Stalled,
}

impl Cli {
    /// File settings (or defaults) with flags and env vars on top.
    fn load_config(&self) -> anyhow::Result<ChaindConfig> {
        let mut config = match &self.config {
            Some(path) => ChaindConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ChaindConfig::default(),
        };
        if let Some(chain) = &self.chain {
            config.chain = chain.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(backend) = &self.backend {
            config.store_backend = backend.clone();
        }
        if let Some(dispatcher) = &self.dispatcher {
            config.dispatcher = dispatcher.clone();
        }
        if let Some(url) = &self.rpc_url {
            config.rpc_url = url.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        config.store_sync |= self.store_sync;
        config.validate()?;
        Ok(config)
    }
}

/// Parse `HASH[:INDEX]`; a missing index defaults to `position`.
fn parse_observed(s: &str, position: usize, success: bool) -> anyhow::Result<ObservedTx> {
    let (hash, index) = match s.rsplit_once(':') {
        Some((hash, index)) => (
            hash,
            index
                .parse::<u32>()
                .with_context(|| format!("bad tx index in '{s}'"))?,
        ),
        None => (s, u32::try_from(position)?),
    };
    let hash: TxHash = hash.parse().with_context(|| format!("bad tx hash in '{s}'"))?;
    Ok(ObservedTx::new(hash, index, success))
}

fn decode_payload(s: &str) -> anyhow::Result<Vec<u8>> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).with_context(|| format!("payload is not hex: '{s}'"))
}

fn print_hashes(hashes: &[TxHash]) {
    for hash in hashes {
        println!("{hash}");
    }
}

async fn run(
    adapter: DynAdapter,
    config: &ChaindConfig,
    limit: usize,
    once: bool,
) -> anyhow::Result<()> {
    let adapter = Arc::new(adapter);
    let processor = Arc::new(DispatchProcessor::new(limit));

    if once {
        let report = tokio::task::spawn_blocking(move || processor.process(&adapter)).await??;
        println!(
            "selected {} sent {} not_sent {} skipped {}",
            report.selected, report.sent, report.not_sent, report.skipped
        );
        return Ok(());
    }

    let stop = Arc::new(AtomicBool::new(false));
    let interval = config.poll_interval();
    let mut worker = {
        let stop = Arc::clone(&stop);
        let processor = Arc::clone(&processor);
        tokio::task::spawn_blocking(move || -> Result<(), AdapterError> {
            while !stop.load(Ordering::Relaxed) {
                match processor.process(&adapter) {
                    Ok(_) => {}
                    Err(e @ AdapterError::RetryExhausted { .. }) => {
                        tracing::warn!(error = %e, "dispatch pass gave up, next pass will retry");
                    }
                    Err(e) => return Err(e),
                }
                match adapter.stalled() {
                    Ok(stalled) if !stalled.is_empty() => {
                        tracing::warn!(count = stalled.len(), "records stalled in network");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "stalled check failed"),
                }
                std::thread::sleep(interval);
            }
            Ok(())
        })
    };

    tracing::info!(limit, interval_ms = interval.as_millis() as u64, "dispatch loop started");
    tokio::select! {
        result = &mut worker => result??,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received, stopping dispatch loop");
            stop.store(true, Ordering::Relaxed);
            worker.await??;
        }
    }

    let totals = processor.stats().snapshot();
    tracing::info!(?totals, "chaind exited cleanly");
    Ok(())
}

/// Commands that need no event loop. Runs on a blocking thread: the
/// JSON-RPC dispatcher uses a blocking HTTP client.
fn execute(adapter: DynAdapter, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Submit { payloads, hold } => {
            for payload in &payloads {
                let hash = adapter.put(&decode_payload(payload)?)?;
                if !hold {
                    adapter.enqueue(&hash)?;
                }
                println!("{hash}");
            }
        }
        Command::Show { hash } => match adapter.get(&hash)? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => anyhow::bail!("record {hash} has an invalid state"),
        },
        Command::List { kind, limit } => {
            let hashes = match kind {
                ListKind::Pending => adapter.pending()?,
                ListKind::Upcoming => adapter.upcoming(limit)?,
                ListKind::Deferred => adapter.deferred()?,
                ListKind::Failed => adapter.failed()?,
                ListKind::Stalled => adapter.stalled()?,
            };
            print_hashes(&hashes);
        }
        Command::Settle {
            block,
            succeeded,
            reverted,
        } => {
            let mut txs = Vec::with_capacity(succeeded.len() + reverted.len());
            for (i, s) in succeeded.iter().enumerate() {
                txs.push(parse_observed(s, i, true)?);
            }
            for (i, s) in reverted.iter().enumerate() {
                txs.push(parse_observed(s, succeeded.len() + i, false)?);
            }
            let report = BlockFilter.filter(&adapter, BlockRef::new(block), &txs)?;
            println!(
                "succeeded {} failed {} send_failed {} locked {} unknown {}",
                report.succeeded.len(),
                report.failed.len(),
                report.send_failed.len(),
                report.locked.len(),
                report.unknown
            );
            if !report.locked.is_empty() {
                print_hashes(&report.locked);
                anyhow::bail!(
                    "{} records were reserved; settle block {block} again",
                    report.locked.len()
                );
            }
        }
        Command::Reap => println!("{}", adapter.reap()?),
        Command::Run { .. } | Command::Config => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    chaind_utils::init_logging(config.log_format, &config.log_level);

    if let Command::Config = cli.command {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let adapter = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || {
            open_adapter(&config)
                .with_context(|| format!("opening store at {}", config.store_root().display()))
        })
        .await??
    };

    match cli.command {
        Command::Run { once, limit } => {
            let limit = limit.unwrap_or(config.dispatch_limit);
            run(adapter, &config, limit, once).await
        }
        command => tokio::task::spawn_blocking(move || execute(adapter, command)).await?,
    }
}
