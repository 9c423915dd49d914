use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use boundwit_core::config::Config;
use boundwit_core::core_bridge::{serve_relay, BridgeQueue, BridgeQueueHandle, BridgeRelay};
use boundwit_core::core_codec::{encode, ObjectSchema};
use boundwit_core::core_crypto::{Ed25519Signer, Ed25519Verifier, Sha256Hasher, Signer};
use boundwit_core::core_network::{PipeOptions, TcpPipe, TcpPipeListener};
use boundwit_core::core_witness::{BoundWitness, Party, Payload};
use boundwit_core::executor::TaskExecutor;
use boundwit_core::logging::{init_logging_with_config, LogConfig};
use boundwit_core::metrics::init_metrics;
use clap::{Args as ClapArgs, Parser, Subcommand};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEMO_ITEM: ObjectSchema = ObjectSchema::value(0x20);

#[derive(Parser, Debug)]
#[command(name = "boundwit")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// TOML configuration file; environment variables are used otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print collected metrics in Prometheus format on exit
    #[arg(long)]
    metrics: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a hex encoded bound witness and check its signatures
    Inspect {
        /// Hex encoding of the record
        hex: String,
    },

    /// Witness a record between local parties and print it
    Demo {
        #[arg(short, long, default_value_t = 2)]
        parties: u8,
    },

    /// Show how queue weights evolve over repeated relay batches
    QueueSim {
        #[arg(short, long, default_value_t = 12)]
        records: u32,

        #[arg(long, default_value_t = 3)]
        rounds: u32,
    },

    /// Relay records to a bridge, or act as one
    Relay(RelayArgs),
}

#[derive(ClapArgs, Debug)]
struct RelayArgs {
    /// Bridge to send records to
    #[arg(long, conflicts_with = "listen")]
    connect: Option<SocketAddr>,

    /// Accept relayed records; defaults to network.bind_address
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    listen: Option<String>,

    /// Records to witness and queue before relaying
    #[arg(short, long, default_value_t = 25)]
    records: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::from_env()?,
    };
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }

    init_logging_with_config(LogConfig::try_from(&config.logging)?)?;
    let metrics = install_metrics(&config, args.metrics)?;

    info!("boundwit CLI started");

    match args.command {
        Command::Inspect { hex } => inspect(&hex)?,
        Command::Demo { parties } => demo(parties).await?,
        Command::QueueSim { records, rounds } => queue_sim(records, rounds),
        Command::Relay(relay_args) => relay(&config, relay_args).await?,
    }

    if let Some(handle) = metrics {
        println!("{}", handle.render());
    }

    info!("boundwit CLI finished");

    Ok(())
}

/// Install the Prometheus recorder
///
/// With a listen address the exporter serves scrapes itself and nothing is
/// returned; otherwise the handle is kept so metrics can be printed on exit.
fn install_metrics(config: &Config, print: bool) -> Result<Option<PrometheusHandle>> {
    if !config.metrics.enabled {
        return Ok(None);
    }

    let handle = match config.metrics.listen_address {
        Some(addr) => {
            PrometheusBuilder::new().with_http_listener(addr).install()?;
            info!(%addr, "Serving Prometheus metrics");
            None
        }
        None if print => Some(PrometheusBuilder::new().install_recorder()?),
        None => return Ok(None),
    };

    init_metrics();
    Ok(handle)
}

fn inspect(encoded: &str) -> Result<()> {
    let bytes = hex::decode(encoded.trim()).context("record is not valid hex")?;
    let record = BoundWitness::from_bytes(bytes)?;

    println!("parties:    {}", record.key_count());
    println!("payloads:   {}", record.payload_count());
    println!("signatures: {}", record.signature_count());
    for index in 0..record.key_count() {
        let key = record.public_key(index)?;
        println!("  key[{index}] schema=0x{:02x} {}", key.schema().id, hex::encode(key.as_bytes()));
    }

    if !record.is_complete() {
        match record.pending_signer() {
            Some(slot) => println!("status:     awaiting signature from party {slot}"),
            None => println!("status:     inconsistent"),
        }
        return Ok(());
    }

    match record.verify_signatures(&Ed25519Verifier) {
        Ok(()) => println!("status:     complete, signatures valid"),
        Err(e) => println!("status:     complete, {e}"),
    }
    Ok(())
}

fn demo_party(index: u8) -> Party<Ed25519Signer> {
    let payload = Payload::new().with_signed(encode(DEMO_ITEM, &[index]));
    Party::new(Ed25519Signer::generate(), payload)
}

async fn demo(parties: u8) -> Result<()> {
    if parties == 0 {
        bail!("a bound witness needs at least one party");
    }

    let executor = TaskExecutor::try_current()?;
    let parties: Vec<_> = (0..parties).map(demo_party).collect();

    let mut record = BoundWitness::empty()?;
    for party in &parties {
        record = party.contribute(&record)?;
    }

    // signatures are folded one at a time; every party signs the same preimage
    for party in parties {
        let signer: Arc<dyn Signer> = Arc::new(party.signer().clone());
        let signature = executor.sign_record(record.clone(), signer).join().await??;
        record = record.with_signature(&signature)?;
    }
    record.verify_signatures(&Ed25519Verifier)?;

    let hash = executor
        .hash_record(record.clone(), Arc::new(Sha256Hasher))
        .join()
        .await??;

    info!(parties = record.key_count(), len = record.as_bytes().len(), "Witnessed demo record");
    println!("hash:   {}", hex::encode(hash.as_bytes()));
    println!("record: {}", hex::encode(record.as_bytes()));
    Ok(())
}

fn queue_sim(records: u32, rounds: u32) {
    let mut queue = BridgeQueue::new();
    queue.add_listener("log", |record: &Arc<BoundWitness>| {
        debug!(len = record.as_bytes().len(), "Record left the queue");
    });

    for n in 0..records {
        let payload = Payload::new().with_signed(encode(DEMO_ITEM, &n.to_be_bytes()));
        let key = Ed25519Signer::generate().public_key();
        match BoundWitness::empty().and_then(|r| r.with_contribution(&key, &payload.to_object())) {
            Ok(record) => queue.add_block(record),
            Err(e) => warn!(error = %e, "Skipping record"),
        }
    }

    for round in 1..=rounds {
        let batch = queue.blocks_to_bridge();
        println!(
            "round {round}: sent {}, {} left, weights {:?}",
            batch.len(),
            queue.len(),
            queue.weights()
        );
    }
}

async fn relay(config: &Config, args: RelayArgs) -> Result<()> {
    let options = PipeOptions::from(&config.network);
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });
    }

    if let Some(addr) = args.connect {
        return relay_to(config, addr, options, args.records, shutdown).await;
    }

    let addr = match args.listen.as_deref() {
        None | Some("") => config.network.bind_address,
        Some(addr) => addr.parse().context("invalid listen address")?,
    };
    serve(addr, options, shutdown).await
}

async fn relay_to(
    config: &Config,
    addr: SocketAddr,
    options: PipeOptions,
    records: u32,
    shutdown: CancellationToken,
) -> Result<()> {
    let (queue, actor) = BridgeQueueHandle::new();
    for n in 0..records {
        let parties = [demo_party(0), demo_party((n % 250) as u8 + 1)];
        let record = boundwit_core::core_witness::witness_locally(&parties).await?;
        queue.add_block(record).await?;
    }

    let pipe = TcpPipe::connect(addr, options).await?;
    let stats = BridgeRelay::new(queue.clone(), &config.bridge)
        .run(&pipe, shutdown)
        .await?;
    println!(
        "relayed {} batches: {} accepted, {} rejected",
        stats.batches, stats.accepted, stats.rejected
    );

    queue.shutdown().await?;
    let remaining = actor.await?;
    if !remaining.is_empty() {
        warn!(remaining = remaining.len(), "Records left unrelayed");
    }
    Ok(())
}

async fn serve(addr: SocketAddr, options: PipeOptions, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpPipeListener::bind(addr, options).await?;
    let (queue, _actor) = BridgeQueueHandle::new();
    info!(addr = %listener.local_addr()?, "Accepting relayed records");

    loop {
        let pending = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(pending) => pending,
                Err(e) => {
                    warn!(error = %e, "Failed to accept relay connection");
                    continue;
                }
            },
        };

        let queue = queue.clone();
        tokio::spawn(async move {
            let peer = pending.peer_addr();
            let pipe = match pending.accept().await {
                Ok(pipe) => pipe,
                Err(e) => {
                    warn!(%peer, error = %e, "Relay peer sent no initiation frame");
                    return;
                }
            };
            match serve_relay(&queue, &Ed25519Verifier, &pipe).await {
                Ok(stats) => {
                    let queued = queue.len().await.unwrap_or_default();
                    info!(accepted = stats.accepted, rejected = stats.rejected, queued, "Relay session done");
                }
                Err(e) => warn!(error = %e, "Relay session failed"),
            }
        });
    }

    info!(queued = queue.len().await?, "Stopped accepting relayed records");
    Ok(())
}
