use anyhow::Context;
use clap::{Parser, Subcommand};
use gossip_kv::clock::SystemClock;
use gossip_kv::config::NodeConfig;
use gossip_kv::network::Network;
use gossip_kv::network::types::Address;
use gossip_kv::network::udp::UdpNetwork;
use gossip_kv::node::client::KvClient;
use gossip_kv::node::cluster::ClusterNode;
use gossip_kv::node::handlers::router;
use gossip_kv::node::runtime::NodeRuntime;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Quorum-replicated key-value store over gossip membership
#[derive(Parser, Debug)]
#[command(name = "gossip-kv", version)]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a cluster node until Ctrl+C
    Node {
        /// Address to bind, e.g. 127.0.0.1:5000
        #[arg(long)]
        bind: Address,

        /// Seed node to join on start
        #[arg(long)]
        join: Option<Address>,

        /// JSON file overriding the default settings
        #[arg(long)]
        config: Option<PathBuf>,

        /// Serve /status and /members on this address
        #[arg(long)]
        http: Option<SocketAddr>,

        #[arg(long)]
        replication_factor: Option<usize>,
    },
    /// Send one request and print the result
    Client {
        /// Address the client listens on for the reply
        #[arg(long)]
        bind: Address,

        /// Nodes to contact, rotated per request
        #[arg(long = "node", required = true)]
        nodes: Vec<Address>,

        /// Reply timeout in milliseconds
        #[arg(long, default_value_t = 300)]
        timeout_ms: u64,

        #[command(subcommand)]
        op: Op,
    },
}

#[derive(Subcommand, Debug)]
enum Op {
    Create { key: String, value: String },
    Read { key: String },
    Update { key: String, value: String },
    Delete { key: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Command::Node {
            bind,
            join,
            config,
            http,
            replication_factor,
        } => {
            let mut settings = match config {
                Some(path) => NodeConfig::from_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => NodeConfig::default(),
            };
            if let Some(rf) = replication_factor {
                settings.replication_factor = rf;
            }
            settings.validate()?;
            run_node(bind, join, http, settings).await
        }
        Command::Client {
            bind,
            nodes,
            timeout_ms,
            op,
        } => run_client(bind, nodes, Duration::from_millis(timeout_ms), op).await,
    }
}

async fn run_node(
    bind: Address,
    join: Option<Address>,
    http: Option<SocketAddr>,
    config: NodeConfig,
) -> anyhow::Result<()> {
    // 1. Transport:
    let network: Arc<dyn Network> = Arc::new(UdpNetwork::new().await?);
    let listener = network
        .listen(&bind)
        .with_context(|| format!("binding {}", bind))?;

    // 2. Node + scheduler:
    let node = Arc::new(ClusterNode::new(
        bind.clone(),
        network,
        Arc::new(SystemClock),
        &config,
    ));
    let runtime = NodeRuntime::start(node.clone(), listener, config.cycle_interval());

    if let Some(seed) = join
        && !node.join(&seed)
    {
        tracing::warn!("Could not reach seed {}", seed);
    }

    // 3. Stats reporter:
    let stats_node = node.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));

        loop {
            interval.tick().await;
            let status = stats_node.status();
            tracing::info!(
                "Cluster stats: {} alive, {} failed, {} keys, {} pending",
                status.members.len(),
                status.failed_members.len(),
                status.keys,
                status.pending_requests
            );
            for member in &status.members {
                tracing::info!("  - {}", member);
            }
        }
    });

    // 4. Optional admin HTTP:
    if let Some(http_addr) = http {
        let app = router(node.clone());
        let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
        tracing::info!("HTTP server listening on {}", http_addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(http_listener, app).await {
                tracing::error!("HTTP server stopped: {}", e);
            }
        });
    }

    tracing::info!("Node {} running. Press Ctrl+C to shutdown", bind);
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down");
    runtime.shutdown();
    Ok(())
}

async fn run_client(
    bind: Address,
    nodes: Vec<Address>,
    timeout: Duration,
    op: Op,
) -> anyhow::Result<()> {
    let network: Arc<dyn Network> = Arc::new(UdpNetwork::new().await?);
    let mut client = KvClient::new(bind, network, nodes)?.with_timeout(timeout);

    match op {
        Op::Create { key, value } => {
            client.create(&key, &value).await?;
            println!("OK");
        }
        Op::Read { key } => {
            let value = client.read(&key).await?;
            println!("{}", value);
        }
        Op::Update { key, value } => {
            client.update(&key, &value).await?;
            println!("OK");
        }
        Op::Delete { key } => {
            client.delete(&key).await?;
            println!("OK");
        }
    }
    Ok(())
}
