use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;

use cidstore::cid::ContentIdentifier;
use cidstore::client::{ContentClient, UploadFile};
use cidstore::config::ClientConfig;
use cidstore::server::{self, AppState};

#[derive(Parser)]
#[command(name = "cidstore")]
#[command(about = "Content-addressed blob store client with multi-gateway retrieval")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "CIDSTORE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for persisted usage stats
    #[arg(long, global = true, env = "CIDSTORE_STATS_DIR")]
    stats_dir: Option<PathBuf>,

    /// Read gateway base URL, in priority order (repeatable)
    #[arg(long = "gateway", global = true)]
    gateways: Vec<String>,

    /// Per-gateway attempt timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive an identifier for a file and record the upload
    Upload { path: PathBuf },
    /// Fetch content, trying each read gateway in order
    Retrieve {
        cid: String,
        /// Write content here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check an identifier's format
    Validate { cid: String },
    /// Print the gateway URL for an identifier
    Url {
        cid: String,
        /// Index into the read gateways (default: the first)
        #[arg(long)]
        gateway_index: Option<usize>,
    },
    /// Ask gateways for size and type without downloading
    Info { cid: String },
    /// Show usage stats
    Stats {
        /// Zero the counters
        #[arg(long)]
        reset: bool,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(long, default_value = "127.0.0.1:8787", env = "CIDSTORE_ADDR")]
        addr: String,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn load_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path).await?,
        None => ClientConfig::default(),
    };

    if let Some(dir) = &cli.stats_dir {
        config.stats_path = dir.clone();
    }
    if !cli.gateways.is_empty() {
        config.read_gateways = cli.gateways.clone();
    }
    if let Some(secs) = cli.timeout {
        config.attempt_timeout_secs = secs;
    }

    config.check()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli).await?;
    let client = ContentClient::from_config(&config).await?;

    match cli.command {
        Commands::Upload { path } => {
            let file = UploadFile::from_path(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let on_progress = |p: f64| eprintln!("upload {:>3.0}%", p * 100.0);
            let result = client.upload(&file, Some(&on_progress)).await?;
            print_json(&result)?;
        }
        Commands::Retrieve { cid, out } => {
            let identifier = ContentIdentifier::new(cid);
            let file_name = out
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned());
            let outcome = client.retrieve(&identifier, file_name.as_deref()).await;
            if !outcome.success {
                print_json(&outcome)?;
            }
            let bytes = outcome.into_result(&identifier)?;

            match out {
                Some(path) => {
                    tokio::fs::write(&path, &bytes)
                        .await
                        .with_context(|| format!("writing {}", path.display()))?;
                    eprintln!("wrote {} bytes to {}", bytes.len(), path.display());
                }
                None => {
                    use std::io::Write;
                    std::io::stdout().write_all(&bytes)?;
                }
            }
        }
        Commands::Validate { cid } => {
            let result = client.validate(&cid);
            print_json(&result)?;
            if !result.valid {
                bail!("invalid identifier");
            }
        }
        Commands::Url { cid, gateway_index } => {
            let gateway = match gateway_index {
                Some(i) => match client.registry().read_gateway(i) {
                    Some(g) => Some(g),
                    None => bail!("no read gateway at index {i}"),
                },
                None => None,
            };
            println!("{}", client.url_for(&ContentIdentifier::new(cid), gateway));
        }
        Commands::Info { cid } => {
            let identifier = ContentIdentifier::new(cid);
            match client.info(&identifier).await {
                Some(info) => print_json(&info)?,
                None => bail!("{identifier} not found on any gateway"),
            }
        }
        Commands::Stats { reset } => {
            if reset {
                client.ledger().reset().await;
            }
            print_json(&client.stats().await)?;
        }
        Commands::Serve { addr } => {
            let state = AppState {
                client: Arc::new(client),
            };
            server::serve(state, &addr).await?;
        }
    }

    Ok(())
}
