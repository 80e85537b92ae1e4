use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use sqc_core::coordinator::RefreshOutcome;
use sqc_core::setup::{probe, EntryStore};
use sqc_core::{
    entity_states, validate_input, BridgeConfig, BridgeState, Coordinator, DeviceIdentity, HttpSession,
    RefreshEngine, StatusPolicy,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Debug, Parser)]
#[command(name = "sqcd")]
#[command(about = "SeaQuaComp aquarium controller bridge (read-only)")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, env = "SQC_HOST")]
    host: String,

    #[arg(long, env = "SQC_PIN", hide_env_values = true)]
    pin: String,

    #[arg(long, default_value = "sqc")]
    entry_id: String,

    #[arg(long, default_value_t = 30)]
    interval_secs: u64,

    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    #[arg(long, default_value_t = 5)]
    settle_secs: u64,

    #[arg(long, default_value_t = 5)]
    max_attempts: u32,

    #[arg(long, default_value_t = 300)]
    backoff_max_secs: u64,

    #[arg(long, value_enum, default_value = "soft-offline")]
    status_policy: PolicyArg,
}

#[derive(Debug, Subcommand)]
enum Command {
    Validate,
    Once {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    Run {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    SoftOffline,
    Fail,
}

impl From<PolicyArg> for StatusPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::SoftOffline => StatusPolicy::SoftOffline,
            PolicyArg::Fail => StatusPolicy::Fail,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
    Ndjson,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let config = BridgeConfig {
        update_interval: Duration::from_secs(cli.interval_secs),
        request_timeout: Duration::from_secs(cli.timeout_secs),
        login_settle: Duration::from_secs(cli.settle_secs),
        max_fetch_attempts: cli.max_attempts,
        status_policy: cli.status_policy.into(),
        backoff_max: Duration::from_secs(cli.backoff_max_secs),
    };

    let data = validate_input(&cli.host, &cli.pin)?;
    let mut session = HttpSession::new(data.host.clone(), config.request_timeout)?;

    match cli.command {
        Command::Validate => {
            probe(&mut session, &data, config.request_timeout).await?;
            let mut store = EntryStore::new();
            let entry = store.register(data)?;
            let out = serde_json::json!({
                "entry_id": entry.entry_id,
                "title": entry.data.title,
                "host": entry.data.host,
                "read_only": true
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Once { format } => {
            let mut engine = RefreshEngine::new(session, data.credentials(), config);
            if let Err(err) = engine.refresh().await {
                warn!(%err, "refresh failed");
            }
            print_state(&cli.entry_id, &engine.state(), format)?;
        }
        Command::Run { format } => {
            let engine = RefreshEngine::new(session, data.credentials(), config);
            let coordinator = Coordinator::new(engine);
            let shutdown = async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("received ctrl-c, stopping");
                }
            };

            let entry_id = cli.entry_id.clone();
            coordinator
                .run_with(shutdown, |outcome, state| {
                    if let RefreshOutcome::Completed(Err(err)) = outcome {
                        warn!(%err, "update failed");
                    }
                    if let Err(err) = print_state(&entry_id, state, format) {
                        warn!(%err, "failed to print state");
                    }
                })
                .await;
            info!(skipped = coordinator.skipped(), "bridge stopped");
        }
    }

    Ok(())
}

fn print_state(entry_id: &str, state: &BridgeState, format: OutputFormat) -> Result<()> {
    let device = DeviceIdentity::from_snapshot(entry_id, &state.snapshot);
    let entities = entity_states(entry_id, state);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&render::to_json(&device, state, &entities))?);
        }
        OutputFormat::Ndjson => {
            println!("{}", serde_json::to_string(&render::to_json(&device, state, &entities))?);
        }
        OutputFormat::Human => {
            print!("{}", render::human(&device, state, &entities)?);
        }
    }

    Ok(())
}
