use clap::Parser;
use client::game::ReconcileMode;
use client::network::{Client, ClientConfig, UpdateMode};
use log::info;
use std::time::Duration;
use tokio::io::BufReader;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:1234")]
    server: String,

    /// Player identity
    #[arg(short, long)]
    name: String,

    /// Snapshot polling interval in milliseconds
    #[arg(short, long, default_value = "150")]
    poll_ms: u64,

    /// Per-call reply timeout in milliseconds (0 waits forever)
    #[arg(short = 't', long, default_value = "2000")]
    call_timeout_ms: u64,

    /// What to send for each action
    #[arg(short, long, value_enum, default_value_t = UpdateMode::Command)]
    mode: UpdateMode,

    /// Re-apply unacknowledged actions on top of each snapshot
    #[arg(short, long)]
    replay: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Connecting to: {}", args.server);
    info!("Controls: w/a/s/d to move, e to interact, q to quit (then Enter)");

    let config = ClientConfig {
        poll_interval: Duration::from_millis(args.poll_ms.max(1)),
        call_timeout: (args.call_timeout_ms > 0).then(|| Duration::from_millis(args.call_timeout_ms)),
        update_mode: args.mode,
        reconcile_mode: if args.replay {
            ReconcileMode::Replay
        } else {
            ReconcileMode::Replace
        },
        ..ClientConfig::new(&args.server, &args.name)
    };

    let mut client = Client::connect(config).await?;
    client.run(BufReader::new(tokio::io::stdin())).await?;

    Ok(())
}
