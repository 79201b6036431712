use clap::Parser;
use log::info;
use server::network::Server;
use server::round::spawn_round;
use server::store::{StateStore, StoreConfig};
use shared::{fits_in_datagram, Grid, DEFAULT_PORT};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Map file to load
    #[arg(short, long, default_value = "mapa.txt")]
    map: String,

    /// Round length in seconds (0 disables the round clock)
    #[arg(short, long, default_value = "0")]
    round_secs: u64,

    /// Let several players stand on the same tile
    #[arg(long)]
    allow_stacking: bool,

    /// How long armed traps stay armed, in milliseconds
    #[arg(long, default_value = "3000")]
    trap_alert_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let text = std::fs::read_to_string(&args.map)
        .map_err(|e| format!("failed to read map '{}': {}", args.map, e))?;
    let grid = Grid::parse(&text)?;

    let config = StoreConfig {
        block_stacking: !args.allow_stacking,
        trap_alert: Duration::from_millis(args.trap_alert_ms),
        ..StoreConfig::default()
    };
    let store = Arc::new(StateStore::new(grid, config)?);

    if !fits_in_datagram(&store.snapshot().await) {
        return Err(format!("map '{}' is too large to send in one datagram", args.map).into());
    }

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::new(&address, Arc::clone(&store)).await?;

    if args.round_secs > 0 {
        info!("Starting a {} second round", args.round_secs);
        spawn_round(Arc::clone(&store), Duration::from_secs(args.round_secs));
    }

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
