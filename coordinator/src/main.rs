use clap::Parser;
use coordinator::Coordinator;
use log::{error, info};
use shared::settings::Settings;
use shared::{Pong, Vector2, DEFAULT_PORT};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative Pong coordinator", long_about = None)]
struct Args {
    /// Port to listen on (all interfaces)
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Simulation ticks per second
    #[arg(short, long, default_value = "60")]
    fps: u32,

    /// Arena width
    #[arg(short = 'W', long, default_value = "800")]
    width: f32,

    /// Arena height
    #[arg(short = 'H', long, default_value = "600")]
    height: f32,

    /// Probability of dropping an outgoing datagram
    #[arg(long, env = "UDP_DROP_RATE", default_value = "0")]
    drop_rate: f32,

    /// Expected heartbeat period of terminals, in milliseconds
    #[arg(long, default_value = "500")]
    heartbeat_ms: u64,

    /// Silence after which a terminal is evicted, in milliseconds
    #[arg(long, default_value = "5000")]
    timeout_ms: u64,

    /// Maximum number of players
    #[arg(long, default_value = "4")]
    max_peers: usize,

    /// Seed for ball launches
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn settings(&self) -> Settings {
        Settings {
            size: Vector2::new(self.width, self.height),
            fps: self.fps,
            port: self.port,
            heartbeat_interval: Duration::from_millis(self.heartbeat_ms),
            heartbeat_timeout: Duration::from_millis(self.timeout_ms),
            drop_rate: self.drop_rate,
            max_peers: self.max_peers,
            ..Settings::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let settings = args.settings();
    settings.validate()?;

    let pong = match args.seed {
        Some(seed) => Pong::with_seed(settings.size, settings.config, seed)?,
        None => Pong::new(settings.size, settings.config)?,
    };

    info!(
        "Starting coordinator on port {} at {} ticks/s",
        settings.port, settings.fps
    );
    if settings.drop_rate > 0.0 {
        info!("Simulating {:.0}% outgoing packet loss", settings.drop_rate * 100.0);
    }

    let mut coordinator = Coordinator::bind(settings, pong).await?;
    let shutdown = coordinator.shutdown_handle();
    let mut run = tokio::spawn(async move { coordinator.run().await });

    tokio::select! {
        result = &mut run => {
            result??;
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            shutdown.trigger();
        }
    }

    if let Err(e) = run.await? {
        error!("Coordinator stopped with error: {}", e);
    }
    Ok(())
}
