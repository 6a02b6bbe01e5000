use clap::{Parser, ValueEnum};
use log::info;
use macroquad::prelude::{get_fps, get_frame_time, next_frame};
use macroquad::window::Conf;
use shared::control::{ActionMap, ScriptedInput};
use shared::settings::Settings;
use shared::{Pong, Side, Vector2, DEFAULT_PORT};
use std::time::Duration;
use terminal::input::InputManager;
use terminal::local::LocalMatch;
use terminal::rendering::Renderer;
use terminal::Terminal;

/// Keyboard layout used to steer the paddle
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Keys {
    Wasd,
    Arrows,
    Ijkl,
    Numpad,
}

impl From<Keys> for ActionMap {
    fn from(keys: Keys) -> Self {
        match keys {
            Keys::Wasd => ActionMap::wasd(),
            Keys::Arrows => ActionMap::arrow_keys(),
            Keys::Ijkl => ActionMap::ijkl(),
            Keys::Numpad => ActionMap::numpad(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Pong terminal", long_about = None)]
struct Args {
    /// Coordinator host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Coordinator port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Side of the table to play (up, down, left or right)
    #[arg(short, long, default_value = "left")]
    side: Side,

    /// Keyboard layout
    #[arg(short, long, value_enum, default_value = "wasd")]
    keys: Keys,

    /// Frames per second
    #[arg(short, long, default_value = "60")]
    fps: u32,

    /// Window width
    #[arg(short = 'W', long, default_value = "800")]
    width: f32,

    /// Window height
    #[arg(short = 'H', long, default_value = "600")]
    height: f32,

    /// Probability of dropping an outgoing datagram
    #[arg(long, env = "UDP_DROP_RATE", default_value = "0")]
    drop_rate: f32,

    /// Heartbeat period, in milliseconds
    #[arg(long, default_value = "500")]
    heartbeat_ms: u64,

    /// Coordinator silence after which the terminal gives up, in milliseconds
    #[arg(long, default_value = "5000")]
    timeout_ms: u64,

    /// Run without a window until the match ends
    #[arg(long)]
    headless: bool,

    /// Play offline on this keyboard, one paddle per listed side (e.g. left,right)
    #[arg(long, value_delimiter = ',', num_args = 1.., conflicts_with = "headless")]
    local: Vec<Side>,

    /// Seed for the local mirror
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn settings(&self) -> Settings {
        Settings {
            size: Vector2::new(self.width, self.height),
            fps: self.fps,
            host: self.host.clone(),
            port: self.port,
            heartbeat_interval: Duration::from_millis(self.heartbeat_ms),
            heartbeat_timeout: Duration::from_millis(self.timeout_ms),
            drop_rate: self.drop_rate,
            ..Settings::default()
        }
    }
}

fn window_conf(title: String, settings: &Settings) -> Conf {
    Conf {
        window_title: title,
        window_width: settings.size.x as i32,
        window_height: settings.size.y as i32,
        ..Default::default()
    }
}

/// Offline match: every listed side is steered from this keyboard.
fn run_local(
    settings: &Settings,
    pong: Pong,
    sides: &[Side],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut local = LocalMatch::new(pong, sides)?;
    let bindings = LocalMatch::bindings(sides);
    for (side, keys) in &bindings {
        info!("{} plays with {:?}", side, keys);
    }
    let mut input = InputManager::with_bindings(bindings);
    let (width, height) = (settings.size.x, settings.size.y);
    let conf = window_conf("Pong - local".to_string(), settings);

    macroquad::Window::from_config(conf, async move {
        let mut renderer = Renderer::new(width, height);
        loop {
            let running = local.frame(get_frame_time(), &mut input);
            renderer.render(local.pong(), &local.hud(get_fps()));
            if !running {
                break;
            }
            next_frame().await;
        }
    });
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
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

    if !args.local.is_empty() {
        return run_local(&settings, pong, &args.local);
    }

    // macroquad owns the main thread, so the network tasks get their own runtime
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let mut terminal = runtime.block_on(Terminal::connect(&settings, args.side, pong))?;

    if args.headless {
        info!("Running headless as {}", args.side);
        let stopped = runtime.block_on(async {
            let mut input = ScriptedInput::default();
            tokio::select! {
                reason = terminal.run_headless(settings.fps, &mut input) => Some(reason),
                _ = tokio::signal::ctrl_c() => None,
            }
        });
        match stopped {
            Some(reason) => info!("Terminal stopped: {:?}", reason),
            None => {
                info!("Received Ctrl+C, leaving the match...");
                terminal.close();
            }
        }
        // Give the sender task a moment to flush the leave
        runtime.block_on(tokio::time::sleep(Duration::from_millis(100)));
        return Ok(());
    }

    let conf = window_conf(format!("Pong - {}", args.side), &settings);
    let (width, height) = (settings.size.x, settings.size.y);
    let (side, keys) = (args.side, ActionMap::from(args.keys));
    info!("Controls: {:?}, Escape to quit", args.keys);

    macroquad::Window::from_config(conf, async move {
        let mut renderer = Renderer::new(width, height);
        let mut input = InputManager::new(side, keys);
        loop {
            let running = terminal.frame(get_frame_time(), &mut input);
            renderer.render(terminal.game_state().pong(), &terminal.hud(get_fps()));
            if !running {
                break;
            }
            next_frame().await;
        }
        info!("Terminal stopped: {:?}", terminal.stop_reason());
        terminal.close();
    });

    runtime.block_on(tokio::time::sleep(Duration::from_millis(100)));
    Ok(())
}
