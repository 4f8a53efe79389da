use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::Parser;
use folje_core::{
    default_source_address, enumerate_ipv4_addresses, CalibrationStatus, ConfigManager,
    ConsoleEvent, FollowConsole, Settings,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::commands::Command;
use crate::show::ShowFile;

mod commands;
mod show;

/// Follow-spot console: points calibrated moving heads at a stage position over sACN.
#[derive(Parser, Debug)]
#[command(name = "folje")]
#[command(about = "Folje follow-spot console")]
struct Args {
    /// Settings file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Show file with fixtures and calibration points
    #[arg(long)]
    show: Option<PathBuf>,

    /// sACN source IP address (defaults to the first network interface)
    #[arg(long, value_parser = parse_ip)]
    source_ip: Option<Ipv4Addr>,

    /// Frames per second; 0 sends once per second
    #[arg(long)]
    fps: Option<u32>,

    /// Disable multicast and only send to --destination addresses
    #[arg(long)]
    unicast: bool,

    /// Unicast receiver as IP or IP:port (repeatable)
    #[arg(long = "destination")]
    destinations: Vec<String>,

    /// Print the available source addresses and exit
    #[arg(long)]
    list_interfaces: bool,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn parse_ip(s: &str) -> Result<Ipv4Addr, String> {
    s.parse().map_err(|e| format!("Invalid IPv4 address: {}", e))
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if args.list_interfaces {
        for interface in enumerate_ipv4_addresses().map_err(anyhow::Error::msg)? {
            println!("{}\t{}", interface.address, interface.name);
        }
        return Ok(());
    }

    let mut config_manager = ConfigManager::new(args.config.clone());
    let mut settings = match config_manager.load() {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("{}; using default settings", e);
            Settings::default()
        }
    };
    apply_overrides(&mut settings, &args);
    ConfigManager::validate_settings(&settings)
        .map_err(|errors| anyhow::anyhow!("Invalid settings: {}", errors.join(", ")))?;

    if settings.broadcast.source_address.is_empty() {
        if let Some(address) = default_source_address() {
            settings.broadcast.source_address = address.to_string();
        }
    }

    println!("Configuring Folje with sACN settings:");
    println!("Source: {}", display_source(&settings));
    println!("Mode: {}", settings.broadcast.mode_string());
    println!("Frame rate: {} fps", settings.broadcast.fps);

    let mut console = FollowConsole::new(&settings);

    let show_path = args.show.clone().or_else(|| settings.last_show_path.clone());
    if let Some(path) = show_path {
        let show = ShowFile::load(&path)?;
        console.set_calibration_points(show.calibration_points());
        console.set_fixtures(show.fixtures());
        print_calibration(&console);

        if args.show.is_some() {
            remember_show(&mut config_manager, path);
        }
    } else {
        println!("No show loaded; start with --show <file>");
    }

    let mut events = console
        .take_event_receiver()
        .ok_or_else(|| anyhow::anyhow!("Console event receiver already taken"))?;
    console.initialize().await?;

    println!("{}", commands::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutdown signal received");
                break;
            }

            Some(event) = events.recv() => print_event(&event),

            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match commands::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => execute(&console, command),
                    Ok(None) => {}
                    Err(e) => println!("{}", e),
                },
                Ok(None) => {
                    log::info!("Input closed; press Ctrl-C to stop");
                    stdin_open = false;
                }
                Err(e) => {
                    log::error!("Failed to read input: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    console.shutdown().await?;
    Ok(())
}

fn apply_overrides(settings: &mut Settings, args: &Args) {
    if let Some(source_ip) = args.source_ip {
        settings.broadcast.source_address = source_ip.to_string();
    }
    if let Some(fps) = args.fps {
        settings.broadcast.fps = fps;
    }
    if args.unicast {
        settings.broadcast.multicast = false;
    }
    if !args.destinations.is_empty() {
        settings.broadcast.destinations = args.destinations.clone();
    }
}

/// Persists the show path without the command-line overrides.
fn remember_show(config_manager: &mut ConfigManager, path: PathBuf) {
    let mut persisted = config_manager.settings().clone();
    persisted.last_show_path = Some(path);
    if let Err(e) = config_manager.update_settings(persisted) {
        log::warn!("Could not remember show path: {}", e);
    }
}

fn display_source(settings: &Settings) -> String {
    if settings.broadcast.source_address.is_empty() {
        "all interfaces".to_string()
    } else {
        settings.broadcast.source_address.clone()
    }
}

fn execute(console: &FollowConsole, command: Command) {
    match command {
        Command::Position(position) => {
            let moved = console.set_position_for_all_fixtures(position);
            println!("{} fixtures moved", moved);
        }
        Command::PanTilt { fixture, pan, tilt } => {
            if let Err(e) = console.set_pan_tilt_for_fixture(&fixture, pan, tilt) {
                println!("{}", e);
            }
        }
        Command::Fps(fps) => {
            if fps > 120 {
                println!("fps must be between 0 and 120");
                return;
            }
            let mut config = console.broadcast_config();
            config.fps = fps;
            console.set_broadcast_config(config);
        }
        Command::Status => {
            let status = console.broadcast_status();
            println!(
                "broadcast: {:?}, universes {:?}, {} frames sent, {} dropped, {} ticks{}",
                status.state,
                status.active_universes,
                status.frames_sent,
                status.frames_dropped,
                status.ticks,
                if console.is_broadcast_halted() { " (HALTED)" } else { "" }
            );
            print_calibration(console);
        }
        Command::Help => println!("{}", commands::HELP),
        Command::Quit => {}
    }
}

fn print_calibration(console: &FollowConsole) {
    for id in console.fixture_ids() {
        match console.calibration_status(&id) {
            Some(CalibrationStatus::Ready) => println!("  {}: follows position", id),
            Some(CalibrationStatus::Incomplete { missing }) => {
                println!("  {}: not calibrated at {}", id, missing.join(", "))
            }
            Some(CalibrationStatus::Failed(reason)) => println!("  {}: {}", id, reason),
            None => println!("  {}: unknown", id),
        }
    }
}

fn print_event(event: &ConsoleEvent) {
    match event {
        ConsoleEvent::BroadcastConnected { mode } => println!("sACN output connected ({})", mode),
        ConsoleEvent::SenderUnavailable(reason) => println!("sACN output unavailable: {}", reason),
        ConsoleEvent::UniverseActivationFailed { universe, reason } => {
            println!("universe {} not started: {}", universe, reason)
        }
        ConsoleEvent::BroadcastHalted(reason) => {
            println!("sACN output stopped unexpectedly: {}", reason)
        }
    }
}
