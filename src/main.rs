use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use docent::codec::{decode, TrailerLayout};
use docent::config::Config;
use docent::engine::{EngineEvent, ScanEngine};
use docent::narration::{self, GuideNarrator};
use docent::report::{print_reading_realtime, ReportGenerator, SessionStats};
use docent::transport::{parse_hex, SourceKind};
use docent::tui;
use log::{info, LevelFilter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "docent")]
#[command(author = "spikehead")]
#[command(version = "0.1.0")]
#[command(about = "BLE room-beacon proximity zone tracker for guided spaces")]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "docent.json")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan an advertisement stream and log zone changes
    Scan {
        /// Replay a recorded JSONL advertisement stream
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Simulate a walk toward a beacon instead of replaying
        #[arg(long)]
        walk: bool,

        /// Room id for the simulated walk
        #[arg(long, default_value = "SALA_2")]
        room: String,

        /// Beacon node for the simulated walk
        #[arg(long, default_value = "2")]
        node: u8,

        /// Write the session summary to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start the interactive TUI dashboard over a live scan
    Tui {
        /// Replay a recorded JSONL advertisement stream
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Simulate a walk toward a beacon instead of replaying
        #[arg(long)]
        walk: bool,

        /// Room id for the simulated walk
        #[arg(long, default_value = "SALA_2")]
        room: String,

        /// Beacon node for the simulated walk
        #[arg(long, default_value = "2")]
        node: u8,
    },

    /// Decode a beacon payload given as hex and print its fields
    Decode {
        /// Service data payload, hex encoded
        payload: String,

        /// Trailer layout override (defaults to the configured one)
        #[arg(long)]
        layout: Option<String>,
    },

    /// Initialize configuration and narration content files
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_secs()
        .init();

    // Handle init command before loading config
    if matches!(cli.command, Commands::Init) {
        return handle_init();
    }

    // Load configuration
    let config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        info!("Config file not found, using defaults");
        Config::default()
    };

    match cli.command {
        Commands::Scan {
            replay,
            walk,
            room,
            node,
            output,
        } => {
            let source = resolve_source(replay, walk, room, node)?;
            handle_scan(config, source, output).await
        }
        Commands::Tui {
            replay,
            walk,
            room,
            node,
        } => {
            let source = resolve_source(replay, walk, room, node)?;
            tui::run_tui(config, source).await
        }
        Commands::Decode { payload, layout } => handle_decode(&config, &payload, layout),
        Commands::Init => unreachable!(),
    }
}

fn resolve_source(
    replay: Option<PathBuf>,
    walk: bool,
    room: String,
    node: u8,
) -> Result<SourceKind> {
    match (replay, walk) {
        (Some(_), true) => bail!("--replay and --walk are mutually exclusive"),
        (Some(path), false) => Ok(SourceKind::Replay(path)),
        (None, true) => Ok(SourceKind::Walk { room_id: room, node }),
        (None, false) => {
            bail!("No advertisement source: pass --replay <file> or --walk")
        }
    }
}

async fn handle_scan(config: Config, source: SourceKind, output: Option<PathBuf>) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    // Set up Ctrl+C handler
    ctrlc::set_handler(move || {
        eprintln!("\nReceived Ctrl+C, stopping scan...");
        r.store(false, Ordering::SeqCst);
    })?;

    let (advert_tx, advert_rx) = mpsc::channel(256);
    let (event_tx, mut event_rx) = mpsc::channel(1000);

    let source_handle = source.spawn(&config, advert_tx, running.clone());

    let mut narrator = GuideNarrator::load(&config.narration.content)?;
    let narration_enabled = config.narration.enabled;

    let mut stats = SessionStats::new(chrono::Utc::now().timestamp_millis());
    let mut current_zone = 0u8;

    let engine = ScanEngine::new(config, running.clone());
    let engine_handle = tokio::spawn(async move { engine.run(advert_rx, event_tx).await });

    while let Some(event) = event_rx.recv().await {
        match event {
            EngineEvent::Reading(entry) => {
                stats.record_reading(&entry);
                print_reading_realtime(&entry, current_zone);
            }
            EngineEvent::Snapshot(snapshot) => {
                stats.record_snapshot(&snapshot);

                if snapshot.current_zone != current_zone {
                    info!(
                        "Zone change: {} -> {} (progress {})",
                        current_zone, snapshot.current_zone, snapshot.progress_zone
                    );
                    current_zone = snapshot.current_zone;
                }

                if narration_enabled && snapshot.current_zone > 0 {
                    if let Some(strongest) = snapshot.strongest() {
                        let room_id = strongest.room_id.clone();
                        if let Some(line) = narrator.announce(&room_id, snapshot.current_zone) {
                            println!(">> GUIDE: {}", line);
                        }
                    }
                }
            }
            EngineEvent::SourceEnded => {
                info!("Advertisement source finished");
                running.store(false, Ordering::SeqCst);
            }
        }
    }

    let counters = engine_handle.await??;
    source_handle.abort();

    ReportGenerator::write_session_summary(&stats, &counters, output.as_deref())
}

fn handle_decode(config: &Config, payload_hex: &str, layout: Option<String>) -> Result<()> {
    let layout = match layout.as_deref() {
        Some("legacy") => TrailerLayout::Legacy,
        Some("calibrated") => TrailerLayout::Calibrated,
        Some(other) => bail!("Unknown layout {:?}, expected legacy or calibrated", other),
        None => config.scan.trailer_layout,
    };

    let payload = parse_hex(payload_hex)?;
    let reading = match decode(&payload, layout) {
        Ok(reading) => reading,
        Err(e) => bail!("Decode failed: {}", e),
    };

    println!("Identity:  {}", reading.identity());
    println!("Room:      {}", reading.room_id);
    println!("Node:      {}", reading.node);
    println!("Firmware:  {}", reading.firmware_version());
    if let Some(tx_power) = reading.tx_power_payload {
        println!("Tx power:  {} dBm (informational)", tx_power);
    }
    println!("Battery:   {} mV", reading.battery_mv);

    Ok(())
}

fn handle_init() -> Result<()> {
    info!("Initializing docent configuration...");

    let config = Config::default();
    config.save("docent.json")?;
    info!("Created docent.json");

    narration::write_default_content("narration.json")?;

    info!("Initialization complete!");
    info!("Edit docent.json to calibrate distance and zone thresholds.");
    info!("Run 'docent scan --walk' to try the pipeline on a simulated walk.");

    Ok(())
}
