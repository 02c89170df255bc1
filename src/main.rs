use std::env;
use std::error;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::{bounded, Receiver, Sender};
use dotenv::dotenv;
use log::{debug, error, info, warn};
use serde::Serialize;

use stride_hub::config::ConfigManager;
use stride_hub::export::parse_csv_row;
use stride_hub::logger;
use stride_hub::protocol::{encode_frame, FRAME_SIZE};
use stride_hub::simulate::{synthetic_run, RunProfile};
use stride_hub::{SessionController, SessionEvent};

/// Replay or simulate an IMU stream through the gait pipeline, then export it.
#[derive(Parser, Debug)]
#[command(name = "stridehub", version, about)]
struct Cli {
    /// Generate a synthetic run of this many seconds (default 60)
    #[arg(long, value_name = "SECONDS", conflicts_with = "replay")]
    simulate: Option<u32>,

    /// Replay readings from an exported CSV file
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Pace frames at the configured sample interval
    #[arg(long)]
    realtime: bool,
}

/// 数据来源：导出的 CSV 回放，或合成跑步数据
#[derive(Debug, PartialEq)]
enum Source {
    Replay(PathBuf),
    Simulate { seconds: u32 },
}

impl Cli {
    fn source(&self) -> Source {
        match (&self.replay, self.simulate) {
            (Some(path), _) => Source::Replay(path.clone()),
            (None, seconds) => Source::Simulate {
                seconds: seconds.unwrap_or(60),
            },
        }
    }
}

#[derive(Serialize)]
struct RunSummary {
    frames_sent: usize,
    frames_accepted: usize,
    readings: usize,
    elements: usize,
    cadence: f64,
    speed_kmh: f64,
    distance_m: f64,
    csv_path: String,
    gpx_path: String,
}

fn main() {
    dotenv().ok(); // 加载 .env 文件
    logger::init_logger();
    info!("StrideHub starting");

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn error::Error>> {
    let mut manager = match env::var("STRIDEHUB_CONFIG") {
        Ok(path) => {
            info!("Loading config from {}", path);
            ConfigManager::load_from_file(path)?
        }
        Err(_) => ConfigManager::new(),
    };
    if let Ok(dir) = env::var("STRIDEHUB_EXPORT_DIR") {
        manager.get_config_mut().export.directory = dir;
    }
    let config = manager.get_config().clone();
    config.validate()?;

    let controller = SessionController::new(config.clone())?;
    let events = controller.subscribe();
    let event_handle = thread::spawn(move || log_events(events));

    let (frame_sender, frame_receiver) = bounded(config.channels.frame_channel_capacity.max(1));
    let interval = config.session.sample_interval_millis;
    let source = cli.source();
    let realtime = cli.realtime;
    let producer = thread::spawn(move || produce_frames(source, frame_sender, interval, realtime));

    controller.connect();
    controller.record()?;

    let mut frames_accepted = 0;
    for frame in frame_receiver.iter() {
        if controller.add_frame(&frame) {
            frames_accepted += 1;
        }
    }

    let frames_sent = match producer.join() {
        Ok(Ok(count)) => count,
        Ok(Err(e)) => return Err(e.to_string().into()),
        Err(_) => return Err("Frame producer panicked".into()),
    };

    // 等待最后一次计算完成
    while controller.is_computing() {
        thread::sleep(Duration::from_millis(10));
    }

    let cadence = controller.current_cadence();
    let speed_kmh = controller.current_speed_kmh();
    let distance_m = controller.current_distance_m();
    let saved = controller.stop_recording()?;

    let summary = RunSummary {
        frames_sent,
        frames_accepted,
        readings: saved.readings,
        elements: saved.elements,
        cadence,
        speed_kmh,
        distance_m,
        csv_path: saved.csv_path.display().to_string(),
        gpx_path: saved.gpx_path.display().to_string(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    controller.disconnect();
    drop(controller);
    if event_handle.join().is_err() {
        warn!("Event logger thread panicked");
    }
    Ok(())
}

/// Encode readings into wire frames, as the transport would deliver them.
fn produce_frames(
    source: Source,
    sender: Sender<[u8; FRAME_SIZE]>,
    interval_millis: u32,
    realtime: bool,
) -> Result<usize, Box<dyn error::Error + Send + Sync>> {
    let readings = match source {
        Source::Simulate { seconds } => {
            let profile = RunProfile {
                sample_interval_millis: interval_millis,
                jitter_g: 0.02,
                ..RunProfile::default()
            };
            let count = (seconds as usize * 1000) / interval_millis.max(1) as usize;
            info!("Simulating {} s run ({} readings, {:.1} steps/min)", seconds, count, profile.cadence());
            synthetic_run(&profile, 0, count, &mut rand::rng())
        }
        Source::Replay(path) => {
            info!("Replaying {}", path.display());
            let reader = BufReader::new(File::open(&path)?);
            let mut readings = Vec::new();
            for line in reader.lines() {
                let line = line?;
                match parse_csv_row(&line) {
                    Some(reading) => readings.push(reading),
                    None => debug!("Skipping CSV line: {}", line),
                }
            }
            readings
        }
    };

    let mut sent = 0;
    for reading in &readings {
        if sender.send(encode_frame(reading)).is_err() {
            // 接收端已关闭
            info!("Frame channel disconnected, producer exiting");
            break;
        }
        sent += 1;
        if realtime {
            thread::sleep(Duration::from_millis(u64::from(interval_millis)));
        }
    }
    info!("Producer sent {} frames", sent);
    Ok(sent)
}

fn log_events(events: Receiver<SessionEvent>) {
    for event in events.iter() {
        match event {
            SessionEvent::MetricsUpdated {
                cadence,
                speed_kmh,
                distance_m,
            } => info!(
                "cadence {:.1} steps/min, speed {:.2} km/h, distance {:.1} m",
                cadence, speed_kmh, distance_m
            ),
            SessionEvent::VisualisationUpdated(bytes) => debug!("Visualisation refreshed ({} points)", bytes.len()),
            SessionEvent::StateChanged(state) => debug!("State changed to {}", state),
            SessionEvent::Saved(result) => info!("{}", result.message()),
            SessionEvent::ExportFailed(message) => warn!("Export failed: {}", message),
        }
    }
    debug!("Event channel closed");
}
