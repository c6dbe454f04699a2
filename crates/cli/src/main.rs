use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use sightplay_core::detection::domain::object_detector::InferenceOptions;
use sightplay_core::detection::infrastructure::model_store::ModelStore;
use sightplay_core::detection::infrastructure::onnx_detector::OnnxDetector;
use sightplay_core::overlay::display_mode::DisplayMode;
use sightplay_core::overlay::frame_processor::FrameProcessor;
use sightplay_core::playback::player::{Player, PlayerConfig, PlayerEvent};
use sightplay_core::video::domain::video_source::VideoSource;
use sightplay_core::video::infrastructure::ffmpeg_source::FfmpegSource;
use sightplay_core::video::infrastructure::pattern_source::PatternSource;

/// Headless video playback with detection and tracking overlays.
#[derive(Parser)]
#[command(name = "sightplay")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play a video, logging playback progress and detection activity.
    Play(PlayArgs),
    /// Manage installed detection models.
    Models {
        #[command(subcommand)]
        command: ModelsCommand,
    },
}

#[derive(Args)]
struct PlayArgs {
    /// Input video file.
    input: Option<PathBuf>,

    /// Play a synthetic test pattern instead of a file.
    #[arg(long)]
    pattern: bool,

    /// Run object detection on each frame.
    #[arg(long)]
    detect: bool,

    /// Model to use: an installed name or a path to an .onnx file.
    #[arg(long, default_value = "yolov8n.onnx")]
    model: String,

    /// Detection confidence threshold (0.0-1.0).
    #[arg(long, default_value = "0.25")]
    confidence: f64,

    /// Overlap (IoU) threshold for suppression (0.0-1.0).
    #[arg(long, default_value = "0.45")]
    iou: f64,

    /// Annotation style: full, boxes, confidence, or censored.
    #[arg(long, default_value = "full")]
    mode: String,

    /// Assign persistent track identities to detections.
    #[arg(long)]
    track: bool,

    /// Playback rate override (frames per second).
    #[arg(long)]
    fps: Option<f64>,

    /// Seek to this frame before playback starts.
    #[arg(long)]
    seek_to: Option<u64>,

    /// Stop after this many rendered frames.
    #[arg(long)]
    max_frames: Option<u64>,

    /// Render-loop poll interval in milliseconds.
    #[arg(long, default_value = "10")]
    poll_ms: u64,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// List installed models.
    List,
    /// Copy a model file into the store.
    Add {
        /// Path to an .onnx model file.
        file: PathBuf,
        /// Replace an installed model with the same name.
        #[arg(long)]
        overwrite: bool,
    },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::Play(args) => run_play(args),
        Command::Models { command } => run_models(command),
    }
}

fn run_play(args: PlayArgs) -> Result<(), Box<dyn std::error::Error>> {
    let source = open_source(&args)?;
    let processor = build_processor(&args)?;
    let mut player = Player::new(
        source,
        processor,
        PlayerConfig {
            target_fps: args.fps,
            ..PlayerConfig::default()
        },
    );

    let total = player.info().frame_count;
    let fps = player.state().target_fps;
    log::info!(
        "source ready: {}x{}, {} frames, {fps:.1} fps",
        player.info().width,
        player.info().height,
        total.map_or("unbounded".to_string(), |n| n.to_string()),
    );

    if let Some(target) = args.seek_to {
        let rendered = player.seek(target)?;
        log::info!(
            "seeked to frame {} ({})",
            rendered.frame.index(),
            format_time(rendered.frame.index() as f64 / fps),
        );
    }

    player.play();

    let poll = Duration::from_millis(args.poll_ms.max(1));
    let mut rendered: u64 = 0;
    loop {
        thread::sleep(poll);

        while let Some(frame) = player.poll_frame() {
            rendered += 1;
            if rendered % 30 == 0 {
                let position = frame.frame.index();
                let clock = format_time(position as f64 / fps);
                match total {
                    Some(n) => log::info!(
                        "playing {clock}/{} (frame {position}/{n}) - {:.1} fps, {} objects",
                        format_time(n as f64 / fps),
                        frame.fps,
                        frame.detections.len(),
                    ),
                    None => log::info!(
                        "playing {clock} (frame {position}) - {:.1} fps, {} objects",
                        frame.fps,
                        frame.detections.len(),
                    ),
                }
            }
            if let Some(max) = args.max_frames {
                if rendered >= max {
                    log::info!("rendered {rendered} frames, stopping");
                    player.pause();
                    return Ok(());
                }
            }
        }

        while let Some(event) = player.poll_event() {
            match event {
                PlayerEvent::Finished => {
                    log::info!("playback finished after {rendered} rendered frames");
                    return Ok(());
                }
                PlayerEvent::SourceError(message) => {
                    return Err(format!("source failed: {message}").into());
                }
                PlayerEvent::DetectionDisabled(message) => {
                    log::warn!("detection disabled after repeated failures: {message}");
                }
            }
        }
    }
}

fn open_source(args: &PlayArgs) -> Result<Box<dyn VideoSource>, Box<dyn std::error::Error>> {
    if args.pattern {
        return Ok(Box::new(PatternSource::finite(640, 480, 30.0, 300)));
    }
    let Some(input) = args.input.as_deref() else {
        return Err("an input file (or --pattern) is required".into());
    };
    Ok(Box::new(FfmpegSource::open(input)?))
}

fn build_processor(args: &PlayArgs) -> Result<FrameProcessor, Box<dyn std::error::Error>> {
    let mut processor = if args.detect {
        let store = ModelStore::open_default()?;
        let model_path = store.resolve(&args.model).ok_or_else(|| {
            format!(
                "model {:?} not found (install it with `sightplay models add`)",
                args.model
            )
        })?;
        log::info!("loading model {}", model_path.display());
        let detector = OnnxDetector::new(&model_path)?;
        FrameProcessor::with_detector(Box::new(detector))
    } else {
        FrameProcessor::new()
    };

    processor.set_mode(args.mode.parse::<DisplayMode>()?);
    processor.set_options(InferenceOptions {
        confidence: args.confidence,
        iou: args.iou,
        with_track_ids: args.track,
    });
    Ok(processor)
}

fn run_models(command: ModelsCommand) -> Result<(), Box<dyn std::error::Error>> {
    let store = ModelStore::open_default()?;
    match command {
        ModelsCommand::List => {
            let models = store.list()?;
            if models.is_empty() {
                println!("no models installed in {}", store.dir().display());
            } else {
                for name in models {
                    println!("{name}");
                }
            }
        }
        ModelsCommand::Add { file, overwrite } => {
            let installed = store.install(&file, overwrite)?;
            println!("installed {}", installed.display());
        }
    }
    Ok(())
}

/// Seconds as M:SS for progress logging.
fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
