use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tank_core::{normalize_face, Actuator, Frame, FrameSource, VisionOracle};
use tank_hw::{CameraFeeder, GpioMotor, MotorWiring};
use tank_vision::OnnxOracle;

#[derive(Parser)]
#[command(name = "tank", about = "Tank face-follower diagnostics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive the motors directly, bypassing the daemon
    Motor {
        direction: Direction,
        /// How long to hold the command before stopping
        #[arg(long, default_value_t = 1.0)]
        secs: f32,
        /// TOML motor wiring file (built-in pins when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List cameras and grab one frame
    Camera {
        #[arg(long, default_value = "/dev/video0")]
        device: String,
        #[arg(long, default_value_t = 640)]
        width: u32,
        #[arg(long, default_value_t = 480)]
        height: u32,
    },
    /// Run detection and recognition on an image file
    Detect {
        image: PathBuf,
        /// Directory containing ONNX model files
        #[arg(long)]
        model_dir: Option<PathBuf>,
        /// Face gallery JSON (defaults to <model-dir>/gallery.json)
        #[arg(long)]
        gallery: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Direction {
    Forward,
    Cw,
    Ccw,
    Stop,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Motor {
            direction,
            secs,
            config,
        } => run_motor(direction, secs, config),
        Commands::Camera {
            device,
            width,
            height,
        } => run_camera(&device, width, height),
        Commands::Detect {
            image,
            model_dir,
            gallery,
        } => run_detect(&image, model_dir, gallery),
    }
}

fn run_motor(direction: Direction, secs: f32, config: Option<PathBuf>) -> Result<()> {
    let wiring = match config {
        Some(path) => MotorWiring::load(&path)?,
        None => MotorWiring::default(),
    };
    let hold = Duration::try_from_secs_f32(secs).context("--secs must be a non-negative number")?;

    let mut motor = GpioMotor::new(wiring);
    motor.initialize().context("initializing motor GPIO")?;
    tracing::info!(?direction, secs, "jogging motors");

    match direction {
        Direction::Forward => motor.move_forward(),
        Direction::Cw => motor.turn_clockwise(),
        Direction::Ccw => motor.turn_counterclockwise(),
        Direction::Stop => {}
    }
    if !matches!(direction, Direction::Stop) {
        std::thread::sleep(hold);
    }
    motor.stop();
    tracing::debug!("motor jog finished");
    println!("Motors stopped");
    Ok(())
}

fn run_camera(device: &str, width: u32, height: u32) -> Result<()> {
    let devices = CameraFeeder::list_devices();
    if devices.is_empty() {
        println!("No V4L2 capture devices found");
    }
    for info in &devices {
        println!("{}  {} ({}, {})", info.path, info.name, info.driver, info.bus);
    }

    let camera = CameraFeeder::new(device, width, height);
    tracing::info!(device, width, height, "grabbing one frame");
    camera.start().with_context(|| format!("starting camera {device}"))?;
    let frame = camera.read();
    camera.stop();
    tracing::debug!(received = frame.is_some(), "camera stopped");

    match frame {
        Some(frame) => println!("Frame shape: {}x{}x3", frame.height, frame.width),
        None => bail!("camera {device} produced no frame"),
    }
    Ok(())
}

fn run_detect(path: &Path, model_dir: Option<PathBuf>, gallery: Option<PathBuf>) -> Result<()> {
    let model_dir = model_dir.unwrap_or_else(tank_vision::default_model_dir);
    let gallery = gallery.unwrap_or_else(|| model_dir.join("gallery.json"));
    let mut oracle = OnnxOracle::load(&model_dir, &gallery).context("loading vision models")?;

    let rgb = image::open(path)
        .with_context(|| format!("opening {}", path.display()))?
        .to_rgb8();
    let (width, height) = rgb.dimensions();
    let frame = Frame::new(rgb.into_raw(), width, height, 0)?;

    let faces = oracle.detect(&frame)?;
    let mut results = Vec::with_capacity(faces.len());
    for face in &faces {
        let normalized = normalize_face(&frame, face, oracle.face_size())?;
        let recognition = oracle.recognize(&normalized)?;
        results.push(serde_json::json!({
            "x": face.x,
            "y": face.y,
            "width": face.width,
            "height": face.height,
            "score": face.score,
            "offset": face.horizontal_offset(frame.width),
            "label": recognition.label,
            "confidence": recognition.confidence,
        }));
    }

    let report = serde_json::json!({
        "image": path.display().to_string(),
        "width": width,
        "height": height,
        "faces": results,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
