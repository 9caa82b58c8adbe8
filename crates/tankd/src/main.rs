use std::sync::Arc;

use anyhow::{Context, Result};
use tank_core::{Actuator, ControlLoop, FrameSource, VisionOracle, WorkerOutcome};
use tank_hw::{CameraFeeder, GpioMotor};
use tank_vision::OnnxOracle;
use tracing_subscriber::EnvFilter;

mod config;
mod signals;

use config::Config;
use signals::TerminationSignals;

type Tank = ControlLoop<CameraFeeder, OnnxOracle, GpioMotor>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(?config, "tankd starting");

    let wiring = config.motor_wiring().context("loading motor wiring")?;
    let oracle = OnnxOracle::load(&config.model_dir, &config.gallery_path)
        .context("loading vision models")?;
    let camera = CameraFeeder::new(&config.camera_device, config.frame_width, config.frame_height);
    tracing::debug!(device = camera.device_path(), "camera feeder configured");

    let tank: Arc<Tank> = Arc::new(ControlLoop::new(
        config.control_config(),
        camera,
        oracle,
        GpioMotor::new(wiring),
    ));

    // Blocks for the camera settle delay.
    {
        let tank = tank.clone();
        tokio::task::spawn_blocking(move || tank.start()).await??;
    }

    let mut signals = TerminationSignals::install().context("installing signal handlers")?;
    tracing::info!("tankd ready");

    let worker = {
        let tank = tank.clone();
        tokio::task::spawn_blocking(move || tank.join())
    };

    tokio::select! {
        outcome = worker => finish(tank, outcome?).await,
        name = signals.recv() => shutdown(tank, signals, name).await,
    }
}

/// The worker ended on its own: release motors and camera off the runtime
/// threads, then report the worker's error, if any.
async fn finish<F, V, A>(tank: Arc<ControlLoop<F, V, A>>, outcome: Option<WorkerOutcome>) -> Result<()>
where
    F: FrameSource + 'static,
    V: VisionOracle + 'static,
    A: Actuator + 'static,
{
    tokio::task::spawn_blocking(move || tank.stop()).await?;
    if let Some(Err(err)) = outcome {
        return Err(err).context("control worker failed");
    }
    tracing::info!("tankd exiting");
    Ok(())
}

/// Run the one-shot shutdown for the first signal, logging any that arrive
/// while it is in progress, then exit with status 1.
async fn shutdown(tank: Arc<Tank>, mut signals: TerminationSignals, first: &'static str) -> ! {
    let stopping = {
        let tank = tank.clone();
        tokio::task::spawn_blocking(move || tank.shutdown_on_signal(first))
    };
    tokio::pin!(stopping);

    loop {
        tokio::select! {
            _ = &mut stopping => break,
            name = signals.recv() => {
                tank.shutdown_on_signal(name);
            }
        }
    }

    tracing::info!("tankd exiting after signal");
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;
    use std::sync::Mutex;
    use std::thread::{self, ThreadId};
    use tank_core::{ControlConfig, ControlError, DetectedFace, Frame, RecognitionResult};

    #[derive(Default)]
    struct IdleSource {
        stopped_on: Arc<Mutex<Option<ThreadId>>>,
    }

    impl FrameSource for IdleSource {
        type Error = std::io::Error;

        fn start(&self) -> std::io::Result<()> {
            Ok(())
        }

        fn stop(&self) {
            *self.stopped_on.lock().unwrap() = Some(thread::current().id());
        }

        fn read(&self) -> Option<Frame> {
            None
        }
    }

    struct NoFaces;

    impl VisionOracle for NoFaces {
        type Error = std::io::Error;

        fn detect(&mut self, _frame: &Frame) -> std::io::Result<Vec<DetectedFace>> {
            Ok(Vec::new())
        }

        fn recognize(&mut self, _face: &GrayImage) -> std::io::Result<RecognitionResult> {
            Ok(RecognitionResult::new("unknown", f32::INFINITY))
        }

        fn face_size(&self) -> (u32, u32) {
            (112, 112)
        }
    }

    struct IdleMotor;

    impl Actuator for IdleMotor {
        type Error = std::io::Error;

        fn initialize(&mut self) -> std::io::Result<()> {
            Ok(())
        }
        fn move_forward(&mut self) {}
        fn turn_clockwise(&mut self) {}
        fn turn_counterclockwise(&mut self) {}
        fn stop(&mut self) {}
    }

    fn idle_tank() -> (Arc<ControlLoop<IdleSource, NoFaces, IdleMotor>>, Arc<Mutex<Option<ThreadId>>>) {
        let source = IdleSource::default();
        let stopped_on = source.stopped_on.clone();
        let tank = ControlLoop::new(ControlConfig::default(), source, NoFaces, IdleMotor);
        (Arc::new(tank), stopped_on)
    }

    #[tokio::test]
    async fn test_finish_stops_off_runtime_thread() {
        let (tank, stopped_on) = idle_tank();
        let runtime_thread = thread::current().id();

        finish(tank.clone(), None).await.unwrap();

        let stopped_on = stopped_on.lock().unwrap().expect("source stopped");
        assert_ne!(stopped_on, runtime_thread);
        assert_eq!(tank.state(), tank_core::SystemState::Stopped);
    }

    #[tokio::test]
    async fn test_finish_reports_worker_error() {
        let (tank, stopped_on) = idle_tank();
        let err = finish(tank, Some(Err(ControlError::WorkerPanicked)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("control worker failed"));
        assert!(stopped_on.lock().unwrap().is_some());
    }
}
