//! Track motors driven through sysfs GPIO lines.

use std::fs;
use std::path::{Path, PathBuf};

use tank_core::Actuator;
use thiserror::Error;

use crate::wiring::MotorWiring;

#[derive(Debug, Error)]
pub enum MotorError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid motor wiring: {0}")]
    Wiring(String),
}

/// Line levels for (left fwd, left back, right fwd, right back).
type Levels = [bool; 4];

const FORWARD: Levels = [true, false, true, false];
const CLOCKWISE: Levels = [true, false, false, true];
const COUNTER_CLOCKWISE: Levels = [false, true, true, false];
const HALT: Levels = [false; 4];

/// Dual-track motor driver using four sysfs GPIO outputs.
pub struct GpioMotor {
    wiring: MotorWiring,
}

impl GpioMotor {
    pub fn new(wiring: MotorWiring) -> Self {
        Self { wiring }
    }

    fn line_dir(&self, line: u32) -> PathBuf {
        self.wiring.gpio_root.join(format!("gpio{line}"))
    }

    fn apply(&self, levels: Levels) {
        for (line, high) in self.wiring.lines().into_iter().zip(levels) {
            let path = self.line_dir(line).join("value");
            if let Err(err) = fs::write(&path, if high { "1" } else { "0" }) {
                tracing::warn!(line, path = %path.display(), error = %err, "GPIO write failed");
            }
        }
    }
}

fn write_attr(path: &Path, value: &str) -> Result<(), MotorError> {
    fs::write(path, value).map_err(|source| MotorError::Io {
        path: path.to_path_buf(),
        source,
    })
}

impl Actuator for GpioMotor {
    type Error = MotorError;

    /// Export every line, configure it as an output and drive it low.
    fn initialize(&mut self) -> Result<(), MotorError> {
        for line in self.wiring.lines() {
            let dir = self.line_dir(line);
            if !dir.exists() {
                write_attr(&self.wiring.gpio_root.join("export"), &line.to_string())?;
                tracing::debug!(line, "exported GPIO line");
            }
            write_attr(&dir.join("direction"), "out")?;
            write_attr(&dir.join("value"), "0")?;
        }
        tracing::info!(lines = ?self.wiring.lines(), "motor GPIO initialized");
        Ok(())
    }

    fn move_forward(&mut self) {
        self.apply(FORWARD);
    }

    fn turn_clockwise(&mut self) {
        self.apply(CLOCKWISE);
    }

    fn turn_counterclockwise(&mut self) {
        self.apply(COUNTER_CLOCKWISE);
    }

    fn stop(&mut self) {
        self.apply(HALT);
    }
}
