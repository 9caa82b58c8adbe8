//! Motor wiring map.
//!
//! Maps each track's forward/backward H-bridge input to a sysfs GPIO line.
//! Loaded from a TOML file; `contrib/motor.toml` documents the default layout.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::motor::MotorError;

/// GPIO lines driving one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WheelPins {
    pub forward: u32,
    pub backward: u32,
}

/// Full wiring of the motor board.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MotorWiring {
    /// sysfs GPIO class directory.
    pub gpio_root: PathBuf,
    pub left: WheelPins,
    pub right: WheelPins,
}

impl Default for MotorWiring {
    fn default() -> Self {
        Self {
            gpio_root: PathBuf::from("/sys/class/gpio"),
            left: WheelPins {
                forward: 17,
                backward: 27,
            },
            right: WheelPins {
                forward: 22,
                backward: 23,
            },
        }
    }
}

impl MotorWiring {
    pub fn from_toml_str(src: &str) -> Result<Self, MotorError> {
        toml::from_str(src).map_err(|e| MotorError::Wiring(e.to_string()))
    }

    /// Read a wiring file from disk.
    pub fn load(path: &Path) -> Result<Self, MotorError> {
        let src = std::fs::read_to_string(path).map_err(|source| MotorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let wiring = Self::from_toml_str(&src)?;
        tracing::info!(path = %path.display(), ?wiring, "loaded motor wiring");
        Ok(wiring)
    }

    /// All four lines in (left fwd, left back, right fwd, right back) order.
    pub fn lines(&self) -> [u32; 4] {
        [
            self.left.forward,
            self.left.backward,
            self.right.forward,
            self.right.backward,
        ]
    }
}
