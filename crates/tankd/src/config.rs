use std::path::PathBuf;
use std::time::Duration;

use tank_core::{ControlConfig, PolicyTimings};
use tank_hw::{MotorError, MotorWiring};

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// JSON gallery of labeled face embeddings.
    pub gallery_path: PathBuf,
    /// Optional TOML motor wiring file; built-in pins when unset.
    pub motor_config: Option<PathBuf>,
    /// Gallery label of the person to follow.
    pub target_label: String,
    /// Recognition confidence must be below this to follow.
    pub confidence_threshold: f32,
    /// Camera settle time before the control loop starts.
    pub settle_secs: f32,
    pub search_turn_secs: f32,
    pub follow_forward_secs: f32,
    pub follow_turn_secs: f32,
    pub initial_rotate_secs: f32,
    /// Horizontal offset (pixels) treated as centered.
    pub center_tolerance: f32,
}

impl Config {
    /// Load configuration from `TANK_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("TANK_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| tank_vision::default_model_dir());

        let gallery_path = std::env::var("TANK_GALLERY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| model_dir.join("gallery.json"));

        let defaults = PolicyTimings::default();

        Self {
            camera_device: std::env::var("TANK_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            frame_width: env_parse("TANK_FRAME_WIDTH", 640),
            frame_height: env_parse("TANK_FRAME_HEIGHT", 480),
            model_dir,
            gallery_path,
            motor_config: std::env::var("TANK_MOTOR_CONFIG").ok().map(PathBuf::from),
            target_label: std::env::var("TANK_TARGET_LABEL").unwrap_or_else(|_| "me".to_string()),
            confidence_threshold: env_parse("TANK_CONFIDENCE_THRESHOLD", 60.0),
            settle_secs: env_parse("TANK_SETTLE_SECS", 3.0),
            search_turn_secs: env_parse("TANK_SEARCH_TURN_SECS", defaults.search_turn.as_secs_f32()),
            follow_forward_secs: env_parse(
                "TANK_FOLLOW_FORWARD_SECS",
                defaults.follow_forward.as_secs_f32(),
            ),
            follow_turn_secs: env_parse("TANK_FOLLOW_TURN_SECS", defaults.follow_turn.as_secs_f32()),
            initial_rotate_secs: env_parse(
                "TANK_INITIAL_ROTATE_SECS",
                defaults.initial_rotate.as_secs_f32(),
            ),
            center_tolerance: env_parse("TANK_CENTER_TOLERANCE", defaults.center_tolerance),
        }
    }

    /// Control loop settings derived from this configuration.
    pub fn control_config(&self) -> ControlConfig {
        ControlConfig {
            target_label: self.target_label.clone(),
            confidence_threshold: self.confidence_threshold,
            settle_delay: secs(self.settle_secs),
            timings: PolicyTimings {
                search_turn: secs(self.search_turn_secs),
                follow_forward: secs(self.follow_forward_secs),
                follow_turn: secs(self.follow_turn_secs),
                initial_rotate: secs(self.initial_rotate_secs),
                center_tolerance: self.center_tolerance,
            },
            rng_seed: None,
        }
    }

    /// Motor wiring from `TANK_MOTOR_CONFIG`, or the built-in layout.
    pub fn motor_wiring(&self) -> Result<MotorWiring, MotorError> {
        match &self.motor_config {
            Some(path) => MotorWiring::load(path),
            None => Ok(MotorWiring::default()),
        }
    }
}

/// Negative or non-finite values collapse to zero.
fn secs(value: f32) -> Duration {
    Duration::try_from_secs_f32(value).unwrap_or(Duration::ZERO)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secs_conversion() {
        assert_eq!(secs(0.7), Duration::from_secs_f32(0.7));
        assert_eq!(secs(-1.0), Duration::ZERO);
        assert_eq!(secs(f32::NAN), Duration::ZERO);
    }

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        std::env::set_var("TANK_TEST_PARSE_GARBAGE", "not-a-number");
        assert_eq!(env_parse("TANK_TEST_PARSE_GARBAGE", 4u32), 4);
        assert_eq!(env_parse("TANK_TEST_PARSE_UNSET", 2.5f32), 2.5);
        std::env::set_var("TANK_TEST_PARSE_OK", "17");
        assert_eq!(env_parse("TANK_TEST_PARSE_OK", 0u32), 17);
    }

    #[test]
    fn test_control_config_mapping() {
        let config = Config {
            camera_device: "/dev/video0".into(),
            frame_width: 640,
            frame_height: 480,
            model_dir: PathBuf::from("/models"),
            gallery_path: PathBuf::from("/models/gallery.json"),
            motor_config: None,
            target_label: "alice".into(),
            confidence_threshold: 45.0,
            settle_secs: 3.0,
            search_turn_secs: 0.7,
            follow_forward_secs: 1.0,
            follow_turn_secs: 0.7,
            initial_rotate_secs: 10.0,
            center_tolerance: 20.0,
        };
        let control = config.control_config();
        assert_eq!(control.target_label, "alice");
        assert_eq!(control.confidence_threshold, 45.0);
        assert_eq!(control.settle_delay, Duration::from_secs(3));
        assert_eq!(control.timings.follow_forward, Duration::from_secs(1));
        assert_eq!(control.timings.initial_rotate, Duration::from_secs(10));
        assert_eq!(config.motor_wiring().unwrap(), MotorWiring::default());
    }
}
