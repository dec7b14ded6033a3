// Character controller configuration

use super::animation::DEFAULT_FINISH_TOLERANCE;
use super::clips::ClipConfig;
use super::model::Transform;
use super::physics::PhysicsConfig;
use super::state::{ACCEPT, IDLE, REJECT};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Initial placement of the model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub position: [f32; 3],
    /// Heading in radians around the vertical axis
    pub rotation_y: f32,
    /// Uniform scale
    pub scale: f32,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            rotation_y: 0.0,
            scale: 1.0,
        }
    }
}

impl TransformConfig {
    pub fn to_transform(&self) -> Transform {
        Transform {
            position: Vec3::from_array(self.position),
            rotation: Quat::from_rotation_y(self.rotation_y),
            scale: Vec3::splat(self.scale),
        }
    }
}

/// Everything needed to build one character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Model file, loaded first
    pub model_path: PathBuf,
    /// Directory clip paths are relative to
    pub animation_base_path: PathBuf,
    pub transform: TransformConfig,
    pub physics: PhysicsConfig,
    /// Clips loaded after the model
    pub clips: Vec<ClipConfig>,
    /// State the machine starts in; `None` keeps the state table's own
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<String>,
    /// Input channel to the state it requests
    pub channel_states: BTreeMap<String, String>,
    /// Completion tolerance for single-shot clips, in seconds
    pub finish_tolerance: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/tutor.json"),
            animation_base_path: PathBuf::from("animations"),
            transform: TransformConfig::default(),
            physics: PhysicsConfig::default(),
            clips: vec![
                ClipConfig::looping(IDLE, "idle.json"),
                ClipConfig::one_shot(ACCEPT, "accept.json"),
                ClipConfig::one_shot(REJECT, "reject.json"),
            ],
            initial_state: None,
            channel_states: BTreeMap::from([
                (ACCEPT.to_string(), ACCEPT.to_string()),
                (REJECT.to_string(), REJECT.to_string()),
            ]),
            finish_tolerance: DEFAULT_FINISH_TOLERANCE,
        }
    }
}

impl ControllerConfig {
    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string_lossy().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    pub fn with_animation_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.animation_base_path = path.into();
        self
    }

    pub fn with_clips(mut self, clips: Vec<ClipConfig>) -> Self {
        self.clips = clips;
        self
    }

    /// Start in `state` instead of the state table's initial state
    pub fn with_initial_state(mut self, state: &str) -> Self {
        self.initial_state = Some(state.to_string());
        self
    }

    pub fn with_physics(mut self, physics: PhysicsConfig) -> Self {
        self.physics = physics;
        self
    }

    /// Route an input channel to a state
    pub fn with_channel_state(mut self, channel: &str, state: &str) -> Self {
        self.channel_states
            .insert(channel.to_string(), state.to_string());
        self
    }

    pub fn clip(&self, name: &str) -> Option<&ClipConfig> {
        self.clips.iter().find(|clip| clip.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.initial_state, None);
        assert_eq!(config.clips.len(), 3);
        assert!(config.clip(IDLE).unwrap().looping);
        assert!(!config.clip(ACCEPT).unwrap().looping);
        assert_eq!(config.channel_states.get(REJECT).map(String::as_str), Some(REJECT));
        assert_eq!(config.finish_tolerance, 0.1);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ControllerConfig::from_json_str(
            r#"{
                "model_path": "models/owl.json",
                "transform": { "position": [1.0, 0.0, -2.0], "scale": 0.5 },
                "physics": { "acceleration": [1.0, 1.0, 20.0], "deceleration": [0.0, 0.0, -2.0] }
            }"#,
        )
        .unwrap();

        assert_eq!(config.model_path, PathBuf::from("models/owl.json"));
        assert_eq!(config.animation_base_path, PathBuf::from("animations"));
        assert_eq!(config.physics.acceleration, Vec3::new(1.0, 1.0, 20.0));
        assert_eq!(config.clips.len(), 3);
        assert_eq!(config.initial_state, None);

        let transform = config.transform.to_transform();
        assert_eq!(transform.position, Vec3::new(1.0, 0.0, -2.0));
        assert_eq!(transform.scale, Vec3::splat(0.5));
    }

    #[test]
    fn test_clip_list_from_json() {
        let config = ControllerConfig::from_json_str(
            r#"{ "clips": [
                { "name": "idle", "path": "idle.json", "looping": true },
                { "name": "accept", "path": "yes.json", "time_scale": 1.5 }
            ] }"#,
        )
        .unwrap();

        assert_eq!(config.clips.len(), 2);
        let accept = config.clip(ACCEPT).unwrap();
        assert!(!accept.looping);
        assert_eq!(accept.time_scale, Some(1.5));
    }

    #[test]
    fn test_initial_state_override() {
        let config = ControllerConfig::from_json_str(r#"{ "initial_state": "rest" }"#).unwrap();
        assert_eq!(config.initial_state.as_deref(), Some("rest"));

        let config = ControllerConfig::default().with_initial_state(REJECT);
        assert_eq!(config.initial_state.as_deref(), Some(REJECT));
    }

    #[test]
    fn test_rotation() {
        let config = TransformConfig {
            rotation_y: std::f32::consts::PI,
            ..TransformConfig::default()
        };
        let forward = config.to_transform().rotation * Vec3::Z;
        assert_relative_eq!(forward.z, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_invalid_json() {
        let err = ControllerConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = ControllerConfig::load("does/not/exist.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
