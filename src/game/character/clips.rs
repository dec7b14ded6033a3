// Clip loader - fetches animation assets and turns them into playable clips

use super::animation::{AnimationClip, LoopMode};
use crate::engine::assets::{AnimationData, AssetError, AssetLoader, AssetSource};
use futures::future::join_all;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Describes one clip to load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipConfig {
    /// Name the clip is registered and played under
    pub name: String,
    /// Path relative to the animation base path
    pub path: PathBuf,
    /// Repeat forever, or play once and hold the last pose
    #[serde(default)]
    pub looping: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_scale: Option<f32>,
}

impl ClipConfig {
    pub fn new(name: &str, path: impl Into<PathBuf>, looping: bool) -> Self {
        Self {
            name: name.to_string(),
            path: path.into(),
            looping,
            time_scale: None,
        }
    }

    /// A clip that repeats forever
    pub fn looping(name: &str, path: impl Into<PathBuf>) -> Self {
        Self::new(name, path, true)
    }

    /// A clip that plays once and holds
    pub fn one_shot(name: &str, path: impl Into<PathBuf>) -> Self {
        Self::new(name, path, false)
    }

    pub fn with_time_scale(mut self, time_scale: f32) -> Self {
        self.time_scale = Some(time_scale);
        self
    }

    pub fn loop_mode(&self) -> LoopMode {
        LoopMode::from_looping(self.looping)
    }
}

/// Where a loaded clip came from
#[derive(Debug, Clone, PartialEq)]
pub enum ClipOrigin {
    /// Embedded in the model file under the given animation name
    Embedded(String),
    /// Read from its own clip file
    File(PathBuf),
}

/// A decoded clip ready to be registered with a director
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedClip {
    pub clip: AnimationClip,
    pub origin: ClipOrigin,
}

/// How a request may fall back onto animations embedded in the model file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddedFallback {
    /// Only an embedded animation whose name matches (case-insensitively)
    MatchingName,
    /// A matching name first, otherwise the first embedded animation
    FirstAvailable,
}

/// Loads clips from embedded model animations or from clip files
#[derive(Debug, Clone)]
pub struct ClipLoader<S> {
    assets: AssetLoader<S>,
    embedded: Vec<AnimationData>,
    bones: Vec<String>,
}

impl<S: AssetSource> ClipLoader<S> {
    /// Create a loader reading clip files relative to `base_path`
    pub fn new<P: AsRef<Path>>(source: S, base_path: P) -> Self {
        Self {
            assets: AssetLoader::new(source, base_path),
            embedded: Vec::new(),
            bones: Vec::new(),
        }
    }

    /// Animations shipped inside the model file
    pub fn with_embedded(mut self, animations: Vec<AnimationData>) -> Self {
        self.embedded = animations;
        self
    }

    /// Bones of the skeleton clips get bound to
    pub fn with_skeleton(mut self, bones: Vec<String>) -> Self {
        self.bones = bones;
        self
    }

    pub fn base_path(&self) -> &Path {
        self.assets.base_path()
    }

    /// Find an embedded animation for a clip name.
    ///
    /// Takes without keyframes are never candidates.
    pub fn find_embedded(&self, name: &str, fallback: EmbeddedFallback) -> Option<&AnimationData> {
        let mut candidates = self.embedded.iter().filter(|anim| anim.has_tracks());
        let matching = candidates
            .clone()
            .find(|anim| anim.name.eq_ignore_ascii_case(name));

        match fallback {
            EmbeddedFallback::MatchingName => matching,
            EmbeddedFallback::FirstAvailable => matching.or_else(|| candidates.next()),
        }
    }

    /// Load a clip, preferring an embedded animation with the same name
    pub async fn load_animation(&self, config: &ClipConfig) -> Result<LoadedClip, AssetError> {
        self.load_animation_with(config, EmbeddedFallback::MatchingName)
            .await
    }

    /// Load a clip using an explicit embedded fallback policy
    pub async fn load_animation_with(
        &self,
        config: &ClipConfig,
        fallback: EmbeddedFallback,
    ) -> Result<LoadedClip, AssetError> {
        if let Some(data) = self.find_embedded(&config.name, fallback) {
            debug!(
                "Using embedded animation '{}' for clip '{}'",
                data.name, config.name
            );
            let label = format!("embedded animation '{}'", data.name);
            let clip = self.build_clip(config, data, &label)?;
            return Ok(LoadedClip {
                clip,
                origin: ClipOrigin::Embedded(data.name.clone()),
            });
        }

        let document = self.assets.load_clips(&config.path).await?;
        let path = self.assets.resolve_path(&config.path);

        // First animation with keyframes is authoritative
        let data = document
            .animations
            .iter()
            .find(|anim| anim.has_tracks())
            .ok_or_else(|| AssetError::NoAnimationTrack(path.to_string_lossy().to_string()))?;

        if document.animations.len() > 1 {
            debug!(
                "{} holds {} animations, using '{}'",
                path.display(),
                document.animations.len(),
                data.name
            );
        }

        let clip = self.build_clip(config, data, &path.to_string_lossy())?;
        Ok(LoadedClip {
            clip,
            origin: ClipOrigin::File(path),
        })
    }

    /// Load a batch of clips concurrently, one result per config
    pub async fn load_animations(
        &self,
        configs: &[ClipConfig],
    ) -> Vec<Result<LoadedClip, AssetError>> {
        join_all(configs.iter().map(|config| self.load_animation(config))).await
    }

    /// `origin` names where `data` came from in errors
    fn build_clip(
        &self,
        config: &ClipConfig,
        data: &AnimationData,
        origin: &str,
    ) -> Result<AnimationClip, AssetError> {
        if !data.has_tracks() {
            return Err(AssetError::NoAnimationTrack(origin.to_string()));
        }

        let duration = data.resolved_duration();
        if !duration.is_finite() || duration <= 0.0 {
            return Err(AssetError::InvalidClip {
                name: config.name.clone(),
                reason: format!("duration {duration} is not positive"),
            });
        }

        let track_count = if self.bones.is_empty() {
            data.tracks.len()
        } else {
            let bound = data
                .tracks
                .iter()
                .filter(|track| self.bones.iter().any(|bone| bone == &track.bone))
                .count();
            if bound == 0 {
                return Err(AssetError::InvalidClip {
                    name: config.name.clone(),
                    reason: "no track targets a bone of the skeleton".to_string(),
                });
            }
            if bound < data.tracks.len() {
                warn!(
                    "Clip '{}': {} of {} tracks target unknown bones and are ignored",
                    config.name,
                    data.tracks.len() - bound,
                    data.tracks.len()
                );
            }
            bound
        };

        let mut clip = AnimationClip::new(&config.name, duration, config.loop_mode())
            .with_track_count(track_count);
        if let Some(time_scale) = config.time_scale {
            clip = clip.with_time_scale(time_scale);
        }

        Ok(clip)
    }
}
