// On-disk rig format
//
// Models and clips are stored as JSON. A model document describes the skeleton,
// the materials and (optionally) embedded animations. A clip document only
// carries animations; the first one is authoritative.

use serde::{Deserialize, Serialize};

/// A model file: skeleton, materials and any embedded animations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub skeleton: SkeletonData,
    #[serde(default)]
    pub materials: Vec<MaterialData>,
    #[serde(default)]
    pub animations: Vec<AnimationData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkeletonData {
    #[serde(default)]
    pub bones: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialData {
    pub name: String,
    /// Linear RGB
    #[serde(default = "default_color")]
    pub color: [f32; 3],
}

fn default_color() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

/// A clip file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipDocument {
    #[serde(default)]
    pub animations: Vec<AnimationData>,
}

/// One animation with its keyframe tracks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationData {
    pub name: String,
    /// Explicit duration in seconds; derived from the keyframes when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f32>,
    #[serde(default)]
    pub tracks: Vec<TrackData>,
}

/// Keyframes for a single bone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackData {
    pub bone: String,
    pub times: Vec<f32>,
    #[serde(default)]
    pub values: Vec<f32>,
}

impl AnimationData {
    /// Check whether the animation has at least one keyframed track
    pub fn has_tracks(&self) -> bool {
        self.tracks.iter().any(|track| !track.times.is_empty())
    }

    /// Duration in seconds: the explicit value, or the last keyframe time
    pub fn resolved_duration(&self) -> f32 {
        self.duration.unwrap_or_else(|| {
            self.tracks
                .iter()
                .filter_map(|track| track.times.last().copied())
                .fold(0.0, f32::max)
        })
    }
}
