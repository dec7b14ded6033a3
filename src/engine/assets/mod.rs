// Asset management system
//
// Provides async byte sources and decoding of the JSON rig format
// (models, skeletons, materials and animation clips).

pub mod format;
mod loader;
mod source;

pub use format::{
    AnimationData, ClipDocument, MaterialData, ModelDocument, SkeletonData, TrackData,
};
pub use loader::AssetLoader;
pub use source::{AssetSource, FileSource, MemorySource};

/// Asset loading errors
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Failed to decode {path}: {message}")]
    Decode { path: String, message: String },

    #[error("No animation track in {0}")]
    NoAnimationTrack(String),

    #[error("Invalid clip '{name}': {reason}")]
    InvalidClip { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
