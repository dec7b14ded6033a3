// Character system
//
// This module contains everything needed to drive one animated character:
// - Clip loading from model-embedded animations or separate clip files
// - Animation director blending clips with crossfades
// - Table-driven state machine reacting to input channels
// - Lightweight motion integrator
// - Controller tying them together behind a per-frame `update`

pub mod animation;
pub mod clips;
pub mod config;
pub mod controller;
pub mod model;
pub mod physics;
pub mod state;

// Re-export commonly used types
pub use animation::{AnimationClip, AnimationDirector, ClipAction, ClipInfo, LoopMode, PlayOptions};
pub use clips::{ClipConfig, ClipLoader, ClipOrigin, EmbeddedFallback, LoadedClip};
pub use config::{ConfigError, ControllerConfig, TransformConfig};
pub use controller::{CharacterController, CharacterLoader, LoadedCharacter};
pub use model::{MaterialHandle, ModelRoot, SceneContainer, Transform};
pub use physics::{PhysicsConfig, PhysicsState, BASE_PHYSICS};
pub use state::{StateChange, StateDefinition, StateEvent, StateMachine, StateTable, StateTableError};
