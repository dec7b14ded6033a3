// Animation director - owns the skeletal playback timeline

use super::clips::{ClipConfig, ClipLoader};
use crate::core::math::{lerp, progress};
use crate::engine::assets::{AssetError, AssetSource};
use log::{debug, warn};
use std::collections::HashMap;

/// Default crossfade window in seconds
pub const DEFAULT_CROSSFADE: f32 = 0.5;

/// Default tolerance for single-shot completion, absorbs frame-step error
pub const DEFAULT_FINISH_TOLERANCE: f32 = 0.1;

/// How a clip behaves when it reaches its end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopMode {
    /// Wrap around forever; never finishes
    Repeat,
    /// Play once and hold the last pose
    Once,
}

impl LoopMode {
    pub fn from_looping(looping: bool) -> Self {
        if looping {
            Self::Repeat
        } else {
            Self::Once
        }
    }
}

/// A decoded animation clip bound to the character's skeleton
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    /// Name the clip is registered under (e.g., "idle", "accept")
    pub name: String,
    /// Length of one cycle in seconds
    pub duration: f32,
    pub loop_mode: LoopMode,
    /// Base playback speed from the clip configuration
    pub time_scale: f32,
    /// Number of keyframed tracks bound to the skeleton
    pub track_count: usize,
}

impl AnimationClip {
    pub fn new(name: &str, duration: f32, loop_mode: LoopMode) -> Self {
        Self {
            name: name.to_string(),
            duration,
            loop_mode,
            time_scale: 1.0,
            track_count: 0,
        }
    }

    /// Create a looping clip
    pub fn looping(name: &str, duration: f32) -> Self {
        Self::new(name, duration, LoopMode::Repeat)
    }

    /// Create a one-shot clip (plays once and holds)
    pub fn one_shot(name: &str, duration: f32) -> Self {
        Self::new(name, duration, LoopMode::Once)
    }

    pub fn with_time_scale(mut self, time_scale: f32) -> Self {
        self.time_scale = time_scale.max(0.0);
        self
    }

    pub fn with_track_count(mut self, track_count: usize) -> Self {
        self.track_count = track_count;
        self
    }

    /// Metadata reported back to callers after loading
    pub fn info(&self) -> ClipInfo {
        ClipInfo {
            name: self.name.clone(),
            duration: self.duration,
            loop_mode: self.loop_mode,
        }
    }
}

/// Duration and loop metadata of a registered clip
#[derive(Debug, Clone, PartialEq)]
pub struct ClipInfo {
    pub name: String,
    pub duration: f32,
    pub loop_mode: LoopMode,
}

/// Options for [`AnimationDirector::play`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayOptions {
    /// Seconds over which running clips hand their weight to the new one
    pub crossfade: f32,
    /// Multiplied with the clip's base time scale
    pub time_scale: f32,
    /// Restart the clip from the beginning
    pub reset_time: bool,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            crossfade: DEFAULT_CROSSFADE,
            time_scale: 1.0,
            reset_time: true,
        }
    }
}

impl PlayOptions {
    /// Hard cut, no blending
    pub fn immediate() -> Self {
        Self {
            crossfade: 0.0,
            ..Self::default()
        }
    }

    pub fn with_crossfade(mut self, seconds: f32) -> Self {
        self.crossfade = seconds.max(0.0);
        self
    }

    pub fn with_time_scale(mut self, time_scale: f32) -> Self {
        self.time_scale = time_scale.max(0.0);
        self
    }

    pub fn keep_time(mut self) -> Self {
        self.reset_time = false;
        self
    }
}

/// A linear weight ramp
#[derive(Debug, Clone, Copy, PartialEq)]
struct Fade {
    from: f32,
    to: f32,
    duration: f32,
    elapsed: f32,
}

/// Playback state of one registered clip.
///
/// Owned by the director; callers only ever get shared references.
#[derive(Debug, Clone)]
pub struct ClipAction {
    clip: AnimationClip,
    /// Local clip time, wrapped or clamped by the loop mode
    time: f32,
    /// Scaled time since the clip was last (re)started, never wrapped
    elapsed: f32,
    time_scale: f32,
    weight: f32,
    fade: Option<Fade>,
    active: bool,
}

impl ClipAction {
    fn new(clip: AnimationClip) -> Self {
        Self {
            time_scale: clip.time_scale,
            clip,
            time: 0.0,
            elapsed: 0.0,
            weight: 0.0,
            fade: None,
            active: false,
        }
    }

    pub fn clip(&self) -> &AnimationClip {
        &self.clip
    }

    pub fn name(&self) -> &str {
        &self.clip.name
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    fn fade_to(&mut self, target: f32, duration: f32) {
        self.fade = Some(Fade {
            from: self.weight,
            to: target,
            duration,
            elapsed: 0.0,
        });
    }

    fn deactivate(&mut self) {
        self.active = false;
        self.weight = 0.0;
        self.fade = None;
    }

    fn restart(&mut self) {
        self.time = 0.0;
        self.elapsed = 0.0;
    }

    fn advance(&mut self, dt: f32) {
        // Fades run on wall time, independent of playback speed
        if let Some(fade) = &mut self.fade {
            fade.elapsed += dt;
            let t = progress(fade.elapsed, fade.duration);
            self.weight = lerp(fade.from, fade.to, t);

            if t >= 1.0 {
                self.weight = fade.to;
                let faded_out = fade.to <= 0.0;
                self.fade = None;
                if faded_out {
                    self.deactivate();
                    return;
                }
            }
        }

        let step = dt * self.time_scale;
        self.elapsed += step;
        self.time += step;

        let duration = self.clip.duration;
        match self.clip.loop_mode {
            LoopMode::Repeat if duration > 0.0 => self.time %= duration,
            LoopMode::Repeat => self.time = 0.0,
            LoopMode::Once => self.time = self.time.min(duration),
        }
    }
}

/// The single owner of a character's playback timeline
#[derive(Debug)]
pub struct AnimationDirector {
    actions: HashMap<String, ClipAction>,
    finish_tolerance: f32,
    disposed: bool,
}

impl Default for AnimationDirector {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationDirector {
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
            finish_tolerance: DEFAULT_FINISH_TOLERANCE,
            disposed: false,
        }
    }

    /// Set the tolerance used by [`AnimationDirector::is_finished`]
    pub fn with_finish_tolerance(mut self, tolerance: f32) -> Self {
        self.finish_tolerance = tolerance.max(0.0);
        self
    }

    pub fn finish_tolerance(&self) -> f32 {
        self.finish_tolerance
    }

    /// Register a decoded clip. Already registered names keep their cached clip.
    pub fn register_clip(&mut self, clip: AnimationClip) -> ClipInfo {
        if self.disposed {
            debug!("Director disposed, dropping clip '{}'", clip.name);
            return clip.info();
        }

        if let Some(existing) = self.actions.get(&clip.name) {
            debug!("Clip '{}' already registered, keeping cached copy", clip.name);
            return existing.clip.info();
        }

        let info = clip.info();
        debug!(
            "Registered clip '{}' ({:.2}s, {:?})",
            info.name, info.duration, info.loop_mode
        );
        self.actions.insert(clip.name.clone(), ClipAction::new(clip));
        info
    }

    /// Load a clip and register it. Cached clips are not loaded again.
    pub async fn load_animation<S: AssetSource>(
        &mut self,
        loader: &ClipLoader<S>,
        config: &ClipConfig,
    ) -> Result<ClipInfo, AssetError> {
        if let Some(action) = self.actions.get(&config.name) {
            return Ok(action.clip.info());
        }

        let loaded = loader.load_animation(config).await?;
        Ok(self.register_clip(loaded.clip))
    }

    /// Load a batch of clips concurrently.
    ///
    /// Every config gets its own result; one failure leaves the other clips usable.
    pub async fn load_animations<S: AssetSource>(
        &mut self,
        loader: &ClipLoader<S>,
        configs: &[ClipConfig],
    ) -> Vec<Result<ClipInfo, AssetError>> {
        loader
            .load_animations(configs)
            .await
            .into_iter()
            .map(|result| result.map(|loaded| self.register_clip(loaded.clip)))
            .collect()
    }

    /// Activate a clip, crossfading every other running clip into it.
    ///
    /// Returns `None` (and logs a warning) if the clip is not registered.
    pub fn play(&mut self, name: &str, options: PlayOptions) -> Option<&ClipAction> {
        if !self.actions.contains_key(name) {
            warn!("Cannot play unregistered clip '{}'", name);
            return None;
        }

        let crossfade = options.crossfade.max(0.0);
        let mut blending = false;

        for (other, action) in self.actions.iter_mut() {
            if other == name || !action.active {
                continue;
            }
            if crossfade > 0.0 {
                action.fade_to(0.0, crossfade);
                blending = true;
            } else {
                action.deactivate();
            }
        }

        let action = self.actions.get_mut(name)?;
        if options.reset_time {
            action.restart();
        }
        action.time_scale = action.clip.time_scale * options.time_scale.max(0.0);

        if blending {
            if !action.active {
                action.weight = 0.0;
            }
            action.fade_to(1.0, crossfade);
        } else {
            action.weight = 1.0;
            action.fade = None;
        }
        action.active = true;

        debug!(
            "Playing '{}' (crossfade {:.2}s, blending: {})",
            name, crossfade, blending
        );

        Some(&*action)
    }

    /// Deactivate a clip, optionally fading its weight out first
    pub fn stop(&mut self, name: &str, fade: f32) {
        let Some(action) = self.actions.get_mut(name) else {
            warn!("Cannot stop unregistered clip '{}'", name);
            return;
        };

        if !action.active {
            return;
        }

        if fade > 0.0 {
            action.fade_to(0.0, fade);
        } else {
            action.deactivate();
        }
    }

    /// Stop every clip immediately
    pub fn stop_all(&mut self) {
        for action in self.actions.values_mut() {
            action.deactivate();
        }
    }

    /// Advance every active clip by `dt` seconds. Zero or negative `dt` is a no-op.
    pub fn update(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }

        for action in self.actions.values_mut().filter(|action| action.active) {
            action.advance(dt);
        }
    }

    pub fn has_clip(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn action(&self, name: &str) -> Option<&ClipAction> {
        self.actions.get(name)
    }

    pub fn clip_names(&self) -> Vec<&str> {
        self.actions.keys().map(String::as_str).collect()
    }

    pub fn is_playing(&self, name: &str) -> bool {
        self.actions.get(name).is_some_and(|action| action.active)
    }

    /// Local time of a clip in seconds
    pub fn get_time(&self, name: &str) -> Option<f32> {
        self.actions.get(name).map(|action| action.time)
    }

    /// Scaled time since the clip was last restarted
    pub fn get_elapsed(&self, name: &str) -> Option<f32> {
        self.actions.get(name).map(|action| action.elapsed)
    }

    pub fn get_duration(&self, name: &str) -> Option<f32> {
        self.actions.get(name).map(|action| action.clip.duration)
    }

    pub fn loop_mode(&self, name: &str) -> Option<LoopMode> {
        self.actions.get(name).map(|action| action.clip.loop_mode)
    }

    /// Current blend weight (0 for unknown or inactive clips)
    pub fn weight(&self, name: &str) -> f32 {
        self.actions
            .get(name)
            .filter(|action| action.active)
            .map(|action| action.weight)
            .unwrap_or(0.0)
    }

    /// Sum of the weights of every active clip
    pub fn total_weight(&self) -> f32 {
        self.actions
            .values()
            .filter(|action| action.active)
            .map(|action| action.weight)
            .sum()
    }

    /// The active clip with the highest weight
    pub fn dominant_clip(&self) -> Option<&str> {
        self.actions
            .values()
            .filter(|action| action.active)
            .max_by(|a, b| a.weight.total_cmp(&b.weight))
            .map(|action| action.name())
    }

    /// Names of every active clip
    pub fn active_clips(&self) -> Vec<&str> {
        self.actions
            .values()
            .filter(|action| action.active)
            .map(ClipAction::name)
            .collect()
    }

    /// Check if a running single-shot clip has reached its end.
    ///
    /// Looping, inactive and unknown clips are never finished.
    pub fn is_finished(&self, name: &str) -> bool {
        self.actions.get(name).is_some_and(|action| {
            action.active
                && action.clip.loop_mode == LoopMode::Once
                && action.time >= action.clip.duration - self.finish_tolerance
        })
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Stop every clip and release them. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.stop_all();
        let released = self.actions.len();
        self.actions.clear();
        self.disposed = true;
        debug!("Animation director disposed ({} clips released)", released);
    }
}
