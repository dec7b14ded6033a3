// Character controller - composition root for one animated character
//
// Owns the state machine (and through it the animation director), the
// motion integrator and the loaded model. Input arrives only through the
// injected `InputSource`; the outside world drives everything else through
// `update(dt)` once per frame.

use super::animation::{AnimationClip, AnimationDirector};
use super::clips::{ClipLoader, EmbeddedFallback};
use super::config::ControllerConfig;
use super::model::{MaterialHandle, ModelRoot, SceneContainer, Transform};
use super::physics::PhysicsState;
use super::state::{StateChange, StateMachine, StateTable};
use crate::engine::assets::{AssetError, AssetLoader, AssetSource};
use crate::engine::input::{InputSource, SubscriptionId};
use futures::future::join_all;
use glam::Vec3;
use log::{debug, error, info, warn};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

type SharedMachine = Rc<RefCell<Option<StateMachine>>>;

/// Everything a load produced, ready to be installed into a controller
#[derive(Debug)]
pub struct LoadedCharacter {
    pub model: ModelRoot,
    /// One entry per configured clip, in configuration order
    pub clips: Vec<(String, Result<AnimationClip, AssetError>)>,
}

/// Loads a character's model and clips without borrowing the controller.
///
/// The returned future can be polled alongside the render loop; its result
/// is handed to [`CharacterController::install`].
#[derive(Debug, Clone)]
pub struct CharacterLoader {
    config: ControllerConfig,
    /// Clip of the initial state; may fall back to any embedded animation
    initial_clip: Option<String>,
    disposed: Rc<Cell<bool>>,
}

impl CharacterLoader {
    /// Load the model, then every configured clip concurrently.
    ///
    /// Only a model failure is fatal; clip failures are reported per clip.
    /// A loader cancelled while the model loads skips the clip set.
    pub async fn load<S: AssetSource>(&self, source: &S) -> Result<LoadedCharacter, AssetError> {
        let models = AssetLoader::new(source, "");
        let document = models.load_model(&self.config.model_path).await?;
        let model = ModelRoot::from_document(&document);

        if self.is_cancelled() {
            debug!("Load of '{}' cancelled, skipping clips", model.name);
            return Ok(LoadedCharacter {
                model,
                clips: Vec::new(),
            });
        }

        if !model.has_skeleton() {
            warn!(
                "Model '{}' has no skeleton, clips will not be bone-checked",
                model.name
            );
        }

        let loader = ClipLoader::new(source, &self.config.animation_base_path)
            .with_embedded(document.animations)
            .with_skeleton(document.skeleton.bones);

        let loads = self.config.clips.iter().map(|config| {
            let fallback = if self.initial_clip.as_deref() == Some(config.name.as_str()) {
                EmbeddedFallback::FirstAvailable
            } else {
                EmbeddedFallback::MatchingName
            };
            loader.load_animation_with(config, fallback)
        });
        let results = join_all(loads).await;

        let clips = self
            .config
            .clips
            .iter()
            .zip(results)
            .map(|(config, result)| (config.name.clone(), result.map(|loaded| loaded.clip)))
            .collect();

        Ok(LoadedCharacter { model, clips })
    }

    /// True once the controller that created this loader was disposed
    pub fn is_cancelled(&self) -> bool {
        self.disposed.get()
    }
}

/// One character instance: state machine, animation, motion and model
pub struct CharacterController {
    config: ControllerConfig,
    input: Rc<InputSource>,
    /// Consumed when the machine is built at install time
    states: Option<StateTable>,
    machine: SharedMachine,
    pending_observer: Option<Box<dyn FnMut(&StateChange)>>,
    physics: PhysicsState,
    transform: Transform,
    model: Option<ModelRoot>,
    attached: bool,
    subscriptions: Vec<(String, SubscriptionId)>,
    on_error: Option<Box<dyn FnMut(&str)>>,
    disposed: Rc<Cell<bool>>,
}

impl CharacterController {
    /// Create a controller with the default idle/accept/reject states
    pub fn new(config: ControllerConfig, input: Rc<InputSource>) -> Self {
        Self::with_states(config, input, StateTable::reactions())
    }

    /// Create a controller with a custom state table.
    ///
    /// The table's initial state is used unless the configuration names one.
    pub fn with_states(config: ControllerConfig, input: Rc<InputSource>, states: StateTable) -> Self {
        let states = match config.initial_state.as_deref() {
            Some(initial) => states.starting_in(initial),
            None => states,
        };

        let mut controller = Self {
            physics: PhysicsState::new(config.physics),
            transform: config.transform.to_transform(),
            states: Some(states),
            config,
            input,
            machine: Rc::new(RefCell::new(None)),
            pending_observer: None,
            model: None,
            attached: false,
            subscriptions: Vec::new(),
            on_error: None,
            disposed: Rc::new(Cell::new(false)),
        };
        controller.wire_input();
        controller
    }

    fn wire_input(&mut self) {
        let bindings: Vec<(String, String)> = self
            .config
            .channel_states
            .iter()
            .map(|(channel, state)| (channel.clone(), state.clone()))
            .collect();

        for (channel, state) in bindings {
            let machine = Rc::downgrade(&self.machine);
            let input = Rc::downgrade(&self.input);
            let disposed = self.disposed.clone();

            let id = self.input.on(&channel, move |channel| {
                if !disposed.get() {
                    request_transition(&machine, &input, channel, &state);
                }
            });

            if let Some(id) = id {
                self.subscriptions.push((channel, id));
            }
        }
    }

    /// Register the callback that receives load failures
    pub fn on_error<F: FnMut(&str) + 'static>(&mut self, callback: F) {
        self.on_error = Some(Box::new(callback));
    }

    /// Register the observer called after every successful state change
    pub fn on_state_change<F: FnMut(&StateChange) + 'static>(&mut self, observer: F) {
        match self.machine.try_borrow_mut() {
            Ok(mut slot) => match slot.as_mut() {
                Some(machine) => machine.on_state_change(observer),
                None => self.pending_observer = Some(Box::new(observer)),
            },
            Err(_) => warn!("Cannot register a state observer during a transition"),
        }
    }

    fn report_error(&mut self, message: &str) {
        error!("{}", message);
        if let Some(callback) = self.on_error.as_mut() {
            callback(message);
        }
    }

    /// A loader for this controller's model and clips
    pub fn loader(&self) -> CharacterLoader {
        let initial_clip = self
            .states
            .as_ref()
            .and_then(|table| table.state(table.initial_state()))
            .map(|state| state.bound_animation().to_string());

        CharacterLoader {
            config: self.config.clone(),
            initial_clip,
            disposed: self.disposed.clone(),
        }
    }

    /// Load and install in one step. Not for use inside the frame loop.
    pub async fn load<S: AssetSource>(&mut self, source: &S) -> Option<&ModelRoot> {
        let result = self.loader().load(source).await;
        self.handle_load_result(result)
    }

    /// Install a finished load, or forward its error to `on_error`
    pub fn handle_load_result(
        &mut self,
        result: Result<LoadedCharacter, AssetError>,
    ) -> Option<&ModelRoot> {
        match result {
            Ok(loaded) => self.install(loaded),
            Err(e) => {
                if !self.disposed.get() {
                    self.report_error(&format!("Failed to load model: {e}"));
                }
                None
            }
        }
    }

    /// Register loaded clips, build the state machine and keep the model.
    ///
    /// Returns the model ready for attachment. A disposed controller ignores
    /// the load and returns `None`.
    pub fn install(&mut self, loaded: LoadedCharacter) -> Option<&ModelRoot> {
        if self.disposed.get() {
            debug!("Controller disposed, ignoring late load of '{}'", loaded.model.name);
            return None;
        }
        if self.model.is_some() {
            warn!("Character already installed, ignoring second load");
            return self.model.as_ref();
        }

        let LoadedCharacter { mut model, clips } = loaded;

        let mut director = AnimationDirector::new().with_finish_tolerance(self.config.finish_tolerance);
        for (name, result) in clips {
            match result {
                Ok(clip) => {
                    director.register_clip(clip);
                }
                Err(e) => self.report_error(&format!("Failed to load clip '{name}': {e}")),
            }
        }

        let table = self.states.take().unwrap_or_default();
        match StateMachine::new(table, director) {
            Ok(mut machine) => {
                if let Some(observer) = self.pending_observer.take() {
                    machine.on_state_change(observer);
                }
                let installed = match self.machine.try_borrow_mut() {
                    Ok(mut slot) => {
                        *slot = Some(machine);
                        true
                    }
                    Err(_) => false,
                };
                if !installed {
                    self.report_error("Cannot install character during a transition");
                    return None;
                }
            }
            // The model is only kept alongside a running machine
            Err(e) => {
                self.report_error(&format!("Invalid state table: {e}"));
                return None;
            }
        }

        model.transform = self.transform;
        info!(
            "Character '{}' ready ({} bones, {} materials)",
            model.name,
            model.bones().len(),
            model.materials().len()
        );
        self.model = Some(model);
        self.model.as_ref()
    }

    /// Advance one frame.
    ///
    /// Order matters: completions are checked before the timeline advances, so
    /// an auto-transition is animated in the same frame; motion comes last.
    pub fn update(&mut self, dt: f32) {
        if self.disposed.get() {
            return;
        }

        match self.machine.try_borrow_mut() {
            Ok(mut slot) => {
                if let Some(machine) = slot.as_mut() {
                    machine.update();
                    machine.director_mut().update(dt);
                }
            }
            Err(_) => warn!("Skipping re-entrant character update"),
        }

        self.physics.integrate(&mut self.transform, dt);
        if let Some(model) = self.model.as_mut() {
            model.transform = self.transform;
        }
    }

    /// Push the character along its own axes (x lateral, y vertical, z forward)
    pub fn accelerate(&mut self, input: Vec3, dt: f32) {
        if self.disposed.get() {
            return;
        }
        self.physics.accelerate(input, dt);
    }

    /// Attach the model to a scene container. Only the first call attaches.
    pub fn attach_to<C: SceneContainer>(&mut self, container: &mut C) -> bool {
        if self.disposed.get() || self.attached {
            return false;
        }
        let Some(model) = self.model.as_ref() else {
            warn!("Cannot attach a character whose model has not loaded");
            return false;
        };

        container.attach(model);
        self.attached = true;
        true
    }

    /// Request a state directly, bypassing input channels
    pub fn transition(&mut self, to: &str) -> bool {
        if self.disposed.get() {
            return false;
        }
        match self.machine.try_borrow_mut() {
            Ok(mut slot) => slot.as_mut().is_some_and(|machine| machine.transition(to)),
            Err(_) => {
                warn!("Transition to '{}' rejected: already transitioning", to);
                false
            }
        }
    }

    pub fn can_transition(&self, to: &str) -> bool {
        self.with_machine(|machine| machine.can_transition(to))
            .unwrap_or(false)
    }

    /// Run a read-only query against the state machine, if it is installed
    pub fn with_machine<R>(&self, query: impl FnOnce(&StateMachine) -> R) -> Option<R> {
        let slot = self.machine.try_borrow().ok()?;
        slot.as_ref().map(query)
    }

    pub fn current_state(&self) -> Option<String> {
        self.with_machine(|machine| machine.current_state().to_string())
    }

    pub fn is_ready(&self) -> bool {
        !self.disposed.get() && self.model.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    pub fn model(&self) -> Option<&ModelRoot> {
        self.model.as_ref()
    }

    /// The model's material table for the appearance system
    pub fn material_map(&self) -> Option<&HashMap<String, MaterialHandle>> {
        self.model.as_ref().map(ModelRoot::materials)
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn physics(&self) -> &PhysicsState {
        &self.physics
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn input(&self) -> &Rc<InputSource> {
        &self.input
    }

    /// Tear down the state machine, its director and the input wiring.
    /// Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.disposed.get() {
            return;
        }
        self.disposed.set(true);

        match self.machine.try_borrow_mut() {
            // Disposing the machine disposes its director
            Ok(mut slot) => {
                if let Some(mut machine) = slot.take() {
                    machine.dispose();
                }
            }
            Err(_) => warn!("State machine busy during dispose, released on drop"),
        }

        for (channel, id) in self.subscriptions.drain(..) {
            self.input.off(&channel, id);
        }
        self.input.reset();

        self.physics.stop();
        self.states = None;
        self.pending_observer = None;
        self.on_error = None;

        info!(
            "Character '{}' disposed",
            self.model.as_ref().map(|m| m.name.as_str()).unwrap_or("<unloaded>")
        );
    }
}

impl Drop for CharacterController {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for CharacterController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CharacterController")
            .field("state", &self.current_state())
            .field("model", &self.model.as_ref().map(|m| &m.name))
            .field("transform", &self.transform)
            .field("disposed", &self.disposed.get())
            .finish()
    }
}

/// Input callback body: transition if legal, then consume the channel
fn request_transition(
    machine: &Weak<RefCell<Option<StateMachine>>>,
    input: &Weak<InputSource>,
    channel: &str,
    state: &str,
) {
    let Some(machine) = machine.upgrade() else {
        return;
    };
    let Ok(mut slot) = machine.try_borrow_mut() else {
        warn!("'{}' rejected: character is mid-transition", channel);
        return;
    };
    let Some(machine) = slot.as_mut() else {
        debug!("'{}' ignored: character not loaded yet", channel);
        return;
    };

    if !machine.can_transition(state) || !machine.transition(state) {
        debug!(
            "'{}' ignored in state '{}'",
            channel,
            machine.current_state()
        );
        return;
    }
    drop(slot);

    if let Some(input) = input.upgrade() {
        input.reset_input(channel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::{AnimationData, MemorySource, ModelDocument, SkeletonData, MaterialData};
    use crate::engine::input::{ACCEPT as ACCEPT_CHANNEL, REJECT as REJECT_CHANNEL};
    use crate::game::character::clips::tests::{animation, clip_file};
    use crate::game::character::clips::ClipConfig;
    use crate::game::character::physics::PhysicsConfig;
    use crate::game::character::state::{StateDefinition, ACCEPT, IDLE, REJECT};
    use approx::assert_relative_eq;

    fn model_document(animations: Vec<AnimationData>) -> ModelDocument {
        ModelDocument {
            name: "tutor".to_string(),
            skeleton: SkeletonData {
                bones: vec!["hips".to_string(), "head".to_string()],
            },
            materials: vec![MaterialData {
                name: "Shirt".to_string(),
                color: [0.2, 0.4, 0.8],
            }],
            animations,
        }
    }

    fn assets() -> MemorySource {
        let mut source = MemorySource::new();
        source
            .insert_json("models/tutor.json", &model_document(vec![]))
            .unwrap();
        clip_file(&mut source, "animations/idle.json", "idle", 1.0);
        clip_file(&mut source, "animations/accept.json", "accept", 2.0);
        clip_file(&mut source, "animations/reject.json", "reject", 1.5);
        source
    }

    fn loaded_controller() -> (CharacterController, Rc<InputSource>) {
        let input = Rc::new(InputSource::with_default_channels());
        let mut controller = CharacterController::new(ControllerConfig::default(), input.clone());
        assert!(pollster::block_on(controller.load(&assets())).is_some());
        (controller, input)
    }

    fn errors_of(controller: &mut CharacterController) -> Rc<RefCell<Vec<String>>> {
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = errors.clone();
        controller.on_error(move |message| sink.borrow_mut().push(message.to_string()));
        errors
    }

    #[test]
    fn test_load_installs_model_and_machine() {
        let (controller, _input) = loaded_controller();
        assert!(controller.is_ready());
        assert_eq!(controller.current_state().as_deref(), Some(IDLE));
        assert_eq!(controller.model().unwrap().name, "tutor");
        assert_eq!(
            controller.with_machine(|m| m.director().clip_names().len()),
            Some(3)
        );
    }

    #[test]
    fn test_input_event_transitions_and_consumes() {
        let (controller, input) = loaded_controller();

        input.trigger_event(ACCEPT_CHANNEL);
        assert_eq!(controller.current_state().as_deref(), Some(ACCEPT));
        assert!(!input.is_active(ACCEPT_CHANNEL));
    }

    #[test]
    fn test_illegal_event_is_not_consumed() {
        let (controller, input) = loaded_controller();

        input.trigger_event(REJECT_CHANNEL);
        input.trigger_event(ACCEPT_CHANNEL);

        assert_eq!(controller.current_state().as_deref(), Some(REJECT));
        assert!(input.is_active(ACCEPT_CHANNEL));
        assert!(!input.is_active(REJECT_CHANNEL));
    }

    #[test]
    fn test_edge_triggered_input() {
        let (mut controller, input) = loaded_controller();

        input.trigger_event(ACCEPT_CHANNEL);
        controller.update(2.1);
        controller.update(0.0);
        assert_eq!(controller.current_state().as_deref(), Some(IDLE));

        // The consumed flag must not fire accept again
        for _ in 0..5 {
            controller.update(0.5);
            assert_eq!(controller.current_state().as_deref(), Some(IDLE));
        }
    }

    #[test]
    fn test_completion_reflected_in_same_frame() {
        let (mut controller, input) = loaded_controller();

        input.trigger_event(ACCEPT_CHANNEL);
        controller.update(2.1);
        assert_eq!(
            controller.with_machine(|m| m.director().is_finished(ACCEPT)),
            Some(true)
        );
        assert_eq!(controller.current_state().as_deref(), Some(ACCEPT));

        // Back to idle and the idle fade-in already advanced this frame
        controller.update(0.1);
        assert_eq!(controller.current_state().as_deref(), Some(IDLE));
        let idle_weight = controller.with_machine(|m| m.director().weight(IDLE)).unwrap();
        assert_relative_eq!(idle_weight, 0.2, epsilon = 1e-5);
    }

    #[test]
    fn test_reentrant_event_rejected() {
        let input = Rc::new(InputSource::with_default_channels());
        let hook_input = input.clone();
        let table = StateTable::new(IDLE)
            .with_state(StateDefinition::new(IDLE, IDLE).with_transitions(&[ACCEPT, REJECT]))
            .with_state(
                StateDefinition::new(ACCEPT, ACCEPT)
                    .with_transitions(&[IDLE, REJECT])
                    .on_enter(move |_| hook_input.trigger_event(REJECT_CHANNEL)),
            )
            .with_state(StateDefinition::new(REJECT, REJECT).returns_to(IDLE));

        let mut controller =
            CharacterController::with_states(ControllerConfig::default(), input.clone(), table);
        pollster::block_on(controller.load(&assets()));

        input.trigger_event(ACCEPT_CHANNEL);
        assert_eq!(controller.current_state().as_deref(), Some(ACCEPT));
        assert!(input.is_active(REJECT_CHANNEL));

        // A fresh event outside the transition goes through
        input.trigger_event(REJECT_CHANNEL);
        assert_eq!(controller.current_state().as_deref(), Some(REJECT));
    }

    #[test]
    fn test_events_before_load_are_ignored() {
        let input = Rc::new(InputSource::with_default_channels());
        let mut controller = CharacterController::new(ControllerConfig::default(), input.clone());

        input.trigger_event(ACCEPT_CHANNEL);
        controller.update(0.016);
        assert_eq!(controller.current_state(), None);
        assert!(!controller.is_ready());

        pollster::block_on(controller.load(&assets()));
        assert_eq!(controller.current_state().as_deref(), Some(IDLE));
    }

    #[test]
    fn test_missing_clip_reported_others_usable() {
        let mut source = assets();
        source.remove(std::path::Path::new("animations/accept.json"));

        let input = Rc::new(InputSource::with_default_channels());
        let mut controller = CharacterController::new(ControllerConfig::default(), input.clone());
        let errors = errors_of(&mut controller);

        assert!(pollster::block_on(controller.load(&source)).is_some());
        assert_eq!(errors.borrow().len(), 1);
        assert!(errors.borrow()[0].contains("accept"));

        input.trigger_event(REJECT_CHANNEL);
        assert_eq!(controller.current_state().as_deref(), Some(REJECT));
    }

    #[test]
    fn test_model_failure_reported() {
        let input = Rc::new(InputSource::with_default_channels());
        let mut controller = CharacterController::new(ControllerConfig::default(), input);
        let errors = errors_of(&mut controller);

        assert!(pollster::block_on(controller.load(&MemorySource::new())).is_none());
        assert_eq!(errors.borrow().len(), 1);
        assert!(errors.borrow()[0].starts_with("Failed to load model"));

        controller.update(0.016);
        assert!(!controller.is_ready());
    }

    #[test]
    fn test_embedded_idle_fallback() {
        let mut source = MemorySource::new();
        source
            .insert_json(
                "models/tutor.json",
                &model_document(vec![animation("mixamo.com", "hips", 3.0)]),
            )
            .unwrap();
        clip_file(&mut source, "animations/accept.json", "accept", 2.0);
        clip_file(&mut source, "animations/reject.json", "reject", 1.5);

        let input = Rc::new(InputSource::with_default_channels());
        let mut controller = CharacterController::new(ControllerConfig::default(), input);
        let errors = errors_of(&mut controller);
        pollster::block_on(controller.load(&source));

        assert!(errors.borrow().is_empty());
        assert_eq!(
            controller.with_machine(|m| m.director().get_duration(IDLE)),
            Some(Some(3.0))
        );
        // Accept has no embedded match and comes from its own file
        assert_eq!(
            controller.with_machine(|m| m.director().get_duration(ACCEPT)),
            Some(Some(2.0))
        );
    }

    #[test]
    fn test_split_load_and_late_install() {
        let input = Rc::new(InputSource::with_default_channels());
        let mut controller = CharacterController::new(ControllerConfig::default(), input);
        let loader = controller.loader();

        controller.dispose();
        assert!(loader.is_cancelled());

        let loaded = pollster::block_on(loader.load(&assets())).unwrap();
        assert!(controller.install(loaded).is_none());
        assert!(controller.model().is_none());
    }

    #[test]
    fn test_custom_table_keeps_its_initial_state() {
        let mut source = MemorySource::new();
        source
            .insert_json("models/tutor.json", &model_document(vec![]))
            .unwrap();
        clip_file(&mut source, "animations/rest.json", "rest", 1.0);
        clip_file(&mut source, "animations/wave.json", "wave", 1.2);

        let table = StateTable::new("rest")
            .with_state(StateDefinition::new("rest", "rest").to("wave"))
            .with_state(StateDefinition::new("wave", "wave").returns_to("rest"));
        let config = ControllerConfig::default()
            .with_clips(vec![
                ClipConfig::looping("rest", "rest.json"),
                ClipConfig::one_shot("wave", "wave.json"),
            ])
            .with_channel_state(ACCEPT_CHANNEL, "wave");

        let input = Rc::new(InputSource::with_default_channels());
        let mut controller = CharacterController::with_states(config, input.clone(), table);
        let errors = errors_of(&mut controller);

        assert!(pollster::block_on(controller.load(&source)).is_some());
        assert!(errors.borrow().is_empty());
        assert!(controller.is_ready());
        assert_eq!(controller.current_state().as_deref(), Some("rest"));
        assert_eq!(
            controller.with_machine(|m| m.director().weight("rest")),
            Some(1.0)
        );

        input.trigger_event(ACCEPT_CHANNEL);
        assert_eq!(controller.current_state().as_deref(), Some("wave"));
    }

    #[test]
    fn test_invalid_table_is_not_ready() {
        let input = Rc::new(InputSource::with_default_channels());
        let config = ControllerConfig::default().with_initial_state("missing");
        let mut controller = CharacterController::new(config, input);
        let errors = errors_of(&mut controller);

        assert!(pollster::block_on(controller.load(&assets())).is_none());
        assert!(!controller.is_ready());
        assert!(controller.model().is_none());
        assert_eq!(controller.current_state(), None);
        assert_eq!(errors.borrow().len(), 1);
        assert!(errors.borrow()[0].starts_with("Invalid state table"));
    }

    #[test]
    fn test_configured_initial_state_overrides_table() {
        let input = Rc::new(InputSource::with_default_channels());
        let config = ControllerConfig::default().with_initial_state(REJECT);
        let mut controller = CharacterController::new(config, input);

        pollster::block_on(controller.load(&assets()));
        assert_eq!(controller.current_state().as_deref(), Some(REJECT));
    }

    /// Cancels the load as soon as the first asset is read
    struct CancelOnRead {
        inner: MemorySource,
        cancel: Rc<Cell<bool>>,
        reads: Cell<usize>,
    }

    impl AssetSource for CancelOnRead {
        async fn read(&self, path: &std::path::Path) -> Result<Vec<u8>, AssetError> {
            self.reads.set(self.reads.get() + 1);
            self.cancel.set(true);
            self.inner.read(path).await
        }
    }

    #[test]
    fn test_cancelled_load_skips_clips() {
        let input = Rc::new(InputSource::with_default_channels());
        let controller = CharacterController::new(ControllerConfig::default(), input);
        let loader = controller.loader();
        let source = CancelOnRead {
            inner: assets(),
            cancel: loader.disposed.clone(),
            reads: Cell::new(0),
        };

        let loaded = pollster::block_on(loader.load(&source)).unwrap();
        assert!(loader.is_cancelled());
        assert_eq!(source.reads.get(), 1);
        assert!(loaded.clips.is_empty());
    }

    #[test]
    fn test_second_install_ignored() {
        let (mut controller, _input) = loaded_controller();
        let loaded = pollster::block_on(controller.loader().load(&assets())).unwrap();
        controller.transition(ACCEPT);

        assert!(controller.install(loaded).is_some());
        assert_eq!(controller.current_state().as_deref(), Some(ACCEPT));
    }

    #[test]
    fn test_observer_registered_before_load() {
        let input = Rc::new(InputSource::with_default_channels());
        let mut controller = CharacterController::new(ControllerConfig::default(), input.clone());
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        controller.on_state_change(move |change| {
            sink.borrow_mut().push((change.from.clone(), change.to.clone()))
        });

        pollster::block_on(controller.load(&assets()));
        input.trigger_event(REJECT_CHANNEL);

        assert_eq!(
            *changes.borrow(),
            vec![(IDLE.to_string(), REJECT.to_string())]
        );
    }

    #[test]
    fn test_physics_moves_model() {
        let input = Rc::new(InputSource::with_default_channels());
        let config = ControllerConfig::default().with_physics(PhysicsConfig {
            acceleration: Vec3::new(1.0, 1.0, 10.0),
            deceleration: Vec3::ZERO,
        });
        let mut controller = CharacterController::new(config, input);
        pollster::block_on(controller.load(&assets()));

        controller.accelerate(Vec3::Z, 0.1);
        controller.update(0.5);

        assert_relative_eq!(controller.transform().position.z, 0.5, epsilon = 1e-5);
        assert_eq!(
            controller.model().unwrap().transform.position,
            controller.transform().position
        );
    }

    #[test]
    fn test_material_map_and_attach_once() {
        struct Scene {
            attached: Vec<String>,
        }
        impl SceneContainer for Scene {
            fn attach(&mut self, model: &ModelRoot) {
                self.attached.push(model.name.clone());
            }
        }

        let (mut controller, _input) = loaded_controller();
        let materials = controller.material_map().unwrap();
        assert!(materials.contains_key("Shirt"));

        let mut scene = Scene { attached: vec![] };
        assert!(controller.attach_to(&mut scene));
        assert!(!controller.attach_to(&mut scene));
        assert_eq!(scene.attached, vec!["tutor".to_string()]);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let (mut controller, input) = loaded_controller();
        assert_eq!(input.subscriber_count(ACCEPT_CHANNEL), 1);

        controller.dispose();
        controller.dispose();

        assert!(controller.is_disposed());
        assert!(!controller.is_ready());
        assert_eq!(input.subscriber_count(ACCEPT_CHANNEL), 0);
        assert_eq!(controller.current_state(), None);

        // Everything afterwards is a no-op
        input.trigger_event(ACCEPT_CHANNEL);
        controller.update(0.1);
        controller.accelerate(Vec3::Z, 1.0);
        assert!(!controller.transition(ACCEPT));
        assert!(controller.physics().is_at_rest());
    }

    #[test]
    fn test_drop_releases_subscriptions() {
        let (controller, input) = loaded_controller();
        drop(controller);
        assert_eq!(input.subscriber_count(ACCEPT_CHANNEL), 0);
        assert_eq!(input.subscriber_count(REJECT_CHANNEL), 0);
    }
}
