// Character state machine
//
// States are data, not types: a table maps each state name to the clip it
// plays, the states it may move to, and optional lifecycle hooks. A single
// executor drives every state the same way.

use super::animation::{AnimationDirector, LoopMode, PlayOptions, DEFAULT_CROSSFADE};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Instant;

/// Resting state, loops forever
pub const IDLE: &str = "idle";
/// Positive reaction, plays once then returns to idle
pub const ACCEPT: &str = "accept";
/// Negative reaction, plays once then returns to idle
pub const REJECT: &str = "reject";

/// Passed to lifecycle hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateEvent<'a> {
    /// The state the hook belongs to
    pub state: &'a str,
    /// State being left (for enter hooks, the previous state)
    pub from: Option<&'a str>,
    /// State being entered (for exit hooks, the next state)
    pub to: Option<&'a str>,
}

/// Hook fired when a state is entered or exited
pub type StateHook = Rc<dyn Fn(&StateEvent<'_>)>;

/// Hook fired once when a state completes; returns the state to move to next
pub type CompletionHook = Rc<dyn Fn(&StateEvent<'_>) -> Option<String>>;

/// Reported to the global observer after every successful transition
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub from: String,
    pub to: String,
    pub timestamp: Instant,
}

/// State table validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateTableError {
    #[error("State table has no states")]
    Empty,

    #[error("Initial state '{0}' is not registered")]
    UnknownInitialState(String),

    #[error("State '{0}' registered twice")]
    DuplicateState(String),

    #[error("State '{from}' lists unknown next state '{to}'")]
    UnknownTarget { from: String, to: String },
}

/// Static description of one state
#[derive(Clone)]
pub struct StateDefinition {
    name: String,
    bound_animation: String,
    legal_next: HashSet<String>,
    duration_override: Option<f32>,
    crossfade: f32,
    on_enter: Option<StateHook>,
    on_exit: Option<StateHook>,
    on_complete: Option<CompletionHook>,
}

impl StateDefinition {
    /// A state named `name` that plays the clip `bound_animation`
    pub fn new(name: &str, bound_animation: &str) -> Self {
        Self {
            name: name.to_string(),
            bound_animation: bound_animation.to_string(),
            legal_next: HashSet::new(),
            duration_override: None,
            crossfade: DEFAULT_CROSSFADE,
            on_enter: None,
            on_exit: None,
            on_complete: None,
        }
    }

    /// Allow a transition to `next`
    pub fn to(mut self, next: &str) -> Self {
        self.legal_next.insert(next.to_string());
        self
    }

    /// Allow transitions to every state in `next`
    pub fn with_transitions(mut self, next: &[&str]) -> Self {
        self.legal_next
            .extend(next.iter().map(|name| name.to_string()));
        self
    }

    /// Complete after a fixed time instead of when the clip ends
    pub fn with_duration(mut self, seconds: f32) -> Self {
        self.duration_override = Some(seconds.max(0.0));
        self
    }

    /// Crossfade used when entering this state
    pub fn with_crossfade(mut self, seconds: f32) -> Self {
        self.crossfade = seconds.max(0.0);
        self
    }

    pub fn on_enter<F: Fn(&StateEvent<'_>) + 'static>(mut self, hook: F) -> Self {
        self.on_enter = Some(Rc::new(hook));
        self
    }

    pub fn on_exit<F: Fn(&StateEvent<'_>) + 'static>(mut self, hook: F) -> Self {
        self.on_exit = Some(Rc::new(hook));
        self
    }

    pub fn on_complete<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StateEvent<'_>) -> Option<String> + 'static,
    {
        self.on_complete = Some(Rc::new(hook));
        self
    }

    /// Automatically move to `next` when this state completes
    pub fn returns_to(self, next: &str) -> Self {
        let next = next.to_string();
        self.to(&next).on_complete(move |_| Some(next.clone()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bound_animation(&self) -> &str {
        &self.bound_animation
    }

    pub fn legal_next_states(&self) -> &HashSet<String> {
        &self.legal_next
    }

    pub fn allows(&self, next: &str) -> bool {
        self.legal_next.contains(next)
    }

    pub fn duration_override(&self) -> Option<f32> {
        self.duration_override
    }

    pub fn crossfade(&self) -> f32 {
        self.crossfade
    }
}

impl std::fmt::Debug for StateDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateDefinition")
            .field("name", &self.name)
            .field("bound_animation", &self.bound_animation)
            .field("legal_next", &self.legal_next)
            .field("duration_override", &self.duration_override)
            .field("crossfade", &self.crossfade)
            .field("on_enter", &self.on_enter.is_some())
            .field("on_exit", &self.on_exit.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// The set of states a machine is built from
#[derive(Debug, Clone)]
pub struct StateTable {
    initial: String,
    states: Vec<StateDefinition>,
}

impl StateTable {
    pub fn new(initial: &str) -> Self {
        Self {
            initial: initial.to_string(),
            states: Vec::new(),
        }
    }

    pub fn with_state(mut self, state: StateDefinition) -> Self {
        self.states.push(state);
        self
    }

    /// `idle → {accept, reject}`, `accept → {idle}`, `reject → {idle}`.
    ///
    /// Idle loops; accept and reject play once and return to idle.
    pub fn reactions() -> Self {
        Self::new(IDLE)
            .with_state(StateDefinition::new(IDLE, IDLE).with_transitions(&[ACCEPT, REJECT]))
            .with_state(StateDefinition::new(ACCEPT, ACCEPT).returns_to(IDLE))
            .with_state(StateDefinition::new(REJECT, REJECT).returns_to(IDLE))
    }

    pub fn initial_state(&self) -> &str {
        &self.initial
    }

    /// Set the state the machine starts in
    pub fn starting_in(mut self, initial: &str) -> Self {
        self.initial = initial.to_string();
        self
    }

    pub fn state(&self, name: &str) -> Option<&StateDefinition> {
        self.states.iter().find(|state| state.name == name)
    }

    pub fn states(&self) -> &[StateDefinition] {
        &self.states
    }

    /// Every clip the table's states play
    pub fn bound_animations(&self) -> Vec<&str> {
        let mut clips: Vec<&str> = self
            .states
            .iter()
            .map(|state| state.bound_animation.as_str())
            .collect();
        clips.sort_unstable();
        clips.dedup();
        clips
    }

    /// Check that the initial state and every transition target exist
    pub fn validate(&self) -> Result<(), StateTableError> {
        if self.states.is_empty() {
            return Err(StateTableError::Empty);
        }

        let mut names = HashSet::new();
        for state in &self.states {
            if !names.insert(state.name.as_str()) {
                return Err(StateTableError::DuplicateState(state.name.clone()));
            }
        }

        if !names.contains(self.initial.as_str()) {
            return Err(StateTableError::UnknownInitialState(self.initial.clone()));
        }

        for state in &self.states {
            if let Some(to) = state.legal_next.iter().find(|to| !names.contains(to.as_str())) {
                return Err(StateTableError::UnknownTarget {
                    from: state.name.clone(),
                    to: to.clone(),
                });
            }
        }

        Ok(())
    }
}

impl Default for StateTable {
    fn default() -> Self {
        Self::reactions()
    }
}

/// Drives legal, animation-bound state transitions.
///
/// Owns the character's [`AnimationDirector`]; entering a state crossfades to
/// its bound clip. `update` must run once per frame before the director
/// advances so completions are acted on in the same frame.
pub struct StateMachine {
    states: HashMap<String, StateDefinition>,
    current: String,
    previous: Option<String>,
    is_transitioning: bool,
    /// Completion already handled for the current entry
    completed: bool,
    director: AnimationDirector,
    on_state_change: Option<Box<dyn FnMut(&StateChange)>>,
    disposed: bool,
}

impl StateMachine {
    /// Build a machine from a validated table and enter its initial state
    pub fn new(table: StateTable, director: AnimationDirector) -> Result<Self, StateTableError> {
        table.validate()?;

        let StateTable { initial, states } = table;
        let states = states
            .into_iter()
            .map(|state| (state.name.clone(), state))
            .collect();

        let mut machine = Self {
            states,
            current: initial,
            previous: None,
            is_transitioning: false,
            completed: false,
            director,
            on_state_change: None,
            disposed: false,
        };
        machine.enter_initial();

        Ok(machine)
    }

    fn enter_initial(&mut self) {
        let Some(state) = self.states.get(&self.current) else {
            return;
        };
        let bound = state.bound_animation.clone();
        let hook = state.on_enter.clone();

        self.director.play(&bound, PlayOptions::immediate());
        if let Some(hook) = hook {
            hook(&StateEvent {
                state: &self.current,
                from: None,
                to: None,
            });
        }

        info!("State machine started in '{}'", self.current);
    }

    /// Register the global observer called after every successful transition
    pub fn on_state_change<F: FnMut(&StateChange) + 'static>(&mut self, observer: F) {
        self.on_state_change = Some(Box::new(observer));
    }

    pub fn current_state(&self) -> &str {
        &self.current
    }

    pub fn previous_state(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    pub fn is_transitioning(&self) -> bool {
        self.is_transitioning
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn state(&self, name: &str) -> Option<&StateDefinition> {
        self.states.get(name)
    }

    pub fn director(&self) -> &AnimationDirector {
        &self.director
    }

    pub fn director_mut(&mut self) -> &mut AnimationDirector {
        &mut self.director
    }

    /// Check whether `to` is a legal next state right now. No side effects.
    pub fn can_transition(&self, to: &str) -> bool {
        if self.disposed || self.is_transitioning || to == self.current {
            return false;
        }

        self.states.contains_key(to)
            && self
                .states
                .get(&self.current)
                .is_some_and(|state| state.allows(to))
    }

    /// Move to `to` if legal. Returns false, without side effects, otherwise.
    pub fn transition(&mut self, to: &str) -> bool {
        if self.disposed {
            return false;
        }
        if self.is_transitioning {
            warn!("Transition to '{}' rejected: already transitioning", to);
            return false;
        }
        if to == self.current {
            debug!("Self-transition to '{}' rejected", to);
            return false;
        }
        if !self.can_transition(to) {
            debug!("Illegal transition '{}' -> '{}' rejected", self.current, to);
            return false;
        }

        self.is_transitioning = true;
        let from = self.current.clone();

        if let Some(hook) = self.states.get(&from).and_then(|s| s.on_exit.clone()) {
            hook(&StateEvent {
                state: &from,
                from: Some(&from),
                to: Some(to),
            });
        }

        let (bound, crossfade, enter_hook) = match self.states.get(to) {
            Some(state) => (
                state.bound_animation.clone(),
                state.crossfade,
                state.on_enter.clone(),
            ),
            None => {
                self.is_transitioning = false;
                return false;
            }
        };

        if self
            .director
            .play(&bound, PlayOptions::default().with_crossfade(crossfade))
            .is_none()
        {
            warn!("State '{}' entered without its clip '{}'", to, bound);
        }

        if let Some(hook) = enter_hook {
            hook(&StateEvent {
                state: to,
                from: Some(&from),
                to: Some(to),
            });
        }

        self.previous = Some(from.clone());
        self.current = to.to_string();
        self.completed = false;
        self.is_transitioning = false;

        debug!("State '{}' -> '{}'", from, to);

        if let Some(observer) = self.on_state_change.as_mut() {
            observer(&StateChange {
                from,
                to: to.to_string(),
                timestamp: Instant::now(),
            });
        }

        true
    }

    /// Whether `name` ends on its own (single-shot clip or fixed duration)
    pub fn has_completion(&self, name: &str) -> bool {
        self.states.get(name).is_some_and(|state| {
            state.duration_override.is_some()
                || self.director.loop_mode(&state.bound_animation) == Some(LoopMode::Once)
        })
    }

    /// How long `name` lasts: its override, otherwise its clip's duration
    pub fn state_duration(&self, name: &str) -> Option<f32> {
        let state = self.states.get(name)?;
        state
            .duration_override
            .or_else(|| self.director.get_duration(&state.bound_animation))
    }

    fn is_current_complete(&self) -> bool {
        let Some(state) = self.states.get(&self.current) else {
            return false;
        };
        let bound = &state.bound_animation;

        match state.duration_override {
            Some(duration) => {
                self.director.is_playing(bound)
                    && self.director.get_elapsed(bound).is_some_and(|elapsed| {
                        elapsed >= duration - self.director.finish_tolerance()
                    })
            }
            None => self.director.is_finished(bound),
        }
    }

    /// Per-frame completion check. Call before the director advances.
    pub fn update(&mut self) {
        if self.disposed || self.is_transitioning || self.completed {
            return;
        }
        if !self.has_completion(&self.current) || !self.is_current_complete() {
            return;
        }

        self.completed = true;
        let current = self.current.clone();
        debug!("State '{}' complete", current);

        let hook = self.states.get(&current).and_then(|s| s.on_complete.clone());
        let next = hook.and_then(|hook| {
            hook(&StateEvent {
                state: &current,
                from: self.previous.as_deref(),
                to: None,
            })
        });

        if let Some(next) = next {
            if !self.transition(&next) {
                warn!("Completion of '{}' could not move to '{}'", current, next);
            }
        }
    }

    /// Exit the current state and release the table and clips. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }

        if let Some(hook) = self.states.get(&self.current).and_then(|s| s.on_exit.clone()) {
            hook(&StateEvent {
                state: &self.current,
                from: Some(&self.current),
                to: None,
            });
        }

        self.states.clear();
        self.director.dispose();
        self.on_state_change = None;
        self.disposed = true;
        info!("State machine disposed in '{}'", self.current);
    }
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("current", &self.current)
            .field("previous", &self.previous)
            .field("is_transitioning", &self.is_transitioning)
            .field("states", &self.states.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}
