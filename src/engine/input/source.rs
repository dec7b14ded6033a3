// Input source - named event channels shared between the UI bridge and the character

use log::{debug, warn};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Channel raised when the player confirms / answers correctly
pub const ACCEPT: &str = "accept";
/// Channel raised when the player declines / answers wrong
pub const REJECT: &str = "reject";
/// Channel raised when the character should pay attention
pub const FOCUS: &str = "focus";

/// Channels every input source starts with by default
pub const DEFAULT_CHANNELS: [&str; 3] = [ACCEPT, REJECT, FOCUS];

/// Callback invoked with the name of the channel that fired
pub type InputCallback = Rc<dyn Fn(&str)>;

/// Identifies one subscription so it can be removed again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// State of a single channel
#[derive(Default)]
struct Channel {
    /// Set by `trigger_event`, cleared by the consumer
    active: bool,
    subscribers: Vec<(SubscriptionId, InputCallback)>,
}

/// Normalizes discrete user events into boolean channel flags plus subscriptions.
///
/// All methods take `&self` so the source can be shared as `Rc<InputSource>`
/// between the code that raises events and the code that consumes them.
/// Subscribers are free to call back into the source while being notified.
pub struct InputSource {
    channels: RefCell<HashMap<String, Channel>>,
    next_id: Cell<u64>,
}

impl InputSource {
    /// Create an input source with the given channel names
    pub fn new<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let channels = channels
            .into_iter()
            .map(|name| (name.into(), Channel::default()))
            .collect();

        Self {
            channels: RefCell::new(channels),
            next_id: Cell::new(0),
        }
    }

    /// Create an input source with `accept`, `reject` and `focus`
    pub fn with_default_channels() -> Self {
        Self::new(DEFAULT_CHANNELS)
    }

    /// Subscribe to a channel.
    ///
    /// Returns `None` (and logs a warning) if the channel does not exist.
    pub fn on<F>(&self, channel: &str, callback: F) -> Option<SubscriptionId>
    where
        F: Fn(&str) + 'static,
    {
        let mut channels = self.channels.borrow_mut();
        let Some(entry) = channels.get_mut(channel) else {
            warn!("Cannot subscribe to unknown input channel '{}'", channel);
            return None;
        };

        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        entry.subscribers.push((id, Rc::new(callback)));

        Some(id)
    }

    /// Remove a subscription. Returns true if it was found.
    pub fn off(&self, channel: &str, id: SubscriptionId) -> bool {
        let mut channels = self.channels.borrow_mut();
        let Some(entry) = channels.get_mut(channel) else {
            warn!("Cannot unsubscribe from unknown input channel '{}'", channel);
            return false;
        };

        let before = entry.subscribers.len();
        entry.subscribers.retain(|(sub, _)| *sub != id);
        before != entry.subscribers.len()
    }

    /// Set a channel's flag and synchronously notify every subscriber
    pub fn trigger_event(&self, channel: &str) {
        // Snapshot the subscribers so callbacks may re-enter the source
        let subscribers: Vec<InputCallback> = {
            let mut channels = self.channels.borrow_mut();
            let Some(entry) = channels.get_mut(channel) else {
                warn!("Ignoring event on unknown input channel '{}'", channel);
                return;
            };
            entry.active = true;
            entry.subscribers.iter().map(|(_, cb)| cb.clone()).collect()
        };

        debug!(
            "Input '{}' triggered ({} subscribers)",
            channel,
            subscribers.len()
        );

        for callback in subscribers {
            callback(channel);
        }
    }

    /// Clear a single channel's flag
    pub fn reset_input(&self, channel: &str) {
        match self.channels.borrow_mut().get_mut(channel) {
            Some(entry) => entry.active = false,
            None => warn!("Cannot reset unknown input channel '{}'", channel),
        }
    }

    /// Clear every channel's flag
    pub fn reset(&self) {
        for entry in self.channels.borrow_mut().values_mut() {
            entry.active = false;
        }
    }

    /// Check whether a channel's flag is currently set
    pub fn is_active(&self, channel: &str) -> bool {
        self.channels
            .borrow()
            .get(channel)
            .map(|entry| entry.active)
            .unwrap_or(false)
    }

    /// Check whether a channel exists
    pub fn has_channel(&self, channel: &str) -> bool {
        self.channels.borrow().contains_key(channel)
    }

    /// Names of all registered channels
    pub fn channels(&self) -> Vec<String> {
        self.channels.borrow().keys().cloned().collect()
    }

    /// Number of subscribers on a channel (0 for unknown channels)
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .borrow()
            .get(channel)
            .map(|entry| entry.subscribers.len())
            .unwrap_or(0)
    }
}

impl Default for InputSource {
    fn default() -> Self {
        Self::with_default_channels()
    }
}

impl std::fmt::Debug for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let channels = self.channels.borrow();
        let mut map = f.debug_map();
        for (name, entry) in channels.iter() {
            map.entry(name, &entry.active);
        }
        map.finish()
    }
}
