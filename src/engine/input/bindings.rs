// Keyboard bindings - maps physical keys onto input channels

use super::source::{InputSource, ACCEPT, FOCUS, REJECT};
use std::collections::HashMap;
use winit::event::ElementState;
use winit::keyboard::KeyCode;

/// Default keyboard bindings
pub fn default_bindings() -> Vec<(KeyCode, &'static str)> {
    vec![
        (KeyCode::Enter, ACCEPT),
        (KeyCode::KeyY, ACCEPT),
        (KeyCode::Backspace, REJECT),
        (KeyCode::KeyN, REJECT),
        (KeyCode::Tab, FOCUS),
        (KeyCode::KeyF, FOCUS),
    ]
}

/// Maps keys to channel names.
///
/// The mapping is entirely the caller's concern; the character never looks at
/// keys, only at the channels they raise.
#[derive(Debug, Clone)]
pub struct KeyBindings {
    bindings: HashMap<KeyCode, String>,
}

impl KeyBindings {
    /// Create an empty set of bindings
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    /// Create bindings from a list of (key, channel) pairs
    pub fn from_bindings<S: Into<String>>(bindings: Vec<(KeyCode, S)>) -> Self {
        let mut result = Self::new();
        for (key, channel) in bindings {
            result.bind(key, channel);
        }
        result
    }

    /// Bind a key to a channel, replacing any previous binding for that key
    pub fn bind(&mut self, key: KeyCode, channel: impl Into<String>) {
        self.bindings.insert(key, channel.into());
    }

    /// Remove the binding for a key
    pub fn unbind(&mut self, key: KeyCode) {
        self.bindings.remove(&key);
    }

    /// Get the channel bound to a key
    pub fn channel_for(&self, key: KeyCode) -> Option<&str> {
        self.bindings.get(&key).map(String::as_str)
    }

    /// All keys bound to a channel
    pub fn keys_for(&self, channel: &str) -> Vec<KeyCode> {
        self.bindings
            .iter()
            .filter(|(_, bound)| bound.as_str() == channel)
            .map(|(key, _)| *key)
            .collect()
    }

    /// Forward a key event to the input source.
    ///
    /// Only fresh presses trigger; releases and key repeats are ignored.
    /// Returns true if an event was raised.
    pub fn handle_key(
        &self,
        key: KeyCode,
        state: ElementState,
        repeat: bool,
        input: &InputSource,
    ) -> bool {
        if state != ElementState::Pressed || repeat {
            return false;
        }

        match self.channel_for(key) {
            Some(channel) => {
                input.trigger_event(channel);
                true
            }
            None => false,
        }
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::from_bindings(default_bindings())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings() {
        let bindings = KeyBindings::default();
        assert_eq!(bindings.channel_for(KeyCode::Enter), Some(ACCEPT));
        assert_eq!(bindings.channel_for(KeyCode::Backspace), Some(REJECT));
        assert_eq!(bindings.channel_for(KeyCode::Tab), Some(FOCUS));
        assert_eq!(bindings.channel_for(KeyCode::Space), None);
    }

    #[test]
    fn test_no_duplicate_keys_in_defaults() {
        let mut seen = std::collections::HashSet::new();
        for (key, _) in default_bindings() {
            assert!(seen.insert(key), "Duplicate key found in default bindings");
        }
    }

    #[test]
    fn test_rebind() {
        let mut bindings = KeyBindings::default();
        bindings.bind(KeyCode::Enter, REJECT);
        assert_eq!(bindings.channel_for(KeyCode::Enter), Some(REJECT));

        bindings.unbind(KeyCode::Enter);
        assert_eq!(bindings.channel_for(KeyCode::Enter), None);
    }

    #[test]
    fn test_keys_for_channel() {
        let bindings = KeyBindings::default();
        let keys = bindings.keys_for(ACCEPT);
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&KeyCode::Enter));
        assert!(keys.contains(&KeyCode::KeyY));
    }

    #[test]
    fn test_handle_key_press_triggers() {
        let bindings = KeyBindings::default();
        let input = InputSource::default();

        assert!(bindings.handle_key(KeyCode::KeyN, ElementState::Pressed, false, &input));
        assert!(input.is_active(REJECT));
    }

    #[test]
    fn test_handle_key_ignores_release_and_repeat() {
        let bindings = KeyBindings::default();
        let input = InputSource::default();

        assert!(!bindings.handle_key(KeyCode::Enter, ElementState::Released, false, &input));
        assert!(!bindings.handle_key(KeyCode::Enter, ElementState::Pressed, true, &input));
        assert!(!bindings.handle_key(KeyCode::Space, ElementState::Pressed, false, &input));
        assert!(!input.is_active(ACCEPT));
    }
}
