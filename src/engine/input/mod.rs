// Input handling system
//
// This module decouples physical input from gameplay semantics.
//
// ## Architecture
//
// - `source`: Named boolean channels with synchronous subscriptions
// - `bindings`: Optional keyboard bridge mapping winit keys to channels
//
// ## Usage Example
//
// ```rust
// use avatar_control::engine::input::{InputSource, ACCEPT};
//
// let input = std::rc::Rc::new(InputSource::with_default_channels());
// input.on(ACCEPT, |channel| println!("{channel} fired"));
//
// // From a button handler
// input.trigger_event(ACCEPT);
//
// // Consumers clear the flag once they acted on it
// input.reset_input(ACCEPT);
// ```

pub mod bindings;
pub mod source;

// Re-export commonly used types
pub use bindings::KeyBindings;
pub use source::{InputSource, SubscriptionId, ACCEPT, DEFAULT_CHANNELS, FOCUS, REJECT};
