// Character control core for an animated tutor avatar
//
// `engine` holds the reusable plumbing (asset sources, input channels,
// frame timing); `game` builds the character on top of it.

pub mod core;
pub mod engine;
pub mod game;
