// Game layer: characters built on top of the engine modules

pub mod character;
