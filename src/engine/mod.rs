// Engine modules: assets, input, frame timing

pub mod assets;
pub mod game_loop;
pub mod input;
