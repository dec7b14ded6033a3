use anyhow::{Context, Result};
use avatar_control::engine::assets::FileSource;
use avatar_control::engine::game_loop::FrameClock;
use avatar_control::engine::input::{InputSource, KeyBindings};
use avatar_control::game::character::{CharacterController, ControllerConfig};
use glam::Vec3;
use log::{error, info};
use std::rc::Rc;
use winit::{
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("Starting avatar control demo...");

    let config = match std::env::args().nth(1) {
        Some(path) => ControllerConfig::load(&path)
            .with_context(|| format!("Failed to load controller config from {path}"))?,
        None => ControllerConfig::default(),
    };

    let input = Rc::new(InputSource::with_default_channels());
    let bindings = KeyBindings::default();

    let mut controller = CharacterController::new(config, input.clone());
    controller.on_error(|message| error!("Character: {}", message));
    controller.on_state_change(|change| info!("State {} -> {}", change.from, change.to));

    // Loading happens once before the frame loop starts
    let loader = controller.loader();
    let loaded = pollster::block_on(loader.load(&FileSource));
    if let Some(model) = controller.handle_load_result(loaded) {
        info!("Loaded model '{}' with {} materials", model.name, model.materials().len());
    }

    let event_loop = EventLoop::new()?;
    let window = WindowBuilder::new()
        .with_title("Avatar Control")
        .with_inner_size(winit::dpi::LogicalSize::new(1280, 720))
        .with_resizable(true)
        .build(&event_loop)?;

    info!("Window created successfully");

    let mut clock = FrameClock::new();
    let mut forward = 0.0_f32;

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                ..
            } => {
                info!("Close requested, shutting down...");
                controller.dispose();
                elwt.exit();
            }
            Event::WindowEvent {
                event:
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                physical_key: PhysicalKey::Code(code),
                                state,
                                repeat,
                                ..
                            },
                        ..
                    },
                ..
            } => {
                if bindings.handle_key(code, state, repeat, &input) {
                    return;
                }
                match (code, state) {
                    (KeyCode::ArrowUp, ElementState::Pressed) => forward = 1.0,
                    (KeyCode::ArrowDown, ElementState::Pressed) => forward = -1.0,
                    (KeyCode::ArrowUp | KeyCode::ArrowDown, ElementState::Released) => forward = 0.0,
                    (KeyCode::KeyP, ElementState::Pressed) if !repeat => clock.toggle_pause(),
                    _ => {}
                }
            }
            Event::WindowEvent {
                event: WindowEvent::RedrawRequested,
                ..
            } => {
                let dt = clock.tick();
                controller.accelerate(Vec3::new(0.0, 0.0, forward), dt);
                controller.update(dt);

                if clock.frame_count() % 600 == 0 {
                    info!(
                        "{:.0} fps, state {:?}, position {:?}",
                        clock.fps(),
                        controller.current_state(),
                        controller.transform().position
                    );
                }
            }
            Event::AboutToWait => {
                window.request_redraw();
            }
            _ => {}
        })
        .map_err(|e| anyhow::anyhow!("Event loop error: {}", e))?;

    Ok(())
}
