/// Frame timing for the render loop
///
/// Produces one variable delta per frame for `CharacterController::update`.
/// Long frames (a stalled window, a debugger break) are clamped so animation
/// and motion never jump by more than `MAX_FRAME_DELTA`.
use std::time::{Duration, Instant};

/// Largest delta handed out for a single frame, in seconds
pub const MAX_FRAME_DELTA: f32 = 0.1;

/// FPS tracking window (average over last N frames)
const FPS_WINDOW_SIZE: usize = 60;

/// Frame clock state
pub struct FrameClock {
    /// Time of last frame
    last_frame_time: Instant,

    /// Time when the clock started
    start_time: Instant,

    paused: bool,

    /// Frame timing history for FPS calculation
    frame_times: Vec<Duration>,

    frame_count: u64,

    current_fps: f32,

    /// Delta handed out by the last tick, after clamping and pausing
    delta: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_frame_time: now,
            start_time: now,
            paused: false,
            frame_times: Vec::with_capacity(FPS_WINDOW_SIZE),
            frame_count: 0,
            current_fps: 0.0,
            delta: 0.0,
        }
    }

    /// Begin a new frame from the wall clock, returning its delta in seconds
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let frame_time = now.duration_since(self.last_frame_time);
        self.last_frame_time = now;
        self.advance(frame_time)
    }

    /// Begin a new frame of a known length
    pub fn advance(&mut self, frame_time: Duration) -> f32 {
        self.frame_count += 1;

        self.frame_times.push(frame_time);
        if self.frame_times.len() > FPS_WINDOW_SIZE {
            self.frame_times.remove(0);
        }

        // Update FPS counter every 10 frames
        if self.frame_count % 10 == 0 {
            self.update_fps();
        }

        self.delta = if self.paused {
            0.0
        } else {
            frame_time.as_secs_f32().min(MAX_FRAME_DELTA)
        };
        self.delta
    }

    /// Delta handed out by the last tick, in seconds
    pub fn delta(&self) -> f32 {
        self.delta
    }

    pub fn fps(&self) -> f32 {
        self.current_fps
    }

    /// Total elapsed wall time since start
    pub fn elapsed(&self) -> Duration {
        Instant::now().duration_since(self.start_time)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Pause: frames keep counting but hand out a zero delta
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            log::info!("Frame clock paused");
        }
    }

    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            // Don't hand the paused span to the next frame
            self.last_frame_time = Instant::now();
            log::info!("Frame clock resumed");
        }
    }

    pub fn toggle_pause(&mut self) {
        if self.paused {
            self.resume();
        } else {
            self.pause();
        }
    }

    fn update_fps(&mut self) {
        if self.frame_times.is_empty() {
            self.current_fps = 0.0;
            return;
        }

        let total: Duration = self.frame_times.iter().sum();
        let avg_frame_time = total / self.frame_times.len() as u32;

        self.current_fps = if avg_frame_time.as_secs_f32() > 0.0 {
            1.0 / avg_frame_time.as_secs_f32()
        } else {
            0.0
        };
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::thread;

    #[test]
    fn test_clock_creation() {
        let clock = FrameClock::new();
        assert_eq!(clock.frame_count(), 0);
        assert_eq!(clock.delta(), 0.0);
        assert!(!clock.is_paused());
    }

    #[test]
    fn test_advance_returns_delta() {
        let mut clock = FrameClock::new();
        let dt = clock.advance(Duration::from_millis(16));
        assert_relative_eq!(dt, 0.016, epsilon = 1e-6);
        assert_relative_eq!(clock.delta(), 0.016, epsilon = 1e-6);
    }

    #[test]
    fn test_long_frame_is_clamped() {
        let mut clock = FrameClock::new();
        let dt = clock.advance(Duration::from_millis(300));
        assert_eq!(dt, MAX_FRAME_DELTA);
    }

    #[test]
    fn test_paused_gives_zero_delta() {
        let mut clock = FrameClock::new();
        clock.pause();

        assert_eq!(clock.advance(Duration::from_millis(16)), 0.0);
        assert_eq!(clock.frame_count(), 1);

        clock.resume();
        assert!(clock.advance(Duration::from_millis(16)) > 0.0);
    }

    #[test]
    fn test_toggle_pause() {
        let mut clock = FrameClock::new();
        clock.toggle_pause();
        assert!(clock.is_paused());
        clock.toggle_pause();
        assert!(!clock.is_paused());
    }

    #[test]
    fn test_fps_average() {
        let mut clock = FrameClock::new();
        for _ in 0..10 {
            clock.advance(Duration::from_millis(20));
        }
        assert_relative_eq!(clock.fps(), 50.0, epsilon = 0.01);
    }

    #[test]
    fn test_tick_measures_wall_time() {
        let mut clock = FrameClock::new();
        thread::sleep(Duration::from_millis(10));
        let dt = clock.tick();
        assert!(dt >= 0.01 && dt <= MAX_FRAME_DELTA);
        assert!(clock.elapsed() >= Duration::from_millis(10));
    }
}
