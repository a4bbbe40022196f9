//! Render loop state machine and tick-source selection
//!
//! The loop itself is driven by host callbacks; this module owns the
//! liveness state and the startup choice between per-decoded-frame ticks
//! and display-refresh ticks.

use tracing::debug;

/// Liveness of the render loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// Which host callback drives the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickSource {
    /// One tick per decoded video frame. Skips duplicate frames and saves
    /// power; preferred when the platform supports it.
    VideoFrames,
    /// One tick per display refresh. Fallback.
    DisplayRefresh,
}

/// Host capability probe used once at startup.
pub trait SchedulerProbe {
    fn supports_video_frame_callbacks(&self) -> bool;
}

/// Pick the tick source for this platform.
pub fn select_tick_source(probe: &dyn SchedulerProbe) -> TickSource {
    if probe.supports_video_frame_callbacks() {
        TickSource::VideoFrames
    } else {
        TickSource::DisplayRefresh
    }
}

/// Gates scheduled draw callbacks on a liveness flag.
///
/// Starts `Running`. After [`stop`](Self::stop) no draw runs, even for a
/// callback that was already queued before the stop request.
pub struct RenderLoop {
    state: LoopState,
    source: TickSource,
}

impl RenderLoop {
    pub fn new(source: TickSource) -> Self {
        Self {
            state: LoopState::Running,
            source,
        }
    }

    pub fn source(&self) -> TickSource {
        self.source
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    /// Stop the loop. Synchronous, idempotent, and effective before the
    /// next scheduled callback fires.
    pub fn stop(&mut self) {
        if self.state == LoopState::Running {
            debug!("render loop stopped");
        }
        self.state = LoopState::Stopped;
    }

    /// Run one scheduled tick. Invokes `draw` only while running; returns
    /// whether the caller should schedule another tick.
    pub fn tick(&mut self, draw: impl FnOnce()) -> bool {
        match self.state {
            LoopState::Stopped => false,
            LoopState::Running => {
                draw();
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe(bool);

    impl SchedulerProbe for Probe {
        fn supports_video_frame_callbacks(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn test_prefers_video_frame_callbacks() {
        assert_eq!(select_tick_source(&Probe(true)), TickSource::VideoFrames);
        assert_eq!(
            select_tick_source(&Probe(false)),
            TickSource::DisplayRefresh
        );
    }

    #[test]
    fn test_starts_running_and_draws() {
        let mut rl = RenderLoop::new(TickSource::VideoFrames);
        assert!(rl.is_running());

        let mut draws = 0;
        assert!(rl.tick(|| draws += 1));
        assert!(rl.tick(|| draws += 1));
        assert_eq!(draws, 2);
    }

    #[test]
    fn test_queued_tick_after_stop_does_not_draw() {
        let mut rl = RenderLoop::new(TickSource::DisplayRefresh);
        let mut draws = 0;
        rl.tick(|| draws += 1);

        // A callback queued before the stop request still fires, but must
        // neither draw nor reschedule.
        rl.stop();
        assert!(!rl.tick(|| draws += 1));
        assert_eq!(draws, 1);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut rl = RenderLoop::new(TickSource::VideoFrames);
        rl.stop();
        rl.stop();
        assert_eq!(rl.state(), LoopState::Stopped);
        assert!(!rl.tick(|| panic!("draw after stop")));
    }
}
