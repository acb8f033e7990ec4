//! Frame-paced execution engine.
//!
//! Runs no instructions: it advances each CPU's cycle counter a frame at a
//! time and drives the session's frame loop, with one partial update per
//! interleave slice so raster effects are exercised.

use marquee_core::driver::MachineConfig;
use marquee_core::host::{CpuEngine, FrameControl, FrameSink, HostError, RunOutcome};
use marquee_core::video::Rect;
use tracing::{debug, trace};

/// Slices each frame is cut into.
const INTERLEAVE: i32 = 4;

pub struct FrameClock {
    frame_limit: Option<u64>,
    reset_after: Option<u64>,
    cpu_clocks: Vec<u32>,
    cycles: Vec<u64>,
    frames_per_second: f64,
    cycles_per_scanline: Vec<u64>,
    timed_area: Option<Rect>,
    timers_armed: bool,
    refresh_armed: bool,
    frames: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            frame_limit: None,
            reset_after: None,
            cpu_clocks: Vec::new(),
            cycles: Vec::new(),
            frames_per_second: 60.0,
            cycles_per_scanline: Vec::new(),
            timed_area: None,
            timers_armed: false,
            refresh_armed: false,
            frames: 0,
        }
    }

    /// Quit after `frames` frames.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Soft-reset the machine after `frames` frames of the first run.
    pub fn with_reset_after(mut self, frames: u64) -> Self {
        self.reset_after = Some(frames);
        self
    }

    /// Frames emulated since the last `init`.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Cycles each CPU has run since the last `init`.
    pub fn cycles(&self) -> &[u64] {
        &self.cycles
    }

    pub fn cycles_per_scanline(&self) -> &[u64] {
        &self.cycles_per_scanline
    }

    /// Change the visible area through `frame`, retiming scanlines when the
    /// area actually moved.
    pub fn change_visible_area(&mut self, frame: &mut dyn FrameSink, area: Rect) {
        if frame.set_visible_area(area) {
            self.compute_scanline_timing(&frame.visible_area());
        }
    }
}

fn cycles_per_frame(clock: u32, frames_per_second: f64) -> u64 {
    if frames_per_second <= 0.0 {
        return 0;
    }
    (f64::from(clock) / frames_per_second) as u64
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuEngine for FrameClock {
    fn init_timers(&mut self) {
        self.timers_armed = true;
    }

    fn init_refresh_timer(&mut self) {
        self.refresh_armed = true;
    }

    fn init(&mut self, config: &MachineConfig) -> Result<(), HostError> {
        if !self.timers_armed {
            return Err(HostError::failed("timers not initialised"));
        }
        self.cpu_clocks = config.cpus.iter().map(|slot| slot.kind.clock).collect();
        self.cycles = vec![0; self.cpu_clocks.len()];
        self.frames_per_second = config.frames_per_second;
        self.frames = 0;
        debug!(cpus = self.cpu_clocks.len(), fps = self.frames_per_second, "execution engine ready");
        Ok(())
    }

    fn exit(&mut self) {
        self.cpu_clocks.clear();
        self.cycles.clear();
        self.cycles_per_scanline.clear();
        self.timed_area = None;
        self.timers_armed = false;
        self.refresh_armed = false;
    }

    fn compute_scanline_timing(&mut self, visible_area: &Rect) {
        let lines = visible_area.height().max(1) as u64;
        let fps = self.frames_per_second;
        self.cycles_per_scanline = self
            .cpu_clocks
            .iter()
            .map(|&clock| cycles_per_frame(clock, fps) / lines)
            .collect();
        self.timed_area = Some(*visible_area);
        trace!(lines, "scanline timing updated");
    }

    fn run(&mut self, frame: &mut dyn FrameSink) -> RunOutcome {
        let reset_at = self.reset_after.take();
        loop {
            frame.begin_frame();
            if !frame.is_paused() {
                let area = frame.visible_area();
                if self.timed_area != Some(area) {
                    self.compute_scanline_timing(&area);
                }
                let rows = area.height().max(1);
                for slice in 1..INTERLEAVE {
                    frame.partial_update(area.min_y + rows * slice / INTERLEAVE - 1);
                }
                let fps = self.frames_per_second;
                for (cycles, &clock) in self.cycles.iter_mut().zip(&self.cpu_clocks) {
                    *cycles += cycles_per_frame(clock, fps);
                }
            }

            if frame.end_frame() == FrameControl::Quit {
                return RunOutcome::Quit;
            }
            self.frames += 1;

            if reset_at.is_some_and(|limit| self.frames >= limit) {
                debug!(frames = self.frames, "soft reset");
                return RunOutcome::Reset;
            }
            if self.frame_limit.is_some_and(|limit| self.frames >= limit) {
                return RunOutcome::Quit;
            }
        }
    }
}
