//! Interfaces to the subsystems a session drives but does not own the
//! logic of: the platform layer, the CPU execution engine, memory, input,
//! palette, audio and the on-screen user interface.

use std::io;
use std::path::Path;

use thiserror::Error;

use crate::driver::{
    DriverDescriptor, InputPort, InputPortDef, MachineConfig, Rgb, VideoAttributes,
};
use crate::session::Orientation;
use crate::video::{Bitmap, GfxElement, Pen, Rect};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl HostError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// What the platform needs to create the output display.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayParams {
    pub width: u32,
    pub height: u32,
    pub depth: u8,
    /// Palette entries including the ones reserved for the UI.
    pub colors: u32,
    pub aspect: (u32, u32),
    pub frames_per_second: f64,
    pub video_attributes: VideoAttributes,
    pub orientation: Orientation,
}

/// What changed since the previous published frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameChanges {
    pub bitmap: bool,
    pub visible_area: bool,
    pub leds: bool,
}

/// One finished frame, handed to the platform for presentation.
pub struct DisplayFrame<'a> {
    pub bitmap: &'a Bitmap,
    pub visible_area: Rect,
    pub changes: FrameChanges,
    /// One bit per LED.
    pub led_state: u32,
    pub palette: &'a dyn Palette,
}

pub trait Platform {
    fn init(&mut self) -> Result<(), HostError>;
    fn exit(&mut self);

    fn create_display(&mut self, params: &DisplayParams) -> Result<(), HostError>;
    fn close_display(&mut self);

    fn enable_artwork(&mut self, _enable: bool) {}

    fn update_display(&mut self, frame: &DisplayFrame<'_>);

    /// Frame-skip decision for the frame in progress.
    fn skip_this_frame(&self) -> bool;

    fn pause(&mut self, paused: bool);
    fn sound_enable(&mut self, enable: bool);
}

// ---------------------------------------------------------------------------
// CPU execution engine
// ---------------------------------------------------------------------------

/// Why the execution engine returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Quit,
    /// Soft reset: tear the session down and start it again.
    Reset,
}

/// Whether the engine should keep running after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameControl {
    Continue,
    Quit,
}

pub trait CpuEngine {
    fn init_timers(&mut self);
    fn init_refresh_timer(&mut self);
    fn init(&mut self, config: &MachineConfig) -> Result<(), HostError>;
    fn exit(&mut self);

    /// Recompute per-scanline timing for a new visible area.
    fn compute_scanline_timing(&mut self, visible_area: &Rect);

    /// Emulate until the user quits or the machine resets.
    fn run(&mut self, frame: &mut dyn FrameSink) -> RunOutcome;
}

/// The session's side of the frame loop, as seen by the execution engine.
pub trait FrameSink {
    /// Start of a new frame.
    fn begin_frame(&mut self);

    /// Bring the frame up to date through `scanline`.
    fn partial_update(&mut self, scanline: i32);

    /// Change the visible area. On `true` the engine must recompute its
    /// scanline timing.
    fn set_visible_area(&mut self, area: Rect) -> bool;

    fn visible_area(&self) -> Rect;

    fn schedule_full_refresh(&mut self);

    fn set_led(&mut self, num: u32, on: bool);

    fn memory(&mut self) -> &mut dyn MemorySystem;

    /// Finish the frame: audio, remaining rows, UI, presentation.
    fn end_frame(&mut self) -> FrameControl;

    fn is_paused(&self) -> bool;
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

pub trait MemorySystem {
    /// Load every region of `driver`'s ROM set. Either all regions are
    /// loaded or none are.
    fn load_roms(&mut self, driver: &'static DriverDescriptor) -> Result<(), HostError>;

    /// Build the address maps.
    fn init(&mut self, config: &MachineConfig) -> Result<(), HostError>;
    fn shutdown(&mut self);

    fn region(&self, tag: &str) -> Option<&[u8]>;
    fn region_mut(&mut self, tag: &str) -> Option<&mut [u8]>;

    fn region_length(&self, tag: &str) -> usize {
        self.region(tag).map_or(0, <[u8]>::len)
    }

    fn free_regions(&mut self);

    /// Release one region early. Returns `false` if it was not loaded.
    fn dispose_region(&mut self, tag: &str) -> bool;

    fn reset_save_state(&mut self);
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

pub trait InputSystem {
    fn init_codes(&mut self) -> Result<(), HostError>;
    fn close_codes(&mut self);

    fn allocate_ports(&mut self, defs: &[InputPortDef]) -> Result<Vec<InputPort>, HostError>;
    fn free_ports(&mut self, ports: Vec<InputPort>);

    /// Apply persisted settings. Returns `true` if any were found.
    fn load_settings(
        &mut self,
        driver: &'static DriverDescriptor,
        live: &mut [InputPort],
        defaults: &mut [InputPort],
    ) -> bool;

    fn save_settings(
        &mut self,
        driver: &'static DriverDescriptor,
        live: &[InputPort],
        defaults: &[InputPort],
    );
}

// ---------------------------------------------------------------------------
// Palette
// ---------------------------------------------------------------------------

pub trait Palette {
    fn start(&mut self, config: &MachineConfig) -> Result<(), HostError>;

    /// Fill colours from the driver's PROMs. Runs after the display exists.
    fn init(&mut self, config: &MachineConfig, memory: &dyn MemorySystem) -> Result<(), HostError>;

    fn stop(&mut self);

    /// Whether gfx pens go through a colour lookup table.
    fn remapped_colortable(&self) -> bool;

    /// First of the two pens (background, foreground) reserved for the UI.
    fn ui_pen_base(&self) -> Pen;

    fn total_colors_with_ui(&self) -> u32;

    fn black_pen(&self) -> Pen;

    fn set_brightness(&mut self, brightness: f32);

    fn rgb(&self, pen: Pen) -> Rgb;
}

// ---------------------------------------------------------------------------
// Sound
// ---------------------------------------------------------------------------

pub trait SoundSystem {
    fn start(&mut self, config: &MachineConfig, sample_rate: u32) -> Result<(), HostError>;
    fn stop(&mut self);
    fn update(&mut self);
}

// ---------------------------------------------------------------------------
// User interface
// ---------------------------------------------------------------------------

/// Result of a blocking start-up screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Acknowledged,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiRequest {
    None,
    Quit,
    Pause(bool),
}

/// What the UI may draw into at the end of a frame.
pub struct UiOverlay<'a> {
    pub bitmap: &'a mut Bitmap,
    pub font: &'a GfxElement,
    pub paused: bool,
}

pub trait UserInterface {
    fn load_strings(&mut self, language_file: Option<&Path>) -> Result<(), HostError>;
    fn unload_strings(&mut self);

    fn show_copyright(&mut self, driver: &'static DriverDescriptor) -> Gate;
    fn show_warnings(&mut self, driver: &'static DriverDescriptor) -> Gate;

    fn init(&mut self, driver: &'static DriverDescriptor);

    /// Called once per frame, skipped or not.
    fn poll(&mut self, overlay: &mut UiOverlay<'_>) -> UiRequest;

    fn start_cheats(&mut self);
    fn stop_cheats(&mut self);

    /// A cheat was applied this session.
    fn cheated(&self) -> bool {
        false
    }
}

/// The collaborator set a controller runs sessions on.
pub struct Host {
    pub platform: Box<dyn Platform>,
    pub cpu: Box<dyn CpuEngine>,
    pub memory: Box<dyn MemorySystem>,
    pub input: Box<dyn InputSystem>,
    pub palette: Box<dyn Palette>,
    pub sound: Box<dyn SoundSystem>,
    pub ui: Box<dyn UserInterface>,
}
