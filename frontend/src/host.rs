//! Headless collaborators: no window, no audio device, no keyboard.
//!
//! Frames are converted to RGB as they are published so the last one can
//! be saved after the session has ended.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use marquee_core::driver::{DriverDescriptor, InputPort, InputPortDef, MachineConfig};
use marquee_core::host::{
    DisplayFrame, DisplayParams, Gate, HostError, InputSystem, Platform, SoundSystem, UiOverlay,
    UiRequest, UserInterface,
};
use marquee_core::video::font::{GLYPH_HEIGHT, draw_text};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// One published frame, cropped to the visible area, RGB24.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameCapture {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl FrameCapture {
    fn from_frame(frame: &DisplayFrame<'_>) -> Self {
        let area = frame.visible_area.intersect(&frame.bitmap.bounds());
        let mut rgb = Vec::with_capacity((area.width().max(0) * area.height().max(0) * 3) as usize);
        for y in area.min_y..=area.max_y {
            for x in area.min_x..=area.max_x {
                let (r, g, b) = frame.palette.rgb(frame.bitmap.pixel(x, y).unwrap_or(0));
                rgb.extend_from_slice(&[r, g, b]);
            }
        }
        Self {
            width: area.width().max(0) as u32,
            height: area.height().max(0) as u32,
            rgb,
        }
    }
}

pub type SharedCapture = Rc<RefCell<Option<FrameCapture>>>;

pub struct HeadlessPlatform {
    capture: SharedCapture,
    display: Option<DisplayParams>,
    frames: u64,
}

impl HeadlessPlatform {
    pub fn new(capture: SharedCapture) -> Self {
        Self {
            capture,
            display: None,
            frames: 0,
        }
    }
}

impl Platform for HeadlessPlatform {
    fn init(&mut self) -> Result<(), HostError> {
        debug!("headless platform up");
        Ok(())
    }

    fn exit(&mut self) {
        debug!(frames = self.frames, "headless platform down");
    }

    fn create_display(&mut self, params: &DisplayParams) -> Result<(), HostError> {
        info!(
            width = params.width,
            height = params.height,
            depth = params.depth,
            colors = params.colors,
            fps = params.frames_per_second,
            "display created"
        );
        self.display = Some(params.clone());
        Ok(())
    }

    fn close_display(&mut self) {
        self.display = None;
    }

    fn update_display(&mut self, frame: &DisplayFrame<'_>) {
        self.frames += 1;
        if frame.changes.bitmap || frame.changes.visible_area {
            *self.capture.borrow_mut() = Some(FrameCapture::from_frame(frame));
        }
        if frame.changes.leds {
            debug!(leds = frame.led_state, "LEDs changed");
        }
    }

    fn skip_this_frame(&self) -> bool {
        false
    }

    fn pause(&mut self, paused: bool) {
        debug!(paused, "pause");
    }

    fn sound_enable(&mut self, enable: bool) {
        debug!(enable, "sound output");
    }
}

// ---------------------------------------------------------------------------
// Sound
// ---------------------------------------------------------------------------

/// Accepts a sound configuration and produces nothing.
#[derive(Debug, Default)]
pub struct NullSound {
    updates: u64,
}

impl SoundSystem for NullSound {
    fn start(&mut self, config: &MachineConfig, sample_rate: u32) -> Result<(), HostError> {
        self.updates = 0;
        debug!(chips = config.sounds.len(), sample_rate, "sound started (silent)");
        Ok(())
    }

    fn stop(&mut self) {
        debug!(updates = self.updates, "sound stopped");
    }

    fn update(&mut self) {
        self.updates += 1;
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct PortSetting {
    value: u8,
    default: u8,
}

/// `cfg/<driver>.toml`: one table per port, keyed by port name.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
struct PortSettings {
    ports: BTreeMap<String, PortSetting>,
}

/// Ports hold their configured values; nothing drives them at run time.
pub struct PortInput {
    cfg_dir: PathBuf,
}

impl PortInput {
    pub fn new(cfg_dir: PathBuf) -> Self {
        Self { cfg_dir }
    }

    fn settings_path(&self, driver: &DriverDescriptor) -> PathBuf {
        self.cfg_dir.join(format!("{}.toml", driver.name))
    }

    fn read_settings(path: &Path) -> Option<PortSettings> {
        let text = fs::read_to_string(path).ok()?;
        match toml::from_str(&text) {
            Ok(settings) => Some(settings),
            Err(err) => {
                warn!(path = %path.display(), %err, "ignoring unreadable input settings");
                None
            }
        }
    }
}

impl InputSystem for PortInput {
    fn init_codes(&mut self) -> Result<(), HostError> {
        Ok(())
    }

    fn close_codes(&mut self) {}

    fn allocate_ports(&mut self, defs: &[InputPortDef]) -> Result<Vec<InputPort>, HostError> {
        Ok(defs.iter().map(InputPort::from).collect())
    }

    fn free_ports(&mut self, _ports: Vec<InputPort>) {}

    fn load_settings(
        &mut self,
        driver: &'static DriverDescriptor,
        live: &mut [InputPort],
        defaults: &mut [InputPort],
    ) -> bool {
        let Some(settings) = Self::read_settings(&self.settings_path(driver)) else {
            return false;
        };
        for (port, default) in live.iter_mut().zip(defaults.iter_mut()) {
            if let Some(saved) = settings.ports.get(port.name) {
                port.value = (port.value & !port.mask) | (saved.value & port.mask);
                default.value = (default.value & !default.mask) | (saved.default & default.mask);
            }
        }
        debug!(driver = driver.name, ports = settings.ports.len(), "input settings loaded");
        true
    }

    fn save_settings(&mut self, driver: &'static DriverDescriptor, live: &[InputPort], defaults: &[InputPort]) {
        let ports = live
            .iter()
            .zip(defaults)
            .map(|(port, default)| {
                let setting = PortSetting {
                    value: port.value,
                    default: default.value,
                };
                (port.name.to_string(), setting)
            })
            .collect();
        let path = self.settings_path(driver);
        let result = toml::to_string(&PortSettings { ports })
            .map_err(|err| err.to_string())
            .and_then(|text| {
                fs::create_dir_all(&self.cfg_dir).map_err(|err| err.to_string())?;
                fs::write(&path, text).map_err(|err| err.to_string())
            });
        if let Err(err) = result {
            warn!(path = %path.display(), %err, "could not save input settings");
        }
    }
}

// ---------------------------------------------------------------------------
// User interface
// ---------------------------------------------------------------------------

/// Start-up screens go to the log; the only overlay is a pause banner.
#[derive(Debug, Default)]
pub struct ConsoleUi {
    strings: HashMap<String, String>,
    cheats: bool,
}

impl ConsoleUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Localized text for `key`, or `fallback`.
    fn text<'a>(&'a self, key: &str, fallback: &'a str) -> &'a str {
        self.strings.get(key).map_or(fallback, String::as_str)
    }
}

impl UserInterface for ConsoleUi {
    fn load_strings(&mut self, language_file: Option<&Path>) -> Result<(), HostError> {
        let Some(path) = language_file else {
            return Ok(());
        };
        let text = fs::read_to_string(path)?;
        self.strings = toml::from_str(&text)
            .map_err(|err| HostError::failed(format!("{}: {err}", path.display())))?;
        debug!(path = %path.display(), strings = self.strings.len(), "strings loaded");
        Ok(())
    }

    fn unload_strings(&mut self) {
        self.strings.clear();
    }

    fn show_copyright(&mut self, driver: &'static DriverDescriptor) -> Gate {
        let notice = self.text(
            "copyright",
            "Only play this game if you own the original board it emulates.",
        );
        info!(driver = driver.name, "{notice}");
        Gate::Acknowledged
    }

    fn show_warnings(&mut self, driver: &'static DriverDescriptor) -> Gate {
        info!(
            driver = driver.name,
            description = driver.description,
            year = driver.year,
            manufacturer = driver.manufacturer,
            "{}",
            self.text("warnings", "Emulation runs without CPU cores; the display shows ROM and RAM contents only.")
        );
        Gate::Acknowledged
    }

    fn init(&mut self, driver: &'static DriverDescriptor) {
        debug!(driver = driver.name, "user interface ready");
    }

    fn poll(&mut self, overlay: &mut UiOverlay<'_>) -> UiRequest {
        if overlay.paused {
            let bottom = overlay.bitmap.height() as i32 - GLYPH_HEIGHT - 2;
            draw_text(overlay.bitmap, overlay.font, "PAUSED", 2, bottom.max(0));
        }
        UiRequest::None
    }

    fn start_cheats(&mut self) {
        self.cheats = true;
    }

    fn stop_cheats(&mut self) {
        self.cheats = false;
    }
}
