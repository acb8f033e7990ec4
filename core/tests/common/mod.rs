#![allow(dead_code)]

//! Recording host for session tests.
//!
//! Every collaborator writes to a per-thread [`Log`]: the calls it received,
//! a balance per resource (acquire +1, release -1), and which calls should
//! fail. Tests script the CPU run and the UI through the same log.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::rc::Rc;

use marquee_core::driver::{
    CpuSlot, CpuType, DriverDescriptor, InputPort, InputPortDef, MachineConfig, NvramAccess, Rgb,
    RomEntry, RomRegion, ScreenTarget, SlotError, VideoHardware,
};
use marquee_core::host::{
    CpuEngine, DisplayFrame, DisplayParams, FrameChanges, FrameControl, FrameSink, Gate, Host, HostError,
    InputSystem, MemorySystem, Palette, Platform, RunOutcome, SoundSystem, UiOverlay, UiRequest,
    UserInterface,
};
use marquee_core::session::{Controller, Options};
use marquee_core::storage::{FileType, StorageBackend, StorageFile};
use marquee_core::video::gfx::steps;
use marquee_core::video::{GfxDecodeInfo, GfxLayout, LayoutValue, Pen, PlaneOffsets, Rect};

// ==========================================================================
// Log
// ==========================================================================

#[derive(Default)]
pub struct Log {
    pub calls: Vec<String>,
    counts: HashMap<String, usize>,
    /// Step name -> 1-based call number that should fail.
    failures: HashMap<String, usize>,
    pub held: BTreeMap<&'static str, i32>,

    pub settings_found: bool,
    pub copyright: Option<Gate>,
    pub warnings: Option<Gate>,
    pub ui_requests: VecDeque<UiRequest>,
    pub skip_frames: bool,

    /// Frames per run; each frame does the listed partial updates first.
    pub run_frames: usize,
    pub partials: Vec<i32>,
    pub outcomes: VecDeque<RunOutcome>,
    pub visible_area_requests: Vec<Rect>,

    pub timing_changes: usize,
    pub display: Option<DisplayParams>,
    pub published: Vec<FrameChanges>,
    pub published_leds: Vec<u32>,
    pub updates: Vec<Rect>,
    pub brightness: Vec<f32>,
    pub disposed: Vec<String>,
    pub regions_at_init: Vec<String>,
}

impl Log {
    fn call(&mut self, step: &str) -> Result<(), HostError> {
        self.calls.push(step.to_string());
        let count = self.counts.entry(step.to_string()).or_default();
        *count += 1;
        let count = *count;
        if self.failures.get(step) == Some(&count) {
            return Err(HostError::failed(format!("{step} failed")));
        }
        Ok(())
    }

    fn note(&mut self, step: &str) {
        self.calls.push(step.to_string());
        *self.counts.entry(step.to_string()).or_default() += 1;
    }

    fn acquire(&mut self, resource: &'static str) {
        *self.held.entry(resource).or_default() += 1;
    }

    fn release(&mut self, resource: &'static str) {
        *self.held.entry(resource).or_default() -= 1;
    }

    pub fn count(&self, step: &str) -> usize {
        self.counts.get(step).copied().unwrap_or(0)
    }

    pub fn position(&self, step: &str) -> Option<usize> {
        self.calls.iter().position(|c| c == step)
    }

    pub fn balanced(&self) -> bool {
        self.held.values().all(|&n| n == 0)
    }

    pub fn holding(&self, resource: &str) -> i32 {
        self.held.get(resource).copied().unwrap_or(0)
    }
}

thread_local! {
    static LOG: RefCell<Log> = RefCell::new(Log::default());
}

pub fn with_log<R>(f: impl FnOnce(&mut Log) -> R) -> R {
    LOG.with(|log| f(&mut log.borrow_mut()))
}

/// A call that may fail and holds `resource` when it succeeds.
fn acquire_on(step: &str, resource: &'static str) -> Result<(), HostError> {
    with_log(|log| log.call(step).map(|()| log.acquire(resource)))
}

fn release_on(step: &str, resource: &'static str) {
    with_log(|log| {
        log.note(step);
        log.release(resource);
    });
}

pub fn reset_log() {
    with_log(|log| *log = Log::default());
}

/// Make the `nth` call of `step` fail.
pub fn fail_on(step: &str, nth: usize) {
    with_log(|log| {
        log.failures.insert(step.to_string(), nth);
    });
}

/// Every step that acquires something, with the call number to fail.
pub const INJECTION_POINTS: &[(&str, usize)] = &[
    ("platform.init", 1),
    ("ui.strings", 1),
    ("input.codes", 1),
    ("input.ports", 1),
    ("input.ports", 2),
    ("roms.load", 1),
    ("cpu.init", 1),
    ("memory.init", 1),
    ("palette.start", 1),
    ("display.create", 1),
    ("palette.init", 1),
    ("video.start", 1),
    ("sound.start", 1),
];

// ==========================================================================
// Collaborators
// ==========================================================================

pub struct TestPlatform;

impl Platform for TestPlatform {
    fn init(&mut self) -> Result<(), HostError> {
        acquire_on("platform.init", "platform")
    }

    fn exit(&mut self) {
        release_on("platform.exit", "platform");
    }

    fn create_display(&mut self, params: &DisplayParams) -> Result<(), HostError> {
        acquire_on("display.create", "display")?;
        with_log(|log| log.display = Some(params.clone()));
        Ok(())
    }

    fn close_display(&mut self) {
        release_on("display.close", "display");
    }

    fn enable_artwork(&mut self, enable: bool) {
        with_log(|log| log.note(if enable { "artwork.on" } else { "artwork.off" }));
    }

    fn update_display(&mut self, frame: &DisplayFrame<'_>) {
        with_log(|log| {
            log.published.push(frame.changes);
            log.published_leds.push(frame.led_state);
        });
    }

    fn skip_this_frame(&self) -> bool {
        with_log(|log| log.skip_frames)
    }

    fn pause(&mut self, paused: bool) {
        with_log(|log| log.note(if paused { "platform.pause" } else { "platform.resume" }));
    }

    fn sound_enable(&mut self, enable: bool) {
        with_log(|log| log.note(if enable { "sound.enable" } else { "sound.disable" }));
    }
}

pub struct TestCpu;

impl CpuEngine for TestCpu {
    fn init_timers(&mut self) {
        with_log(|log| log.note("timers.init"));
    }

    fn init_refresh_timer(&mut self) {
        with_log(|log| log.note("timers.refresh"));
    }

    fn init(&mut self, _config: &MachineConfig) -> Result<(), HostError> {
        acquire_on("cpu.init", "cpu")
    }

    fn exit(&mut self) {
        release_on("cpu.exit", "cpu");
    }

    fn compute_scanline_timing(&mut self, _visible_area: &Rect) {
        with_log(|log| log.timing_changes += 1);
    }

    fn run(&mut self, frame: &mut dyn FrameSink) -> RunOutcome {
        with_log(|log| log.note("cpu.run"));
        let (frames, partials, areas) =
            with_log(|log| (log.run_frames, log.partials.clone(), log.visible_area_requests.clone()));
        for area in areas {
            if frame.set_visible_area(area) {
                self.compute_scanline_timing(&area);
            }
        }
        for _ in 0..frames {
            frame.begin_frame();
            for &scanline in &partials {
                frame.partial_update(scanline);
            }
            if frame.end_frame() == FrameControl::Quit {
                return RunOutcome::Quit;
            }
        }
        with_log(|log| log.outcomes.pop_front().unwrap_or(RunOutcome::Quit))
    }
}

#[derive(Default)]
pub struct TestMemory {
    regions: BTreeMap<String, Vec<u8>>,
    loaded: bool,
}

impl MemorySystem for TestMemory {
    fn load_roms(&mut self, driver: &'static DriverDescriptor) -> Result<(), HostError> {
        with_log(|log| log.call("roms.load"))?;
        for region in driver.roms {
            // Deterministic contents: byte i holds i.
            let data = (0..region.size).map(|i| i as u8).collect();
            self.regions.insert(region.tag.to_string(), data);
        }
        self.loaded = true;
        with_log(|log| log.acquire("regions"));
        Ok(())
    }

    fn init(&mut self, _config: &MachineConfig) -> Result<(), HostError> {
        acquire_on("memory.init", "memory")?;
        let names = self.regions.keys().cloned().collect();
        with_log(|log| log.regions_at_init = names);
        Ok(())
    }

    fn shutdown(&mut self) {
        release_on("memory.shutdown", "memory");
    }

    fn region(&self, tag: &str) -> Option<&[u8]> {
        self.regions.get(tag).map(Vec::as_slice)
    }

    fn region_mut(&mut self, tag: &str) -> Option<&mut [u8]> {
        self.regions.get_mut(tag).map(Vec::as_mut_slice)
    }

    fn free_regions(&mut self) {
        self.regions.clear();
        if std::mem::take(&mut self.loaded) {
            with_log(|log| {
                log.note("regions.free");
                log.release("regions");
            });
        }
    }

    fn dispose_region(&mut self, tag: &str) -> bool {
        let found = self.regions.remove(tag).is_some();
        if found {
            with_log(|log| log.disposed.push(tag.to_string()));
        }
        found
    }

    fn reset_save_state(&mut self) {
        with_log(|log| log.note("state.reset"));
    }
}

pub struct TestInput;

impl InputSystem for TestInput {
    fn init_codes(&mut self) -> Result<(), HostError> {
        acquire_on("input.codes", "codes")
    }

    fn close_codes(&mut self) {
        release_on("input.codes.close", "codes");
    }

    fn allocate_ports(&mut self, defs: &[InputPortDef]) -> Result<Vec<InputPort>, HostError> {
        acquire_on("input.ports", "ports")?;
        Ok(defs.iter().map(InputPort::from).collect())
    }

    fn free_ports(&mut self, _ports: Vec<InputPort>) {
        release_on("input.ports.free", "ports");
    }

    fn load_settings(
        &mut self,
        _driver: &'static DriverDescriptor,
        _live: &mut [InputPort],
        _defaults: &mut [InputPort],
    ) -> bool {
        with_log(|log| {
            log.note("settings.load");
            log.settings_found
        })
    }

    fn save_settings(&mut self, _driver: &'static DriverDescriptor, _live: &[InputPort], _defaults: &[InputPort]) {
        with_log(|log| log.note("settings.save"));
    }
}

pub struct TestPalette;

pub const UI_PEN_BASE: Pen = 256;

impl Palette for TestPalette {
    fn start(&mut self, _config: &MachineConfig) -> Result<(), HostError> {
        acquire_on("palette.start", "palette")
    }

    fn init(&mut self, _config: &MachineConfig, _memory: &dyn MemorySystem) -> Result<(), HostError> {
        with_log(|log| log.call("palette.init"))
    }

    fn stop(&mut self) {
        release_on("palette.stop", "palette");
    }

    fn remapped_colortable(&self) -> bool {
        false
    }

    fn ui_pen_base(&self) -> Pen {
        UI_PEN_BASE
    }

    fn total_colors_with_ui(&self) -> u32 {
        UI_PEN_BASE + 2
    }

    fn black_pen(&self) -> Pen {
        0
    }

    fn set_brightness(&mut self, brightness: f32) {
        with_log(|log| log.brightness.push(brightness));
    }

    fn rgb(&self, pen: Pen) -> Rgb {
        let v = pen as u8;
        (v, v, v)
    }
}

pub struct TestSound;

impl SoundSystem for TestSound {
    fn start(&mut self, _config: &MachineConfig, _sample_rate: u32) -> Result<(), HostError> {
        acquire_on("sound.start", "sound")
    }

    fn stop(&mut self) {
        release_on("sound.stop", "sound");
    }

    fn update(&mut self) {
        with_log(|log| log.note("sound.update"));
    }
}

pub struct TestUi;

impl UserInterface for TestUi {
    fn load_strings(&mut self, _language_file: Option<&Path>) -> Result<(), HostError> {
        acquire_on("ui.strings", "strings")
    }

    fn unload_strings(&mut self) {
        release_on("ui.strings.unload", "strings");
    }

    fn show_copyright(&mut self, _driver: &'static DriverDescriptor) -> Gate {
        with_log(|log| {
            log.note("ui.copyright");
            log.copyright.unwrap_or(Gate::Acknowledged)
        })
    }

    fn show_warnings(&mut self, _driver: &'static DriverDescriptor) -> Gate {
        with_log(|log| {
            log.note("ui.warnings");
            log.warnings.unwrap_or(Gate::Acknowledged)
        })
    }

    fn init(&mut self, _driver: &'static DriverDescriptor) {
        with_log(|log| log.note("ui.init"));
    }

    fn poll(&mut self, _overlay: &mut UiOverlay<'_>) -> UiRequest {
        with_log(|log| {
            log.note("ui.poll");
            log.ui_requests.pop_front().unwrap_or(UiRequest::None)
        })
    }

    fn start_cheats(&mut self) {
        with_log(|log| {
            log.note("cheats.start");
            log.acquire("cheats");
        });
    }

    fn stop_cheats(&mut self) {
        release_on("cheats.stop", "cheats");
    }
}

pub fn test_host() -> Host {
    Host {
        platform: Box::new(TestPlatform),
        cpu: Box::new(TestCpu),
        memory: Box::new(TestMemory::default()),
        input: Box::new(TestInput),
        palette: Box::new(TestPalette),
        sound: Box::new(TestSound),
        ui: Box::new(TestUi),
    }
}

// ==========================================================================
// Storage
// ==========================================================================

type FileKey = (Option<String>, String, FileType);

/// In-memory file that stays in its store after being dropped.
pub struct SharedFile {
    data: Rc<RefCell<Vec<u8>>>,
    pos: u64,
}

impl Read for SharedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.data.borrow();
        let start = (self.pos as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Write for SharedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut data = self.data.borrow_mut();
        let start = self.pos as usize;
        if data.len() < start + buf.len() {
            data.resize(start + buf.len(), 0);
        }
        data[start..start + buf.len()].copy_from_slice(buf);
        self.pos += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for SharedFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.data.borrow().len() as i64;
        let target = match pos {
            SeekFrom::Start(n) => n as i64,
            SeekFrom::End(n) => len + n,
            SeekFrom::Current(n) => self.pos as i64 + n,
        };
        if target < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek before start"));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

/// Storage backed by a shared map. Clones see the same files and open log.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    files: Rc<RefCell<BTreeMap<FileKey, Rc<RefCell<Vec<u8>>>>>>,
    pub opens: Rc<RefCell<Vec<(Option<String>, String, FileType, bool)>>>,
    pub read_only: Rc<RefCell<bool>>,
}

impl MemoryStorage {
    pub fn insert(&self, system: Option<&str>, filename: &str, file_type: FileType, data: Vec<u8>) {
        self.files.borrow_mut().insert(
            (system.map(str::to_string), filename.to_string(), file_type),
            Rc::new(RefCell::new(data)),
        );
    }

    pub fn contents(&self, system: Option<&str>, filename: &str, file_type: FileType) -> Option<Vec<u8>> {
        self.files
            .borrow()
            .get(&(system.map(str::to_string), filename.to_string(), file_type))
            .map(|data| data.borrow().clone())
    }

    pub fn open_log(&self) -> Vec<(Option<String>, String, FileType, bool)> {
        self.opens.borrow().clone()
    }
}

impl StorageBackend for MemoryStorage {
    fn open(
        &mut self,
        system: Option<&str>,
        filename: &str,
        file_type: FileType,
        for_write: bool,
    ) -> Option<Box<dyn StorageFile>> {
        self.opens
            .borrow_mut()
            .push((system.map(str::to_string), filename.to_string(), file_type, for_write));
        let key = (system.map(str::to_string), filename.to_string(), file_type);
        let mut files = self.files.borrow_mut();
        let existing = files.get(&key).cloned();
        let data = match existing {
            Some(data) => data.clone(),
            None if for_write && !*self.read_only.borrow() => {
                let data = Rc::new(RefCell::new(Vec::new()));
                files.insert(key, data.clone());
                data
            }
            None => return None,
        };
        if for_write {
            data.borrow_mut().clear();
        }
        Some(Box::new(SharedFile { data, pos: 0 }))
    }
}

pub fn controller(options: Options) -> (Controller, MemoryStorage) {
    reset_log();
    let storage = MemoryStorage::default();
    let controller = Controller::new(test_host(), Box::new(storage.clone()), options);
    (controller, storage)
}

pub fn quiet_options() -> Options {
    Options {
        skip_disclaimer: true,
        skip_warnings: true,
        ..Options::default()
    }
}

// ==========================================================================
// Drivers
// ==========================================================================

static TILE_PLANES: [LayoutValue; 1] = [LayoutValue::lit(0)];
static TILE_X: [LayoutValue; 8] = steps(0, 1);
static TILE_Y: [LayoutValue; 8] = steps(0, 8);

static TILE_LAYOUT: GfxLayout = GfxLayout {
    width: 8,
    height: 8,
    total: LayoutValue::frac(1, 1),
    planes: 1,
    plane_offsets: PlaneOffsets::Bits(&TILE_PLANES),
    x_offsets: &TILE_X,
    y_offsets: &TILE_Y,
    increment: 64,
};

static TEST_GFX: [GfxDecodeInfo; 1] = [GfxDecodeInfo {
    region: "gfx1",
    start: 0,
    layout: &TILE_LAYOUT,
    color_codes_start: 0,
    total_color_codes: 4,
}];

/// Names a region no driver loads.
static UNLOADED_GFX: [GfxDecodeInfo; 1] = [GfxDecodeInfo {
    region: "gfx9",
    start: 0,
    layout: &TILE_LAYOUT,
    color_codes_start: 0,
    total_color_codes: 4,
}];

static HUGE_TILE_LAYOUT: GfxLayout = GfxLayout {
    width: 8,
    height: 8,
    total: LayoutValue::lit(0x0200_0000),
    planes: 1,
    plane_offsets: PlaneOffsets::Bits(&TILE_PLANES),
    x_offsets: &TILE_X,
    y_offsets: &TILE_Y,
    increment: 64,
};

/// 32M 8x8 tiles: more pixel data than one set may decode to.
static HUGE_GFX: [GfxDecodeInfo; 1] = [GfxDecodeInfo {
    region: "gfx1",
    start: 0,
    layout: &HUGE_TILE_LAYOUT,
    color_codes_start: 0,
    total_color_codes: 4,
}];

static TEST_ROMS: [RomRegion; 3] = [
    RomRegion {
        tag: "maincpu",
        size: 0x100,
        dispose: false,
        entries: &[RomEntry {
            name: "test.cpu",
            size: 0x100,
            offset: 0,
            crc32: None,
        }],
    },
    RomRegion {
        tag: "gfx1",
        size: 64,
        dispose: true,
        entries: &[RomEntry {
            name: "test.gfx",
            size: 64,
            offset: 0,
            crc32: None,
        }],
    },
    RomRegion {
        tag: "nvram",
        size: 16,
        dispose: false,
        entries: &[],
    },
];

static TEST_PORTS: [InputPortDef; 2] = [
    InputPortDef {
        name: "IN0",
        mask: 0xFF,
        default: 0xFF,
    },
    InputPortDef {
        name: "DSW",
        mask: 0x0F,
        default: 0x01,
    },
];

/// Paints every row of `clip` with pen 7 and marks the priority bitmap.
struct TestVideo;

impl VideoHardware for TestVideo {
    fn start(&mut self, _memory: &dyn MemorySystem) -> Result<(), HostError> {
        acquire_on("video.start", "video")
    }

    fn update(&mut self, screen: &mut ScreenTarget<'_>, clip: &Rect) {
        screen.bitmap.fill(7, Some(clip));
        screen.priority.fill(1, Some(clip));
        screen.priority_used = true;
        with_log(|log| log.updates.push(*clip));
    }

    fn end_of_frame(&mut self, _memory: &dyn MemorySystem) {
        with_log(|log| log.note("video.eof"));
    }

    fn stop(&mut self) {
        release_on("video.stop", "video");
    }
}

fn make_video() -> Box<dyn VideoHardware> {
    Box::new(TestVideo)
}

fn nvram(memory: &mut dyn MemorySystem, access: NvramAccess<'_>) -> io::Result<()> {
    let region = memory
        .region_mut("nvram")
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no nvram region"))?;
    match access {
        NvramAccess::Load(Some(file)) => file.read_exact(region),
        NvramAccess::Load(None) => {
            region.fill(0xA5);
            Ok(())
        }
        NvramAccess::Save(file) => file.write_all(region),
    }
}

fn construct_test(config: &mut MachineConfig) -> Result<(), SlotError> {
    config.cpus.add(
        Some("maincpu"),
        CpuSlot {
            cpu_type: CpuType::Z80,
            clock: 3_072_000,
        },
    )?;
    config.frames_per_second = 60.0;
    config.screen_width = 32;
    config.screen_height = 32;
    config.default_visible_area = Rect::new(0, 31, 2, 29);
    config.gfx_decode = &TEST_GFX;
    config.total_colors = 8;
    config.video = Some(make_video);
    config.nvram_handler = Some(nvram);
    Ok(())
}

fn construct_bare(config: &mut MachineConfig) -> Result<(), SlotError> {
    config.frames_per_second = 60.0;
    config.screen_width = 16;
    config.screen_height = 16;
    config.default_visible_area = Rect::new(0, 15, 0, 15);
    Ok(())
}

fn construct_unloaded_gfx(config: &mut MachineConfig) -> Result<(), SlotError> {
    construct_test(config)?;
    config.gfx_decode = &UNLOADED_GFX;
    Ok(())
}

fn construct_huge_gfx(config: &mut MachineConfig) -> Result<(), SlotError> {
    construct_test(config)?;
    config.gfx_decode = &HUGE_GFX;
    Ok(())
}

fn construct_broken(config: &mut MachineConfig) -> Result<(), SlotError> {
    construct_test(config)?;
    config.cpus.remove("audiocpu")?;
    Ok(())
}

pub static TEST_DRIVER: DriverDescriptor = DriverDescriptor {
    name: "testgame",
    description: "Test Game",
    year: "1981",
    manufacturer: "Test",
    clone_of: None,
    construct: construct_test,
    driver_init: None,
    roms: &TEST_ROMS,
    input_ports: &TEST_PORTS,
};

pub static TEST_CLONE: DriverDescriptor = DriverDescriptor {
    name: "testgamea",
    description: "Test Game (set 2)",
    clone_of: Some(&TEST_DRIVER),
    ..BARE_BASE
};

pub static TEST_BOOTLEG: DriverDescriptor = DriverDescriptor {
    name: "testgameb",
    description: "Test Game (bootleg)",
    clone_of: Some(&TEST_CLONE),
    ..BARE_BASE
};

/// No ROMs and no input ports.
pub static BARE_DRIVER: DriverDescriptor = BARE_BASE;

pub static UNLOADED_GFX_DRIVER: DriverDescriptor = DriverDescriptor {
    name: "gfxmiss",
    construct: construct_unloaded_gfx,
    roms: &TEST_ROMS,
    input_ports: &TEST_PORTS,
    ..BARE_BASE
};

pub static HUGE_GFX_DRIVER: DriverDescriptor = DriverDescriptor {
    name: "gfxhuge",
    construct: construct_huge_gfx,
    roms: &TEST_ROMS,
    input_ports: &TEST_PORTS,
    ..BARE_BASE
};

pub static BROKEN_DRIVER: DriverDescriptor = DriverDescriptor {
    name: "broken",
    construct: construct_broken,
    ..BARE_BASE
};

const BARE_BASE: DriverDescriptor = DriverDescriptor {
    name: "bare",
    description: "Bare Board",
    year: "1980",
    manufacturer: "Test",
    clone_of: None,
    construct: construct_bare,
    driver_init: None,
    roms: &[],
    input_ports: &[],
};
