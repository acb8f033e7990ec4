//! Execution stage: start-up screens, NVRAM and cheats around the CPU run,
//! and the per-frame loop the execution engine drives.

use tracing::{debug, info, warn};

use super::undo::UndoList;
use super::video::VideoState;
use super::{Options, Ports, Session};
use crate::driver::{DriverDescriptor, MachineConfig, NvramAccess};
use crate::host::{
    DisplayFrame, FrameChanges, FrameControl, FrameSink, Gate, Host, MemorySystem, Palette, Platform,
    RunOutcome, SoundSystem, UiOverlay, UiRequest, UserInterface,
};
use crate::storage::{FileType, StorageAdapter, StorageFile};
use crate::video::{Rect, RenderScheduler};

/// Variants are in shutdown order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum RunResource {
    Nvram,
    Cheats,
    Settings,
}

/// Copyright then warnings. A session whose input settings were restored
/// has already been through the copyright screen once.
pub(super) fn gate(host: &mut Host, session: &Session, options: &Options) -> Gate {
    let driver = session.driver;
    if !(session.settings_loaded || options.skip_disclaimer) && host.ui.show_copyright(driver) == Gate::Quit {
        return Gate::Quit;
    }
    if options.skip_warnings {
        Gate::Acknowledged
    } else {
        host.ui.show_warnings(driver)
    }
}

pub(super) fn start(host: &mut Host, storage: &mut StorageAdapter, session: &mut Session) -> UndoList<RunResource> {
    let driver = session.driver;
    let mut undo = UndoList::new();

    host.ui.init(driver);
    host.platform.enable_artwork(true);
    undo.push(RunResource::Settings);

    // Nothing to patch without ROMs.
    if !driver.has_roms() {
        session.settings.cheat = false;
    }
    if session.settings.cheat {
        host.ui.start_cheats();
        undo.push(RunResource::Cheats);
    }

    if let Some(handler) = session.config.nvram_handler {
        let mut file = storage.open_file(Some(driver.name), driver.name, FileType::Nvram, false);
        let found = file.is_some();
        match handler(&mut *host.memory, NvramAccess::Load(file.as_mut().map(as_file))) {
            Ok(()) => debug!(driver = driver.name, found, "nvram loaded"),
            Err(err) => warn!(driver = driver.name, %err, "nvram load failed"),
        }
        undo.push(RunResource::Nvram);
    }
    undo
}

fn as_file(file: &mut Box<dyn StorageFile>) -> &mut dyn StorageFile {
    &mut **file
}

pub(super) fn run(host: &mut Host, session: &mut Session, pause_brightness: f32) -> RunOutcome {
    let Host { platform, cpu, memory, palette, sound, ui, .. } = host;
    let mut frame_loop = FrameLoop {
        platform: &mut **platform,
        memory: &mut **memory,
        palette: &mut **palette,
        sound: &mut **sound,
        ui: &mut **ui,
        video: &mut session.video,
        paused: &mut session.paused,
        frames: &mut session.frames,
        pause_brightness,
    };
    cpu.run(&mut frame_loop)
}

pub(super) fn teardown(
    host: &mut Host,
    storage: &mut StorageAdapter,
    session: &mut Session,
    undo: UndoList<RunResource>,
) {
    let driver = session.driver;
    undo.teardown(|resource| match resource {
        RunResource::Nvram => save_nvram(&mut *host.memory, storage, driver, &session.config),
        RunResource::Cheats => host.ui.stop_cheats(),
        RunResource::Settings => {
            let Ports { live, defaults } = &session.ports;
            host.input.save_settings(
                driver,
                live.as_deref().unwrap_or_default(),
                defaults.as_deref().unwrap_or_default(),
            );
        }
    });
}

fn save_nvram(
    memory: &mut dyn MemorySystem,
    storage: &mut StorageAdapter,
    driver: &'static DriverDescriptor,
    config: &MachineConfig,
) {
    let Some(handler) = config.nvram_handler else {
        return;
    };
    let Some(mut file) = storage.open_file(Some(driver.name), driver.name, FileType::Nvram, true) else {
        warn!(driver = driver.name, "nvram not saved: file could not be opened");
        return;
    };
    match handler(memory, NvramAccess::Save(&mut *file)) {
        Ok(()) => debug!(driver = driver.name, "nvram saved"),
        Err(err) => warn!(driver = driver.name, %err, "nvram save failed"),
    }
}

pub(super) fn apply_pause(
    platform: &mut dyn Platform,
    palette: &mut dyn Palette,
    render: &mut RenderScheduler,
    paused: &mut bool,
    brightness: f32,
    pause: bool,
) {
    platform.pause(pause);
    platform.sound_enable(!pause);
    palette.set_brightness(if pause { brightness } else { 1.0 });
    render.schedule_full_refresh();
    *paused = pause;
    info!(paused = pause, "pause");
}

/// The session side of the frame loop, lent to the execution engine for
/// the length of one run.
struct FrameLoop<'a> {
    platform: &'a mut dyn Platform,
    memory: &'a mut dyn MemorySystem,
    palette: &'a mut dyn Palette,
    sound: &'a mut dyn SoundSystem,
    ui: &'a mut dyn UserInterface,
    video: &'a mut VideoState,
    paused: &'a mut bool,
    frames: &'a mut u64,
    pause_brightness: f32,
}

impl FrameLoop<'_> {
    fn publish(&mut self, skipped: bool) {
        let video = &mut *self.video;
        let Some(bitmap) = video.bitmap.as_ref() else {
            return;
        };
        let changes = FrameChanges {
            bitmap: !skipped,
            visible_area: video.render.visible_area_changed(),
            leds: video.leds != video.published_leds,
        };
        self.platform.update_display(&DisplayFrame {
            bitmap,
            visible_area: video.render.absolute_visible_area(),
            changes,
            led_state: video.leds,
            palette: &*self.palette,
        });
        video.published_leds = video.leds;
        video.render.clear_visible_area_changed();
    }
}

impl FrameSink for FrameLoop<'_> {
    fn begin_frame(&mut self) {
        self.video.render.reset_partial_updates();
    }

    fn partial_update(&mut self, scanline: i32) {
        let skip = self.platform.skip_this_frame();
        self.video
            .partial_update(scanline, skip, self.palette.black_pen(), &*self.memory);
    }

    fn set_visible_area(&mut self, area: Rect) -> bool {
        self.video.render.set_visible_area(area)
    }

    fn visible_area(&self) -> Rect {
        self.video.render.visible_area()
    }

    fn schedule_full_refresh(&mut self) {
        self.video.render.schedule_full_refresh();
    }

    fn set_led(&mut self, num: u32, on: bool) {
        self.video.set_led(num, on);
    }

    fn memory(&mut self) -> &mut dyn MemorySystem {
        &mut *self.memory
    }

    fn end_frame(&mut self) -> FrameControl {
        self.sound.update();

        let skipped = self.platform.skip_this_frame();
        if !skipped {
            self.video.draw_screen(skipped, self.palette.black_pen(), &*self.memory);
        }

        let video = &mut *self.video;
        let request = match (video.bitmap.as_mut(), video.ui_font.as_ref()) {
            (Some(bitmap), Some(font)) => self.ui.poll(&mut UiOverlay {
                bitmap,
                font,
                paused: *self.paused,
            }),
            _ => UiRequest::None,
        };
        match request {
            UiRequest::Quit => return FrameControl::Quit,
            UiRequest::Pause(pause) if pause != *self.paused => apply_pause(
                &mut *self.platform,
                &mut *self.palette,
                &mut self.video.render,
                &mut *self.paused,
                self.pause_brightness,
                pause,
            ),
            _ => {}
        }

        self.publish(skipped);
        if let Some(hardware) = self.video.hardware.as_mut() {
            hardware.end_of_frame(&*self.memory);
        }
        *self.frames += 1;
        FrameControl::Continue
    }

    fn is_paused(&self) -> bool {
        *self.paused
    }
}
