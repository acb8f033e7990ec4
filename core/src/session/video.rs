//! Video stage: palette, gfx decode, display, frame bitmap, UI font, then
//! the driver's video and the sound system.

use tracing::debug;

use super::undo::UndoList;
use super::{Diagnostics, Session};
use crate::driver::{ScreenTarget, VideoHardware};
use crate::error::StepError;
use crate::host::{DisplayParams, Host, MemorySystem};
use crate::video::font::build_ui_font;
use crate::video::gfx::decode_graphics;
use crate::video::{Bitmap, GfxElement, GfxError, Pen, Rect, RenderScheduler, UpdateTarget};

const VIDEO_FAILED: &str = "Unable to start video emulation";
const AUDIO_FAILED: &str = "Unable to start audio emulation";
const GFX_OUT_OF_MEMORY: &str = "Out of memory decoding gfx";

/// Variants are in shutdown order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum VideoResource {
    Sound,
    Hardware,
    Graphics,
    UiFont,
    Display,
    Bitmap,
    Palette,
}

/// Everything the session draws with.
#[derive(Default)]
pub(crate) struct VideoState {
    pub(crate) render: RenderScheduler,
    pub(crate) gfx: Vec<GfxElement>,
    pub(crate) bitmap: Option<Bitmap>,
    pub(crate) priority: Option<Bitmap>,
    pub(crate) ui_font: Option<GfxElement>,
    pub(crate) hardware: Option<Box<dyn VideoHardware>>,
    pub(crate) leds: u32,
    pub(crate) published_leds: u32,
}

impl VideoState {
    pub(crate) fn set_led(&mut self, num: u32, on: bool) {
        let Some(bit) = 1u32.checked_shl(num) else {
            return;
        };
        if on {
            self.leds |= bit;
        } else {
            self.leds &= !bit;
        }
    }

    pub(crate) fn partial_update(
        &mut self,
        scanline: i32,
        skip: bool,
        black_pen: Pen,
        memory: &dyn MemorySystem,
    ) -> Option<Rect> {
        let Self { render, gfx, bitmap, priority, hardware, .. } = self;
        let (Some(bitmap), Some(priority)) = (bitmap.as_mut(), priority.as_mut()) else {
            return None;
        };
        let mut screen = Screen {
            bitmap,
            priority,
            gfx: gfx.as_slice(),
            hardware: hardware.as_mut(),
            memory,
            skip,
            black_pen,
            priority_used: false,
        };
        render.force_partial_update(scanline, &mut screen)
    }

    pub(crate) fn draw_screen(&mut self, skip: bool, black_pen: Pen, memory: &dyn MemorySystem) {
        let Self { render, gfx, bitmap, priority, hardware, .. } = self;
        let (Some(bitmap), Some(priority)) = (bitmap.as_mut(), priority.as_mut()) else {
            return;
        };
        let mut screen = Screen {
            bitmap,
            priority,
            gfx: gfx.as_slice(),
            hardware: hardware.as_mut(),
            memory,
            skip,
            black_pen,
            priority_used: false,
        };
        render.draw_screen(&mut screen);
    }
}

/// The session's frame as an [`UpdateTarget`].
struct Screen<'a> {
    bitmap: &'a mut Bitmap,
    priority: &'a mut Bitmap,
    gfx: &'a [GfxElement],
    hardware: Option<&'a mut Box<dyn VideoHardware>>,
    memory: &'a dyn MemorySystem,
    skip: bool,
    black_pen: Pen,
    priority_used: bool,
}

impl UpdateTarget for Screen<'_> {
    fn skip_this_frame(&self) -> bool {
        self.skip
    }

    fn fill_background(&mut self) {
        self.bitmap.fill(self.black_pen, None);
    }

    fn update(&mut self, clip: &Rect) {
        let Some(hardware) = self.hardware.as_mut() else {
            return;
        };
        let mut target = ScreenTarget {
            bitmap: &mut *self.bitmap,
            priority: &mut *self.priority,
            priority_used: false,
            gfx: self.gfx,
            memory: self.memory,
        };
        hardware.update(&mut target, clip);
        self.priority_used |= target.priority_used;
    }

    fn clear_priority(&mut self) {
        self.priority.fill(0, None);
    }

    fn take_priority_dirty(&mut self) -> bool {
        std::mem::take(&mut self.priority_used)
    }
}

pub(super) fn open(
    host: &mut Host,
    session: &mut Session,
    diagnostics: &mut Diagnostics,
) -> Result<UndoList<VideoResource>, StepError> {
    let mut undo = UndoList::new();
    match acquire(host, session, diagnostics, &mut undo) {
        Ok(()) => Ok(undo),
        Err(err) => {
            debug!(%err, "video start failed");
            undo.rollback(|resource| release(host, &mut session.video, resource));
            Err(err)
        }
    }
}

fn acquire(
    host: &mut Host,
    session: &mut Session,
    diagnostics: &mut Diagnostics,
    undo: &mut UndoList<VideoResource>,
) -> Result<(), StepError> {
    let config = &session.config;
    let settings = &session.settings;
    let video = &mut session.video;

    host.palette
        .start(config)
        .map_err(StepError::host("palette start"))
        .inspect_err(|_| diagnostics.bail(VIDEO_FAILED))?;
    undo.push(VideoResource::Palette);

    video.gfx = decode_graphics(config.gfx_decode, &*host.memory, host.palette.remapped_colortable())
        .inspect_err(|err| {
            diagnostics.bail(if *err == GfxError::OutOfMemory {
                GFX_OUT_OF_MEMORY
            } else {
                VIDEO_FAILED
            })
        })?;
    undo.push(VideoResource::Graphics);
    debug!(elements = video.gfx.len(), "gfx decoded");

    let (width, height) = config.display_size();
    let params = DisplayParams {
        width,
        height,
        depth: settings.color_depth,
        colors: host.palette.total_colors_with_ui(),
        aspect: config.aspect_ratio(),
        frames_per_second: config.frames_per_second,
        video_attributes: config.video_attributes,
        orientation: settings.orientation,
    };
    host.platform
        .create_display(&params)
        .map_err(StepError::host("create display"))
        .inspect_err(|_| diagnostics.bail(VIDEO_FAILED))?;
    undo.push(VideoResource::Display);

    let bitmap = Bitmap::new(config.screen_width, config.screen_height, settings.color_depth)
        .inspect_err(|_| diagnostics.bail(VIDEO_FAILED))?;
    let priority = Bitmap::new(config.screen_width, config.screen_height, 8)
        .inspect_err(|_| diagnostics.bail(VIDEO_FAILED))?;
    video.bitmap = Some(bitmap);
    video.priority = Some(priority);
    undo.push(VideoResource::Bitmap);

    // Force a change so the engine computes timing for the real area.
    for area in [Rect::new(0, 1, 0, 1), config.default_visible_area] {
        if video.render.set_visible_area(area) {
            host.cpu.compute_scanline_timing(&area);
        }
    }

    let font = build_ui_font(host.palette.ui_pen_base()).inspect_err(|_| diagnostics.bail(VIDEO_FAILED))?;
    video.ui_font = Some(font);
    undo.push(VideoResource::UiFont);

    host.palette
        .init(config, &*host.memory)
        .map_err(StepError::host("palette init"))
        .inspect_err(|_| diagnostics.bail(VIDEO_FAILED))?;

    video.leds = 0;
    video.published_leds = 0;

    if let Some(make_hardware) = config.video {
        let mut hardware = make_hardware();
        hardware
            .start(&*host.memory)
            .map_err(StepError::host("video start"))
            .inspect_err(|_| diagnostics.bail(VIDEO_FAILED))?;
        video.hardware = Some(hardware);
        undo.push(VideoResource::Hardware);
    }

    host.sound
        .start(config, settings.sample_rate)
        .map_err(StepError::host("sound start"))
        .inspect_err(|_| diagnostics.bail(AUDIO_FAILED))?;
    undo.push(VideoResource::Sound);

    for region in session.driver.roms.iter().filter(|r| r.dispose) {
        if host.memory.dispose_region(region.tag) {
            debug!(region = region.tag, "region disposed");
        }
    }
    Ok(())
}

fn release(host: &mut Host, video: &mut VideoState, resource: VideoResource) {
    match resource {
        VideoResource::Sound => host.sound.stop(),
        VideoResource::Hardware => {
            if let Some(mut hardware) = video.hardware.take() {
                hardware.stop();
            }
        }
        VideoResource::Graphics => video.gfx.clear(),
        VideoResource::UiFont => video.ui_font = None,
        VideoResource::Display => host.platform.close_display(),
        VideoResource::Bitmap => {
            video.bitmap = None;
            video.priority = None;
        }
        VideoResource::Palette => host.palette.stop(),
    }
}

pub(super) fn close(host: &mut Host, video: &mut VideoState, undo: UndoList<VideoResource>) {
    undo.teardown(|resource| release(host, video, resource));
}
