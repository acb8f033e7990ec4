//! Incremental screen updates.
//!
//! Drivers that change video registers mid-frame ask for the screen to be
//! rendered up to the current scanline before the change lands. The
//! scheduler remembers how far the frame has been rendered so each row is
//! drawn at most once per frame, however many times an update is requested.

use tracing::trace;

use super::Rect;

/// The frame being rendered, as seen by the scheduler.
pub trait UpdateTarget {
    /// The platform decided not to present this frame.
    fn skip_this_frame(&self) -> bool;

    /// Clear the whole frame bitmap to the background pen.
    fn fill_background(&mut self);

    /// Run the driver's video update over `clip`.
    fn update(&mut self, clip: &Rect);

    /// Clear the sprite priority bitmap.
    fn clear_priority(&mut self);

    /// Whether the last update wrote to the priority bitmap. Reading clears it.
    fn take_priority_dirty(&mut self) -> bool {
        false
    }
}

#[derive(Debug, Default, Clone)]
pub struct RenderScheduler {
    visible_area: Rect,
    absolute_visible_area: Rect,
    visible_area_changed: bool,
    full_refresh_pending: bool,
    last_partial_scanline: i32,
    partial_updates_this_frame: u32,
    priority_dirty: bool,
}

impl RenderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visible_area(&self) -> Rect {
        self.visible_area
    }

    /// Copy of the visible area used when composing the output display.
    pub fn absolute_visible_area(&self) -> Rect {
        self.absolute_visible_area
    }

    /// Change the visible area.
    ///
    /// Returns `true` when the bounds actually changed; the caller must then
    /// have the execution engine recompute its scanline timing.
    pub fn set_visible_area(&mut self, area: Rect) -> bool {
        if self.visible_area == area {
            return false;
        }
        self.visible_area_changed = true;
        self.visible_area = area;
        self.absolute_visible_area = area;
        trace!(?area, "visible area changed");
        true
    }

    pub fn visible_area_changed(&self) -> bool {
        self.visible_area_changed
    }

    /// Acknowledge a visible-area change once the display has picked it up.
    pub fn clear_visible_area_changed(&mut self) {
        self.visible_area_changed = false;
    }

    /// Erase and redraw the whole screen on the next update.
    pub fn schedule_full_refresh(&mut self) {
        self.full_refresh_pending = true;
    }

    pub fn full_refresh_pending(&self) -> bool {
        self.full_refresh_pending
    }

    /// Start of a new frame.
    pub fn reset_partial_updates(&mut self) {
        self.last_partial_scanline = 0;
        self.partial_updates_this_frame = 0;
    }

    pub fn last_partial_scanline(&self) -> i32 {
        self.last_partial_scanline
    }

    pub fn partial_updates_this_frame(&self) -> u32 {
        self.partial_updates_this_frame
    }

    pub fn mark_priority_dirty(&mut self) {
        self.priority_dirty = true;
    }

    /// Render everything between the last update and `scanline`, inclusive.
    ///
    /// Returns the rows handed to the driver, if any. Requests for rows that
    /// were already rendered this frame draw nothing.
    pub fn force_partial_update(&mut self, scanline: i32, target: &mut dyn UpdateTarget) -> Option<Rect> {
        if target.skip_this_frame() || scanline < self.last_partial_scanline {
            return None;
        }

        if self.full_refresh_pending && self.last_partial_scanline == 0 {
            target.fill_background();
            self.full_refresh_pending = false;
        }

        let mut clip = self.visible_area;
        clip.min_y = clip.min_y.max(self.last_partial_scanline);
        clip.max_y = clip.max_y.min(scanline);

        let rendered = (clip.min_y <= clip.max_y).then(|| {
            target.update(&clip);
            if target.take_priority_dirty() {
                self.priority_dirty = true;
            }
            self.partial_updates_this_frame += 1;
            clip
        });

        self.last_partial_scanline = scanline.saturating_add(1);
        rendered
    }

    /// Finish the frame: render the remaining rows and reset the priority bitmap.
    pub fn draw_screen(&mut self, target: &mut dyn UpdateTarget) {
        self.force_partial_update(self.visible_area.max_y, target);
        if self.priority_dirty {
            target.clear_priority();
            self.priority_dirty = false;
        }
    }
}
