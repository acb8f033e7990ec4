use std::path::PathBuf;

use crate::driver::{MachineConfig, VideoAttributes};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    #[default]
    Rot0,
    Rot90,
    Rot180,
    Rot270,
}

/// User-supplied options, shared by every session a controller runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub language_file: Option<PathBuf>,
    /// Requested bitmap depth. Only 15 and 32 are honoured, and only for
    /// direct-RGB drivers.
    pub color_depth: Option<u8>,
    pub sample_rate: u32,
    pub ui_orientation: Orientation,
    pub record: Option<PathBuf>,
    pub playback: Option<PathBuf>,
    pub debug: bool,
    pub cheat: bool,
    pub skip_disclaimer: bool,
    pub skip_warnings: bool,
    /// Display brightness while paused, 0.0 to 1.0.
    pub pause_brightness: f32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            language_file: None,
            color_depth: None,
            sample_rate: 44_100,
            ui_orientation: Orientation::Rot0,
            record: None,
            playback: None,
            debug: false,
            cheat: false,
            skip_disclaimer: false,
            skip_warnings: false,
            pause_brightness: 0.65,
        }
    }
}

/// Options resolved against one machine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub color_depth: u8,
    pub alpha_active: bool,
    pub sample_rate: u32,
    pub orientation: Orientation,
    pub ui_orientation: Orientation,
    pub recording: bool,
    pub playing_back: bool,
    pub debug: bool,
    /// Cleared when the driver has no ROMs.
    pub cheat: bool,
}

impl SessionSettings {
    pub fn resolve(options: &Options, config: &MachineConfig) -> Self {
        let attributes = config.video_attributes;
        let direct_rgb = attributes.contains(VideoAttributes::RGB_DIRECT);

        let color_depth = if direct_rgb {
            match options.color_depth {
                Some(depth @ (15 | 32)) => depth,
                _ if attributes.contains(VideoAttributes::NEEDS_6BITS_PER_GUN) => 32,
                _ => 15,
            }
        } else {
            16
        };

        Self {
            color_depth,
            alpha_active: direct_rgb,
            sample_rate: options.sample_rate,
            orientation: Orientation::Rot0,
            ui_orientation: options.ui_orientation,
            recording: options.record.is_some(),
            playing_back: options.playback.is_some(),
            debug: options.debug,
            cheat: options.cheat,
        }
    }
}
