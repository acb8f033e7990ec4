pub mod board;
pub mod clock;
pub mod joust;
pub mod pacman;
pub mod palette;
pub mod registry;
pub mod rom_loader;
pub mod williams;

pub use board::{RomBoard, RomSource};
pub use clock::FrameClock;
pub use joust::{JOUST, JOUSTR, JOUSTY};
pub use pacman::PACMAN;
pub use palette::TablePalette;
pub use rom_loader::{RegionLoader, RomLoadError, RomSet};
