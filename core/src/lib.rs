pub mod driver;
pub mod error;
pub mod host;
pub mod session;
pub mod storage;
pub mod video;

pub mod prelude {
    pub use crate::driver::{
        CpuSlot, CpuType, DriverDescriptor, InitContext, InputPort, InputPortDef, MachineConfig,
        NvramAccess, RomEntry, RomRegion, ScreenTarget, SlotError, SoundSlot, SoundType,
        VideoAttributes, VideoHardware,
    };
    pub use crate::error::{SessionError, StepError};
    pub use crate::host::{
        CpuEngine, FrameControl, FrameSink, Host, HostError, InputSystem, MemorySystem, Palette,
        Platform, RunOutcome, SoundSystem, UserInterface,
    };
    pub use crate::session::{Controller, Options, Phase};
    pub use crate::storage::{FileType, StorageAdapter, StorageBackend, StorageFile};
    pub use crate::video::{Bitmap, GfxDecodeInfo, GfxElement, GfxLayout, LayoutValue, Pen, Rect};
}
