//! Session lifecycle: bring a machine up in stages, run it, and take it down
//! again in the reverse order.
//!
//! A session passes through [`Phase`]s as each stage succeeds. Every stage
//! records what it acquired, so a failure at any point releases exactly what
//! was acquired before it and nothing more.

mod execution;
mod machine;
mod options;
mod undo;
mod video;

pub use options::{Options, Orientation, SessionSettings};

use tracing::{debug, error, info, warn};

use crate::driver::{DriverDescriptor, InputPort, MachineConfig, build_config};
use crate::error::{SessionError, StepError};
use crate::host::{Gate, Host, RunOutcome};
use crate::storage::{StorageAdapter, StorageBackend};
use crate::video::{Bitmap, GfxElement, Rect};

use execution::RunResource;
use machine::MachineResource;
use undo::UndoList;
use video::{VideoResource, VideoState};

/// How far session start-up has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    OptionsResolved,
    PlatformReady,
    MachineInitialized,
    VideoReady,
    Running,
}

/// Fatal-error latch for one start attempt.
///
/// The first report is surfaced at error level; anything reported after it
/// is a consequence of the same failure and is only logged at debug level.
#[derive(Debug, Default)]
pub struct Diagnostics {
    first: Option<&'static str>,
}

impl Diagnostics {
    pub fn bail(&mut self, message: &'static str) {
        match self.first {
            None => {
                error!("{message}");
                self.first = Some(message);
            }
            Some(first) => debug!(message, first, "suppressed follow-on failure"),
        }
    }

    pub fn message(&self) -> Option<&'static str> {
        self.first
    }

    pub fn is_bailing(&self) -> bool {
        self.first.is_some()
    }
}

/// Counters for the on-screen performance display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceInfo {
    pub partial_updates_this_frame: u32,
    pub frames: u64,
}

enum Stage {
    Platform,
    Machine(UndoList<MachineResource>),
    Video(UndoList<VideoResource>),
    Execution(UndoList<RunResource>),
}

#[derive(Debug, Default)]
struct Ports {
    live: Option<Vec<InputPort>>,
    defaults: Option<Vec<InputPort>>,
}

struct Session {
    driver: &'static DriverDescriptor,
    config: MachineConfig,
    settings: SessionSettings,
    phase: Phase,
    stages: Vec<Stage>,
    ports: Ports,
    settings_loaded: bool,
    video: VideoState,
    paused: bool,
    frames: u64,
}

impl Session {
    fn new(driver: &'static DriverDescriptor, config: MachineConfig, settings: SessionSettings) -> Self {
        Self {
            driver,
            config,
            settings,
            phase: Phase::OptionsResolved,
            stages: Vec::new(),
            ports: Ports::default(),
            settings_loaded: false,
            video: VideoState::default(),
            paused: false,
            frames: 0,
        }
    }
}

/// Owns the host collaborators and runs at most one session on them.
pub struct Controller {
    host: Host,
    storage: StorageAdapter,
    options: Options,
    diagnostics: Diagnostics,
    session: Option<Session>,
}

impl Controller {
    pub fn new(host: Host, storage: Box<dyn StorageBackend>, options: Options) -> Self {
        Self {
            host,
            storage: StorageAdapter::new(storage),
            options,
            diagnostics: Diagnostics::default(),
            session: None,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut Host {
        &mut self.host
    }

    pub fn storage(&self) -> &StorageAdapter {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut StorageAdapter {
        &mut self.storage
    }

    /// Diagnostics of the most recent start attempt.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn phase(&self) -> Option<Phase> {
        self.session.as_ref().map(|s| s.phase)
    }

    pub fn driver(&self) -> Option<&'static DriverDescriptor> {
        self.session.as_ref().map(|s| s.driver)
    }

    pub fn config(&self) -> Option<&MachineConfig> {
        self.session.as_ref().map(|s| &s.config)
    }

    pub fn settings(&self) -> Option<&SessionSettings> {
        self.session.as_ref().map(|s| &s.settings)
    }

    pub fn settings_loaded(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.settings_loaded)
    }

    pub fn input_ports(&self) -> Option<&[InputPort]> {
        self.session.as_ref()?.ports.live.as_deref()
    }

    /// The frame bitmap, once video is up.
    pub fn frame(&self) -> Option<&Bitmap> {
        self.session.as_ref()?.video.bitmap.as_ref()
    }

    pub fn gfx(&self) -> &[GfxElement] {
        match &self.session {
            Some(session) => &session.video.gfx,
            None => &[],
        }
    }

    pub fn visible_area(&self) -> Option<Rect> {
        self.session.as_ref().map(|s| s.video.render.visible_area())
    }

    pub fn is_paused(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.paused)
    }

    /// Bring a session for `driver` up to [`Phase::VideoReady`].
    ///
    /// On failure everything acquired so far has been released and the
    /// error carries the first diagnostic reported.
    pub fn start_session(&mut self, driver: &'static DriverDescriptor) -> Result<(), SessionError> {
        if self.session.is_some() {
            warn!(driver = driver.name, "session already active");
            return Err(SessionError::Busy);
        }
        self.diagnostics = Diagnostics::default();
        info!(driver = driver.name, "starting session");

        let config = match build_config(driver) {
            Ok(config) => config,
            Err(err) => {
                self.diagnostics.bail("Unable to initialize machine emulation");
                return Err(self.stage_failure(Phase::OptionsResolved, err.into()));
            }
        };
        let settings = SessionSettings::resolve(&self.options, &config);
        debug!(
            depth = settings.color_depth,
            cpus = config.cpus.len(),
            sounds = config.sounds.len(),
            "options resolved"
        );

        if let Err(source) = self.host.platform.init() {
            self.diagnostics.bail("Unable to initialize system");
            return Err(SessionError::FatalStartup {
                message: "Unable to initialize system",
                cause: StepError::Host { step: "platform init", source },
            });
        }
        let mut session = Session::new(driver, config, settings);
        session.stages.push(Stage::Platform);
        session.phase = Phase::PlatformReady;

        let language_file = self.options.language_file.clone();
        match machine::init(&mut self.host, &mut self.storage, &mut session, language_file.as_deref()) {
            Ok(undo) => {
                session.stages.push(Stage::Machine(undo));
                session.phase = Phase::MachineInitialized;
            }
            Err(cause) => {
                self.diagnostics.bail("Unable to initialize machine emulation");
                return Err(self.abandon(session, Phase::MachineInitialized, cause));
            }
        }

        match video::open(&mut self.host, &mut session, &mut self.diagnostics) {
            Ok(undo) => {
                session.stages.push(Stage::Video(undo));
                session.phase = Phase::VideoReady;
            }
            Err(cause) => {
                self.diagnostics.bail("Unable to start machine emulation");
                return Err(self.abandon(session, Phase::VideoReady, cause));
            }
        }

        info!(driver = driver.name, "session ready");
        self.session = Some(session);
        Ok(())
    }

    /// Show the start-up screens and run the machine until it quits or
    /// resets. The session stays active afterwards; call
    /// [`end_session`](Self::end_session) to release it.
    pub fn run_session(&mut self) -> Result<RunOutcome, SessionError> {
        let Self { host, storage, options, session, .. } = self;
        let session = session.as_mut().ok_or(SessionError::NoSession)?;
        if session.phase == Phase::Running {
            return Err(SessionError::AlreadyRunning);
        }

        host.platform.enable_artwork(false);
        if execution::gate(host, session, options) == Gate::Quit {
            info!(driver = session.driver.name, "quit at start-up screen");
            return Ok(RunOutcome::Quit);
        }

        let undo = execution::start(host, storage, session);
        session.stages.push(Stage::Execution(undo));
        session.phase = Phase::Running;
        info!(driver = session.driver.name, "running");

        let outcome = execution::run(host, session, options.pause_brightness);
        info!(?outcome, frames = session.frames, "execution finished");
        Ok(outcome)
    }

    /// Release everything the session holds, latest stage first.
    pub fn end_session(&mut self) -> Result<(), SessionError> {
        let session = self.session.take().ok_or(SessionError::NoSession)?;
        let driver = session.driver.name;
        self.unwind(session);
        info!(driver, "session ended");
        Ok(())
    }

    pub fn pause_session(&mut self, pause: bool) -> Result<(), SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        execution::apply_pause(
            &mut *self.host.platform,
            &mut *self.host.palette,
            &mut session.video.render,
            &mut session.paused,
            self.options.pause_brightness,
            pause,
        );
        Ok(())
    }

    /// Run `driver` to completion, restarting it on soft reset. Returns the
    /// process exit status.
    pub fn run_game(&mut self, driver: &'static DriverDescriptor) -> i32 {
        loop {
            if let Err(err) = self.start_session(driver) {
                return err.exit_code();
            }
            let outcome = self.run_session();
            if let Err(err) = self.end_session() {
                warn!(%err, "session vanished before shutdown");
            }
            match outcome {
                Ok(RunOutcome::Reset) => info!(driver = driver.name, "soft reset"),
                Ok(RunOutcome::Quit) => return 0,
                Err(err) => return err.exit_code(),
            }
        }
    }

    /// Change the visible area outside the frame loop.
    pub fn set_visible_area(&mut self, area: Rect) -> Result<bool, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        let changed = session.video.render.set_visible_area(area);
        if changed {
            self.host.cpu.compute_scanline_timing(&area);
        }
        Ok(changed)
    }

    pub fn schedule_full_refresh(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.video.render.schedule_full_refresh();
        }
    }

    pub fn set_led_status(&mut self, num: u32, on: bool) {
        if let Some(session) = self.session.as_mut() {
            session.video.set_led(num, on);
        }
    }

    /// High scores are only kept for unassisted play.
    pub fn highscore_enabled(&self) -> bool {
        self.options.record.is_none() && self.options.playback.is_none() && !self.host.ui.cheated()
    }

    pub fn performance(&self) -> Option<PerformanceInfo> {
        self.session.as_ref().map(|s| PerformanceInfo {
            partial_updates_this_frame: s.video.render.partial_updates_this_frame(),
            frames: s.frames,
        })
    }

    /// Index of the CPU slot tagged `tag` in the running configuration.
    pub fn find_cpu_index(&self, tag: &str) -> Option<usize> {
        self.session.as_ref()?.config.cpus.index_of(tag)
    }

    fn stage_failure(&self, phase: Phase, cause: StepError) -> SessionError {
        SessionError::StageFailure {
            phase,
            message: self.diagnostics.message().unwrap_or("Unable to start machine emulation"),
            cause,
        }
    }

    fn abandon(&mut self, session: Session, phase: Phase, cause: StepError) -> SessionError {
        debug!(?phase, %cause, "start-up failed, unwinding");
        self.unwind(session);
        self.stage_failure(phase, cause)
    }

    fn unwind(&mut self, mut session: Session) {
        while let Some(stage) = session.stages.pop() {
            match stage {
                Stage::Execution(undo) => {
                    execution::teardown(&mut self.host, &mut self.storage, &mut session, undo)
                }
                Stage::Video(undo) => video::close(&mut self.host, &mut session.video, undo),
                Stage::Machine(undo) => {
                    machine::teardown(&mut self.host, &mut self.storage, &mut session, undo)
                }
                Stage::Platform => self.host.platform.exit(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_bail_wins() {
        let mut diagnostics = Diagnostics::default();
        assert!(!diagnostics.is_bailing());
        diagnostics.bail("Unable to start video emulation");
        diagnostics.bail("Unable to start machine emulation");
        assert_eq!(diagnostics.message(), Some("Unable to start video emulation"));
    }

    #[test]
    fn phases_are_ordered() {
        assert!(Phase::OptionsResolved < Phase::PlatformReady);
        assert!(Phase::VideoReady < Phase::Running);
    }
}
