use thiserror::Error;

use crate::driver::SlotError;
use crate::host::HostError;
use crate::session::Phase;
use crate::video::{AllocError, GfxError};

/// A lifecycle sub-step that failed.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("{step} failed: {source}")]
    Host {
        step: &'static str,
        #[source]
        source: HostError,
    },

    #[error(transparent)]
    Gfx(#[from] GfxError),

    #[error(transparent)]
    Alloc(#[from] AllocError),

    #[error(transparent)]
    Slot(#[from] SlotError),
}

impl StepError {
    /// Adapter for `map_err` on collaborator calls.
    pub fn host(step: &'static str) -> impl FnOnce(HostError) -> Self {
        move |source| Self::Host { step, source }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a session is already active")]
    Busy,

    #[error("no session is active")]
    NoSession,

    #[error("the session has already entered execution")]
    AlreadyRunning,

    /// The platform could not be brought up; nothing else was attempted.
    #[error("{message}")]
    FatalStartup {
        message: &'static str,
        #[source]
        cause: StepError,
    },

    /// A later stage failed and everything before it was unwound.
    #[error("{message}")]
    StageFailure {
        phase: Phase,
        message: &'static str,
        #[source]
        cause: StepError,
    },
}

impl SessionError {
    /// Process exit status for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_adapter_names_step() {
        let err = Err::<(), _>(HostError::failed("no display"))
            .map_err(StepError::host("create display"))
            .unwrap_err();
        assert_eq!(err.to_string(), "create display failed: no display");
    }

    #[test]
    fn stage_failure_displays_surfaced_message() {
        let err = SessionError::StageFailure {
            phase: Phase::VideoReady,
            message: "Out of memory decoding gfx",
            cause: StepError::Gfx(GfxError::OutOfMemory),
        };
        assert_eq!(err.to_string(), "Out of memory decoding gfx");
        assert_eq!(err.exit_code(), 1);
    }
}
