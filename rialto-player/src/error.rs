//! Error taxonomy. Tasks return `Result<(), PlayerError>`; the Worker
//! catches every variant at the task boundary and only a subset
//! terminate the session (see `PlayerError::is_terminal`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayerError {
    /// NO_AVAILABLE_SAMPLES: not an error so much as "try again later".
    #[error("transient demand: no samples available")]
    TransientDemand,

    /// HaveData(ERROR) from the client — handled the same as
    /// `TransientDemand` for resend purposes.
    #[error("producer reported an error")]
    ProducerError,

    /// A state-change call failed, or the bus posted GST_MESSAGE_ERROR.
    #[error("framework failure: {0}")]
    FrameworkFailure(String),

    /// RPC referenced an unknown session/source, or a call is invalid
    /// in the current state.
    #[error("misuse: {0}")]
    Misuse(String),

    /// Buffer or caps allocation returned null.
    #[error("resource exhaustion: {0}")]
    ResourceExhaustion(String),

    /// Per-buffer decrypt call returned non-OK. The buffer is still
    /// pushed downstream; this is logged, not surfaced as a failure.
    #[error("decrypt failure")]
    DecryptFailure,

    /// Unknown metadata version, or a shared-memory lookup failed.
    #[error("shared-memory corruption: {0}")]
    ShmCorruption(String),
}

impl PlayerError {
    /// Only these terminate the session. The rest are logged and the
    /// Worker continues.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlayerError::FrameworkFailure(_)
                | PlayerError::ResourceExhaustion(_)
                | PlayerError::ShmCorruption(_)
        )
    }
}

pub type PlayerResult<T> = Result<T, PlayerError>;
