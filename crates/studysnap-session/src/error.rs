use thiserror::Error;

use studysnap_providers::CaptureError;

use crate::state::Phase;

/// Rejected session operations. A rejected operation leaves the state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("cannot {action} while {state}")]
    InvalidTransition { state: Phase, action: &'static str },

    #[error("captured image is empty")]
    EmptyImage,

    #[error("question count {0} is outside 1..=10")]
    InvalidQuestionCount(u8),

    #[error("option {0} does not exist")]
    InvalidOption(usize),

    #[error("the current question has not been answered yet")]
    NotAnswered,

    #[error("a quiz is already being generated")]
    GenerationInFlight,

    #[error("ignoring response for stale generation ticket {0}")]
    StaleResponse(u64),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
