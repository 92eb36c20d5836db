//! Quiz session: the lifecycle state machine that sequences capture,
//! generation, question presentation, scoring and completion.
//!
//! [`SessionController`] owns the only live [`SessionState`] and its
//! [`ScoringLedger`], and drives the per-question
//! [`NarrationController`](studysnap_media::NarrationController).
//! Rendering code reads a [`SessionView`], a pure projection of the state.

pub mod controller;
pub mod error;
pub mod ledger;
pub mod state;
pub mod view;

pub use controller::{AnswerFeedback, FAILURE_MESSAGE, GenerationRequest, SessionController};
pub use error::{Result, SessionError};
pub use ledger::{RecordOutcome, ScoringLedger};
pub use state::{Phase, QuizRun, SessionState};
pub use view::{Progress, QuestionView, SessionView};
