//! Read-only projection of the session for rendering.

use studysnap_core::types::{QuizResult, percentage};
use studysnap_media::NarrationStatus;

use crate::state::{Phase, SessionState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// 1-based position of the current question.
    pub position: usize,
    pub total: usize,
    /// `position / total * 100`, rounded.
    pub percent: u32,
}

impl Progress {
    pub fn label(&self) -> String {
        format!("Question {} of {}", self.position, self.total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    pub prompt: String,
    pub options: Vec<String>,
    pub selected: Option<usize>,
    /// Revealed once the question is answered.
    pub correct_index: Option<usize>,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub phase: Phase,
    pub question_count: Option<u8>,
    pub progress: Option<Progress>,
    pub question: Option<QuestionView>,
    /// Correct answers so far, while presenting.
    pub running_score: Option<usize>,
    pub result: Option<QuizResult>,
    pub error: Option<String>,
    pub narration: NarrationStatus,
}

impl SessionView {
    pub fn project(state: &SessionState, narration: NarrationStatus) -> Self {
        let mut view = SessionView {
            phase: state.phase(),
            question_count: None,
            progress: None,
            question: None,
            running_score: None,
            result: state.result(),
            error: None,
            narration,
        };

        match state {
            SessionState::Capturing { last_error } => {
                view.error = last_error.as_ref().map(ToString::to_string);
            }
            SessionState::Configuring { count, .. } | SessionState::Generating { count, .. } => {
                view.question_count = Some(count.get());
            }
            SessionState::Presenting(run) => {
                let index = run.current_index();
                let total = run.questions().len();
                let question = run.current_question();
                let answered = run.ledger().is_answered(index);

                view.question_count = u8::try_from(total).ok();
                view.progress = Some(Progress {
                    position: index + 1,
                    total,
                    percent: percentage(index + 1, total).unwrap_or(0),
                });
                view.question = Some(QuestionView {
                    prompt: question.prompt().to_string(),
                    options: question.options().to_vec(),
                    selected: run.selection(index),
                    correct_index: answered.then(|| question.correct_index()),
                    explanation: answered.then(|| question.explanation().to_string()),
                });
                view.running_score = Some(run.ledger().correct());
            }
            SessionState::Failed { message, .. } => {
                view.error = Some(message.clone());
            }
            SessionState::Welcome | SessionState::Completed { .. } => {}
        }

        view
    }
}
