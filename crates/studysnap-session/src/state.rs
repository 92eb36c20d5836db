//! Tagged session state. Each variant carries exactly the data that is
//! meaningful in that phase, so e.g. questions cannot linger after a failure.

use std::fmt;

use studysnap_core::types::{ImagePayload, QuestionCount, QuizQuestion, QuizResult};
use studysnap_providers::{CaptureError, GenerationError};

use crate::ledger::ScoringLedger;

/// Lifecycle phase without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Welcome,
    Capturing,
    Configuring,
    Generating,
    Presenting,
    Completed,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Welcome => "welcome",
            Phase::Capturing => "capturing",
            Phase::Configuring => "configuring",
            Phase::Generating => "generating",
            Phase::Presenting => "presenting",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A quiz being answered.
#[derive(Debug, Clone)]
pub struct QuizRun {
    questions: Vec<QuizQuestion>,
    current: usize,
    ledger: ScoringLedger,
    selections: Vec<Option<usize>>,
}

impl QuizRun {
    /// Start at the first question with a fresh ledger. `questions` must be non-empty.
    pub(crate) fn new(questions: Vec<QuizQuestion>) -> Self {
        let total = questions.len();
        Self {
            questions,
            current: 0,
            ledger: ScoringLedger::new(total),
            selections: vec![None; total],
        }
    }

    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> &QuizQuestion {
        &self.questions[self.current]
    }

    pub fn is_last(&self) -> bool {
        self.current + 1 == self.questions.len()
    }

    pub fn ledger(&self) -> &ScoringLedger {
        &self.ledger
    }

    /// Option chosen for the question at `index`, if answered.
    pub fn selection(&self, index: usize) -> Option<usize> {
        self.selections.get(index).copied().flatten()
    }

    pub(crate) fn ledger_mut(&mut self) -> &mut ScoringLedger {
        &mut self.ledger
    }

    pub(crate) fn select(&mut self, selected: usize) {
        self.selections[self.current] = Some(selected);
    }

    pub(crate) fn step(&mut self) {
        self.current += 1;
    }

    pub(crate) fn into_parts(self) -> (Vec<QuizQuestion>, ScoringLedger) {
        (self.questions, self.ledger)
    }
}

#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Welcome,
    Capturing {
        /// Failure of the most recent capture attempt, shown to the user.
        last_error: Option<CaptureError>,
    },
    Configuring {
        image: ImagePayload,
        count: QuestionCount,
    },
    Generating {
        image: ImagePayload,
        count: QuestionCount,
        ticket: u64,
    },
    Presenting(QuizRun),
    Completed {
        questions: Vec<QuizQuestion>,
        ledger: ScoringLedger,
        /// Correct answers committed when the last question was left.
        score: usize,
    },
    Failed {
        message: String,
        cause: GenerationError,
    },
}

impl SessionState {
    pub fn phase(&self) -> Phase {
        match self {
            SessionState::Welcome => Phase::Welcome,
            SessionState::Capturing { .. } => Phase::Capturing,
            SessionState::Configuring { .. } => Phase::Configuring,
            SessionState::Generating { .. } => Phase::Generating,
            SessionState::Presenting(_) => Phase::Presenting,
            SessionState::Completed { .. } => Phase::Completed,
            SessionState::Failed { .. } => Phase::Failed,
        }
    }

    /// The captured image, from Configuring until a quiz exists.
    pub fn image(&self) -> Option<&ImagePayload> {
        match self {
            SessionState::Configuring { image, .. } | SessionState::Generating { image, .. } => {
                Some(image)
            }
            _ => None,
        }
    }

    pub fn questions(&self) -> Option<&[QuizQuestion]> {
        match self {
            SessionState::Presenting(run) => Some(run.questions()),
            SessionState::Completed { questions, .. } => Some(questions),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<QuizResult> {
        match self {
            SessionState::Completed {
                questions, score, ..
            } => QuizResult::new(questions.len(), *score),
            _ => None,
        }
    }
}
