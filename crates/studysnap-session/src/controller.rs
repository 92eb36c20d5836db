//! Session controller: the only writer of [`SessionState`].
//!
//! | From        | Operation                          | To                     |
//! |-------------|------------------------------------|------------------------|
//! | Welcome     | `start_capture`                    | Capturing              |
//! | Capturing   | `capture` / `submit_image`         | Configuring            |
//! | Capturing   | `cancel`                           | Welcome                |
//! | Configuring | `retake`                           | Capturing              |
//! | Configuring | `confirm_generate`                 | Generating             |
//! | Generating  | `receive_questions`                | Presenting             |
//! | Generating  | `receive_error`                    | Failed                 |
//! | Presenting  | `record_answer`, `advance`         | Presenting / Completed |
//! | Failed      | `retry`                            | Capturing              |
//! | any         | `reset`                            | Welcome                |
//!
//! Anything else is rejected with [`SessionError::InvalidTransition`] and
//! leaves the state as it was.

use std::sync::Arc;

use tracing::{debug, info, warn};

use studysnap_core::types::{ImagePayload, OPTION_COUNT, QuestionCount, QuizQuestion, QuizResult};
use studysnap_media::{NarrationController, NarrationOutcome};
use studysnap_providers::{
    CaptureConstraints, ContentGenerationGateway, GenerationError, ImageCaptureDevice,
    capture_with_fallback, ensure_count,
};

use crate::error::{Result, SessionError};
use crate::ledger::RecordOutcome;
use crate::state::{Phase, QuizRun, SessionState};
use crate::view::SessionView;

/// Shown to the user whenever generation fails, whatever the cause.
pub const FAILURE_MESSAGE: &str = "Failed to analyze image. Please try again with a clearer photo.";

/// Work order for one generation round trip.
///
/// The response must be handed back with the same `ticket`; answers for any
/// other ticket are dropped.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub ticket: u64,
    pub image: ImagePayload,
    pub count: QuestionCount,
}

/// Outcome of answering the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub question_index: usize,
    pub selected: usize,
    pub correct_index: usize,
    pub is_correct: bool,
    pub explanation: String,
}

pub struct SessionController {
    state: SessionState,
    generator: Arc<dyn ContentGenerationGateway>,
    camera: Arc<dyn ImageCaptureDevice>,
    capture_attempts: Vec<CaptureConstraints>,
    default_count: QuestionCount,
    narrator: NarrationController,
    next_ticket: u64,
}

impl SessionController {
    pub fn new(
        generator: Arc<dyn ContentGenerationGateway>,
        camera: Arc<dyn ImageCaptureDevice>,
        narrator: NarrationController,
    ) -> Self {
        Self {
            state: SessionState::Welcome,
            generator,
            camera,
            capture_attempts: vec![CaptureConstraints::default()],
            default_count: QuestionCount::default(),
            narrator,
            next_ticket: 0,
        }
    }

    /// Ordered constraint sets tried by [`capture`](Self::capture).
    pub fn with_capture_attempts(mut self, attempts: Vec<CaptureConstraints>) -> Self {
        self.capture_attempts = attempts;
        self
    }

    pub fn with_default_count(mut self, count: QuestionCount) -> Self {
        self.default_count = count;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn narrator(&self) -> &NarrationController {
        &self.narrator
    }

    pub fn view(&self) -> SessionView {
        SessionView::project(&self.state, self.narrator.status())
    }

    pub fn current_question(&self) -> Option<&QuizQuestion> {
        match &self.state {
            SessionState::Presenting(run) => Some(run.current_question()),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<QuizResult> {
        self.state.result()
    }

    // --- capture ---

    pub fn start_capture(&mut self) -> Result<()> {
        self.expect(Phase::Welcome, "start capture")?;
        self.transition(SessionState::Capturing { last_error: None });
        Ok(())
    }

    /// Acquire an image through the configured attempts and submit it.
    ///
    /// On failure the session stays in Capturing with the error recorded, so
    /// calling this again retries the device.
    pub async fn capture(&mut self) -> Result<()> {
        self.expect(Phase::Capturing, "capture")?;

        let camera = Arc::clone(&self.camera);
        let captured = capture_with_fallback(camera.as_ref(), &self.capture_attempts).await;
        match captured {
            Ok(image) => self.submit_image(image),
            Err(e) => {
                warn!(%e, "Capture failed");
                if let SessionState::Capturing { last_error } = &mut self.state {
                    *last_error = Some(e.clone());
                }
                Err(SessionError::Capture(e))
            }
        }
    }

    pub fn submit_image(&mut self, image: ImagePayload) -> Result<()> {
        self.expect(Phase::Capturing, "submit an image")?;
        if image.is_empty() {
            return Err(SessionError::EmptyImage);
        }
        debug!(bytes = image.len(), mime = image.mime_type(), "Image submitted");
        self.transition(SessionState::Configuring {
            image,
            count: self.default_count,
        });
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.expect(Phase::Capturing, "cancel capture")?;
        self.transition(SessionState::Welcome);
        Ok(())
    }

    // --- configuring ---

    pub fn set_question_count(&mut self, n: u8) -> Result<()> {
        let phase = self.phase();
        let SessionState::Configuring { count, .. } = &mut self.state else {
            return Err(invalid(phase, "set the question count"));
        };
        *count = QuestionCount::new(n).ok_or(SessionError::InvalidQuestionCount(n))?;
        debug!(count = n, "Question count set");
        Ok(())
    }

    pub fn retake(&mut self) -> Result<()> {
        self.expect(Phase::Configuring, "retake")?;
        self.transition(SessionState::Capturing { last_error: None });
        Ok(())
    }

    // --- generation ---

    /// Enter Generating and hand out the request to run.
    ///
    /// While a request is outstanding further calls fail with
    /// [`SessionError::GenerationInFlight`], so only one round trip is ever issued.
    pub fn begin_generation(&mut self) -> Result<GenerationRequest> {
        let (image, count) = match &self.state {
            SessionState::Configuring { image, count } => (image.clone(), *count),
            SessionState::Generating { .. } => return Err(SessionError::GenerationInFlight),
            other => return Err(invalid(other.phase(), "generate a quiz")),
        };

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        info!(ticket, count = count.get(), "Generating quiz");
        self.transition(SessionState::Generating {
            image: image.clone(),
            count,
            ticket,
        });

        Ok(GenerationRequest {
            ticket,
            image,
            count,
        })
    }

    pub fn receive_questions(&mut self, ticket: u64, questions: Vec<QuizQuestion>) -> Result<()> {
        let count = self.pending_count(ticket)?;

        match ensure_count(questions, count) {
            Ok(questions) => {
                info!(ticket, questions = questions.len(), "Quiz ready");
                self.narrator.reset_question();
                self.transition(SessionState::Presenting(QuizRun::new(questions)));
            }
            Err(e) => self.fail(ticket, e),
        }
        Ok(())
    }

    pub fn receive_error(&mut self, ticket: u64, error: GenerationError) -> Result<()> {
        self.pending_count(ticket)?;
        self.fail(ticket, error);
        Ok(())
    }

    /// Run a full generation round trip against the configured gateway.
    ///
    /// A failed generation is not an `Err`: the session moves to Failed.
    pub async fn confirm_generate(&mut self) -> Result<()> {
        let request = self.begin_generation()?;
        let generator = Arc::clone(&self.generator);

        match generator.generate_quiz(&request.image, request.count).await {
            Ok(questions) => self.receive_questions(request.ticket, questions),
            Err(e) => self.receive_error(request.ticket, e),
        }
    }

    pub fn retry(&mut self) -> Result<()> {
        self.expect(Phase::Failed, "retry")?;
        self.transition(SessionState::Capturing { last_error: None });
        Ok(())
    }

    // --- presenting ---

    /// Answer the current question.
    ///
    /// Returns `None` when the question was already answered; the ledger is
    /// left untouched in that case.
    pub fn record_answer(&mut self, selected: usize) -> Result<Option<AnswerFeedback>> {
        let phase = self.phase();
        let SessionState::Presenting(run) = &mut self.state else {
            return Err(invalid(phase, "answer"));
        };
        if selected >= OPTION_COUNT {
            return Err(SessionError::InvalidOption(selected));
        }

        let index = run.current_index();
        let question = run.current_question().clone();
        match run
            .ledger_mut()
            .record_answer(index, selected, question.correct_index())
        {
            RecordOutcome::Recorded { correct } => {
                run.select(selected);
                info!(
                    question = index,
                    selected,
                    correct,
                    score = run.ledger().correct(),
                    "Answer recorded"
                );
                Ok(Some(AnswerFeedback {
                    question_index: index,
                    selected,
                    correct_index: question.correct_index(),
                    is_correct: correct,
                    explanation: question.explanation().to_string(),
                }))
            }
            RecordOutcome::Duplicate | RecordOutcome::OutOfRange => {
                debug!(question = index, selected, "Ignoring repeated answer");
                Ok(None)
            }
        }
    }

    /// Move to the next question, or finish after the last one.
    ///
    /// Narration for the question being left is always stopped first.
    pub fn advance(&mut self) -> Result<()> {
        let phase = self.phase();
        let SessionState::Presenting(run) = &mut self.state else {
            return Err(invalid(phase, "advance"));
        };
        if !run.ledger().is_answered(run.current_index()) {
            return Err(SessionError::NotAnswered);
        }

        self.narrator.reset_question();

        if !run.is_last() {
            run.step();
            debug!(question = run.current_index(), "Next question");
            return Ok(());
        }

        self.state = match std::mem::take(&mut self.state) {
            SessionState::Presenting(run) => {
                let (questions, ledger) = run.into_parts();
                // The ledger already holds the answer to the last question.
                let score = ledger.correct();
                info!(
                    score,
                    total = questions.len(),
                    percentage = ledger.percentage(),
                    "Quiz completed"
                );
                SessionState::Completed {
                    questions,
                    ledger,
                    score,
                }
            }
            other => other,
        };
        Ok(())
    }

    /// Narrate the current question. `None` outside Presenting.
    pub async fn narrate_current(&self) -> Option<NarrationOutcome> {
        let SessionState::Presenting(run) = &self.state else {
            return None;
        };
        Some(
            self.narrator
                .request_narration(run.current_index(), run.current_question())
                .await,
        )
    }

    /// Read-aloud button: stop if playing, otherwise narrate the current question.
    pub async fn toggle_narration(&self) -> Option<NarrationOutcome> {
        let SessionState::Presenting(run) = &self.state else {
            return None;
        };
        Some(
            self.narrator
                .toggle_narration(run.current_index(), run.current_question())
                .await,
        )
    }

    // --- any state ---

    /// Discard the session and release narration resources.
    pub fn reset(&mut self) {
        self.narrator.shutdown();
        self.transition(SessionState::Welcome);
    }

    fn pending_count(&self, ticket: u64) -> Result<QuestionCount> {
        match &self.state {
            SessionState::Generating {
                ticket: current,
                count,
                ..
            } if *current == ticket => Ok(*count),
            _ => {
                debug!(ticket, phase = %self.phase(), "Dropping stale generation response");
                Err(SessionError::StaleResponse(ticket))
            }
        }
    }

    fn fail(&mut self, ticket: u64, cause: GenerationError) {
        warn!(ticket, error = %cause, "Quiz generation failed");
        self.transition(SessionState::Failed {
            message: FAILURE_MESSAGE.to_string(),
            cause,
        });
    }

    fn expect(&self, phase: Phase, action: &'static str) -> Result<()> {
        if self.phase() == phase {
            Ok(())
        } else {
            Err(invalid(self.phase(), action))
        }
    }

    fn transition(&mut self, next: SessionState) {
        let from = self.phase();
        self.state = next;
        if from != self.phase() {
            info!(from = %from, to = %self.phase(), "Session transition");
        }
    }
}

fn invalid(state: Phase, action: &'static str) -> SessionError {
    SessionError::InvalidTransition { state, action }
}
