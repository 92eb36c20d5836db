//! Gateway contracts consumed by the quiz session.
//!
//! The session only talks to the outside world through three narrow traits:
//! [`ContentGenerationGateway`] turns an image into questions,
//! [`NarrationSynthesisGateway`] turns text into speech, and
//! [`ImageCaptureDevice`] produces the still image. The Gemini implementation
//! of the first two lives in [`google`]; [`capture`] holds the capture helpers.

use async_trait::async_trait;
use thiserror::Error;

use studysnap_core::types::{Facing, ImagePayload, QuestionCount, QuizQuestion};

pub mod capture;
pub mod google;

pub use capture::{FileCaptureDevice, capture_with_fallback};
pub use google::GeminiGateway;

/// Device-level capture failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Failures of the quiz generation round trip. Never a partial result.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("generation service is not configured (missing API key)")]
    NotConfigured,
    #[error("generation service unreachable: {0}")]
    Unreachable(String),
    #[error("generation service returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("generation service returned no content")]
    EmptyResponse,
    #[error("malformed generation response: {0}")]
    Malformed(String),
    #[error("expected {expected} questions, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

/// Constraint set for a single capture attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub facing: Facing,
}

impl From<Facing> for CaptureConstraints {
    fn from(facing: Facing) -> Self {
        Self { facing }
    }
}

/// Source of still images.
#[async_trait]
pub trait ImageCaptureDevice: Send + Sync {
    /// Acquire one still image under the given constraints.
    async fn capture(&self, constraints: &CaptureConstraints) -> Result<ImagePayload, CaptureError>;
}

/// Turns study material into multiple-choice questions.
#[async_trait]
pub trait ContentGenerationGateway: Send + Sync {
    /// On success the list has exactly `count` valid questions.
    async fn generate_quiz(
        &self,
        image: &ImagePayload,
        count: QuestionCount,
    ) -> Result<Vec<QuizQuestion>, GenerationError>;
}

/// Text-to-speech for narration.
#[async_trait]
pub trait NarrationSynthesisGateway: Send + Sync {
    /// Base64-encoded mono 16-bit little-endian PCM, or `None` when speech is unavailable.
    ///
    /// Implementations never fail loudly; every error maps to `None`.
    async fn synthesize(&self, text: &str) -> Option<String>;
}

/// Check a generation result against the requested count.
///
/// Individual questions are already validated on construction, so only the
/// count can still be wrong.
pub fn ensure_count(
    questions: Vec<QuizQuestion>,
    count: QuestionCount,
) -> Result<Vec<QuizQuestion>, GenerationError> {
    if questions.len() != count.as_usize() {
        return Err(GenerationError::CountMismatch {
            expected: count.as_usize(),
            actual: questions.len(),
        });
    }
    Ok(questions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: i64) -> QuizQuestion {
        QuizQuestion::new(
            id,
            "Q",
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            0,
            "",
        )
        .unwrap()
    }

    #[test]
    fn test_ensure_count() {
        let count = QuestionCount::new(2).unwrap();
        assert_eq!(ensure_count(vec![question(1), question(2)], count).unwrap().len(), 2);

        let err = ensure_count(vec![question(1)], count).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::CountMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_constraints_from_facing() {
        let c: CaptureConstraints = Facing::User.into();
        assert_eq!(c.facing, Facing::User);
        assert_eq!(CaptureConstraints::default().facing, Facing::Environment);
    }
}
