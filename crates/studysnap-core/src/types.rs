use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StudySnapError};

/// Number of answer options every question carries.
pub const OPTION_COUNT: usize = 4;

/// Smallest and largest number of questions a quiz may request.
pub const MIN_QUESTION_COUNT: u8 = 1;
pub const MAX_QUESTION_COUNT: u8 = 10;
pub const DEFAULT_QUESTION_COUNT: u8 = 5;

/// A single multiple-choice question. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQuizQuestion", into = "RawQuizQuestion")]
pub struct QuizQuestion {
    id: i64,
    prompt: String,
    options: [String; OPTION_COUNT],
    correct_index: usize,
    explanation: String,
}

/// Wire shape of a question as produced by the generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuizQuestion {
    pub id: i64,
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: i64,
    #[serde(default)]
    pub explanation: String,
}

impl QuizQuestion {
    /// Build a question, checking option count, distinctness, and the answer index.
    pub fn new(
        id: i64,
        prompt: impl Into<String>,
        options: Vec<String>,
        correct_index: usize,
        explanation: impl Into<String>,
    ) -> Result<Self> {
        let options: [String; OPTION_COUNT] = options.try_into().map_err(|v: Vec<String>| {
            StudySnapError::InvalidQuestion(format!(
                "question {id} has {} options, expected {OPTION_COUNT}",
                v.len()
            ))
        })?;

        for (i, a) in options.iter().enumerate() {
            if options[i + 1..].iter().any(|b| b == a) {
                return Err(StudySnapError::InvalidQuestion(format!(
                    "question {id} repeats option '{a}'"
                )));
            }
        }

        if correct_index >= OPTION_COUNT {
            return Err(StudySnapError::InvalidQuestion(format!(
                "question {id} has correct index {correct_index} outside 0..{OPTION_COUNT}"
            )));
        }

        Ok(Self {
            id,
            prompt: prompt.into(),
            options,
            correct_index,
            explanation: explanation.into(),
        })
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn options(&self) -> &[String; OPTION_COUNT] {
        &self.options
    }

    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn is_correct(&self, selected: usize) -> bool {
        selected == self.correct_index
    }
}

impl TryFrom<RawQuizQuestion> for QuizQuestion {
    type Error = StudySnapError;

    fn try_from(raw: RawQuizQuestion) -> Result<Self> {
        let correct_index = usize::try_from(raw.correct_index).map_err(|_| {
            StudySnapError::InvalidQuestion(format!(
                "question {} has negative correct index {}",
                raw.id, raw.correct_index
            ))
        })?;
        Self::new(raw.id, raw.text, raw.options, correct_index, raw.explanation)
    }
}

impl From<QuizQuestion> for RawQuizQuestion {
    fn from(q: QuizQuestion) -> Self {
        Self {
            id: q.id,
            text: q.prompt,
            options: q.options.into(),
            correct_index: q.correct_index as i64,
            explanation: q.explanation,
        }
    }
}

/// Build the spoken narration for a question.
///
/// `position` is the 0-based index of the question in the quiz; it is read out 1-based.
pub fn narration_script(position: usize, question: &QuizQuestion) -> String {
    let options = question
        .options()
        .iter()
        .enumerate()
        .map(|(i, opt)| format!("{}. {opt}", i + 1))
        .collect::<Vec<_>>()
        .join(". ");
    format!(
        "Question {}. {}. Options: {options}.",
        position + 1,
        question.prompt()
    )
}

/// Requested number of questions, always within 1–10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct QuestionCount(u8);

impl QuestionCount {
    /// Accept `n` only if it lies within 1–10.
    pub fn new(n: u8) -> Option<Self> {
        (MIN_QUESTION_COUNT..=MAX_QUESTION_COUNT)
            .contains(&n)
            .then_some(Self(n))
    }

    /// Saturate `n` into 1–10 (slider semantics).
    pub fn clamped(n: i64) -> Self {
        Self(n.clamp(MIN_QUESTION_COUNT as i64, MAX_QUESTION_COUNT as i64) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl Default for QuestionCount {
    fn default() -> Self {
        Self(DEFAULT_QUESTION_COUNT)
    }
}

impl TryFrom<u8> for QuestionCount {
    type Error = String;

    fn try_from(n: u8) -> std::result::Result<Self, Self::Error> {
        Self::new(n).ok_or_else(|| {
            format!("question count {n} outside {MIN_QUESTION_COUNT}..={MAX_QUESTION_COUNT}")
        })
    }
}

impl From<QuestionCount> for u8 {
    fn from(c: QuestionCount) -> Self {
        c.0
    }
}

impl std::fmt::Display for QuestionCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A captured still image: opaque encoded bytes plus their MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    mime_type: String,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Parse a `data:image/...;base64,` URL (or bare base64, assumed JPEG).
    pub fn from_data_url(url: &str) -> Result<Self> {
        let (mime_type, data) = match url.strip_prefix("data:") {
            Some(rest) => {
                let (header, data) = rest.split_once(',').ok_or_else(|| {
                    StudySnapError::InvalidImage("data URL has no payload".into())
                })?;
                let mime = header.strip_suffix(";base64").ok_or_else(|| {
                    StudySnapError::InvalidImage("data URL is not base64 encoded".into())
                })?;
                let mime = match mime {
                    "image/png" => "image/png",
                    "image/jpeg" | "image/jpg" => "image/jpeg",
                    other => {
                        return Err(StudySnapError::InvalidImage(format!(
                            "unsupported image type '{other}'"
                        )));
                    }
                };
                (mime, data)
            }
            None => ("image/jpeg", url),
        };

        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|e| StudySnapError::InvalidImage(e.to_string()))?;
        Ok(Self::new(bytes, mime_type))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Camera facing preference for a capture attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    /// Rear camera on phones; preferred for photographing pages.
    #[default]
    Environment,
    User,
    Any,
}

/// Final tally of a finished quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub total_questions: usize,
    pub correct_answers: usize,
    pub score_percentage: u32,
}

impl QuizResult {
    /// `None` when there were no questions.
    pub fn new(total_questions: usize, correct_answers: usize) -> Option<Self> {
        let score_percentage = percentage(correct_answers, total_questions)?;
        Some(Self {
            total_questions,
            correct_answers,
            score_percentage,
        })
    }
}

/// `round(part / whole * 100)`, undefined for an empty whole.
pub fn percentage(part: usize, whole: usize) -> Option<u32> {
    if whole == 0 {
        return None;
    }
    Some((part as f64 / whole as f64 * 100.0).round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_question_requires_four_options() {
        let err = QuizQuestion::new(1, "Q", opts(&["a", "b", "c"]), 0, "").unwrap_err();
        assert!(err.to_string().contains("3 options"));
    }

    #[test]
    fn test_question_rejects_duplicate_options() {
        let err = QuizQuestion::new(1, "Q", opts(&["a", "b", "a", "d"]), 0, "").unwrap_err();
        assert!(err.to_string().contains("repeats"));
    }

    #[test]
    fn test_question_rejects_out_of_range_answer() {
        assert!(QuizQuestion::new(1, "Q", opts(&["a", "b", "c", "d"]), 4, "").is_err());
    }

    #[test]
    fn test_question_wire_deserialization() {
        let json = r#"{"id":7,"text":"What is H2O?","options":["Water","Salt","Air","Fire"],"correctIndex":0,"explanation":"Two hydrogens, one oxygen."}"#;
        let q: QuizQuestion = serde_json::from_str(json).unwrap();
        assert_eq!(q.id(), 7);
        assert_eq!(q.prompt(), "What is H2O?");
        assert_eq!(q.correct_index(), 0);
        assert!(q.is_correct(0));
        assert!(!q.is_correct(2));

        let back = serde_json::to_value(&q).unwrap();
        assert_eq!(back["correctIndex"], 0);
        assert_eq!(back["text"], "What is H2O?");
    }

    #[test]
    fn test_question_wire_negative_index_rejected() {
        let json = r#"{"id":1,"text":"Q","options":["a","b","c","d"],"correctIndex":-1,"explanation":""}"#;
        assert!(serde_json::from_str::<QuizQuestion>(json).is_err());
    }

    #[test]
    fn test_narration_script_format() {
        let q = QuizQuestion::new(
            3,
            "Which planet is largest",
            opts(&["Mars", "Jupiter", "Venus", "Earth"]),
            1,
            "",
        )
        .unwrap();
        assert_eq!(
            narration_script(1, &q),
            "Question 2. Which planet is largest. Options: 1. Mars. 2. Jupiter. 3. Venus. 4. Earth."
        );
    }

    #[test]
    fn test_question_count_bounds() {
        assert!(QuestionCount::new(0).is_none());
        assert!(QuestionCount::new(11).is_none());
        assert_eq!(QuestionCount::new(10).map(QuestionCount::get), Some(10));
        assert_eq!(QuestionCount::clamped(-3).get(), 1);
        assert_eq!(QuestionCount::clamped(42).get(), 10);
        assert_eq!(QuestionCount::default().get(), 5);
    }

    #[test]
    fn test_image_from_data_url_strips_header() {
        let payload = ImagePayload::from_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(payload.bytes(), b"hello");
        assert_eq!(payload.mime_type(), "image/png");

        let jpg = ImagePayload::from_data_url("data:image/jpg;base64,aGVsbG8=").unwrap();
        assert_eq!(jpg.mime_type(), "image/jpeg");

        let bare = ImagePayload::from_data_url("aGVsbG8=").unwrap();
        assert_eq!(bare.mime_type(), "image/jpeg");
        assert_eq!(bare.to_base64(), "aGVsbG8=");
    }

    #[test]
    fn test_image_from_data_url_rejects_other_types() {
        assert!(ImagePayload::from_data_url("data:image/gif;base64,aGVsbG8=").is_err());
        assert!(ImagePayload::from_data_url("data:image/png,raw").is_err());
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(2, 3), Some(67));
        assert_eq!(percentage(1, 3), Some(33));
        assert_eq!(percentage(0, 0), None);
        let result = QuizResult::new(4, 4).unwrap();
        assert_eq!(result.score_percentage, 100);
    }
}
