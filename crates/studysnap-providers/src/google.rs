//! Google Generative AI (Gemini) gateway.
//!
//! Quiz generation and speech synthesis both go through the `generateContent`
//! endpoint. Auth is via the `x-goog-api-key` header, so the key never
//! appears in URLs or in error text derived from them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use studysnap_core::config::{
    Config, DEFAULT_BASE_URL, DEFAULT_QUIZ_MODEL, DEFAULT_SPEECH_MODEL, DEFAULT_VOICE,
};
use studysnap_core::types::{ImagePayload, QuestionCount, QuizQuestion, RawQuizQuestion};

use crate::{ContentGenerationGateway, GenerationError, NarrationSynthesisGateway, ensure_count};

pub struct GeminiGateway {
    pub base_url: String,
    api_key: Option<String>,
    quiz_model: String,
    speech_model: String,
    voice: String,
    client: reqwest::Client,
}

impl GeminiGateway {
    pub fn new(base_url: Option<&str>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            quiz_model: DEFAULT_QUIZ_MODEL.to_string(),
            speech_model: DEFAULT_SPEECH_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Some(&config.base_url()), config.api_key())
            .with_quiz_model(config.quiz_model())
            .with_speech_model(config.speech_model())
            .with_voice(config.voice())
    }

    pub fn with_quiz_model(mut self, model: impl Into<String>) -> Self {
        self.quiz_model = model.into();
        self
    }

    pub fn with_speech_model(mut self, model: impl Into<String>) -> Self {
        self.speech_model = model.into();
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }
}

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Transport error text with the request URL stripped.
fn describe(e: reqwest::Error) -> String {
    e.without_url().to_string()
}

// --- Gemini request/response types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<serde_json::Value>,
    generation_config: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}

impl GeminiResponse {
    fn first_candidate(&self) -> Option<&CandidateContent> {
        self.candidates.first().and_then(|c| c.content.as_ref())
    }

    /// Concatenated text parts of the first candidate.
    fn text(&self) -> Option<String> {
        let text: String = self
            .first_candidate()?
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }

    fn inline_audio(&self) -> Option<&InlineData> {
        self.first_candidate()?
            .parts
            .first()
            .and_then(|p| p.inline_data.as_ref())
            .filter(|d| !d.data.is_empty())
    }
}

fn quiz_instruction(count: QuestionCount) -> String {
    format!(
        "Analyze this study material. Generate exactly {count} multiple-choice questions based on the content. \
         The questions should test understanding of the key concepts shown. \
         Return the output strictly as a JSON array."
    )
}

fn quiz_response_schema() -> serde_json::Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "id": { "type": "INTEGER" },
                "text": { "type": "STRING", "description": "The question text" },
                "options": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "description": "Array of 4 possible answers"
                },
                "correctIndex": {
                    "type": "INTEGER",
                    "description": "Index of the correct answer (0-3)"
                },
                "explanation": {
                    "type": "STRING",
                    "description": "Short explanation why the answer is correct"
                }
            },
            "required": ["id", "text", "options", "correctIndex", "explanation"]
        }
    })
}

fn quiz_request(image: &ImagePayload, count: QuestionCount) -> GeminiRequest {
    GeminiRequest {
        contents: vec![json!({
            "parts": [
                {
                    "inlineData": {
                        "mimeType": image.mime_type(),
                        "data": image.to_base64(),
                    }
                },
                { "text": quiz_instruction(count) }
            ]
        })],
        generation_config: json!({
            "responseMimeType": "application/json",
            "responseSchema": quiz_response_schema(),
        }),
    }
}

fn speech_request(text: &str, voice: &str) -> GeminiRequest {
    GeminiRequest {
        contents: vec![json!({ "parts": [{ "text": text }] })],
        generation_config: json!({
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": {
                    "prebuiltVoiceConfig": { "voiceName": voice }
                }
            }
        }),
    }
}

/// Parse the JSON array text returned by the model into validated questions.
fn parse_questions(text: &str, count: QuestionCount) -> Result<Vec<QuizQuestion>, GenerationError> {
    let raw: Vec<RawQuizQuestion> =
        serde_json::from_str(text.trim()).map_err(|e| GenerationError::Malformed(e.to_string()))?;

    let questions = raw
        .into_iter()
        .map(QuizQuestion::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| GenerationError::Malformed(e.to_string()))?;

    ensure_count(questions, count)
}

#[async_trait]
impl ContentGenerationGateway for GeminiGateway {
    async fn generate_quiz(
        &self,
        image: &ImagePayload,
        count: QuestionCount,
    ) -> Result<Vec<QuizQuestion>, GenerationError> {
        let api_key = self.api_key.as_deref().ok_or(GenerationError::NotConfigured)?;
        let url = self.endpoint(&self.quiz_model);

        debug!(model = %self.quiz_model, %count, image_bytes = image.len(), "Requesting quiz");

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(&quiz_request(image, count))
            .send()
            .await
            .map_err(|e| GenerationError::Unreachable(describe(e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Http { status, body });
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(describe(e)))?;

        if let Some(reason) = body.candidates.first().and_then(|c| c.finish_reason.as_deref()) {
            if reason != "STOP" {
                debug!(reason, "Gemini finish reason");
            }
        }

        let text = body.text().ok_or(GenerationError::EmptyResponse)?;
        let questions = parse_questions(&text, count)?;
        info!(count = questions.len(), "Quiz generated");
        Ok(questions)
    }
}

#[async_trait]
impl NarrationSynthesisGateway for GeminiGateway {
    async fn synthesize(&self, text: &str) -> Option<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("Speech synthesis skipped: no API key configured");
            return None;
        };
        let url = self.endpoint(&self.speech_model);

        debug!(model = %self.speech_model, voice = %self.voice, text_len = text.len(), "Requesting speech");

        let response = match self
            .client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(&speech_request(text, &self.voice))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %describe(e), "Speech synthesis request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, %body, "Speech synthesis API error");
            return None;
        }

        let body: GeminiResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %describe(e), "Speech synthesis response unreadable");
                return None;
            }
        };

        match body.inline_audio() {
            Some(audio) => {
                debug!(mime = ?audio.mime_type, encoded_len = audio.data.len(), "Speech received");
                Some(audio.data.clone())
            }
            None => {
                warn!("Speech synthesis returned no audio");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(n: u8) -> QuestionCount {
        QuestionCount::new(n).unwrap()
    }

    #[test]
    fn test_gateway_creation() {
        let gateway = GeminiGateway::new(Some("https://example.test/"), None);
        assert_eq!(gateway.base_url, "https://example.test");
        assert_eq!(
            gateway.endpoint("m"),
            "https://example.test/v1beta/models/m:generateContent"
        );
        assert_eq!(GeminiGateway::new(None, None).base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_from_config_picks_models() {
        let mut config = Config::default();
        config
            .set_path("narration.voice", json!("Kore"))
            .unwrap();
        config
            .set_path("provider.api_key", json!("abc"))
            .unwrap();
        let gateway = GeminiGateway::from_config(&config);
        assert_eq!(gateway.voice, "Kore");
        assert_eq!(gateway.quiz_model, DEFAULT_QUIZ_MODEL);
        assert_eq!(gateway.api_key.as_deref(), Some("abc"));
    }

    #[test]
    fn test_quiz_request_shape() {
        let image = ImagePayload::new(b"hello".to_vec(), "image/png");
        let request = serde_json::to_value(quiz_request(&image, count(3))).unwrap();
        let parts = &request["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inlineData"]["data"], "aGVsbG8=");
        assert!(parts[1]["text"].as_str().unwrap().contains("exactly 3 multiple-choice"));
        assert_eq!(request["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(
            request["generationConfig"]["responseSchema"]["items"]["required"][3],
            "correctIndex"
        );
    }

    #[test]
    fn test_speech_request_shape() {
        let request = serde_json::to_value(speech_request("Question 1.", "Fenrir")).unwrap();
        assert_eq!(request["contents"][0]["parts"][0]["text"], "Question 1.");
        assert_eq!(request["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            request["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Fenrir"
        );
    }

    #[test]
    fn test_parse_questions_valid() {
        let text = r#"[
            {"id":1,"text":"2+2?","options":["3","4","5","6"],"correctIndex":1,"explanation":"Arithmetic."},
            {"id":2,"text":"Capital of France?","options":["Paris","Rome","Berlin","Madrid"],"correctIndex":0,"explanation":"Geography."}
        ]"#;
        let questions = parse_questions(text, count(2)).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[1].options()[0], "Paris");
    }

    #[test]
    fn test_parse_questions_rejects_bad_payloads() {
        assert!(matches!(
            parse_questions("not json", count(1)),
            Err(GenerationError::Malformed(_))
        ));

        let three_options =
            r#"[{"id":1,"text":"Q","options":["a","b","c"],"correctIndex":0,"explanation":""}]"#;
        assert!(matches!(
            parse_questions(three_options, count(1)),
            Err(GenerationError::Malformed(_))
        ));

        let bad_index =
            r#"[{"id":1,"text":"Q","options":["a","b","c","d"],"correctIndex":7,"explanation":""}]"#;
        assert!(matches!(
            parse_questions(bad_index, count(1)),
            Err(GenerationError::Malformed(_))
        ));

        let one = r#"[{"id":1,"text":"Q","options":["a","b","c","d"],"correctIndex":0,"explanation":""}]"#;
        assert!(matches!(
            parse_questions(one, count(2)),
            Err(GenerationError::CountMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_response_text_and_audio_extraction() {
        let json = r#"{"candidates":[{"content":{"parts":[{"text":"[{\"id\":"},{"text":"1}]"}]},"finishReason":"STOP"}]}"#;
        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text().as_deref(), Some("[{\"id\":1}]"));

        let audio = r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"audio/L16;rate=24000","data":"AAEC"}}]}}]}"#;
        let response: GeminiResponse = serde_json::from_str(audio).unwrap();
        assert_eq!(response.inline_audio().map(|d| d.data.as_str()), Some("AAEC"));
        assert!(response.text().is_none());

        let empty: GeminiResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(empty.text().is_none());
        assert!(empty.inline_audio().is_none());
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let gateway = GeminiGateway::new(None, None);
        let image = ImagePayload::new(vec![1], "image/jpeg");
        assert!(matches!(
            gateway.generate_quiz(&image, count(1)).await,
            Err(GenerationError::NotConfigured)
        ));
        assert!(gateway.synthesize("hello").await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        // Port 9 (discard) on localhost is closed in test environments.
        let gateway = GeminiGateway::new(Some("http://127.0.0.1:9"), Some("k".into()));
        let image = ImagePayload::new(vec![1], "image/jpeg");
        assert!(matches!(
            gateway.generate_quiz(&image, count(1)).await,
            Err(GenerationError::Unreachable(_))
        ));
        assert!(gateway.synthesize("hello").await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_error_hides_api_key() {
        let gateway =
            GeminiGateway::new(Some("http://127.0.0.1:9"), Some("SECRET_KEY_123".into()));
        let image = ImagePayload::new(vec![1], "image/jpeg");
        let err = gateway.generate_quiz(&image, count(1)).await.unwrap_err();
        let text = err.to_string();
        assert!(matches!(err, GenerationError::Unreachable(_)));
        assert!(!text.contains("SECRET_KEY_123"), "key leaked: {text}");
        assert!(!text.contains("key="), "query key leaked: {text}");
    }
}
