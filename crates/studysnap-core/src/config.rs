//! Configuration loading and validation.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::types::{DEFAULT_QUESTION_COUNT, Facing, QuestionCount};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const DEFAULT_QUIZ_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_VOICE: &str = "Fenrir";
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Top-level StudySnap configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<GenerationConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub narration: Option<NarrationConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz: Option<QuizConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture: Option<CaptureConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Credentials and endpoint for the generative AI service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ProviderConfig {
    /// Resolve the API key: check `api_key` field first, then the variable named by
    /// `api_key_env` (`GEMINI_API_KEY` when unset).
    pub fn resolve_api_key(&self) -> Option<String> {
        let env = self
            .api_key_env
            .clone()
            .or_else(|| Some(DEFAULT_API_KEY_ENV.to_string()));
        resolve_secret_field(&self.api_key, &env)
    }
}

/// Quiz generation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Model used to read the image and write questions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Spoken narration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Speech model (default: "gemini-2.5-flash-preview-tts").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Prebuilt voice name (default: "Fenrir").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Sample rate of the synthesized PCM stream in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Player command (argv) invoked with a WAV file path appended, e.g. `["aplay", "-q"]`.
    /// Without one, narration runs silently on a clock.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<Vec<String>>,

    /// Directory for spooled WAV files (default: `~/.studysnap/narration`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spool_dir: Option<String>,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: None,
            voice: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            player: None,
            spool_dir: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizConfig {
    #[serde(default = "default_question_count")]
    pub default_question_count: u8,
}

fn default_question_count() -> u8 {
    DEFAULT_QUESTION_COUNT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Facing preferences tried in order until one succeeds.
    #[serde(default = "default_capture_attempts")]
    pub attempts: Vec<Facing>,
}

fn default_capture_attempts() -> Vec<Facing> {
    vec![Facing::Environment, Facing::Any]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "studysnap_media=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: None,
            filters: Vec::new(),
            output: default_log_output(),
        }
    }
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

static ENV_VAR_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_default()
        })
        .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::StudySnapError::Io)?;

        // Substitute ${ENV_VAR} references before parsing
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::StudySnapError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        data_dir().join("config.json")
    }

    /// API key for the generative AI service.
    pub fn api_key(&self) -> Option<String> {
        self.provider.clone().unwrap_or_default().resolve_api_key()
    }

    pub fn base_url(&self) -> String {
        self.provider
            .as_ref()
            .and_then(|p| p.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn quiz_model(&self) -> String {
        self.generation
            .as_ref()
            .and_then(|g| g.model.clone())
            .unwrap_or_else(|| DEFAULT_QUIZ_MODEL.to_string())
    }

    pub fn narration_enabled(&self) -> bool {
        self.narration.as_ref().is_none_or(|n| n.enabled)
    }

    pub fn speech_model(&self) -> String {
        self.narration
            .as_ref()
            .and_then(|n| n.model.clone())
            .unwrap_or_else(|| DEFAULT_SPEECH_MODEL.to_string())
    }

    pub fn voice(&self) -> String {
        self.narration
            .as_ref()
            .and_then(|n| n.voice.clone())
            .unwrap_or_else(|| DEFAULT_VOICE.to_string())
    }

    pub fn sample_rate(&self) -> u32 {
        self.narration
            .as_ref()
            .map(|n| n.sample_rate)
            .unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    pub fn player(&self) -> Option<Vec<String>> {
        self.narration.as_ref().and_then(|n| n.player.clone())
    }

    /// Resolve the WAV spool directory.
    pub fn spool_dir(&self) -> PathBuf {
        self.narration
            .as_ref()
            .and_then(|n| n.spool_dir.as_ref())
            .map(|d| {
                let expanded = shellexpand::tilde(d);
                PathBuf::from(expanded.as_ref())
            })
            .unwrap_or_else(|| data_dir().join("narration"))
    }

    /// Question count preselected when a new image is configured.
    ///
    /// Out-of-range values are reported by [`Config::validate`] and saturated here.
    pub fn default_question_count(&self) -> QuestionCount {
        self.quiz
            .as_ref()
            .map(|q| QuestionCount::clamped(q.default_question_count as i64))
            .unwrap_or_default()
    }

    pub fn capture_attempts(&self) -> Vec<Facing> {
        self.capture
            .as_ref()
            .map(|c| c.attempts.clone())
            .unwrap_or_else(default_capture_attempts)
    }

    /// Get a config value by dotted path (e.g. "narration.voice", "quiz.default_question_count").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Set a config value by dotted path.
    pub fn set_path(&mut self, path: &str, value: serde_json::Value) -> anyhow::Result<()> {
        let mut json = serde_json::to_value(&*self)
            .map_err(|e| anyhow::anyhow!("Config serialization error: {e}"))?;

        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        let Some((last, parents)) = segments.split_last() else {
            anyhow::bail!("Empty path");
        };

        let mut current = &mut json;
        for segment in parents {
            if !current.is_object() {
                anyhow::bail!("'{segment}' is not inside an object");
            }
            if current.get(*segment).is_none_or(serde_json::Value::is_null) {
                current[*segment] = serde_json::json!({});
            }
            current = &mut current[*segment];
        }
        if !current.is_object() {
            anyhow::bail!("Cannot set '{last}' on a non-object value");
        }
        current[*last] = value;

        *self = serde_json::from_value(json)
            .map_err(|e| anyhow::anyhow!("Config deserialization error: {e}"))?;
        Ok(())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if self.api_key().is_none() {
            warnings.push(format!(
                "No API key configured; set provider.api_key or {DEFAULT_API_KEY_ENV}"
            ));
        }

        if let Some(narration) = &self.narration {
            if narration.sample_rate == 0 {
                errors.push("narration.sample_rate cannot be 0".to_string());
            }
            if let Some(player) = &narration.player {
                if player.first().is_none_or(|p| p.trim().is_empty()) {
                    errors.push("narration.player must name a program".to_string());
                }
            }
        }

        if let Some(quiz) = &self.quiz {
            if QuestionCount::new(quiz.default_question_count).is_none() {
                errors.push(format!(
                    "quiz.default_question_count {} must be between 1 and 10",
                    quiz.default_question_count
                ));
            }
        }

        if let Some(capture) = &self.capture {
            if capture.attempts.is_empty() {
                errors.push("capture.attempts cannot be empty".to_string());
            }
        }

        (warnings, errors)
    }

    /// Save config to a file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Base directory for StudySnap data: `~/.studysnap/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".studysnap")
}
