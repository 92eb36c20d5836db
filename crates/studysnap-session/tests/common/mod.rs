//! Fakes shared by the session integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use tokio::sync::oneshot;

use studysnap_core::types::{ImagePayload, QuestionCount, QuizQuestion};
use studysnap_media::playback::PlaybackDriver;
use studysnap_media::{AudioBuffer, AudioOutput, AudioSink, NarrationController, Playback, PlaybackError};
use studysnap_providers::{
    CaptureConstraints, CaptureError, ContentGenerationGateway, GenerationError,
    ImageCaptureDevice, NarrationSynthesisGateway,
};
use studysnap_session::SessionController;

/// `n` questions; question `i` has its correct answer at option `i % 4`.
pub fn questions(n: usize) -> Vec<QuizQuestion> {
    (0..n)
        .map(|i| {
            QuizQuestion::new(
                i as i64 + 1,
                format!("Question text {i}"),
                vec![
                    format!("a{i}"),
                    format!("b{i}"),
                    format!("c{i}"),
                    format!("d{i}"),
                ],
                i % 4,
                format!("Because {i}"),
            )
            .unwrap()
        })
        .collect()
}

pub fn image() -> ImagePayload {
    ImagePayload::new(vec![0xFF, 0xD8, 0xFF, 0xE0], "image/jpeg")
}

/// Replies with queued results, one per call. With nothing queued it echoes
/// the requested number of questions.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<Vec<QuizQuestion>, GenerationError>>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn push(&self, reply: Result<Vec<QuizQuestion>, GenerationError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentGenerationGateway for ScriptedGenerator {
    async fn generate_quiz(
        &self,
        _image: &ImagePayload,
        count: QuestionCount,
    ) -> Result<Vec<QuizQuestion>, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().unwrap().pop_front();
        reply.unwrap_or_else(|| Ok(questions(count.as_usize())))
    }
}

/// Camera that fails a fixed number of times, then succeeds.
#[derive(Default)]
pub struct FlakyCamera {
    failures_left: Mutex<usize>,
    seen: Mutex<Vec<CaptureConstraints>>,
}

impl FlakyCamera {
    pub fn failing(times: usize) -> Self {
        Self {
            failures_left: Mutex::new(times),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn attempts(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl ImageCaptureDevice for FlakyCamera {
    async fn capture(&self, constraints: &CaptureConstraints) -> Result<ImagePayload, CaptureError> {
        self.seen.lock().unwrap().push(*constraints);
        let mut left = self.failures_left.lock().unwrap();
        if *left > 0 {
            *left -= 1;
            return Err(CaptureError::PermissionDenied);
        }
        Ok(image())
    }
}

/// Each synthesize call parks until the test releases it.
#[derive(Default)]
pub struct GatedSynth {
    pending: Mutex<VecDeque<(String, oneshot::Sender<Option<String>>)>>,
}

impl GatedSynth {
    pub async fn next_request(&self) -> (String, oneshot::Sender<Option<String>>) {
        for _ in 0..500 {
            if let Some(req) = self.pending.lock().unwrap().pop_front() {
                return req;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("no synthesis request arrived");
    }
}

#[async_trait]
impl NarrationSynthesisGateway for GatedSynth {
    async fn synthesize(&self, text: &str) -> Option<String> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().push_back((text.to_string(), tx));
        rx.await.ok().flatten()
    }
}

/// Records played buffers and holds their drivers.
#[derive(Default, Clone)]
pub struct ManualOutput {
    pub opened: Arc<Mutex<usize>>,
    pub played: Arc<Mutex<Vec<usize>>>,
    pub drivers: Arc<Mutex<Vec<PlaybackDriver>>>,
}

struct ManualSink(ManualOutput);

impl AudioOutput for ManualOutput {
    fn open(&self) -> Result<Box<dyn AudioSink>, PlaybackError> {
        *self.opened.lock().unwrap() += 1;
        Ok(Box::new(ManualSink(self.clone())))
    }
}

impl AudioSink for ManualSink {
    fn play(&mut self, buffer: AudioBuffer) -> Result<Playback, PlaybackError> {
        let (playback, driver) = Playback::channel();
        self.0.played.lock().unwrap().push(buffer.frames());
        self.0.drivers.lock().unwrap().push(driver);
        Ok(playback)
    }
}

pub fn pcm(frames: usize) -> String {
    base64::engine::general_purpose::STANDARD.encode(vec![0u8; frames * 2])
}

pub struct Harness {
    pub session: SessionController,
    pub generator: Arc<ScriptedGenerator>,
    pub camera: Arc<FlakyCamera>,
    pub synth: Arc<GatedSynth>,
    pub output: ManualOutput,
}

pub fn harness() -> Harness {
    let generator = Arc::new(ScriptedGenerator::default());
    let camera = Arc::new(FlakyCamera::default());
    let synth = Arc::new(GatedSynth::default());
    let output = ManualOutput::default();
    let narrator = NarrationController::new(synth.clone(), Arc::new(output.clone()), 24000);
    let session = SessionController::new(generator.clone(), camera.clone(), narrator);
    Harness {
        session,
        generator,
        camera,
        synth,
        output,
    }
}

/// Drive a fresh harness to the first question of a `count`-question quiz.
pub async fn presenting(count: u8) -> Harness {
    let mut h = harness();
    h.session.start_capture().unwrap();
    h.session.submit_image(image()).unwrap();
    h.session.set_question_count(count).unwrap();
    h.session.confirm_generate().await.unwrap();
    h
}
