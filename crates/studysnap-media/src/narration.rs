//! Per-question narration with epoch-based cancellation.
//!
//! Every request bumps an epoch counter before it starts synthesizing. When
//! speech comes back, it is only played if the epoch still matches; anything
//! else means a newer request or a stop happened in the meantime and the
//! audio is discarded. At most one [`Playback`] exists at any time.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use studysnap_core::types::{QuizQuestion, narration_script};
use studysnap_providers::NarrationSynthesisGateway;

use crate::pcm;
use crate::playback::{AudioOutput, AudioSink, Playback, PlaybackEnd};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NarrationStatus {
    #[default]
    Idle,
    Loading,
    Playing,
}

/// Status changes, tagged with the epoch of the request they belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationEvent {
    Loading { epoch: u64 },
    Playing { epoch: u64 },
    Finished { epoch: u64 },
    Stopped { epoch: u64 },
    Unavailable { epoch: u64 },
}

/// Result of a narration request, as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationOutcome {
    /// Audio started playing.
    Playing { epoch: u64 },
    /// Speech could not be produced or played. Silent fallback.
    Unavailable,
    /// A newer request or a stop arrived while synthesizing.
    Superseded,
    /// A toggle stopped the current playback.
    Stopped,
}

struct NarrationState {
    status: NarrationStatus,
    epoch: u64,
    sink: Option<Box<dyn AudioSink>>,
    active: Option<Playback>,
}

struct Shared {
    state: Mutex<NarrationState>,
    synthesizer: Arc<dyn NarrationSynthesisGateway>,
    output: Arc<dyn AudioOutput>,
    sample_rate: u32,
    events: broadcast::Sender<NarrationEvent>,
}

/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct NarrationController {
    shared: Arc<Shared>,
}

impl NarrationController {
    pub fn new(
        synthesizer: Arc<dyn NarrationSynthesisGateway>,
        output: Arc<dyn AudioOutput>,
        sample_rate: u32,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(NarrationState {
                    status: NarrationStatus::Idle,
                    epoch: 0,
                    sink: None,
                    active: None,
                }),
                synthesizer,
                output,
                sample_rate,
                events,
            }),
        }
    }

    pub fn status(&self) -> NarrationStatus {
        self.lock().status
    }

    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NarrationEvent> {
        self.shared.events.subscribe()
    }

    /// Narrate `question`, the quiz's question at 0-based `position`.
    ///
    /// Any current playback is stopped first. Synthesis failures degrade to
    /// [`NarrationOutcome::Unavailable`] and never surface as errors.
    pub async fn request_narration(
        &self,
        position: usize,
        question: &QuizQuestion,
    ) -> NarrationOutcome {
        let script = narration_script(position, question);

        let epoch = {
            let mut state = self.lock();
            self.halt(&mut state);
            state.epoch += 1;
            state.status = NarrationStatus::Loading;
            self.emit(NarrationEvent::Loading { epoch: state.epoch });
            state.epoch
        };
        debug!(epoch, position, "Narration requested");

        let audio = self.shared.synthesizer.synthesize(&script).await;

        let mut state = self.lock();
        if state.epoch != epoch {
            debug!(epoch, current = state.epoch, "Discarding superseded narration");
            return NarrationOutcome::Superseded;
        }

        let Some(encoded) = audio else {
            return self.unavailable(&mut state, epoch, "no audio returned");
        };

        let buffer = match pcm::decode(&encoded, self.shared.sample_rate) {
            Ok(buffer) => buffer,
            Err(e) => return self.unavailable(&mut state, epoch, &e.to_string()),
        };

        let mut sink = match state.sink.take() {
            Some(sink) => sink,
            None => match self.shared.output.open() {
                Ok(sink) => sink,
                Err(e) => return self.unavailable(&mut state, epoch, &e.to_string()),
            },
        };
        let started = sink.play(buffer);
        state.sink = Some(sink);

        let mut playback = match started {
            Ok(playback) => playback,
            Err(e) => return self.unavailable(&mut state, epoch, &e.to_string()),
        };

        if let Some(finished) = playback.take_finished() {
            let controller = self.clone();
            tokio::spawn(async move {
                let end = finished.await.unwrap_or(PlaybackEnd::Stopped);
                controller.playback_ended(epoch, end);
            });
        }

        state.active = Some(playback);
        state.status = NarrationStatus::Playing;
        self.emit(NarrationEvent::Playing { epoch });
        info!(epoch, position, "Narration playing");

        NarrationOutcome::Playing { epoch }
    }

    /// Stop if playing, otherwise start narrating `question`.
    pub async fn toggle_narration(
        &self,
        position: usize,
        question: &QuizQuestion,
    ) -> NarrationOutcome {
        if self.status() == NarrationStatus::Playing {
            self.stop();
            return NarrationOutcome::Stopped;
        }
        self.request_narration(position, question).await
    }

    /// Stop playback and invalidate any request still synthesizing.
    pub fn stop(&self) {
        let mut state = self.lock();
        self.halt(&mut state);
        state.epoch += 1;
    }

    /// Called whenever the visible question changes.
    pub fn reset_question(&self) {
        self.stop();
    }

    /// Stop everything and release the audio output.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        self.halt(&mut state);
        state.epoch += 1;
        if state.sink.take().is_some() {
            debug!("Audio output released");
        }
    }

    fn halt(&self, state: &mut NarrationState) {
        if let Some(playback) = state.active.take() {
            playback.stop();
        }
        if state.status != NarrationStatus::Idle {
            state.status = NarrationStatus::Idle;
            self.emit(NarrationEvent::Stopped { epoch: state.epoch });
        }
    }

    fn unavailable(
        &self,
        state: &mut NarrationState,
        epoch: u64,
        reason: &str,
    ) -> NarrationOutcome {
        warn!(epoch, reason, "Narration unavailable");
        state.status = NarrationStatus::Idle;
        self.emit(NarrationEvent::Unavailable { epoch });
        NarrationOutcome::Unavailable
    }

    fn playback_ended(&self, epoch: u64, end: PlaybackEnd) {
        let mut state = self.lock();
        if state.epoch != epoch || state.status != NarrationStatus::Playing {
            return;
        }
        state.active = None;
        state.status = NarrationStatus::Idle;
        debug!(epoch, ?end, "Narration ended");
        self.emit(NarrationEvent::Finished { epoch });
    }

    fn emit(&self, event: NarrationEvent) {
        // No subscribers is fine.
        let _ = self.shared.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, NarrationState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
