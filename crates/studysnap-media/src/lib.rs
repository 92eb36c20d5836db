//! Narration pipeline: PCM decoding, playback outputs, and the per-question
//! narration controller.

pub mod narration;
pub mod pcm;
pub mod playback;
pub mod wav;

pub use narration::{NarrationController, NarrationEvent, NarrationOutcome, NarrationStatus};
pub use pcm::{AudioBuffer, DecodeError, decode};
pub use playback::{AudioOutput, AudioSink, CommandOutput, Playback, PlaybackEnd, PlaybackError, SilentOutput};
