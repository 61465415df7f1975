//! Voice module
//!
//! Speech synthesis for the call platform's custom-voice hook.

pub mod tts;

pub use tts::{FishAudioClient, SynthesisRequest, Synthesizer, TtsError};
