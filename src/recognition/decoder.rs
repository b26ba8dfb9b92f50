//! # Speech Decoder Capability
//!
//! The external speech engine is modeled as a small capability interface
//! rather than a concrete library binding: a factory creates stateful decoder
//! instances, and each instance incrementally accepts PCM audio, deciding by
//! its own internal endpointing when an utterance is finalized. Any backend
//! that can answer these four operations (create, accept, final result,
//! partial result) can sit behind the pipeline.
//!
//! ## Backends:
//! - `NullDecoder` (here): accepts audio and produces no text; the default
//!   when no recognizer is linked in, useful for wiring and load testing
//! - `VoskDecoder` (`vosk-backend` feature): offline Kaldi/Vosk recognizer

use std::fmt;
use std::sync::Arc;

/// An error reported by a decoder backend.
///
/// Decode errors for a single chunk are always recoverable at the session
/// level: the coordinator logs them and treats the chunk as producing no text.
#[derive(Debug)]
pub struct DecodeError(pub String);

impl DecodeError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decode error: {}", self.0)
    }
}

impl std::error::Error for DecodeError {}

/// One live, stateful decoder instance.
///
/// Instances are owned by exactly one session and are replaced wholesale on a
/// silence-triggered reset; they are never shared or rewound.
pub trait SpeechDecoder: Send {
    /// Feed one chunk of 16-bit little-endian PCM.
    ///
    /// Returns `true` when the decoder's endpointing has finalized an
    /// utterance, in which case [`SpeechDecoder::result`] yields its text.
    fn accept_waveform(&mut self, pcm: &[u8]) -> Result<bool, DecodeError>;

    /// Text of the finalized utterance. Valid after `accept_waveform`
    /// returned `true`; may be empty when the audio carried no speech.
    fn result(&mut self) -> Result<String, DecodeError>;

    /// Current in-flight partial hypothesis; may be empty.
    fn partial_result(&mut self) -> Result<String, DecodeError>;
}

/// Creates decoder instances for sessions.
///
/// One factory is shared by every connection; the per-instance state lives
/// entirely inside the [`SpeechDecoder`] it hands out.
pub trait DecoderFactory: Send + Sync {
    fn create(&self, sample_rate: u32) -> Result<Box<dyn SpeechDecoder>, DecodeError>;

    /// Human-readable backend name for logs and the health endpoint.
    fn backend_name(&self) -> &str;
}

/// Shared handle to the configured factory.
pub type SharedDecoderFactory = Arc<dyn DecoderFactory>;

/// Decoder backend that consumes audio and never produces text.
///
/// Stands in when the server is built without a recognizer backend, keeping
/// the whole ingest pipeline exercisable end to end.
#[derive(Debug, Default)]
pub struct NullDecoder;

impl SpeechDecoder for NullDecoder {
    fn accept_waveform(&mut self, _pcm: &[u8]) -> Result<bool, DecodeError> {
        Ok(false)
    }

    fn result(&mut self) -> Result<String, DecodeError> {
        Ok(String::new())
    }

    fn partial_result(&mut self) -> Result<String, DecodeError> {
        Ok(String::new())
    }
}

/// Factory for [`NullDecoder`] instances.
#[derive(Debug, Default)]
pub struct NullDecoderFactory;

impl DecoderFactory for NullDecoderFactory {
    fn create(&self, _sample_rate: u32) -> Result<Box<dyn SpeechDecoder>, DecodeError> {
        Ok(Box::new(NullDecoder))
    }

    fn backend_name(&self) -> &str {
        "null"
    }
}
