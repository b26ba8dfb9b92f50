//! # Speech Recognition Module
//!
//! Wraps the external speech engine behind a small capability interface and
//! adapts its incremental output for the session pipeline.
//!
//! ## Key Components:
//! - **Decoder capability**: `SpeechDecoder` / `DecoderFactory` traits plus a
//!   no-op fallback backend
//! - **Segment adapter**: per-session decoder lifecycle (create, feed, reset)
//!   and the `Final` / `Partial` / `Empty` outcome mapping
//! - **Vosk backend**: optional offline recognizer behind the `vosk-backend`
//!   feature
//!
//! The engine decides utterance boundaries itself (endpointing); the rest of
//! the pipeline only reacts to what it reports.

pub mod decoder; // Capability traits and the null backend
pub mod segmenter; // Per-session adapter over one live decoder

#[cfg(feature = "vosk-backend")]
pub mod vosk; // Offline Kaldi/Vosk recognizer backend

#[cfg(test)]
pub mod testing; // Scripted decoder for pipeline tests

pub use decoder::{DecodeError, NullDecoderFactory, SharedDecoderFactory};
pub use segmenter::{DecodeOutcome, SegmentDecoder};
