//! # Audio Pipeline Module
//!
//! The per-chunk processing stages between the raw WebSocket byte stream and
//! the speech decoder. Each inbound binary frame flows through:
//!
//! 1. **Chunk buffer**: coalesces frames into fixed 32 KiB chunks
//! 2. **Silence tracker**: inspects raw energy, requests decoder resets
//! 3. **Gain normalizer**: amplifies quiet audio, converts f32 to i16 PCM
//!
//! ## Audio Format:
//! - **Inbound**: interleaved little-endian 32-bit float mono samples, 16 kHz
//! - **Outbound (to decoder)**: 16-bit little-endian PCM, same rate
//!
//! All stages run synchronously per chunk, in arrival order, so transcript
//! segments are always emitted in the order the underlying audio occurred.

pub mod chunker; // Frame-to-chunk coalescing with held remainder
pub mod gain; // Adaptive gain normalization and format conversion
pub mod silence; // Accumulated-silence detection for decoder resets
