//! # Silence Tracking
//!
//! Per-session detector for sustained silence in the inbound audio stream.
//! The tracker accumulates the byte length of consecutive low-energy chunks;
//! once enough silent audio has passed it signals that the decoder context
//! should be reset, which bounds the decoder's internal state growth and
//! forces long recordings to segment into independent utterances.
//!
//! Classification runs on the *raw* (pre-gain) chunk: the gain stage would
//! amplify quiet room noise right past the silence threshold.

use crate::audio::gain;

/// Outcome of classifying one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SilenceReport {
    /// Whether the chunk's raw RMS fell below the silence threshold.
    pub silent: bool,
    /// Whether enough consecutive silence has accumulated to warrant a
    /// decoder-context reset. The accumulator is already zeroed when this
    /// is `true`.
    pub should_reset: bool,
}

/// Tracks accumulated consecutive silence for a single session.
#[derive(Debug)]
pub struct SilenceTracker {
    /// RMS level below which a chunk counts as silent.
    rms_threshold: f32,

    /// Accumulated silent bytes needed before requesting a reset.
    reset_after_bytes: usize,

    /// Silent bytes seen since the last loud chunk or the last reset.
    accumulated_bytes: usize,
}

impl SilenceTracker {
    pub fn new(rms_threshold: f32, reset_after_bytes: usize) -> Self {
        Self {
            rms_threshold,
            reset_after_bytes,
            accumulated_bytes: 0,
        }
    }

    /// Classify one raw chunk and update the running silence total.
    ///
    /// A silent chunk adds its length to the accumulator; reaching the
    /// configured threshold reports `should_reset` and zeroes the accumulator.
    /// Any non-silent chunk zeroes the accumulator unconditionally. A chunk
    /// whose bytes cannot be read as f32 samples is treated as non-silent so
    /// a single malformed delivery never triggers a spurious reset.
    pub fn classify(&mut self, chunk: &[u8]) -> SilenceReport {
        let rms = match gain::chunk_rms(chunk) {
            Ok(rms) => rms,
            Err(err) => {
                tracing::debug!(error = %err, "unreadable chunk treated as non-silent");
                self.accumulated_bytes = 0;
                return SilenceReport {
                    silent: false,
                    should_reset: false,
                };
            }
        };

        if rms < self.rms_threshold {
            self.accumulated_bytes += chunk.len();
            if self.accumulated_bytes >= self.reset_after_bytes {
                self.accumulated_bytes = 0;
                return SilenceReport {
                    silent: true,
                    should_reset: true,
                };
            }
            SilenceReport {
                silent: true,
                should_reset: false,
            }
        } else {
            self.accumulated_bytes = 0;
            SilenceReport {
                silent: false,
                should_reset: false,
            }
        }
    }

    /// Silent bytes accumulated since the last loud chunk or reset.
    pub fn accumulated_bytes(&self) -> usize {
        self.accumulated_bytes
    }
}
