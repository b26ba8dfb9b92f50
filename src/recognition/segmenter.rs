//! # Segment Decoder Adapter
//!
//! Per-session wrapper around one live decoder instance. The adapter owns the
//! decoder's lifecycle (create on session start, feed per chunk, replace on
//! silence-triggered reset) and maps the backend's raw output into the three
//! decode outcomes the session coordinator acts on.
//!
//! The adapter never second-guesses the decoder's endpointing: whether enough
//! acoustic evidence has accumulated to finalize an utterance is entirely the
//! backend's decision.

use crate::recognition::decoder::{DecodeError, SharedDecoderFactory, SpeechDecoder};

/// What feeding one normalized chunk produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// The decoder finalized an utterance with non-empty text.
    Final(String),
    /// An in-flight partial hypothesis with non-empty text.
    Partial(String),
    /// No usable text for this chunk.
    Empty,
}

/// Stateful per-session decoder wrapper.
pub struct SegmentDecoder {
    factory: SharedDecoderFactory,
    decoder: Box<dyn SpeechDecoder>,
    sample_rate: u32,
}

impl SegmentDecoder {
    /// Create the adapter together with its first decoder instance.
    pub fn new(factory: SharedDecoderFactory, sample_rate: u32) -> Result<Self, DecodeError> {
        let decoder = factory.create(sample_rate)?;
        Ok(Self {
            factory,
            decoder,
            sample_rate,
        })
    }

    /// Feed one normalized PCM chunk to the live decoder instance.
    ///
    /// Finalized text is trimmed; an empty trimmed string maps to
    /// [`DecodeOutcome::Empty`], as does an empty trimmed partial.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<DecodeOutcome, DecodeError> {
        if self.decoder.accept_waveform(chunk)? {
            let text = self.decoder.result()?;
            let text = text.trim();
            if text.is_empty() {
                Ok(DecodeOutcome::Empty)
            } else {
                Ok(DecodeOutcome::Final(text.to_string()))
            }
        } else {
            let partial = self.decoder.partial_result()?;
            let partial = partial.trim();
            if partial.is_empty() {
                Ok(DecodeOutcome::Empty)
            } else {
                Ok(DecodeOutcome::Partial(partial.to_string()))
            }
        }
    }

    /// Discard the current decoder instance and start a fresh one.
    ///
    /// Called when the silence tracker requests a context reset, and only
    /// then: resetting on every silent chunk would erase in-flight partial
    /// progress prematurely. Already-finalized text is unaffected. Calling
    /// reset repeatedly without intervening feeds is safe.
    pub fn reset(&mut self) -> Result<(), DecodeError> {
        self.decoder = self.factory.create(self.sample_rate)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::testing::{ScriptedFactory, Step};
    use std::sync::Arc;

    fn adapter(steps: Vec<Step>) -> (SegmentDecoder, Arc<std::sync::Mutex<crate::recognition::testing::ScriptState>>) {
        let factory = ScriptedFactory::new(steps);
        let state = factory.state();
        let adapter = SegmentDecoder::new(Arc::new(factory), 16000).unwrap();
        (adapter, state)
    }

    #[test]
    fn finalized_text_is_trimmed() {
        let (mut seg, _) = adapter(vec![Step::Finalize("  hello world  ")]);
        assert_eq!(
            seg.feed(&[0u8; 4]).unwrap(),
            DecodeOutcome::Final("hello world".to_string())
        );
    }

    #[test]
    fn empty_finalization_maps_to_empty() {
        let (mut seg, _) = adapter(vec![Step::Finalize("   ")]);
        assert_eq!(seg.feed(&[0u8; 4]).unwrap(), DecodeOutcome::Empty);
    }

    #[test]
    fn partial_hypotheses_pass_through_until_finalized() {
        let (mut seg, _) = adapter(vec![
            Step::Partial("he"),
            Step::Partial(""),
            Step::Finalize("hello"),
        ]);
        assert_eq!(
            seg.feed(&[0u8; 4]).unwrap(),
            DecodeOutcome::Partial("he".to_string())
        );
        assert_eq!(seg.feed(&[0u8; 4]).unwrap(), DecodeOutcome::Empty);
        assert_eq!(
            seg.feed(&[0u8; 4]).unwrap(),
            DecodeOutcome::Final("hello".to_string())
        );
    }

    #[test]
    fn reset_replaces_the_decoder_instance() {
        let (mut seg, state) = adapter(vec![]);
        assert_eq!(state.lock().unwrap().instances_created, 1);

        seg.reset().unwrap();
        assert_eq!(state.lock().unwrap().instances_created, 2);
    }

    #[test]
    fn double_reset_without_feeds_is_safe() {
        let (mut seg, state) = adapter(vec![Step::Partial("ok")]);

        seg.reset().unwrap();
        seg.reset().unwrap();
        assert_eq!(state.lock().unwrap().instances_created, 3);

        // The freshest instance still decodes normally.
        assert_eq!(
            seg.feed(&[0u8; 4]).unwrap(),
            DecodeOutcome::Partial("ok".to_string())
        );
    }

    #[test]
    fn backend_errors_surface_to_the_caller() {
        let (mut seg, _) = adapter(vec![Step::Fail("engine fault")]);
        assert!(seg.feed(&[0u8; 4]).is_err());
    }
}
