//! # Vosk Decoder Backend
//!
//! Binds the decoder capability traits to an offline Kaldi/Vosk recognizer.
//! The model directory is loaded once at startup and shared by every session;
//! each session gets its own `Recognizer`, which carries all incremental
//! decoding state and is cheap enough to recreate on silence resets.
//!
//! Enabled with the `vosk-backend` feature; requires `libvosk` and a model
//! directory (e.g. `model-large-ja`) on disk.

use crate::recognition::decoder::{DecodeError, DecoderFactory, SpeechDecoder};
use byteorder::{ByteOrder, LittleEndian};
use vosk::{DecodingState, Model, Recognizer};

/// One live Vosk recognizer bound to a session.
pub struct VoskDecoder {
    recognizer: Recognizer,
}

impl SpeechDecoder for VoskDecoder {
    fn accept_waveform(&mut self, pcm: &[u8]) -> Result<bool, DecodeError> {
        if pcm.len() % 2 != 0 {
            return Err(DecodeError::new(format!(
                "pcm length {} is not a whole number of i16 samples",
                pcm.len()
            )));
        }

        let mut samples = vec![0i16; pcm.len() / 2];
        LittleEndian::read_i16_into(pcm, &mut samples);

        match self.recognizer.accept_waveform(&samples) {
            DecodingState::Finalized => Ok(true),
            DecodingState::Running => Ok(false),
            DecodingState::Failed => Err(DecodeError::new("recognizer rejected waveform")),
        }
    }

    fn result(&mut self) -> Result<String, DecodeError> {
        let text = self
            .recognizer
            .result()
            .single()
            .map(|r| r.text.to_string())
            .unwrap_or_default();
        Ok(text)
    }

    fn partial_result(&mut self) -> Result<String, DecodeError> {
        Ok(self.recognizer.partial_result().partial.to_string())
    }
}

/// Factory holding the shared Vosk model.
pub struct VoskFactory {
    model: Model,
}

impl VoskFactory {
    /// Load the model directory at `model_path`.
    pub fn new(model_path: &str) -> Result<Self, DecodeError> {
        let model = Model::new(model_path)
            .ok_or_else(|| DecodeError::new(format!("failed to load vosk model at {}", model_path)))?;
        Ok(Self { model })
    }
}

impl DecoderFactory for VoskFactory {
    fn create(&self, sample_rate: u32) -> Result<Box<dyn SpeechDecoder>, DecodeError> {
        let recognizer = Recognizer::new(&self.model, sample_rate as f32)
            .ok_or_else(|| DecodeError::new("failed to create vosk recognizer"))?;
        Ok(Box::new(VoskDecoder { recognizer }))
    }

    fn backend_name(&self) -> &str {
        "vosk"
    }
}
