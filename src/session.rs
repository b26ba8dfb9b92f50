//! # Session Coordination
//!
//! One `SessionCoordinator` per WebSocket connection drives the full pipeline
//! for every inbound binary frame:
//!
//! ```text
//! frame → chunk buffer → [per chunk] silence tracker → gain normalizer
//!       → segment decoder → outbound partial/final message
//! ```
//!
//! ## Session Lifecycle:
//! - **Open**: accepting frames, emitting `partial`/`final` messages
//! - **Closing**: disconnect observed; remaining buffer is drained
//! - **Closed**: terminal; the transcript was persisted (at most once)
//!
//! All per-session state lives in this struct and is owned by exactly one
//! connection actor; sessions share nothing, so no locks are needed. A chunk
//! that fails to normalize or decode degrades to "no text" and never ends the
//! session; only transport disconnect drives `Closing` → `Closed`.

use crate::audio::chunker::ChunkBuffer;
use crate::audio::gain;
use crate::audio::silence::SilenceTracker;
use crate::config::AudioConfig;
use crate::recognition::{DecodeError, DecodeOutcome, SegmentDecoder, SharedDecoderFactory};
use crate::storage::TranscriptStore;
use serde::Serialize;

/// JSON messages sent back over the session's WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    /// In-flight hypothesis; not persisted, superseded by later messages.
    Partial { text: String, session_id: String },

    /// Finalized utterance; appended to the session transcript.
    Final { text: String, session_id: String },

    /// Confirmation that the transcript was persisted, with its file name.
    Save { message: String, session_id: String },
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Open,
    Closing,
    Closed,
}

/// Per-connection orchestrator owning all session state.
pub struct SessionCoordinator {
    session_id: String,
    phase: SessionPhase,
    chunker: ChunkBuffer,
    silence: SilenceTracker,
    segmenter: SegmentDecoder,
    /// Finalized segments in emission order; joined with single spaces when
    /// persisted. Never reordered or deduplicated.
    transcript: Vec<String>,
    store: TranscriptStore,
    chunk_size: usize,
}

impl SessionCoordinator {
    /// Create the coordinator and its first decoder instance.
    pub fn new(
        session_id: String,
        audio: &AudioConfig,
        factory: SharedDecoderFactory,
        store: TranscriptStore,
    ) -> Result<Self, DecodeError> {
        let segmenter = SegmentDecoder::new(factory, audio.sample_rate)?;
        Ok(Self {
            session_id,
            phase: SessionPhase::Open,
            chunker: ChunkBuffer::new(audio.chunk_size),
            silence: SilenceTracker::new(audio.silence_rms_threshold, audio.silence_reset_bytes),
            segmenter,
            transcript: Vec::new(),
            store,
            chunk_size: audio.chunk_size,
        })
    }

    /// Process one inbound binary frame.
    ///
    /// Returns the outbound messages produced by every chunk the frame
    /// completed, in emission order. Frames arriving after the session left
    /// `Open` are ignored.
    pub fn handle_frame(&mut self, frame: &[u8]) -> Vec<OutboundMessage> {
        if self.phase != SessionPhase::Open {
            return Vec::new();
        }

        let mut out = Vec::new();
        for chunk in self.chunker.push(frame) {
            if let Some(message) = self.process_chunk(&chunk) {
                out.push(message);
            }
        }
        out
    }

    /// Run one chunk through silence classification, normalization and decode.
    fn process_chunk(&mut self, chunk: &[u8]) -> Option<OutboundMessage> {
        let report = self.silence.classify(chunk);
        if report.should_reset {
            // Sustained silence: start a fresh decoder context before feeding
            // further audio. Finalized text is unaffected.
            tracing::debug!(session_id = %self.session_id, "silence threshold reached, resetting decoder");
            if let Err(err) = self.segmenter.reset() {
                tracing::warn!(session_id = %self.session_id, error = %err, "decoder reset failed");
            }
        }

        let normalized = match gain::normalize(chunk, self.chunk_size) {
            Ok(pcm) => pcm,
            Err(err) => {
                // Data error on a single chunk: forward the original bytes
                // unmodified rather than ending the session.
                tracing::warn!(session_id = %self.session_id, error = %err, "gain normalization skipped");
                chunk.to_vec()
            }
        };

        match self.segmenter.feed(&normalized) {
            Ok(DecodeOutcome::Final(text)) => {
                tracing::info!(session_id = %self.session_id, text = %text, "utterance finalized");
                self.transcript.push(text.clone());
                Some(OutboundMessage::Final {
                    text,
                    session_id: self.session_id.clone(),
                })
            }
            Ok(DecodeOutcome::Partial(text)) => Some(OutboundMessage::Partial {
                text,
                session_id: self.session_id.clone(),
            }),
            Ok(DecodeOutcome::Empty) => None,
            Err(err) => {
                // A decode failure costs at most this one chunk.
                tracing::warn!(session_id = %self.session_id, error = %err, "decode failed for chunk");
                None
            }
        }
    }

    /// Drive the session through `Closing` to `Closed`.
    ///
    /// Drains the chunk buffer, then persists the transcript if any segments
    /// were finalized. A remainder of at least one full chunk is processed
    /// like any other chunk, while a shorter tail is dropped (known
    /// limitation: up to `chunk_size - 1` trailing bytes are lost). Safe to call
    /// more than once; only the first call does work.
    pub fn close(&mut self) -> Vec<OutboundMessage> {
        if self.phase == SessionPhase::Closed {
            return Vec::new();
        }
        self.phase = SessionPhase::Closing;

        let mut out = Vec::new();
        if let Some(tail) = self.chunker.flush() {
            if tail.len() >= self.chunk_size {
                if let Some(message) = self.process_chunk(&tail) {
                    out.push(message);
                }
            } else {
                tracing::debug!(
                    session_id = %self.session_id,
                    dropped_bytes = tail.len(),
                    "discarding short tail at session end"
                );
            }
        }

        if !self.transcript.is_empty() {
            let full_text = self.transcript.join(" ");
            match self.store.save(&full_text) {
                Ok(filename) => {
                    out.push(OutboundMessage::Save {
                        message: format!("Transcript saved: {}", filename),
                        session_id: self.session_id.clone(),
                    });
                }
                Err(err) => {
                    // Reported and logged, never raised: the session still
                    // closes cleanly from the client's perspective.
                    tracing::error!(session_id = %self.session_id, error = %err, "failed to persist transcript");
                }
            }
        }

        self.phase = SessionPhase::Closed;
        out
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Finalized segments in emission order.
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::testing::{ScriptedFactory, Step};
    use byteorder::{ByteOrder, LittleEndian};
    use std::sync::Arc;

    const CHUNK_SIZE: usize = 32768;

    fn test_audio_config() -> AudioConfig {
        AudioConfig {
            sample_rate: 16000,
            chunk_size: CHUNK_SIZE,
            silence_rms_threshold: 0.01,
            silence_reset_bytes: 8192,
        }
    }

    fn coordinator_with(
        steps: Vec<Step>,
        audio: AudioConfig,
        dir: &std::path::Path,
    ) -> (
        SessionCoordinator,
        Arc<std::sync::Mutex<crate::recognition::testing::ScriptState>>,
    ) {
        let factory = ScriptedFactory::new(steps);
        let state = factory.state();
        let store = TranscriptStore::new(dir).unwrap();
        let coordinator =
            SessionCoordinator::new("debate-1".into(), &audio, Arc::new(factory), store).unwrap();
        (coordinator, state)
    }

    fn loud_chunk() -> Vec<u8> {
        let samples = vec![0.1f32; CHUNK_SIZE / 4];
        let mut bytes = vec![0u8; CHUNK_SIZE];
        LittleEndian::write_f32_into(&samples, &mut bytes);
        bytes
    }

    fn saved_files(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    #[test]
    fn finalized_segments_accumulate_and_persist_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut coordinator, _) = coordinator_with(
            vec![Step::Finalize("hello"), Step::Finalize("world")],
            test_audio_config(),
            tmp.path(),
        );

        let first = coordinator.handle_frame(&loud_chunk());
        let second = coordinator.handle_frame(&loud_chunk());
        assert_eq!(
            first,
            vec![OutboundMessage::Final {
                text: "hello".into(),
                session_id: "debate-1".into()
            }]
        );
        assert_eq!(second.len(), 1);
        assert_eq!(coordinator.transcript(), ["hello", "world"]);

        let out = coordinator.close();
        assert_eq!(out.len(), 1);
        match &out[0] {
            OutboundMessage::Save { message, session_id } => {
                assert!(message.contains("speech_recognition_"));
                assert_eq!(session_id, "debate-1");
            }
            other => panic!("expected save message, got {:?}", other),
        }

        let files = saved_files(tmp.path());
        assert_eq!(files.len(), 1);
        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&files[0]).unwrap()).unwrap();
        assert_eq!(doc["text"], "hello world");
    }

    #[test]
    fn partial_messages_are_emitted_but_not_persisted() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut coordinator, _) = coordinator_with(
            vec![Step::Partial("hel"), Step::Finalize("hello")],
            test_audio_config(),
            tmp.path(),
        );

        let out = coordinator.handle_frame(&loud_chunk());
        assert_eq!(
            out,
            vec![OutboundMessage::Partial {
                text: "hel".into(),
                session_id: "debate-1".into()
            }]
        );
        assert!(coordinator.transcript().is_empty());

        coordinator.handle_frame(&loud_chunk());
        assert_eq!(coordinator.transcript(), ["hello"]);
    }

    #[test]
    fn silent_session_decodes_but_persists_nothing() {
        // Three frames totaling exactly one chunk of digital silence, then
        // disconnect. The reset threshold is raised above the chunk size so
        // the single silent chunk stays below it.
        let tmp = tempfile::tempdir().unwrap();
        let audio = AudioConfig {
            silence_reset_bytes: CHUNK_SIZE + 1,
            ..test_audio_config()
        };
        let (mut coordinator, state) = coordinator_with(vec![], audio, tmp.path());

        assert!(coordinator.handle_frame(&vec![0u8; 10000]).is_empty());
        assert!(coordinator.handle_frame(&vec![0u8; 10000]).is_empty());
        assert!(coordinator.handle_frame(&vec![0u8; 12768]).is_empty());

        {
            let state = state.lock().unwrap();
            // One chunk was emitted and fed; no silence reset created a
            // second decoder instance.
            assert_eq!(state.chunks_fed, 1);
            assert_eq!(state.instances_created, 1);
        }

        let out = coordinator.close();
        assert!(out.is_empty());
        assert!(saved_files(tmp.path()).is_empty());
    }

    #[test]
    fn sustained_silence_resets_the_decoder_context() {
        let tmp = tempfile::tempdir().unwrap();
        // One full silent chunk (32768 bytes) crosses the 8192-byte default.
        let (mut coordinator, state) =
            coordinator_with(vec![], test_audio_config(), tmp.path());

        coordinator.handle_frame(&vec![0u8; CHUNK_SIZE]);
        assert_eq!(state.lock().unwrap().instances_created, 2);
    }

    #[test]
    fn decode_error_skips_the_chunk_but_keeps_the_session_alive() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut coordinator, _) = coordinator_with(
            vec![Step::Fail("engine fault"), Step::Finalize("recovered")],
            test_audio_config(),
            tmp.path(),
        );

        assert!(coordinator.handle_frame(&loud_chunk()).is_empty());
        assert_eq!(coordinator.phase(), SessionPhase::Open);

        let out = coordinator.handle_frame(&loud_chunk());
        assert_eq!(out.len(), 1);
        assert_eq!(coordinator.transcript(), ["recovered"]);
    }

    #[test]
    fn short_tail_is_dropped_at_close() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut coordinator, state) =
            coordinator_with(vec![], test_audio_config(), tmp.path());

        // Half a chunk buffered, never enough for a decode unit.
        coordinator.handle_frame(&vec![0u8; CHUNK_SIZE / 2]);
        coordinator.close();

        assert_eq!(state.lock().unwrap().chunks_fed, 0);
    }

    #[test]
    fn close_is_idempotent_and_persists_once() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut coordinator, _) = coordinator_with(
            vec![Step::Finalize("hello")],
            test_audio_config(),
            tmp.path(),
        );

        coordinator.handle_frame(&loud_chunk());
        let first = coordinator.close();
        assert_eq!(first.len(), 1);
        assert_eq!(coordinator.phase(), SessionPhase::Closed);

        let second = coordinator.close();
        assert!(second.is_empty());
        assert_eq!(saved_files(tmp.path()).len(), 1);

        // Frames after close are ignored.
        assert!(coordinator.handle_frame(&loud_chunk()).is_empty());
    }

    #[test]
    fn failed_save_closes_cleanly_without_a_save_message() {
        let tmp = tempfile::tempdir().unwrap();
        let store_dir = tmp.path().join("text");
        let (mut coordinator, _) = coordinator_with(
            vec![Step::Finalize("hello")],
            test_audio_config(),
            &store_dir,
        );

        coordinator.handle_frame(&loud_chunk());

        // Make the write fail by removing the store directory.
        std::fs::remove_dir_all(&store_dir).unwrap();
        let out = coordinator.close();
        assert!(out.is_empty());
        assert_eq!(coordinator.phase(), SessionPhase::Closed);
    }

    #[test]
    fn outbound_messages_serialize_to_the_wire_shapes() {
        let partial = OutboundMessage::Partial {
            text: "hel".into(),
            session_id: "d1".into(),
        };
        assert_eq!(
            serde_json::to_value(&partial).unwrap(),
            serde_json::json!({"type": "partial", "text": "hel", "session_id": "d1"})
        );

        let final_msg = OutboundMessage::Final {
            text: "hello".into(),
            session_id: "d1".into(),
        };
        assert_eq!(
            serde_json::to_value(&final_msg).unwrap(),
            serde_json::json!({"type": "final", "text": "hello", "session_id": "d1"})
        );

        let save = OutboundMessage::Save {
            message: "Transcript saved: f.json".into(),
            session_id: "d1".into(),
        };
        assert_eq!(
            serde_json::to_value(&save).unwrap(),
            serde_json::json!({"type": "save", "message": "Transcript saved: f.json", "session_id": "d1"})
        );
    }
}
