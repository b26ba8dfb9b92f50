//! Scripted decoder backend for tests.
//!
//! Plays back a predetermined sequence of decode outcomes, one per
//! `accept_waveform` call, and records how many decoder instances the
//! session has created so reset behavior can be asserted.

use crate::recognition::decoder::{DecodeError, DecoderFactory, SpeechDecoder};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// What a scripted decoder should do for one fed chunk.
#[derive(Debug, Clone)]
pub enum Step {
    /// Finalize an utterance with this text.
    Finalize(&'static str),
    /// Keep decoding; report this partial hypothesis.
    Partial(&'static str),
    /// Fail the accept call.
    Fail(&'static str),
}

/// Shared script state, visible to the test after the session ran.
#[derive(Debug, Default)]
pub struct ScriptState {
    steps: VecDeque<Step>,
    /// Total decoder instances created, including the initial one.
    pub instances_created: usize,
    /// Chunks fed across all instances.
    pub chunks_fed: usize,
}

pub struct ScriptedDecoder {
    state: Arc<Mutex<ScriptState>>,
    last: Option<Step>,
}

impl SpeechDecoder for ScriptedDecoder {
    fn accept_waveform(&mut self, _pcm: &[u8]) -> Result<bool, DecodeError> {
        let mut state = self.state.lock().unwrap();
        state.chunks_fed += 1;
        let step = state.steps.pop_front().unwrap_or(Step::Partial(""));
        drop(state);

        let finalized = matches!(step, Step::Finalize(_));
        if let Step::Fail(msg) = &step {
            let msg = *msg;
            self.last = Some(step);
            return Err(DecodeError::new(msg));
        }
        self.last = Some(step);
        Ok(finalized)
    }

    fn result(&mut self) -> Result<String, DecodeError> {
        match &self.last {
            Some(Step::Finalize(text)) => Ok((*text).to_string()),
            _ => Ok(String::new()),
        }
    }

    fn partial_result(&mut self) -> Result<String, DecodeError> {
        match &self.last {
            Some(Step::Partial(text)) => Ok((*text).to_string()),
            _ => Ok(String::new()),
        }
    }
}

/// Factory that hands out [`ScriptedDecoder`]s sharing one script.
pub struct ScriptedFactory {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedFactory {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                steps: steps.into(),
                ..ScriptState::default()
            })),
        }
    }

    /// Handle for inspecting script state after the run.
    pub fn state(&self) -> Arc<Mutex<ScriptState>> {
        Arc::clone(&self.state)
    }
}

impl DecoderFactory for ScriptedFactory {
    fn create(&self, _sample_rate: u32) -> Result<Box<dyn SpeechDecoder>, DecodeError> {
        self.state.lock().unwrap().instances_created += 1;
        Ok(Box::new(ScriptedDecoder {
            state: Arc::clone(&self.state),
            last: None,
        }))
    }

    fn backend_name(&self) -> &str {
        "scripted"
    }
}
