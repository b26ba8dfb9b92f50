//! # Configuration Management
//!
//! Loads application configuration from layered sources, highest priority
//! last-applied:
//!
//! 1. Built-in defaults (the `Default` impl below)
//! 2. `config.toml` in the working directory, if present
//! 3. Environment variables with the `APP_` prefix (e.g. `APP_SERVER_PORT`)
//! 4. Bare `HOST` / `PORT` variables, honored for deployment platforms
//!
//! The audio section carries the numeric pipeline constants. Their defaults
//! match the decoder contract (16 kHz mono f32 in, 32 KiB chunks) and changing
//! them is only safe together with the clients producing the stream.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub audio: AudioConfig,
    pub recognition: RecognitionConfig,
    pub storage: StorageConfig,
    pub performance: PerformanceConfig,
}

/// HTTP/WebSocket listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Numeric constants of the per-session audio pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate of the inbound stream and of decoder instances (Hz).
    pub sample_rate: u32,

    /// Fixed decode-unit size in bytes. Must stay a multiple of the 4-byte
    /// f32 sample width so full chunks always parse cleanly.
    pub chunk_size: usize,

    /// RMS level below which a raw chunk is classified as silent.
    pub silence_rms_threshold: f32,

    /// Accumulated silent bytes that trigger a decoder-context reset.
    pub silence_reset_bytes: usize,
}

/// Speech recognizer backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionConfig {
    /// Model directory for the offline recognizer backend.
    pub model_path: String,
}

/// Transcript persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory receiving one JSON transcript file per session.
    pub transcript_dir: String,
}

/// Capacity limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Maximum concurrent recognition sessions accepted at once.
    pub max_concurrent_sessions: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8002,
            },
            audio: AudioConfig {
                sample_rate: 16000,          // Decoder's expected input rate
                chunk_size: 32768,           // 32 KiB per decode unit
                silence_rms_threshold: 0.01, // Matches the severe under-level band
                silence_reset_bytes: 8192,   // Sustained silence before a context reset
            },
            recognition: RecognitionConfig {
                model_path: "model-large-ja".to_string(),
            },
            storage: StorageConfig {
                transcript_dir: "text".to_string(),
            },
            performance: PerformanceConfig {
                max_concurrent_sessions: 10,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, `config.toml`, and the environment.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Deployment platforms commonly inject bare HOST/PORT variables.
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }
        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.audio.chunk_size == 0 || self.audio.chunk_size % 4 != 0 {
            return Err(anyhow::anyhow!(
                "Audio chunk size must be a positive multiple of 4 bytes"
            ));
        }

        if self.audio.sample_rate == 0 {
            return Err(anyhow::anyhow!("Sample rate must be greater than 0"));
        }

        if self.audio.silence_reset_bytes == 0 {
            return Err(anyhow::anyhow!(
                "Silence reset threshold must be greater than 0 bytes"
            ));
        }

        if self.audio.silence_rms_threshold <= 0.0 {
            return Err(anyhow::anyhow!("Silence RMS threshold must be positive"));
        }

        if self.storage.transcript_dir.is_empty() {
            return Err(anyhow::anyhow!("Transcript directory cannot be empty"));
        }

        if self.performance.max_concurrent_sessions == 0 {
            return Err(anyhow::anyhow!(
                "Max concurrent sessions must be greater than 0"
            ));
        }

        Ok(())
    }

    /// Apply a partial update from a JSON body (runtime config endpoint).
    ///
    /// Only fields present in the JSON are touched; the result is validated
    /// before the caller installs it, so a bad update leaves the running
    /// configuration intact.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = port as u16;
            }
        }

        if let Some(audio) = partial.get("audio") {
            if let Some(rate) = audio.get("sample_rate").and_then(|v| v.as_u64()) {
                self.audio.sample_rate = rate as u32;
            }
            if let Some(size) = audio.get("chunk_size").and_then(|v| v.as_u64()) {
                self.audio.chunk_size = size as usize;
            }
            if let Some(rms) = audio.get("silence_rms_threshold").and_then(|v| v.as_f64()) {
                self.audio.silence_rms_threshold = rms as f32;
            }
            if let Some(bytes) = audio.get("silence_reset_bytes").and_then(|v| v.as_u64()) {
                self.audio.silence_reset_bytes = bytes as usize;
            }
        }

        if let Some(recognition) = partial.get("recognition") {
            if let Some(path) = recognition.get("model_path").and_then(|v| v.as_str()) {
                self.recognition.model_path = path.to_string();
            }
        }

        if let Some(storage) = partial.get("storage") {
            if let Some(dir) = storage.get("transcript_dir").and_then(|v| v.as_str()) {
                self.storage.transcript_dir = dir.to_string();
            }
        }

        if let Some(performance) = partial.get("performance") {
            if let Some(sessions) = performance
                .get("max_concurrent_sessions")
                .and_then(|v| v.as_u64())
            {
                self.performance.max_concurrent_sessions = sessions as usize;
            }
        }

        self.validate()?;
        Ok(())
    }
}
