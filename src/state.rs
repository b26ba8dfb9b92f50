//! # Application State Management
//!
//! Shared state visible to every HTTP handler and WebSocket actor: the
//! runtime configuration and the server-wide metrics counters. Both sit
//! behind `Arc<RwLock<_>>` (many concurrent readers, one writer), so request
//! handlers read without blocking each other while the config endpoint or a
//! session actor updates the protected value.
//!
//! Per-session pipeline state does NOT live here; each connection owns its
//! coordinator outright. Only aggregate counters cross session boundaries.

use crate::config::AppConfig;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// State shared across all connections.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Runtime configuration, updatable through the config endpoint.
    pub config: Arc<RwLock<AppConfig>>,

    /// Server-wide counters, updated by middleware and session actors.
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started; never changes after startup.
    pub start_time: Instant,
}

/// Aggregate counters across all requests and sessions.
#[derive(Debug, Default)]
pub struct AppMetrics {
    /// HTTP requests processed since startup.
    pub request_count: u64,

    /// HTTP requests that ended in an error status.
    pub error_count: u64,

    /// Recognition sessions currently connected.
    pub active_sessions: u32,

    /// Binary audio frames received across all sessions.
    pub frames_received: u64,

    /// Raw audio bytes received across all sessions.
    pub audio_bytes_received: u64,

    /// Utterances finalized by the decoder across all sessions.
    pub segments_finalized: u64,

    /// Transcripts successfully persisted.
    pub transcripts_saved: u64,

    /// Per-endpoint request statistics, keyed by "METHOD /path".
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Request statistics for one endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// Snapshot of the current configuration.
    ///
    /// Cloned so the read lock is released immediately; `AppConfig` is cheap
    /// to copy.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// Replace the configuration after validating it.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        new_config.validate().map_err(|e| e.to_string())?;
        *self.config.write().unwrap() = new_config;
        Ok(())
    }

    pub fn increment_request_count(&self) {
        self.metrics.write().unwrap().request_count += 1;
    }

    pub fn increment_error_count(&self) {
        self.metrics.write().unwrap().error_count += 1;
    }

    /// Record one finished request against its endpoint.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();
        let endpoint_metric = metrics
            .endpoint_metrics
            .entry(endpoint.to_string())
            .or_default();
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;
        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    pub fn increment_active_sessions(&self) {
        self.metrics.write().unwrap().active_sessions += 1;
    }

    pub fn decrement_active_sessions(&self) {
        let mut metrics = self.metrics.write().unwrap();
        // Guard against underflow if a disconnect is observed twice.
        if metrics.active_sessions > 0 {
            metrics.active_sessions -= 1;
        }
    }

    /// Account for one inbound audio frame.
    pub fn record_audio_frame(&self, bytes: usize) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.frames_received += 1;
        metrics.audio_bytes_received += bytes as u64;
    }

    pub fn record_finalized_segment(&self) {
        self.metrics.write().unwrap().segments_finalized += 1;
    }

    pub fn record_transcript_saved(&self) {
        self.metrics.write().unwrap().transcripts_saved += 1;
    }

    /// Consistent copy of the metrics for serialization.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        let metrics = self.metrics.read().unwrap();
        AppMetrics {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            active_sessions: metrics.active_sessions,
            frames_received: metrics.frames_received,
            audio_bytes_received: metrics.audio_bytes_received,
            segments_finalized: metrics.segments_finalized,
            transcripts_saved: metrics.transcripts_saved,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    /// Mean request duration for this endpoint, in milliseconds.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Fraction of requests that failed, in `[0.0, 1.0]`.
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_counters_track_activity() {
        let state = AppState::new(AppConfig::default());

        state.increment_active_sessions();
        state.record_audio_frame(4096);
        state.record_audio_frame(4096);
        state.record_finalized_segment();
        state.record_transcript_saved();
        state.decrement_active_sessions();
        state.decrement_active_sessions(); // must not underflow

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.active_sessions, 0);
        assert_eq!(snapshot.frames_received, 2);
        assert_eq!(snapshot.audio_bytes_received, 8192);
        assert_eq!(snapshot.segments_finalized, 1);
        assert_eq!(snapshot.transcripts_saved, 1);
    }

    #[test]
    fn invalid_config_update_is_refused() {
        let state = AppState::new(AppConfig::default());
        let mut bad = AppConfig::default();
        bad.server.port = 0;

        assert!(state.update_config(bad).is_err());
        assert_eq!(state.get_config().server.port, 8002);
    }

    #[test]
    fn endpoint_metrics_aggregate_per_endpoint() {
        let state = AppState::new(AppConfig::default());
        state.record_endpoint_request("GET /health", 10, false);
        state.record_endpoint_request("GET /health", 30, true);

        let snapshot = state.get_metrics_snapshot();
        let metric = &snapshot.endpoint_metrics["GET /health"];
        assert_eq!(metric.request_count, 2);
        assert_eq!(metric.average_duration_ms(), 20.0);
        assert_eq!(metric.error_rate(), 0.5);
    }
}
