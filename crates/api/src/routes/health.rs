//! Health Route

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use alerting::AlertStats;

use crate::AppState;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub active_sessions: usize,
    pub alerts: AlertStats,
    pub sampling: SamplingInfo,
}

/// Effective decision tunables
#[derive(Debug, Serialize)]
pub struct SamplingInfo {
    pub sample_interval: u64,
    pub drowsy_streak_threshold: u32,
    pub classification_threshold: f32,
}

/// Health check handler
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let dms = &state.settings.dms;

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        active_sessions: state.active_sessions.load(Ordering::Relaxed),
        alerts: state.dispatcher.stats(),
        sampling: SamplingInfo {
            sample_interval: dms.sample_interval,
            drowsy_streak_threshold: dms.drowsy_streak_threshold,
            classification_threshold: dms.classification_threshold,
        },
    })
}
