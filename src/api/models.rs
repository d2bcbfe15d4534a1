//! API data models

use serde::{Deserialize, Serialize};

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Playback clock update from the in-page polling probe or slider.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClockUpdate {
    pub seconds: f64,
}

/// Current session playback position.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClockStatus {
    pub seconds: f64,
}

/// Free-text question at a playback position. When `seconds` is omitted the
/// last observed clock reading is used.
#[derive(Debug, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
    pub seconds: Option<f64>,
}

/// Single-turn assistant answer.
#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
}
