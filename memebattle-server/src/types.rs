//! Request and response bodies.

use serde::{Deserialize, Serialize};

/// Envelope of every JSON response.
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
}

impl ApiResponse<()> {
    pub fn error(err: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.into()),
        }
    }
}

/// `POST .../chat`
#[derive(Debug, Deserialize)]
pub struct PostChatRequest {
    pub content: String,
}

/// `POST .../bets` and `POST .../bets/contract`
#[derive(Debug, Deserialize)]
pub struct PlaceBetRequest {
    /// Ether amount as a decimal string.
    pub amount: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub offline: bool,
}
