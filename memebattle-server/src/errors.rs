//! Mapping of service errors and warp rejections to JSON responses.

use std::convert::Infallible;

use memebattle_app::ServiceError;
use memebattle_core::MemeBattleError;
use memebattle_llm::LlmError;
use serde::Serialize;
use tracing::{error, warn};
use warp::http::StatusCode;
use warp::reject::Reject;
use warp::{Rejection, Reply};

use crate::types::ApiResponse;

/// Request-level failures raised by filters.
#[derive(Debug)]
pub enum ServerError {
    /// The `x-address` header is not a wallet address.
    InvalidWallet(String),
    /// A path segment is not a wallet address.
    InvalidAddress(String),
}

impl Reject for ServerError {}

/// HTTP status for a service error.
#[must_use]
pub fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::Domain(domain) => match domain {
            MemeBattleError::BattleNotFound(_) | MemeBattleError::MemeIndexOutOfRange { .. } => StatusCode::NOT_FOUND,
            MemeBattleError::Validation(_) | MemeBattleError::InvalidAddress(_) | MemeBattleError::InvalidAmount(_) => {
                StatusCode::BAD_REQUEST
            }
            MemeBattleError::BettingClosed(_)
            | MemeBattleError::WinnerAlreadyDeclared(_)
            | MemeBattleError::BattleStillRunning(_) => StatusCode::CONFLICT,
            MemeBattleError::WinnerUndetermined(_) => StatusCode::UNPROCESSABLE_ENTITY,
            MemeBattleError::WalletNotConnected => StatusCode::UNAUTHORIZED,
            MemeBattleError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            MemeBattleError::Serialization(_)
            | MemeBattleError::Database(_)
            | MemeBattleError::Config(_)
            | MemeBattleError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
        ServiceError::DeclarationInProgress(_) => StatusCode::CONFLICT,
        ServiceError::CreateOnChainFailed { .. } | ServiceError::Contract(_) | ServiceError::Attestation(_) => {
            StatusCode::BAD_GATEWAY
        }
        ServiceError::Scoring(LlmError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Scoring(LlmError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        ServiceError::Scoring(_) => StatusCode::BAD_GATEWAY,
        ServiceError::WinnerNotPersisted { .. } | ServiceError::Setup(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Render a service result as `ApiResponse` with a matching status.
pub fn reply<T: Serialize>(result: Result<T, ServiceError>, ok: StatusCode) -> warp::reply::Response {
    match result {
        Ok(data) => warp::reply::with_status(warp::reply::json(&ApiResponse::success(data)), ok).into_response(),
        Err(err) => {
            let code = status_for(&err);
            if code.is_server_error() {
                error!(status = code.as_u16(), error = %err, "Request failed");
            } else {
                warn!(status = code.as_u16(), error = %err, "Request rejected");
            }
            error_reply(code, err.to_string())
        }
    }
}

fn error_reply(code: StatusCode, message: String) -> warp::reply::Response {
    warp::reply::with_status(warp::reply::json(&ApiResponse::error(message)), code).into_response()
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found".to_string())
    } else if let Some(server) = err.find::<ServerError>() {
        match server {
            ServerError::InvalidWallet(raw) => (StatusCode::BAD_REQUEST, format!("Invalid x-address header: {raw}")),
            ServerError::InvalidAddress(raw) => (StatusCode::BAD_REQUEST, format!("Invalid wallet address: {raw}")),
        }
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large".to_string())
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Expected application/json".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed".to_string())
    } else {
        error!(rejection = ?err, "Unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
    };
    Ok(error_reply(code, message))
}
