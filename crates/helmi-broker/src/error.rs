//! API error types

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use helmi_kube::BrokerError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by the broker API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized.")]
    Unauthorized,

    #[error("{0}")]
    Conflict(String),

    /// The instance does not exist (any more)
    #[error("{0}")]
    Gone(String),

    #[error("{0}")]
    Internal(String),
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub description: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Gone(_) => StatusCode::GONE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            description: self.to_string(),
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(self, ApiError::Unauthorized) {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static(r#"Basic realm="helmi""#),
            );
        }
        response
    }
}

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        let message = err.to_string();
        if err.is_bad_request() {
            ApiError::BadRequest(message)
        } else if err.is_conflict() {
            ApiError::Conflict(message)
        } else if err.is_not_found() {
            ApiError::Gone(message)
        } else {
            ApiError::Internal(message)
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_error_mapping() {
        let cases = [
            (
                BrokerError::UnknownService {
                    service_id: "x".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                BrokerError::ChartNotSpecified {
                    service_id: "x".to_string(),
                    plan_id: "y".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                BrokerError::Conflict {
                    name: "helmiabc".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (
                BrokerError::NotFound {
                    name: "helmiabc".to_string(),
                },
                StatusCode::GONE,
            ),
            (BrokerError::tool("helm", "boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_unauthorized_challenge() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE).unwrap(),
            r#"Basic realm="helmi""#
        );
    }
}
