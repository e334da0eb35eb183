use axum::{
    extract::rejection::JsonRejection,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::calendar::GoogleError;
use crate::llm::LlmError;
use crate::scraping::FetchError;

const INTERNAL_SERVER_ERROR_MESSAGE: &str = "Internal server error";

/// Any possible server errors
#[derive(Debug, Error)]
pub(crate) enum ServerError {
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),

    #[error(transparent)]
    AxumJsonRejection(#[from] JsonRejection),

    #[error(transparent)]
    AxumQueryRejection(#[from] axum::extract::rejection::QueryRejection),

    #[error(transparent)]
    DbError(#[from] sea_orm::DbErr),

    #[error(transparent)]
    RedisError(#[from] redis::RedisError),

    #[error(transparent)]
    FetchError(#[from] FetchError),

    #[error(transparent)]
    GoogleError(#[from] GoogleError),

    #[error(transparent)]
    LlmError(#[from] LlmError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ServerError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        ServerError::BadRequest(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        ServerError::NotFound(message.into())
    }

    pub(crate) fn invalid_credentials() -> Self {
        ServerError::Unauthorized("Invalid authentication credentials".to_string())
    }

    pub(crate) fn ai_unavailable() -> Self {
        ServerError::ServiceUnavailable("AI is unavailable. Configure GROQ_API_KEY.".to_string())
    }

    pub(crate) fn status_code(&self) -> StatusCode {
        match self {
            ServerError::ValidationError(_)
            | ServerError::AxumJsonRejection(JsonRejection::JsonDataError(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServerError::AxumJsonRejection(_)
            | ServerError::AxumQueryRejection(_)
            | ServerError::FetchError(_)
            | ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::GoogleError(e) => e.status_code(),
            ServerError::LlmError(LlmError::NotConfigured(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::DbError(_)
            | ServerError::RedisError(_)
            | ServerError::LlmError(_)
            | ServerError::Internal(_)
            | ServerError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ServerError::ValidationError(_) => {
                format!("Input validation error: [{}]", self).replace('\n', ", ")
            }
            ServerError::DbError(e) => {
                tracing::error!("Database error occurred: {:?}", e);
                INTERNAL_SERVER_ERROR_MESSAGE.to_string()
            }
            ServerError::RedisError(e) => {
                tracing::error!("Redis error occurred: {:?}", e);
                INTERNAL_SERVER_ERROR_MESSAGE.to_string()
            }
            ServerError::Other(e) => {
                tracing::error!("Unexpected error occurred: {:?}", e);
                INTERNAL_SERVER_ERROR_MESSAGE.to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({ "detail": message }));
        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}
