use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;

use crate::qr::QrError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Text is required")]
    TextRequired,
    #[error("Invalid size")]
    InvalidSize,
    #[error("Invalid error correction level")]
    InvalidErrorCorrectionLevel,
    #[error("Invalid JSON body")]
    InvalidBody,
    // Причина пишется в лог, клиенту уходит общее сообщение
    #[error("QR code generation failed")]
    GenerationFailed(#[source] QrError),
    #[error("QR code generation failed")]
    Blocking,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<QrError> for ApiError {
    fn from(e: QrError) -> Self {
        ApiError::GenerationFailed(e)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::TextRequired
            | ApiError::InvalidSize
            | ApiError::InvalidErrorCorrectionLevel
            | ApiError::InvalidBody => StatusCode::BAD_REQUEST,
            ApiError::GenerationFailed(_) | ApiError::Blocking => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
