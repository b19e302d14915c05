use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

// Struktur response error yang konsisten untuk semua endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

// Enum untuk semua jenis error yang mungkin terjadi di payment service
#[derive(Debug)]
pub enum AppError {
    DatabaseError(sqlx::Error),
    ValidationError(String),
    UnauthorizedError(String),
    ForbiddenError(String),
    NotFoundError(String),
    ConflictError(String),
    /// Upstream gateway failure; status dan detail dari PayMongo
    GatewayError { status: u16, detail: String },
    SignatureValidationError(String),
    MalformedEventError(String),
    /// Refund tidak memenuhi syarat; code machine-readable untuk caller
    IneligibleRefundError { code: String, message: String },
    ReceiptValidationError(String),
    InternalError(String),
    TokenError(String),
    HttpClientError(reqwest::Error),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::UnauthorizedError(msg) => write!(f, "Unauthorized error: {}", msg),
            AppError::ForbiddenError(msg) => write!(f, "Forbidden error: {}", msg),
            AppError::NotFoundError(msg) => write!(f, "Not found: {}", msg),
            AppError::ConflictError(msg) => write!(f, "Conflict: {}", msg),
            AppError::GatewayError { status, detail } => {
                write!(f, "Gateway error ({}): {}", status, detail)
            }
            AppError::SignatureValidationError(msg) => {
                write!(f, "Signature validation error: {}", msg)
            }
            AppError::MalformedEventError(msg) => write!(f, "Malformed event: {}", msg),
            AppError::IneligibleRefundError { code, message } => {
                write!(f, "Ineligible refund ({}): {}", code, message)
            }
            AppError::ReceiptValidationError(msg) => write!(f, "Receipt validation error: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::TokenError(msg) => write!(f, "Token error: {}", msg),
            AppError::HttpClientError(e) => write!(f, "HTTP client error: {}", e),
        }
    }
}

impl std::error::Error for AppError {}

// Konversi dari sqlx::Error ke AppError
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

// Konversi dari jsonwebtoken::errors::Error ke AppError
impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::TokenError(err.to_string())
    }
}

// Konversi dari reqwest::Error ke AppError
impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::HttpClientError(err)
    }
}

// Implementasi IntoResponse untuk AppError agar bisa langsung digunakan sebagai response di axum
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match &self {
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "A database error occurred".to_string(),
                    if cfg!(debug_assertions) {
                        Some(e.to_string())
                    } else {
                        None
                    },
                )
            }
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                msg.clone(),
                None,
            ),
            AppError::UnauthorizedError(msg) => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                msg.clone(),
                None,
            ),
            AppError::ForbiddenError(msg) => (
                StatusCode::FORBIDDEN,
                "forbidden",
                msg.clone(),
                None,
            ),
            AppError::NotFoundError(msg) => {
                (StatusCode::NOT_FOUND, "not_found", msg.clone(), None)
            }
            AppError::ConflictError(msg) => {
                (StatusCode::CONFLICT, "conflict", msg.clone(), None)
            }
            AppError::GatewayError { status, detail } => {
                tracing::error!("Gateway error ({}): {}", status, detail);
                (
                    StatusCode::BAD_GATEWAY,
                    "payment_gateway_error",
                    "The payment gateway returned an error".to_string(),
                    if cfg!(debug_assertions) {
                        Some(detail.clone())
                    } else {
                        None
                    },
                )
            }
            AppError::SignatureValidationError(msg) => {
                tracing::warn!("Webhook signature rejected: {}", msg);
                (
                    StatusCode::UNAUTHORIZED,
                    "signature_validation_error",
                    "Webhook signature validation failed".to_string(),
                    None,
                )
            }
            AppError::MalformedEventError(msg) => (
                StatusCode::BAD_REQUEST,
                "malformed_event",
                msg.clone(),
                None,
            ),
            AppError::IneligibleRefundError { code, message } => (
                StatusCode::BAD_REQUEST,
                "ineligible_refund",
                message.clone(),
                Some(code.clone()),
            ),
            AppError::ReceiptValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                "receipt_validation_error",
                msg.clone(),
                None,
            ),
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal server error occurred".to_string(),
                    if cfg!(debug_assertions) {
                        Some(msg.clone())
                    } else {
                        None
                    },
                )
            }
            AppError::TokenError(msg) => (
                StatusCode::UNAUTHORIZED,
                "token_error",
                "Token is invalid or has expired".to_string(),
                if cfg!(debug_assertions) {
                    Some(msg.clone())
                } else {
                    None
                },
            ),
            AppError::HttpClientError(e) => {
                tracing::error!("HTTP client error: {:?}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "http_client_error",
                    "Failed to reach an external service".to_string(),
                    if cfg!(debug_assertions) {
                        Some(e.to_string())
                    } else {
                        None
                    },
                )
            }
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(error_response)).into_response()
    }
}

// Helper functions untuk membuat error dengan mudah
impl AppError {
    // Buat error validasi dengan pesan custom
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    // Buat error not found dengan pesan custom
    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFoundError(msg.into())
    }

    // Buat error conflict dengan pesan custom
    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::ConflictError(msg.into())
    }

    // Buat error gateway dari status dan detail PayMongo
    pub fn gateway(status: u16, detail: impl Into<String>) -> Self {
        AppError::GatewayError {
            status,
            detail: detail.into(),
        }
    }

    // Buat error signature validation
    pub fn signature(msg: impl Into<String>) -> Self {
        AppError::SignatureValidationError(msg.into())
    }

    // Buat error malformed event
    pub fn malformed(msg: impl Into<String>) -> Self {
        AppError::MalformedEventError(msg.into())
    }

    // Buat error ineligible refund dengan machine-readable code
    pub fn ineligible(code: impl Into<String>, msg: impl Into<String>) -> Self {
        AppError::IneligibleRefundError {
            code: code.into(),
            message: msg.into(),
        }
    }

    // Buat error receipt validation
    pub fn receipt(msg: impl Into<String>) -> Self {
        AppError::ReceiptValidationError(msg.into())
    }

    // Buat error internal dengan pesan custom
    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::InternalError(msg.into())
    }

    // Buat error bad request dengan pesan custom
    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    // Buat error unauthorized dengan pesan custom
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::UnauthorizedError(msg.into())
    }

    // Buat error forbidden dengan pesan custom
    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::ForbiddenError(msg.into())
    }
}

// Type alias untuk Result dengan AppError sebagai error type
pub type AppResult<T> = Result<T, AppError>;
