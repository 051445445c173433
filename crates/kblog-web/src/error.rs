use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use kblog_core::{AuthError, ErrorKind};
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    Auth(AuthError),
    BadRequest(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining_minutes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            retry_after: None,
            remaining_minutes: None,
            field: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Auth(err) => auth_error_body(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorBody::new(msg)),
            AppError::Internal(msg) => {
                // Log the real error server-side, return generic message to client
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new("Internal server error"),
                )
            }
        };

        let retry_after = body.retry_after;
        let mut response = (status, axum::Json(body)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

fn auth_error_body(err: AuthError) -> (StatusCode, ErrorBody) {
    match err.kind() {
        ErrorKind::Unauthorized => {
            let msg = match err {
                AuthError::InvalidCredentials => "Invalid credentials",
                _ => "Invalid or expired token",
            };
            (StatusCode::UNAUTHORIZED, ErrorBody::new(msg))
        }
        ErrorKind::Forbidden => (StatusCode::FORBIDDEN, ErrorBody::new("Forbidden")),
        ErrorKind::TooManyRequests => {
            let body = match err {
                AuthError::Locked { remaining } => ErrorBody {
                    remaining_minutes: Some(remaining.as_secs().div_ceil(60)),
                    ..ErrorBody::new("Too many failed login attempts, account temporarily locked")
                },
                AuthError::RateLimited { retry_after } => ErrorBody {
                    retry_after: Some(retry_after.as_secs()),
                    ..ErrorBody::new("Too many requests, try again later")
                },
                _ => ErrorBody::new("Too many requests, try again later"),
            };
            (StatusCode::TOO_MANY_REQUESTS, body)
        }
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, ErrorBody::new(err.to_string())),
        ErrorKind::Conflict => {
            let field = match &err {
                AuthError::Conflict { field } => Some(field.clone()),
                _ => None,
            };
            (
                StatusCode::CONFLICT,
                ErrorBody {
                    field,
                    ..ErrorBody::new(err.to_string())
                },
            )
        }
        ErrorKind::Internal => {
            tracing::error!(error = %err, "Internal error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new("Internal server error"),
            )
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        AppError::Auth(e)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Internal(format!("{e:#}"))
    }
}
