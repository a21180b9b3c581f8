use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};

use crate::model::ErrorBody;

pub const MISSING_URL_MESSAGE: &str = "URL is required.";
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests. Please try again later.";
pub const EXTRACTION_FAILED_MESSAGE: &str = "Failed to process the video.";
pub const EXTRACTION_FAILED_DETAILS: &str = "Make sure the video is public and the link is correct.";
pub const EXTRACTION_FAILED_SUGGESTION: &str =
    "Try the 'Copy link' option in the Facebook app and paste that link.";

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<String>,
    pub suggestion: Option<String>,
    pub retry_after_seconds: Option<u64>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
            suggestion: None,
            retry_after_seconds: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn missing_url() -> Self {
        Self::bad_request(MISSING_URL_MESSAGE)
    }

    pub fn rate_limited(retry_after_seconds: u64) -> Self {
        Self {
            retry_after_seconds: Some(retry_after_seconds),
            ..Self::new(StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED_MESSAGE)
        }
    }

    /// Every extraction failure gets the same body; the cause is only logged.
    pub fn extraction_failed() -> Self {
        Self {
            details: Some(EXTRACTION_FAILED_DETAILS.to_string()),
            suggestion: Some(EXTRACTION_FAILED_SUGGESTION.to_string()),
            ..Self::internal(EXTRACTION_FAILED_MESSAGE)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            details: self.details,
            suggestion: self.suggestion,
        });

        let mut response = (self.status, body).into_response();
        if let Some(seconds) = self.retry_after_seconds
            && let Ok(value) = HeaderValue::from_str(&seconds.to_string())
        {
            response.headers_mut().insert(RETRY_AFTER, value);
        }

        response
    }
}
