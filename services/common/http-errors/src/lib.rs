use axum::{http::{StatusCode, HeaderValue}, response::{IntoResponse, Response}, Json};
use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub success: bool,
    pub error: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub detail: Option<String>,
}

/// Failures a handler reports to its caller. Authorization failures are not
/// here; they carry their own response mapping.
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: &'static str, detail: Option<String> },
    NotFound { code: &'static str },
    Unprocessable { code: &'static str, detail: Option<String> },
}

impl ApiError {
    pub fn bad_request(code: &'static str) -> Self { Self::BadRequest { code, detail: None } }
    pub fn not_found(code: &'static str) -> Self { Self::NotFound { code } }
    pub fn unprocessable(code: &'static str) -> Self { Self::Unprocessable { code, detail: None } }

    pub fn with_detail<D: std::fmt::Display>(self, detail: D) -> Self {
        match self {
            ApiError::BadRequest { code, .. } => ApiError::BadRequest { code, detail: Some(detail.to_string()) },
            ApiError::Unprocessable { code, .. } => ApiError::Unprocessable { code, detail: Some(detail.to_string()) },
            not_found @ ApiError::NotFound { .. } => not_found,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { code, .. }
            | ApiError::NotFound { code }
            | ApiError::Unprocessable { code, .. } => code,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_code = self.code();
        let (message, detail) = match self {
            ApiError::BadRequest { detail, .. } => ("bad request", detail),
            ApiError::NotFound { .. } => ("resource not found", None),
            ApiError::Unprocessable { detail, .. } => ("unprocessable", detail),
        };
        let body = ErrorBody { success: false, error: status.as_u16(), message: message.into(), detail };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
