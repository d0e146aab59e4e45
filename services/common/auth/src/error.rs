use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use jsonwebtoken::errors::ErrorKind;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authorization header is expected.")]
    MissingAuthorization,
    #[error("Authorization header must be a bearer token.")]
    InvalidAuthorization,
    #[error("Unable to find the appropriate key.")]
    MissingKeyId,
    #[error("Unable to find the appropriate key (kid '{0}').")]
    UnknownKeyId(String),
    #[error("Unable to parse authentication token: {0}")]
    InvalidHeader(String),
    #[error("Token expired.")]
    Expired,
    #[error("Incorrect claims. Please, check the audience and issuer.")]
    InvalidAudienceOrIssuer,
    #[error("token verification failed: {0}")]
    Verification(String),
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("malformed claim payload: {0}")]
    InvalidJson(String),
    #[error("Permissions not included in JWT.")]
    MissingPermissions,
    #[error("Permission not found: {0}")]
    PermissionDenied(String),
    #[error("failed to parse decoding key for kid '{0}': {1}")]
    KeyParse(String, String),
    #[error("failed to fetch JWKS: {0}")]
    JwksFetch(String),
    #[error("failed to parse JWKS response: {0}")]
    JwksDecode(String),
    #[error("JWKS entry missing key id (kid)")]
    JwksMissingKid,
    #[error("JWKS key '{0}' missing required RSA components")]
    JwksMissingComponents(String),
    #[error("JWKS key '{kid}' uses unsupported key type '{kty}'")]
    JwksUnsupportedKey { kid: String, kty: String },
    #[error("JWKS key '{kid}' uses unsupported alg '{alg}'")]
    JwksUnsupportedAlg { kid: String, alg: String },
}

impl AuthError {
    /// Short machine-readable cause, stable across message wording changes.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthorization => "authorization_header_missing",
            AuthError::InvalidAuthorization
            | AuthError::MissingKeyId
            | AuthError::UnknownKeyId(_)
            | AuthError::InvalidHeader(_)
            | AuthError::Verification(_)
            | AuthError::KeyParse(_, _) => "invalid_header",
            AuthError::Expired => "token_expired",
            AuthError::InvalidAudienceOrIssuer
            | AuthError::InvalidClaim(_, _)
            | AuthError::InvalidJson(_)
            | AuthError::MissingPermissions => "invalid_claims",
            AuthError::PermissionDenied(_) => "unauthorized",
            AuthError::JwksFetch(_)
            | AuthError::JwksDecode(_)
            | AuthError::JwksMissingKid
            | AuthError::JwksMissingComponents(_)
            | AuthError::JwksUnsupportedKey { .. }
            | AuthError::JwksUnsupportedAlg { .. } => "jwks_unavailable",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        match value.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidAudience | ErrorKind::InvalidIssuer => Self::InvalidAudienceOrIssuer,
            ErrorKind::MissingRequiredClaim(claim) => {
                Self::InvalidJson(format!("missing required claim '{claim}'"))
            }
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_)
            | ErrorKind::InvalidAlgorithm => Self::InvalidHeader(value.to_string()),
            _ => Self::Verification(value.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: u16,
    code: &'static str,
    message: String,
}

/// Every authorization failure is a 401; the body names the specific cause.
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = StatusCode::UNAUTHORIZED;
        let code = self.code();
        let body = ErrorBody {
            success: false,
            error: status.as_u16(),
            code,
            message: self.to_string(),
        };
        let mut resp = (status, Json(body)).into_response();
        resp.headers_mut()
            .insert("X-Error-Code", HeaderValue::from_static(code));
        resp
    }
}
