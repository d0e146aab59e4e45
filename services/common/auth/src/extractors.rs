use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts};

use crate::claims::Claims;
use crate::error::{AuthError, AuthResult};
use crate::guards::ensure_permission;
use crate::verifier::JwtVerifier;

/// Extracts verified JWT claims from the request using the configured verifier.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Claims,
    pub token: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<JwtVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = Arc::<JwtVerifier>::from_ref(state);

        let header_value = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthorization)?;

        let token = parse_bearer(header_value)?;
        let claims = verifier.verify(&token)?;

        Ok(Self { claims, token })
    }
}

/// A permission string a route can demand, e.g. `post:drinks`.
pub trait Permission: Send + Sync + 'static {
    const NAME: &'static str;
}

/// Verified caller that holds permission `P`.
///
/// Placing this extractor in a handler signature gates the route: it runs
/// before the handler body and before any body extractor, and rejects with
/// a 401 [`AuthError`] when the token is missing, invalid, or lacks `P`.
#[derive(Debug, Clone)]
pub struct RequirePermission<P> {
    pub auth: AuthContext,
    _permission: PhantomData<fn() -> P>,
}

impl<P: Permission> RequirePermission<P> {
    pub fn subject(&self) -> &str {
        &self.auth.claims.subject
    }
}

#[async_trait]
impl<S, P> FromRequestParts<S> for RequirePermission<P>
where
    Arc<JwtVerifier>: FromRef<S>,
    S: Send + Sync,
    P: Permission,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthContext::from_request_parts(parts, state).await?;
        ensure_permission(&auth.claims, P::NAME)?;
        Ok(Self {
            auth,
            _permission: PhantomData,
        })
    }
}

/// Accepts exactly `Bearer <token>`: two space-separated parts, the first
/// literally `Bearer`.
fn parse_bearer(value: &axum::http::HeaderValue) -> AuthResult<String> {
    let raw = value.to_str().map_err(|_| AuthError::InvalidAuthorization)?;

    let mut parts = raw.split(' ');
    let (Some(scheme), Some(token), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(AuthError::InvalidAuthorization);
    };

    if scheme != "Bearer" || token.is_empty() {
        return Err(AuthError::InvalidAuthorization);
    }

    Ok(token.to_owned())
}
