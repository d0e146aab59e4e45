use std::sync::Arc;

use axum::extract::FromRef;
use common_auth::JwtVerifier;

use crate::store::MenuStore;

/// Shared application state used by handlers.
#[derive(Clone)]
pub struct AppState {
    pub(crate) store: Arc<dyn MenuStore>,
    pub(crate) jwt_verifier: Arc<JwtVerifier>,
}

impl AppState {
    pub fn new(store: Arc<dyn MenuStore>, jwt_verifier: Arc<JwtVerifier>) -> Self {
        Self { store, jwt_verifier }
    }
}

impl FromRef<AppState> for Arc<JwtVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_verifier.clone()
    }
}
