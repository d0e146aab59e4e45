pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod guards;
pub mod jwks;
pub mod verifier;

pub use claims::Claims;
pub use config::JwtConfig;
pub use error::{AuthError, AuthResult};
pub use extractors::{AuthContext, Permission, RequirePermission};
pub use guards::ensure_permission;
pub use jwks::JwksFetcher;
pub use verifier::{InMemoryKeyStore, JwtVerifier, JwtVerifierBuilder};
