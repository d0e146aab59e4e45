use crate::claims::Claims;
use crate::error::{AuthError, AuthResult};

/// Permission gate: the claim set must carry a `permissions` list that
/// contains `required`.
pub fn ensure_permission(claims: &Claims, required: &str) -> AuthResult<()> {
    if claims.permissions.is_none() {
        return Err(AuthError::MissingPermissions);
    }

    if claims.has_permission(required) {
        Ok(())
    } else {
        Err(AuthError::PermissionDenied(required.to_string()))
    }
}
