use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Application-focused representation of verified JWT claims.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    pub subject: String,
    /// `None` when the token carries no `permissions` claim at all, which is
    /// reported differently from a list that lacks the required entry.
    pub permissions: Option<Vec<String>>,
    pub expires_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
    pub issuer: String,
    pub audience: Vec<String>,
    pub raw: serde_json::Value,
}

impl Claims {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .as_deref()
            .is_some_and(|granted| granted.iter().any(|value| value == permission))
    }
}

#[derive(Debug, Deserialize)]
struct ClaimsRepr {
    sub: String,
    #[serde(default)]
    permissions: Option<Vec<String>>,
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
    iss: String,
    #[serde(default)]
    aud: Option<AudienceRepr>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AudienceRepr {
    Single(String),
    Many(Vec<String>),
}

impl TryFrom<ClaimsRepr> for Claims {
    type Error = AuthError;

    fn try_from(value: ClaimsRepr) -> AuthResult<Self> {
        if value.sub.trim().is_empty() {
            return Err(AuthError::InvalidClaim("sub", value.sub));
        }

        let expires_at = Utc
            .timestamp_opt(value.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("exp", value.exp.to_string()))?;

        let issued_at = match value.iat {
            Some(iat) => Some(
                Utc.timestamp_opt(iat, 0)
                    .single()
                    .ok_or_else(|| AuthError::InvalidClaim("iat", iat.to_string()))?,
            ),
            None => None,
        };

        let audience = match value.aud {
            Some(AudienceRepr::Single(item)) => vec![item],
            Some(AudienceRepr::Many(items)) => items,
            None => Vec::new(),
        };

        Ok(Self {
            subject: value.sub,
            permissions: value.permissions,
            expires_at,
            issued_at,
            issuer: value.iss,
            audience,
            raw: serde_json::Value::Null,
        })
    }
}

impl TryFrom<serde_json::Value> for Claims {
    type Error = AuthError;

    fn try_from(value: serde_json::Value) -> AuthResult<Self> {
        let repr: ClaimsRepr = serde_json::from_value(value.clone())
            .map_err(|err| AuthError::InvalidJson(err.to_string()))?;
        let mut claims = Claims::try_from(repr)?;
        claims.raw = value;
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_auth0_style_payload() {
        let payload = json!({
            "sub": "auth0|barista",
            "iss": "https://tenant.auth0.com/",
            "aud": ["drinks", "https://tenant.auth0.com/userinfo"],
            "exp": 1_900_000_000,
            "iat": 1_899_990_000,
            "permissions": ["get:drinks-detail", "post:drinks"]
        });
        let claims = Claims::try_from(payload.clone()).expect("claims");
        assert_eq!(claims.subject, "auth0|barista");
        assert_eq!(claims.audience.len(), 2);
        assert!(claims.has_permission("post:drinks"));
        assert!(!claims.has_permission("delete:drinks"));
        assert_eq!(claims.raw, payload);
    }

    #[test]
    fn absent_permissions_claim_is_kept_distinct() {
        let payload = json!({
            "sub": "auth0|guest",
            "iss": "https://tenant.auth0.com/",
            "aud": "drinks",
            "exp": 1_900_000_000
        });
        let claims = Claims::try_from(payload).expect("claims");
        assert!(claims.permissions.is_none());
        assert!(!claims.has_permission("get:drinks-detail"));
        assert_eq!(claims.audience, vec!["drinks".to_string()]);
    }

    #[test]
    fn rejects_blank_subject() {
        let payload = json!({ "sub": " ", "iss": "x", "exp": 1_900_000_000 });
        let err = Claims::try_from(payload).expect_err("blank sub");
        assert!(matches!(err, AuthError::InvalidClaim("sub", _)));
    }

    #[test]
    fn rejects_non_array_permissions() {
        let payload = json!({
            "sub": "auth0|x",
            "iss": "x",
            "exp": 1_900_000_000,
            "permissions": "post:drinks"
        });
        let err = Claims::try_from(payload).expect_err("string permissions");
        assert!(matches!(err, AuthError::InvalidJson(_)));
    }
}
