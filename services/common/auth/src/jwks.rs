use jsonwebtoken::{Algorithm, DecodingKey};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{AuthError, AuthResult};

/// Downloads the identity provider's published signing keys.
#[derive(Clone)]
pub struct JwksFetcher {
    client: Client,
    url: String,
    algorithm: Algorithm,
}

impl JwksFetcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            algorithm: Algorithm::RS256,
        }
    }

    /// Only keys advertising this algorithm (or none at all) are accepted.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> AuthResult<Vec<(String, DecodingKey)>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| AuthError::JwksFetch(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::JwksFetch(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let body: JwksResponse = response
            .json()
            .await
            .map_err(|err| AuthError::JwksDecode(err.to_string()))?;

        // Unusable entries are skipped; only transport and document errors fail the fetch.
        let mut keys = Vec::new();
        for key in body.keys.into_iter() {
            match self.signing_key(key) {
                Ok(Some(entry)) => keys.push(entry),
                Ok(None) => {}
                Err(err) => debug!(error = %err, "skipping unusable JWKS entry"),
            }
        }

        Ok(keys)
    }

    /// `Ok(None)` for entries that are not signing keys at all.
    fn signing_key(&self, key: JwkEntry) -> AuthResult<Option<(String, DecodingKey)>> {
        let kid = key.kid.ok_or(AuthError::JwksMissingKid)?;

        // encryption keys can share the set with signing keys
        if key.key_use.as_deref().is_some_and(|value| value != "sig") {
            debug!(kid, "skipping non-signing JWKS entry");
            return Ok(None);
        }

        let kty = key.kty.unwrap_or_else(|| "RSA".to_string());
        if kty != "RSA" {
            return Err(AuthError::JwksUnsupportedKey { kid, kty });
        }

        if let Some(alg) = key.alg {
            if alg.parse::<Algorithm>().ok() != Some(self.algorithm) {
                return Err(AuthError::JwksUnsupportedAlg { kid, alg });
            }
        }

        let (Some(modulus), Some(exponent)) = (key.n, key.e) else {
            return Err(AuthError::JwksMissingComponents(kid));
        };

        let decoding_key = DecodingKey::from_rsa_components(&modulus, &exponent)
            .map_err(|err| AuthError::KeyParse(kid.clone(), err.to_string()))?;
        Ok(Some((kid, decoding_key)))
    }
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<JwkEntry>,
}

#[derive(Debug, Deserialize)]
struct JwkEntry {
    kid: Option<String>,
    kty: Option<String>,
    alg: Option<String>,
    #[serde(rename = "use")]
    key_use: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn fetch_reports_http_failures() {
        let server = MockServer::start();
        let _mock = server.mock(|when, then| {
            when.method(GET).path("/.well-known/jwks.json");
            then.status(503);
        });

        let fetcher = JwksFetcher::new(format!("{}/.well-known/jwks.json", server.base_url()));
        let err = fetcher.fetch().await.err().expect("503 should fail");
        assert!(matches!(err, AuthError::JwksFetch(_)));
    }

    #[tokio::test]
    async fn fetch_keeps_usable_keys_when_others_are_unusable() {
        let server = MockServer::start();
        let body = serde_json::json!({
            "keys": [
                { "kid": "rs512", "kty": "RSA", "alg": "RS512", "n": "AQAB", "e": "AQAB" },
                { "kid": "ec", "kty": "EC", "crv": "P-256", "x": "AQAB", "y": "AQAB" },
                { "kty": "RSA", "alg": "RS256", "n": "AQAB", "e": "AQAB" },
                { "kid": "no-modulus", "kty": "RSA", "e": "AQAB" },
                { "kid": "good", "kty": "RSA", "alg": "RS256", "use": "sig", "n": "AQAB", "e": "AQAB" }
            ]
        });
        let _mock = server.mock(|when, then| {
            when.method(GET).path("/jwks");
            then.status(200)
                .header("content-type", "application/json")
                .body(body.to_string());
        });

        let fetcher = JwksFetcher::new(format!("{}/jwks", server.base_url()));
        let keys = fetcher.fetch().await.expect("fetch succeeds");
        let kids: Vec<&str> = keys.iter().map(|(kid, _)| kid.as_str()).collect();
        assert_eq!(kids, vec!["good"]);
    }

    #[test]
    fn signing_key_reports_why_an_entry_is_unusable() {
        let fetcher = JwksFetcher::new("http://unused/jwks");
        let entry = |value: serde_json::Value| -> JwkEntry {
            serde_json::from_value(value).expect("entry")
        };

        let err = fetcher
            .signing_key(entry(serde_json::json!({ "kid": "k", "alg": "RS512", "n": "AQAB", "e": "AQAB" })))
            .err().expect("foreign alg");
        assert!(matches!(err, AuthError::JwksUnsupportedAlg { .. }));

        let err = fetcher
            .signing_key(entry(serde_json::json!({ "kid": "k", "kty": "oct" })))
            .err().expect("foreign kty");
        assert!(matches!(err, AuthError::JwksUnsupportedKey { .. }));

        let err = fetcher
            .signing_key(entry(serde_json::json!({ "kty": "RSA", "n": "AQAB", "e": "AQAB" })))
            .err().expect("no kid");
        assert!(matches!(err, AuthError::JwksMissingKid));

        let err = fetcher
            .signing_key(entry(serde_json::json!({ "kid": "k", "n": "AQAB" })))
            .err().expect("no exponent");
        assert!(matches!(err, AuthError::JwksMissingComponents(_)));
    }

    #[tokio::test]
    async fn fetch_skips_encryption_keys() {
        let server = MockServer::start();
        let body = serde_json::json!({
            "keys": [{ "kid": "enc", "kty": "RSA", "use": "enc", "n": "AQAB", "e": "AQAB" }]
        });
        let _mock = server.mock(|when, then| {
            when.method(GET).path("/jwks");
            then.status(200)
                .header("content-type", "application/json")
                .body(body.to_string());
        });

        let fetcher = JwksFetcher::new(format!("{}/jwks", server.base_url()));
        let keys = fetcher.fetch().await.expect("fetch succeeds");
        assert!(keys.is_empty());
    }
}
