use jsonwebtoken::Algorithm;

/// Runtime configuration for JWT verification.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Expected issuer claim (iss).
    pub issuer: String,
    /// Expected audience claim (aud).
    pub audience: String,
    /// Signing algorithm tokens must declare.
    pub algorithm: Algorithm,
    /// Allowable clock skew in seconds when validating exp/nbf.
    pub leeway_seconds: u32,
}

impl JwtConfig {
    /// Construct config with sensible defaults (RS256, 30 second leeway).
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            algorithm: Algorithm::RS256,
            leeway_seconds: 30,
        }
    }

    /// Config for an Auth0-style tenant, where the issuer is `https://<domain>/`.
    pub fn for_domain(domain: &str, audience: impl Into<String>) -> Self {
        Self::new(issuer_for_domain(domain), audience)
    }

    /// Adjust the allowed leeway.
    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }
}

pub fn issuer_for_domain(domain: &str) -> String {
    format!("https://{}/", bare_domain(domain))
}

pub fn jwks_url_for_domain(domain: &str) -> String {
    format!("https://{}/.well-known/jwks.json", bare_domain(domain))
}

fn bare_domain(domain: &str) -> &str {
    let trimmed = domain.trim();
    let trimmed = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    trimmed.trim_end_matches('/')
}
