#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use common_auth::{InMemoryKeyStore, JwtConfig, JwtVerifier};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use menu_service::store::{MemoryMenuStore, MenuStore};
use menu_service::{build_router, AppState};
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use tower::ServiceExt;

pub const ISSUER: &str = "https://coffee.test.auth0.com/";
pub const AUDIENCE: &str = "drinks";
pub const KID: &str = "test-kid";

pub const ALL_PERMISSIONS: &[&str] = &[
    "get:drinks-detail",
    "post:drinks",
    "patch:drinks",
    "delete:drinks",
];

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

fn keys() -> &'static KeyPair {
    static KEYS: OnceLock<KeyPair> = OnceLock::new();
    KEYS.get_or_init(|| {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).expect("key generation");
        let private_pem = private_key.to_pkcs1_pem(LineEnding::LF).expect("private pem");
        let public_pem = private_key
            .to_public_key()
            .to_pkcs1_pem(LineEnding::LF)
            .expect("public pem");
        KeyPair {
            encoding: EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("encoding key"),
            decoding: DecodingKey::from_rsa_pem(public_pem.as_bytes()).expect("decoding key"),
        }
    })
}

pub fn verifier() -> Arc<JwtVerifier> {
    let store = InMemoryKeyStore::new();
    store.insert_key(KID, keys().decoding.clone());
    Arc::new(JwtVerifier::with_store(JwtConfig::new(ISSUER, AUDIENCE), store))
}

pub fn sign(claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KID.to_string());
    encode(&header, claims, &keys().encoding).expect("sign token")
}

pub fn base_claims() -> Value {
    let now = Utc::now().timestamp();
    json!({
        "sub": "auth0|barista",
        "iss": ISSUER,
        "aud": AUDIENCE,
        "iat": now,
        "exp": now + 600,
    })
}

pub fn token(permissions: &[&str]) -> String {
    let mut claims = base_claims();
    claims["permissions"] = json!(permissions);
    sign(&claims)
}

pub fn manager_token() -> String {
    token(ALL_PERMISSIONS)
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryMenuStore>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryMenuStore::new());
        let shared: Arc<dyn MenuStore> = store.clone();
        let router = build_router(AppState::new(shared, verifier()));
        Self { router, store }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn create(&self, body: Value) -> Value {
        let (status, value) = self
            .send(Method::POST, "/drinks", Some(&manager_token()), Some(&body.to_string()))
            .await;
        assert_eq!(status, StatusCode::OK, "create failed: {value}");
        value["drinks"][0].clone()
    }
}

pub fn water() -> Value {
    json!({
        "title": "Water",
        "recipe": [{ "name": "water", "color": "blue", "parts": 1 }]
    })
}

pub fn matcha_shake() -> Value {
    json!({
        "title": "Matcha Shake",
        "recipe": [
            { "name": "milk", "color": "grey", "parts": 1 },
            { "name": "matcha", "color": "green", "parts": 3 }
        ]
    })
}
