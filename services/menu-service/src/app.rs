use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Body,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, AUTHORIZATION,
            CONTENT_TYPE,
        },
        HeaderValue, Method, Request,
    },
    middleware::{self, Next},
    response::Response,
    routing::{get, patch},
    Router,
};
use common_auth::JwtVerifier;
use sqlx::postgres::PgPoolOptions;
use tokio::time::{interval, MissedTickBehavior};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::app_state::AppState;
use crate::config::{MenuConfig, StoreBackend};
use crate::drink_handlers::{
    create_drink, delete_drink, list_drink_details, list_drinks, update_drink,
};
use crate::store::{MemoryMenuStore, MenuStore, PgMenuStore};

async fn health() -> &'static str {
    "ok"
}

const ALLOWED_METHODS: [Method; 6] = [
    Method::GET,
    Method::PUT,
    Method::POST,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];
const ALLOWED_HEADERS_VALUE: &str = "Content-Type,Authorization";
const ALLOWED_METHODS_VALUE: &str = "GET,PUT,POST,PATCH,DELETE,OPTIONS";

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods(ALLOWED_METHODS)
}

/// `CorsLayer` only answers preflights with the allowed methods and headers;
/// this repeats them on every other response.
async fn advertise_cors(req: Request<Body>, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();
    if !headers.contains_key(ACCESS_CONTROL_ALLOW_HEADERS) {
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS_VALUE),
        );
    }
    if !headers.contains_key(ACCESS_CONTROL_ALLOW_METHODS) {
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS_VALUE),
        );
    }
    resp
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/drinks", get(list_drinks).post(create_drink))
        .route("/drinks-detail", get(list_drink_details))
        .route("/drinks/:id", patch(update_drink).delete(delete_drink))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .layer(middleware::from_fn(advertise_cors))
}

/// Wire configuration into a ready router: verifier (with background JWKS
/// refresh), store (migrated, optionally reset), routes.
pub async fn setup(config: &MenuConfig) -> anyhow::Result<Router> {
    let jwt_verifier = build_jwt_verifier(config).await?;
    spawn_jwks_refresh(jwt_verifier.clone(), config);

    let store = build_store(config).await?;
    if config.reset_on_start {
        let seeded = store.reset().await.context("Failed to reset menu")?;
        warn!(drink_id = seeded.id, "Menu reset on start; all previous drinks dropped");
    }

    Ok(build_router(AppState::new(store, jwt_verifier)))
}

pub async fn build_jwt_verifier(config: &MenuConfig) -> anyhow::Result<Arc<JwtVerifier>> {
    let mut builder = JwtVerifier::builder(config.jwt_config());

    info!(jwks_url = %config.jwks_url, "Configuring JWKS fetcher");
    builder = builder.with_jwks_url(config.jwks_url.clone());

    if let Some(pem) = &config.dev_public_key_pem {
        warn!("Using JWT_DEV_PUBLIC_KEY_PEM for verification; do not enable in production");
        builder = builder
            .with_rsa_pem("local-dev", pem.as_bytes())
            .map_err(anyhow::Error::from)?;
    }

    let verifier = builder.build().await.map_err(anyhow::Error::from)?;
    info!(
        keys = verifier.store().len(),
        audience = %config.api_audience,
        "JWT verifier initialised"
    );
    Ok(Arc::new(verifier))
}

pub async fn build_store(config: &MenuConfig) -> anyhow::Result<Arc<dyn MenuStore>> {
    match config.store {
        StoreBackend::Memory => {
            warn!("Using in-memory menu store; drinks are lost on restart");
            Ok(Arc::new(MemoryMenuStore::new()))
        }
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set")?;
            let db = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await
                .context("Failed to connect to DATABASE_URL")?;
            // Ensure database schema is up to date before serving traffic
            sqlx::migrate!("./migrations")
                .run(&db)
                .await
                .context("Failed to run migrations")?;
            Ok(Arc::new(PgMenuStore::new(db)))
        }
    }
}

fn spawn_jwks_refresh(verifier: Arc<JwtVerifier>, config: &MenuConfig) {
    let Some(fetcher) = verifier.jwks_fetcher() else {
        return;
    };

    let url = fetcher.url().to_owned();
    let period = config.jwks_refresh;

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick fires immediately; keys were just loaded by the builder
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match verifier.refresh_jwks().await {
                Ok(count) => {
                    debug!(count, jwks_url = %url, "Refreshed JWKS keys");
                }
                Err(err) => {
                    warn!(error = %err, jwks_url = %url, "Failed to refresh JWKS keys");
                }
            }
        }
    });
}
