use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::Utc;
use mobsync_core::sync::{ManifestOutcome, ResolveParams, ScopeResolver};
use mobsync_core::util::user_fingerprint;
use mobsync_core::{SyncEngine, SyncScope};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{extract_bearer_token, AuthenticatedUser, JwtVerifier};
use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    engine: SyncEngine,
    jwt_verifier: Arc<JwtVerifier>,
    scopes: Arc<dyn ScopeResolver>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, engine: SyncEngine, scopes: Arc<dyn ScopeResolver>) -> Self {
        Self {
            jwt_verifier: Arc::new(JwtVerifier::from_config(&config)),
            config,
            engine,
            scopes,
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/manifest", get(manifest))
        .route("/collections/{name}", get(collection))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/sync", protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any)
                .expose_headers([header::ETAG]),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    collections: usize,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        collections: state.engine.registry().len(),
    })
}

async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;
    let user = state.jwt_verifier.verify_access_token(token)?;
    let scope = state.scopes.resolve(&user.user_id).await?;
    request.extensions_mut().insert(scope);
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

async fn manifest(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(scope): Extension<SyncScope>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let if_none_match = headers
        .get(header::IF_NONE_MATCH)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| AppError::bad_request("If-None-Match header is not valid UTF-8"))
        })
        .transpose()?;

    let outcome = state.engine.manifest(&scope, if_none_match).await?;
    let user_hash = user_fingerprint(&user.user_id);

    match outcome {
        ManifestOutcome::NotModified { etag } => {
            tracing::info!(
                endpoint = "sync_manifest",
                user = user_hash,
                session = user.session_id.as_deref().unwrap_or("none"),
                "Manifest not modified"
            );
            Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response())
        }
        ManifestOutcome::Modified { manifest, etag } => {
            tracing::info!(
                endpoint = "sync_manifest",
                user = user_hash,
                session = user.session_id.as_deref().unwrap_or("none"),
                collections = manifest.collections.len(),
                "Served manifest"
            );
            Ok((StatusCode::OK, [(header::ETAG, etag)], Json(manifest)).into_response())
        }
    }
}

async fn collection(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(scope): Extension<SyncScope>,
    Path(name): Path<String>,
    Query(params): Query<ResolveParams>,
) -> Result<Response, AppError> {
    let response = state.engine.collection(&scope, &name, &params).await?;

    tracing::info!(
        endpoint = "sync_collection",
        user = user_fingerprint(&user.user_id),
        collection = %name,
        mode = %response.mode(),
        items = response.items().len(),
        "Served collection"
    );
    Ok(Json(response).into_response())
}
