//! # Verifier Demo
//!
//! A minimal `axum` binary wiring `vp-bridge`'s OIDC/`OpenID4VP` handlers
//! onto the HTTP route table in `spec.md` §6. Grounded on
//! `examples/verifier/src/main.rs`'s shape: a single `State`, one route per
//! handler. Unlike the teacher, the external base URL is fixed in `Config`
//! at startup rather than read per-request from the `Host` header —
//! `spec.md` §5 holds `Config` immutable for the process lifetime, with no
//! per-tenant routing.
//!
//! Persistence is `vp-bridge-memstore`'s in-memory `MemStore` — restarting
//! this binary loses every session and client. `TrustAnchor` (issuer key
//! resolution for presented credentials, `spec.md` §4.6's `TrustService`)
//! is stubbed as an empty trust set here; a real deployment wires this to
//! whatever resolves issuer signing keys (a DID resolver, a federation
//! registry, a static allowlist).

mod trust;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use vp_bridge::config::{Config, DigitalCredentialsConfig, Lifetimes, SubjectType, SupportedCredential};
use vp_bridge::oauth::discovery;
use vp_bridge::oauth::endpoint::{authorize, token, userinfo};
use vp_bridge::oauth::error::Error;
use vp_bridge::oauth::registry;
use vp_bridge::oauth::types::{ClientId, SessionId, Status};
use vp_bridge::oid4vp::{self, DirectPostForm, ResponseMode};
use vp_bridge_memstore::MemStore;

use crate::trust::StaticTrust;

#[derive(Clone)]
struct AppState {
    store: MemStore,
    trust: StaticTrust,
    config: Arc<Config>,
    caches: Arc<oid4vp::Caches>,
}

fn load_config() -> anyhow::Result<Config> {
    let external_url =
        std::env::var("VP_BRIDGE_EXTERNAL_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
    let signing_key_pem = std::env::var("VP_BRIDGE_SIGNING_KEY_PEM")
        .map_err(|_| anyhow::anyhow!("VP_BRIDGE_SIGNING_KEY_PEM must be set to a PEM-encoded signing key"))?;

    Config::new(
        external_url.clone(),
        external_url,
        SubjectType::Public,
        None,
        Lifetimes::default(),
        DigitalCredentialsConfig {
            enabled: false,
            response_mode: "dc_api".to_string(),
            preferred_formats: vec!["dc+sd-jwt".to_string()],
        },
        &signing_key_pem,
        None,
        vec![SupportedCredential {
            vct: "urn:eu.europa.ec.eudi:pid:1".to_string(),
            scopes: vec!["pid".to_string()],
        }],
        std::collections::BTreeMap::new(),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = Arc::new(load_config()?);
    let caches = Arc::new(oid4vp::Caches::new());
    let _request_objects_sweeper = caches.request_objects.spawn_sweeper(Duration::from_secs(60));
    let _ephemeral_keys_sweeper = caches.ephemeral_keys.spawn_sweeper(Duration::from_secs(60));

    let state = AppState { store: MemStore::new(), trust: StaticTrust::new(), config, caches };

    let cors = CorsLayer::new().allow_methods(Any).allow_origin(Any).allow_headers(Any);

    let router = Router::new()
        .route("/.well-known/openid-configuration", get(discovery_metadata))
        .route("/jwks", get(jwks))
        .route("/authorize", get(authorize_handler))
        .route("/token", post(token_handler))
        .route("/userinfo", get(userinfo_get).post(userinfo_post))
        .route("/register", post(register))
        .route(
            "/register/{client_id}",
            get(read_registration).put(update_registration).delete(delete_registration),
        )
        .route("/verification/request-object", get(request_object))
        .route("/verification/direct_post", post(direct_post))
        .route("/verification/callback", get(callback))
        .route("/session/{id}", get(session_status))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}

// ----------------------------------------------------------------------------
// Discovery (C8)
// ----------------------------------------------------------------------------

async fn discovery_metadata(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!(discovery::metadata(&state.config)))
}

async fn jwks(State(state): State<AppState>) -> ApiResult<serde_json::Value> {
    discovery::jwks(&state.config).into()
}

// ----------------------------------------------------------------------------
// OIDC protocol engine (C5)
// ----------------------------------------------------------------------------

async fn authorize_handler(
    State(state): State<AppState>, Query(req): Query<authorize::AuthorizeRequest>,
) -> ApiResult<authorize::AuthorizeResponse> {
    authorize::authorize(&state.store, &state.config, req).await.into()
}

async fn token_handler(
    State(state): State<AppState>, Form(req): Form<token::TokenRequest>,
) -> ApiResult<token::TokenResponse> {
    // A production host extracts ClientAuth from Basic auth or the POST
    // body per spec.md §4.5 step 6; this demo only exercises public
    // clients (token_endpoint_auth_method = none).
    let auth = token::ClientAuth::default();
    token::token(&state.store, &state.config, req, auth).await.into()
}

async fn userinfo_get(
    State(state): State<AppState>, authorization: Option<TypedHeader<axum_extra::headers::Authorization<axum_extra::headers::authorization::Bearer>>>,
) -> ApiResult<serde_json::Map<String, serde_json::Value>> {
    let Some(TypedHeader(auth)) = authorization else {
        return ApiResult(Err(vp_bridge::invalid_request!("missing Authorization header")));
    };
    ApiResult(userinfo::userinfo(&state.store, auth.token()).await)
}

async fn userinfo_post(
    State(state): State<AppState>, authorization: Option<TypedHeader<axum_extra::headers::Authorization<axum_extra::headers::authorization::Bearer>>>,
) -> ApiResult<serde_json::Map<String, serde_json::Value>> {
    userinfo_get(State(state), authorization).await
}

// ----------------------------------------------------------------------------
// Dynamic client registration (C4)
// ----------------------------------------------------------------------------

async fn register(
    State(state): State<AppState>, Json(req): Json<registry::RegistrationRequest>,
) -> ApiResult<registry::RegistrationResponse> {
    registry::register(&state.store, req).await.into()
}

#[derive(Deserialize)]
struct RegistrationAuth {
    registration_access_token: String,
}

async fn read_registration(
    State(state): State<AppState>, Path(client_id): Path<String>, Query(auth): Query<RegistrationAuth>,
) -> ApiResult<vp_bridge::oauth::types::Client> {
    registry::read(&state.store, &ClientId::from(client_id), &auth.registration_access_token)
        .await
        .into()
}

async fn update_registration(
    State(state): State<AppState>, Path(client_id): Path<String>, Query(auth): Query<RegistrationAuth>,
    Json(req): Json<registry::RegistrationRequest>,
) -> ApiResult<vp_bridge::oauth::types::Client> {
    registry::update(&state.store, &ClientId::from(client_id), &auth.registration_access_token, req)
        .await
        .into()
}

async fn delete_registration(
    State(state): State<AppState>, Path(client_id): Path<String>, Query(auth): Query<RegistrationAuth>,
) -> Response {
    match registry::delete(&state.store, &ClientId::from(client_id), &auth.registration_access_token).await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}

// ----------------------------------------------------------------------------
// OpenID4VP engine (C6)
// ----------------------------------------------------------------------------

#[derive(Deserialize)]
struct RequestObjectQuery {
    id: String,
}

async fn request_object(
    State(state): State<AppState>, Query(q): Query<RequestObjectQuery>,
) -> Response {
    match oid4vp::get_or_build_request_object(
        &state.store,
        &state.config,
        &state.caches,
        &q.id,
        ResponseMode::DirectPost,
    )
    .await
    {
        Ok(jws) => (
            [(axum::http::header::CONTENT_TYPE, "application/oauth-authz-req+jwt")],
            jws,
        )
            .into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}

async fn direct_post(
    State(state): State<AppState>, Query(q): Query<RequestObjectQuery>, Form(form): Form<DirectPostForm>,
) -> ApiResult<vp_bridge::oid4vp::DirectPostResponse> {
    let result: Result<_, Error> = async {
        let session = state
            .store
            .get_session(&SessionId::from(q.id.clone()))
            .await?
            .ok_or_else(|| Error::SessionNotFound(format!("no session {}", q.id)))?;
        let query = oid4vp::default_query(&state.config, &session)?;
        oid4vp::handle_direct_post(&state.store, &state.trust, &state.config, &state.caches, &q.id, &query, form)
            .await
    }
    .await;
    ApiResult(result)
}

async fn callback(State(state): State<AppState>, Query(q): Query<RequestObjectQuery>) -> Response {
    match state.store.get_session(&SessionId::from(q.id)).await {
        Ok(Some(session)) if session.status == Status::CodeIssued => {
            let code = session.tokens.authorization_code.map(|c| c.to_string()).unwrap_or_default();
            Redirect::to(&format!(
                "{}?code={code}&state={}",
                session.oidc_request.redirect_uri, session.oidc_request.state
            ))
            .into_response()
        }
        Ok(Some(_)) => (StatusCode::ACCEPTED, "presentation still pending").into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "unknown session").into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}

#[derive(Serialize)]
struct SessionStatus {
    status: Status,
    redirect_uri: Option<String>,
}

async fn session_status(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<SessionStatus> {
    let result: Result<_, Error> = async {
        let Some(session) = state.store.get_session(&SessionId::from(id.clone())).await? else {
            return Err(Error::SessionNotFound(format!("no session {id}")));
        };
        let redirect_uri = (session.status == Status::CodeIssued).then(|| {
            format!(
                "{}?code={}&state={}",
                session.oidc_request.redirect_uri,
                session.tokens.authorization_code.map(|c| c.to_string()).unwrap_or_default(),
                session.oidc_request.state
            )
        });
        Ok(SessionStatus { status: session.status, redirect_uri })
    }
    .await;
    result.into()
}

// ----------------------------------------------------------------------------
// Axum response plumbing
// ----------------------------------------------------------------------------

/// Axum response wrapper turning `Result<T, oauth::error::Error>` into the
/// fixed status/body mapping `spec.md` §6 specifies.
pub struct ApiResult<T>(Result<T, Error>);

pub struct ApiError(Error);

impl<T> From<Result<T, Error>> for ApiResult<T> {
    fn from(val: Result<T, Error>) -> Self {
        Self(val)
    }
}

impl<T: Serialize> IntoResponse for ApiResult<T> {
    fn into_response(self) -> Response {
        match self.0 {
            Ok(v) => (StatusCode::OK, Json(serde_json::json!(v))).into_response(),
            Err(err) => ApiError(err).into_response(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0.to_json())).into_response()
    }
}
