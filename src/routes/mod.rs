//! API routes
//!
//! JSON surface the web front-end drives a chat view through. Every mutating
//! call answers with the session snapshot to re-render; `/events` streams a
//! new snapshot on every change, reveal ticks included.

mod error;

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    routing::{get, post, put},
    Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::CharacterProfile;
use crate::core::{ErrorView, SessionSnapshot, SharedSession};
use crate::AppState;

pub use error::{ApiError, ApiResult};

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub character: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DraftRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct CharacterRequest {
    pub character: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub accepted: bool,
    pub error: Option<ErrorView>,
    pub session: SessionSnapshot,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_characters(State(state): State<AppState>) -> Json<Vec<CharacterProfile>> {
    Json(state.sessions.roster().profiles().to_vec())
}

async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<SessionSnapshot>)> {
    let character = request.character.map(validate_character).transpose()?;
    let session = state.sessions.create(character).await;
    let snapshot = session.lock().await.snapshot();
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionSnapshot>> {
    let session = lookup(&state, &id).await?;
    let snapshot = session.lock().await.snapshot();
    Ok(Json(snapshot))
}

async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.sessions.remove(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&id))
    }
}

async fn edit_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<DraftRequest>,
) -> ApiResult<Json<SessionSnapshot>> {
    let session = lookup(&state, &id).await?;
    let session = session.lock().await;
    session.edit_draft(request.text);
    Ok(Json(session.snapshot()))
}

async fn submit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SubmitResponse>> {
    let session = lookup(&state, &id).await?;
    let mut session = session.lock().await;
    let result = session.submit();

    Ok(Json(SubmitResponse {
        accepted: result.is_ok(),
        error: result.err().as_ref().map(ErrorView::from),
        session: session.snapshot(),
    }))
}

async fn select_character(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CharacterRequest>,
) -> ApiResult<Json<SessionSnapshot>> {
    let character = validate_character(request.character)?;
    let session = lookup(&state, &id).await?;
    let session = session.lock().await;
    session.select_character(character);
    Ok(Json(session.snapshot()))
}

async fn session_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let session = lookup(&state, &id).await?;
    let mut feed = session.lock().await.subscribe();

    let stream = async_stream::stream! {
        yield Ok::<_, Infallible>(snapshot_event(&feed.current()));
        while let Some(snapshot) = feed.next().await {
            yield Ok::<_, Infallible>(snapshot_event(&snapshot));
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn snapshot_event(snapshot: &SessionSnapshot) -> Event {
    Event::default()
        .event("session")
        .json_data(snapshot)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}

/// Find a session and mark it as in use
async fn lookup(state: &AppState, id: &Uuid) -> ApiResult<SharedSession> {
    let session = state.sessions.get(id).await.ok_or_else(|| not_found(id))?;
    session.lock().await.touch();
    Ok(session)
}

fn not_found(id: &Uuid) -> ApiError {
    ApiError::NotFound(format!("session {}", id))
}

fn validate_character(character: String) -> ApiResult<String> {
    let character = character.trim().to_string();
    if character.is_empty() {
        return Err(ApiError::Validation("character must not be empty".into()));
    }
    Ok(character)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/characters", get(list_characters))
        .route("/v1/sessions", post(create_session))
        .route("/v1/sessions/:id", get(get_session).delete(close_session))
        .route("/v1/sessions/:id/draft", put(edit_draft))
        .route("/v1/sessions/:id/submit", post(submit))
        .route("/v1/sessions/:id/character", put(select_character))
        .route("/v1/sessions/:id/events", get(session_events))
}
