use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::{Stream, stream};
use serde::de::DeserializeOwned;
use tracing::info;
use uuid::Uuid;

use crate::admission::{self, Ballot};
use crate::error::AppError;
use crate::identity;
use crate::models::{
    CreatePollRequest, NewPoll, Poll, PollSummary, ResultsResponse, ShareResponse, VoteRequest,
    VoteResponse, VoterIdentity,
};
use crate::state::AppState;
use crate::tally::Tally;

/// Bodies are read as JSON whatever the `Content-Type` says. Only a body
/// that does not parse is malformed.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|_| AppError::MalformedRequest)
}

fn parse_poll_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Poll not found"))
}

async fn load_poll(state: &AppState, raw_id: &str) -> Result<Poll, AppError> {
    let id = parse_poll_id(raw_id)?;
    state
        .store
        .get_poll(id)
        .await?
        .ok_or(AppError::NotFound("Poll not found"))
}

pub async fn root() -> &'static str {
    "Poll Backend - Use /health to check status"
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let backend = state.store.backend();
    match state.store.ping().await {
        Ok(()) => Json(serde_json::json!({
            "status": "ok",
            "store": backend
        })),
        Err(_) => Json(serde_json::json!({
            "status": "error",
            "store": backend
        })),
    }
}

pub async fn list_polls(State(state): State<AppState>) -> Result<Json<Vec<Poll>>, AppError> {
    Ok(Json(state.store.list_polls().await?))
}

pub async fn create_poll(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Poll>, AppError> {
    let request: CreatePollRequest = parse_body(&body)?;

    let creator = identity::resolve_user(state.verifier.as_ref(), &headers)
        .await
        .map(VoterIdentity::User);
    let new_poll = NewPoll::new(
        request.title.as_deref().unwrap_or_default(),
        request.options.as_deref().unwrap_or_default(),
        creator.as_ref(),
    )?;

    let poll = state.store.create_poll(new_poll).await?;
    info!(poll_id = %poll.id, options = poll.options.len(), "poll created");
    Ok(Json(poll))
}

pub async fn get_poll(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Poll>, AppError> {
    Ok(Json(load_poll(&state, &id).await?))
}

pub async fn poll_results(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ResultsResponse>, AppError> {
    let poll = load_poll(&state, &id).await?;
    let votes = state.store.list_votes(poll.id).await?;
    let tally = Tally::compute(&poll, &votes);

    let viewer = identity::resolve(state.verifier.as_ref(), &headers).await;
    let has_voted = admission::has_voted(state.store.as_ref(), poll.id, &viewer).await?;

    Ok(Json(ResultsResponse {
        poll_id: poll.id,
        counts: tally.counts,
        percentages: tally.percentages,
        total_votes: tally.total_votes,
        has_voted,
    }))
}

/// Streams a `vote` event each time someone votes on the poll. Clients
/// refetch the results when they see one.
pub async fn poll_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let poll = load_poll(&state, &id).await?;
    let subscription = state.notifier.subscribe(poll.id);

    let events = stream::unfold(subscription, |mut subscription| async move {
        let hint = subscription.recv().await?;
        Some((Event::default().event("vote").json_data(&hint), subscription))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

pub async fn share_link(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ShareResponse>, AppError> {
    let poll = load_poll(&state, &id).await?;
    Ok(Json(ShareResponse {
        url: state.share_url(poll.id),
    }))
}

pub async fn my_polls(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<PollSummary>>, AppError> {
    let user_id = identity::resolve_user(state.verifier.as_ref(), &headers)
        .await
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(state.store.list_polls_by_creator(&user_id).await?))
}

pub async fn delete_poll(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let user_id = identity::resolve_user(state.verifier.as_ref(), &headers)
        .await
        .ok_or(AppError::Unauthorized)?;

    let poll = load_poll(&state, &id).await?;
    if poll.creator_id.as_deref() != Some(user_id.as_str()) {
        return Err(AppError::Forbidden);
    }

    if !state.store.delete_poll(poll.id).await? {
        return Err(AppError::NotFound("Poll not found"));
    }

    info!(poll_id = %poll.id, "poll deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit_vote(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<VoteResponse>, AppError> {
    let request: VoteRequest = parse_body(&body)?;
    let ballot = Ballot::from_request(&request)?;

    let voter = identity::resolve(state.verifier.as_ref(), &headers).await;
    let vote = admission::cast_vote(state.store.as_ref(), &state.notifier, ballot, &voter).await?;

    Ok(Json(VoteResponse {
        success: true,
        vote,
    }))
}
