//! Route handlers. Each one authenticates, decodes the request and calls
//! exactly one core operation.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use bytes::Bytes;
use hh_core::{
    AccoladeDraft, AccoladePatch, AssetTarget, Caller, ChallengeDraft, ChallengePatch,
    CoreError, EventDraft, EventPatch, EventRemoval, EventView, FullEvent, FullSubmission,
    RemovalReport, SubmissionDraft, SubmissionPatch, SubmissionRemoval, Upload,
};
use hh_types::{
    AccoladeId, AssetSlot, ChallengeId, CommentId, EntityKind, Event, EventId, SubmissionId,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::Authenticated;
use crate::error::{ServerError, ServerResult};
use crate::router::AppState;

type JsonBody<T> = Result<Json<T>, JsonRejection>;
type QueryParams<T> = Result<Query<T>, QueryRejection>;

fn created(id: impl serde::Serialize) -> impl IntoResponse {
    (StatusCode::CREATED, Json(json!({ "id": id })))
}

/// Health check handler.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Info handler.
pub async fn info() -> Json<Value> {
    Json(json!({
        "name": "hackhub",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListParams {
    include_hidden: bool,
}

/// Hidden events are listed only for organizers who ask for them.
pub async fn list_events(
    State(state): State<AppState>,
    caller: Option<Authenticated>,
    params: QueryParams<ListParams>,
) -> ServerResult<Json<Vec<Event>>> {
    let Query(params) = params?;
    let organizer = is_organizer(&caller);
    let events = state
        .hub
        .query
        .list_events(params.include_hidden && organizer)
        .await?;
    Ok(Json(events))
}

pub async fn create_event(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    body: JsonBody<EventDraft>,
) -> ServerResult<impl IntoResponse> {
    caller.require_organizer()?;
    let Json(draft) = body?;
    let id = state.hub.coordinator.add_event(draft).await?;
    Ok(created(id))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EventParams {
    full: bool,
}

fn is_organizer(caller: &Option<Authenticated>) -> bool {
    caller.as_ref().is_some_and(|Authenticated(c)| c.organizer)
}

/// Hidden events read as missing to everyone but organizers.
fn reveal(caller: &Option<Authenticated>, event: &Event, key: &str) -> ServerResult<()> {
    if event.hidden && !is_organizer(caller) {
        return Err(CoreError::not_found(EntityKind::Event, key).into());
    }
    Ok(())
}

pub async fn get_event(
    State(state): State<AppState>,
    caller: Option<Authenticated>,
    Path(name): Path<String>,
    params: QueryParams<EventParams>,
) -> ServerResult<Json<EventView>> {
    let Query(params) = params?;
    let view = state.hub.query.get_event(&name, params.full).await?;
    reveal(&caller, view.event(), name.trim())?;
    Ok(Json(view))
}

pub async fn get_event_full(
    State(state): State<AppState>,
    caller: Option<Authenticated>,
    Path(id): Path<String>,
) -> ServerResult<Json<FullEvent>> {
    let id = EventId::from_raw(id);
    let full = state.hub.query.get_event_full(&id).await?;
    reveal(&caller, &full.event, id.as_str())?;
    Ok(Json(full))
}

pub async fn update_event(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(name): Path<String>,
    body: JsonBody<EventPatch>,
) -> ServerResult<Json<Value>> {
    caller.require_organizer()?;
    let Json(patch) = body?;
    let id = state.hub.coordinator.update_event(&name, patch).await?;
    Ok(Json(json!({ "id": id })))
}

pub async fn remove_event(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(name): Path<String>,
) -> ServerResult<Json<EventRemoval>> {
    caller.require_organizer()?;
    Ok(Json(state.hub.coordinator.remove_event(&name).await?))
}

// ---------------------------------------------------------------------------
// Challenges and accolades
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct Names {
    names: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AccoladeNames {
    names: Vec<String>,
    #[serde(default)]
    challenge: Option<String>,
}

pub async fn create_challenge(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(event): Path<String>,
    body: JsonBody<ChallengeDraft>,
) -> ServerResult<impl IntoResponse> {
    caller.require_organizer()?;
    let Json(draft) = body?;
    let id = state.hub.coordinator.create_challenge(&event, draft).await?;
    Ok(created(id))
}

pub async fn update_challenge(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path((event, name)): Path<(String, String)>,
    body: JsonBody<ChallengePatch>,
) -> ServerResult<Json<Value>> {
    caller.require_organizer()?;
    let Json(patch) = body?;
    let id = state
        .hub
        .coordinator
        .update_challenge(&event, &name, patch)
        .await?;
    Ok(Json(json!({ "id": id })))
}

pub async fn remove_challenges(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(event): Path<String>,
    body: JsonBody<Names>,
) -> ServerResult<Json<RemovalReport>> {
    caller.require_organizer()?;
    let Json(Names { names }) = body?;
    Ok(Json(
        state.hub.coordinator.remove_challenges(&event, &names).await?,
    ))
}

pub async fn add_accolade(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(event): Path<String>,
    body: JsonBody<AccoladeDraft>,
) -> ServerResult<impl IntoResponse> {
    caller.require_organizer()?;
    let Json(draft) = body?;
    let id = state.hub.coordinator.add_accolade(&event, draft).await?;
    Ok(created(id))
}

pub async fn update_accolade(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path((event, name)): Path<(String, String)>,
    body: JsonBody<AccoladePatch>,
) -> ServerResult<Json<Value>> {
    caller.require_organizer()?;
    let Json(patch) = body?;
    let id = state
        .hub
        .coordinator
        .update_accolade(&event, &name, patch)
        .await?;
    Ok(Json(json!({ "id": id })))
}

pub async fn remove_accolades(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(event): Path<String>,
    body: JsonBody<AccoladeNames>,
) -> ServerResult<Json<RemovalReport>> {
    caller.require_organizer()?;
    let Json(AccoladeNames { names, challenge }) = body?;
    Ok(Json(
        state
            .hub
            .coordinator
            .remove_accolades(&event, &names, challenge.as_deref())
            .await?,
    ))
}

pub async fn award_accolade(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path((accolade, submission)): Path<(String, String)>,
) -> ServerResult<StatusCode> {
    caller.require_organizer()?;
    state
        .hub
        .coordinator
        .award_accolade(
            &AccoladeId::from_raw(accolade),
            &SubmissionId::from_raw(submission),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn revoke_accolade(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path((accolade, submission)): Path<(String, String)>,
) -> ServerResult<Json<Value>> {
    caller.require_organizer()?;
    let revoked = state
        .hub
        .coordinator
        .revoke_accolade(
            &AccoladeId::from_raw(accolade),
            &SubmissionId::from_raw(submission),
        )
        .await?;
    Ok(Json(json!({ "revoked": revoked })))
}

// ---------------------------------------------------------------------------
// Submissions
// ---------------------------------------------------------------------------

pub async fn create_submission(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(event): Path<String>,
    body: JsonBody<SubmissionDraft>,
) -> ServerResult<impl IntoResponse> {
    let Json(draft) = body?;
    let id = state
        .hub
        .submissions
        .create_submission(&caller, &event, draft)
        .await?;
    Ok(created(id))
}

pub async fn get_submission(
    State(state): State<AppState>,
    caller: Option<Authenticated>,
    Path(id): Path<String>,
) -> ServerResult<Json<FullSubmission>> {
    let id = SubmissionId::from_raw(id);
    let full = state.hub.query.get_submission_full(&id).await?;
    if !is_organizer(&caller) && state.hub.query.in_hidden_event(&full.submission).await? {
        return Err(CoreError::not_found(EntityKind::Submission, id.as_str()).into());
    }
    Ok(Json(full))
}

pub async fn update_submission(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    body: JsonBody<SubmissionPatch>,
) -> ServerResult<Json<Value>> {
    let Json(patch) = body?;
    let id = state
        .hub
        .submissions
        .update_submission(&caller, &SubmissionId::from_raw(id), patch)
        .await?;
    Ok(Json(json!({ "id": id })))
}

pub async fn delete_submission(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> ServerResult<Json<SubmissionRemoval>> {
    Ok(Json(
        state
            .hub
            .submissions
            .delete_submission(&caller, &SubmissionId::from_raw(id))
            .await?,
    ))
}

pub async fn like(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> ServerResult<Json<Value>> {
    let like = state
        .hub
        .submissions
        .like(&caller, &SubmissionId::from_raw(id))
        .await?;
    Ok(Json(json!({ "id": like })))
}

pub async fn unlike(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> ServerResult<Json<Value>> {
    let removed = state
        .hub
        .submissions
        .unlike(&caller, &SubmissionId::from_raw(id))
        .await?;
    Ok(Json(json!({ "removed": removed })))
}

#[derive(Debug, Deserialize)]
pub struct NewComment {
    message: String,
}

pub async fn comment(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    body: JsonBody<NewComment>,
) -> ServerResult<impl IntoResponse> {
    let Json(NewComment { message }) = body?;
    let id = state
        .hub
        .submissions
        .comment(&caller, &SubmissionId::from_raw(id), &message)
        .await?;
    Ok(created(id))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> ServerResult<StatusCode> {
    state
        .hub
        .submissions
        .delete_comment(&caller, &CommentId::from_raw(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

fn asset_target(kind: &str, id: String) -> ServerResult<AssetTarget> {
    match kind {
        "event" => Ok(AssetTarget::Event(EventId::from_raw(id))),
        "challenge" => Ok(AssetTarget::Challenge(ChallengeId::from_raw(id))),
        "submission" => Ok(AssetTarget::Submission(SubmissionId::from_raw(id))),
        other => Err(ServerError::BadRequest(format!(
            "{other:?} does not own assets"
        ))),
    }
}

fn asset_slot(slot: &str) -> ServerResult<AssetSlot> {
    slot.parse::<AssetSlot>()
        .map_err(|e| ServerError::Core(CoreError::from(e)))
}

/// Organizers manage event and challenge assets; submission assets are
/// also open to the submission's authors.
async fn authorize_asset(state: &AppState, caller: &Caller, target: &AssetTarget) -> ServerResult<()> {
    match target {
        AssetTarget::Submission(id) => state.hub.submissions.ensure_can_edit(caller, id).await?,
        AssetTarget::Event(_) | AssetTarget::Challenge(_) => caller.require_organizer()?,
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    filename: String,
}

pub async fn put_asset(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path((kind, id, slot)): Path<(String, String, String)>,
    params: QueryParams<UploadParams>,
    body: Bytes,
) -> ServerResult<Json<Value>> {
    let Query(params) = params?;
    let target = asset_target(&kind, id)?;
    let slot = asset_slot(&slot)?;
    authorize_asset(&state, &caller, &target).await?;
    let key = state
        .hub
        .assets
        .set_asset(&target, slot, Upload::new(params.filename, body))
        .await?;
    Ok(Json(json!({ "key": key })))
}

pub async fn clear_asset(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path((kind, id, slot)): Path<(String, String, String)>,
) -> ServerResult<Json<Value>> {
    let target = asset_target(&kind, id)?;
    let slot = asset_slot(&slot)?;
    authorize_asset(&state, &caller, &target).await?;
    let removed = state.hub.assets.clear_asset(&target, slot).await?;
    Ok(Json(json!({ "removed": removed })))
}

pub async fn get_asset(
    State(state): State<AppState>,
    Path((kind, id, slot)): Path<(String, String, String)>,
) -> ServerResult<impl IntoResponse> {
    let target = asset_target(&kind, id)?;
    let slot = asset_slot(&slot)?;
    let (key, bytes) = state.hub.assets.get_asset(&target, slot).await?;
    tracing::debug!(%target, %slot, key = %key, size = bytes.len(), "asset served");
    Ok(([(CONTENT_TYPE, "application/octet-stream")], bytes))
}
