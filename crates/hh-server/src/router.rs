use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post, put};
use axum::Router;
use hh_core::Hackhub;
use tower_http::trace::TraceLayer;

use crate::handler;

/// Shared state handed to every handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub hub: Hackhub,
}

impl AppState {
    pub fn new(hub: Hackhub) -> Self {
        Self { hub }
    }
}

/// Build the axum router with all hackhub endpoints.
pub fn build_router(state: AppState) -> Router {
    // One byte over the policy so an oversized upload reaches the asset
    // manager and is rejected with its own message.
    let upload_limit = usize::try_from(state.hub.assets.policy().max_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(1);

    Router::new()
        .route("/v1/health", get(handler::health))
        .route("/v1/info", get(handler::info))
        .route(
            "/v1/events",
            get(handler::list_events).post(handler::create_event),
        )
        .route("/v1/events/by-id/:id", get(handler::get_event_full))
        .route(
            "/v1/events/:name",
            get(handler::get_event)
                .patch(handler::update_event)
                .delete(handler::remove_event),
        )
        .route(
            "/v1/events/:name/challenges",
            post(handler::create_challenge),
        )
        .route(
            "/v1/events/:name/challenges/remove",
            post(handler::remove_challenges),
        )
        .route(
            "/v1/events/:name/challenges/:challenge",
            patch(handler::update_challenge),
        )
        .route("/v1/events/:name/accolades", post(handler::add_accolade))
        .route(
            "/v1/events/:name/accolades/remove",
            post(handler::remove_accolades),
        )
        .route(
            "/v1/events/:name/accolades/:accolade",
            patch(handler::update_accolade),
        )
        .route(
            "/v1/accolades/:id/awards/:submission",
            put(handler::award_accolade).delete(handler::revoke_accolade),
        )
        .route(
            "/v1/events/:name/submissions",
            post(handler::create_submission),
        )
        .route(
            "/v1/submissions/:id",
            get(handler::get_submission)
                .patch(handler::update_submission)
                .delete(handler::delete_submission),
        )
        .route(
            "/v1/submissions/:id/like",
            put(handler::like).delete(handler::unlike),
        )
        .route("/v1/submissions/:id/comments", post(handler::comment))
        .route(
            "/v1/comments/:id",
            axum::routing::delete(handler::delete_comment),
        )
        .route(
            "/v1/assets/:kind/:id/:slot",
            put(handler::put_asset)
                .get(handler::get_asset)
                .delete(handler::clear_asset)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
