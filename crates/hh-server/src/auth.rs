//! Request authentication and the HTTP identity client.

use std::time::Duration;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use hh_core::{Caller, CoreError, CoreResult, IdentityService};
use hh_types::AccountId;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use crate::error::{ServerError, ServerResult};
use crate::router::AppState;

/// Pull the token out of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> CoreResult<&str> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| CoreError::Unauthorized("missing bearer token".into()))?;
    let value = value
        .to_str()
        .map_err(|_| CoreError::Unauthorized("malformed authorization header".into()))?;
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(CoreError::Unauthorized("expected a bearer token".into())),
    }
}

/// The authenticated caller of a request.
#[derive(Clone, Debug)]
pub struct Authenticated(pub Caller);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> ServerResult<Self> {
        let token = bearer_token(&parts.headers)?;
        let caller = state.hub.identity().authenticate(token).await?;
        Ok(Self(caller))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TagResponse {
    account_id: String,
}

/// [`IdentityService`] backed by the roster service's HTTP API.
///
/// - `GET {base}/v1/session` with the caller's bearer token returns the
///   caller (`accountId`, `organizer`).
/// - `GET {base}/v1/users/by-tag/{tag}` returns `{"accountId": ...}` or 404.
///
/// Every transport or protocol failure is reported as `Unauthorized`.
#[derive(Clone, Debug)]
pub struct HttpIdentityService {
    client: reqwest::Client,
    base: Url,
}

impl HttpIdentityService {
    pub fn new(base_url: &str, timeout: Duration) -> ServerResult<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| ServerError::Config(format!("identity_url {base_url:?}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ServerError::Config(format!(
                "identity_url {base_url:?} cannot be a base URL"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hackhub/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServerError::Config(e.to_string()))?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, segments: &[&str]) -> CoreResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| CoreError::Unauthorized("identity service URL is not a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn unavailable(e: reqwest::Error) -> CoreError {
    tracing::warn!(error = %e, "identity service request failed");
    CoreError::Unauthorized(format!("identity service unavailable: {e}"))
}

#[async_trait]
impl IdentityService for HttpIdentityService {
    async fn authenticate(&self, token: &str) -> CoreResult<Caller> {
        let url = self.endpoint(&["v1", "session"])?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(unavailable)?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%status, "session rejected");
            return Err(CoreError::Unauthorized(format!("session rejected ({status})")));
        }
        let caller: Caller = response.json().await.map_err(unavailable)?;
        tracing::debug!(account = %caller.account_id, organizer = caller.organizer, "session resolved");
        Ok(caller)
    }

    async fn resolve_tag(&self, tag: &str) -> CoreResult<Option<AccountId>> {
        let url = self.endpoint(&["v1", "users", "by-tag", tag])?;
        let response = self.client.get(url).send().await.map_err(unavailable)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: TagResponse = response.json().await.map_err(unavailable)?;
                Ok(Some(AccountId::from_raw(body.account_id)))
            }
            status => Err(CoreError::Unauthorized(format!(
                "tag lookup for {tag:?} failed ({status})"
            ))),
        }
    }
}
