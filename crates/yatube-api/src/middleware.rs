use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use yatube_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;

/// The authenticated requester, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
}

/// Protected routes: a valid bearer token for an existing user, or a
/// redirect to the login page that returns to the requested path.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let next_path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let token = bearer_token(&req);
    let user = authenticate(&state, token)
        .await?
        .ok_or(ApiError::Unauthenticated { next: next_path })?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Public routes: identify the requester when a valid token is present,
/// carry on anonymously otherwise.
pub async fn identify(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&req);
    if let Some(user) = authenticate(&state, token).await? {
        req.extensions_mut().insert(user);
    }
    Ok(next.run(req).await)
}

async fn authenticate(
    state: &AppState,
    token: Option<String>,
) -> Result<Option<CurrentUser>, ApiError> {
    let Some(token) = token else {
        return Ok(None);
    };

    let claims = match decode::<Claims>(
        &token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => data.claims,
        Err(e) => {
            debug!("Rejected bearer token: {}", e);
            return Ok(None);
        }
    };

    // Tokens outlive accounts; make sure the user still exists.
    let user_id = claims.sub.to_string();
    let user = state
        .run_db(move |db| Ok(db.get_user_by_id(&user_id)?))
        .await?;

    Ok(user.map(|row| CurrentUser {
        id: row.id,
        username: row.username,
    }))
}

fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}
