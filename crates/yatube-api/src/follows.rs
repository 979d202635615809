use axum::{
    Extension,
    extract::{Path, State},
    response::Redirect,
};
use tracing::{debug, info};

use yatube_db::models::{FollowOutcome, UnfollowOutcome};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::views::profile_url;

/// POST /profile/{username}/follow
pub async fn profile_follow(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(username): Path<String>,
) -> Result<Redirect, ApiError> {
    let follower_id = user.id.clone();
    let author = username.clone();
    let outcome = state
        .run_db(move |db| {
            let author = db.get_user_by_username(&author)?.ok_or(ApiError::NotFound)?;
            Ok(db.follow(&follower_id, &author.id)?)
        })
        .await?;

    match outcome {
        FollowOutcome::Followed => info!("User '{}' followed '{}'", user.username, username),
        FollowOutcome::AlreadyFollowing => {
            debug!("User '{}' already follows '{}'", user.username, username)
        }
        FollowOutcome::SelfFollow => debug!("User '{}' tried to follow themselves", user.username),
    }

    Ok(Redirect::to(&profile_url(&username)))
}

/// POST /profile/{username}/unfollow
pub async fn profile_unfollow(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(username): Path<String>,
) -> Result<Redirect, ApiError> {
    let follower_id = user.id.clone();
    let author = username.clone();
    let outcome = state
        .run_db(move |db| {
            let author = db.get_user_by_username(&author)?.ok_or(ApiError::NotFound)?;
            Ok(db.unfollow(&follower_id, &author.id)?)
        })
        .await?;

    match outcome {
        UnfollowOutcome::Unfollowed => info!("User '{}' unfollowed '{}'", user.username, username),
        UnfollowOutcome::NotFollowing => {
            debug!("User '{}' does not follow '{}'", user.username, username)
        }
    }

    Ok(Redirect::to(&profile_url(&username)))
}
