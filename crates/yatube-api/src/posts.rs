use axum::{
    Extension, Json,
    extract::{Multipart, Path, State, rejection::JsonRejection},
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, info};

use yatube_types::api::{CommentRequest, PostFormResponse};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::forms::{CommentForm, PostForm, ValidPost};
use crate::middleware::CurrentUser;
use crate::views::{group_response, post_response, post_url, profile_url};

/// GET /create: the empty post form.
pub async fn post_create_form(
    State(state): State<AppState>,
) -> Result<Json<PostFormResponse>, ApiError> {
    let groups = state.run_db(|db| Ok(db.list_groups()?)).await?;

    Ok(Json(PostFormResponse {
        is_edit: false,
        post: None,
        groups: groups.into_iter().map(group_response).collect(),
    }))
}

/// POST /create: on success the author lands on their profile.
pub async fn post_create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<Redirect, ApiError> {
    let form = PostForm::from_multipart(multipart).await?;
    let valid = state.run_db(move |db| form.validate(db)).await?;

    let image = store_image(&state, &valid).await?;
    let fields = valid.into_fields(image.clone());
    let author_id = user.id.clone();
    let inserted = state
        .run_db(move |db| Ok(db.insert_post(&author_id, &fields)?))
        .await;

    let post_id = match inserted {
        Ok(id) => id,
        Err(e) => {
            if let Some(path) = image {
                state.media.discard(&path).await;
            }
            return Err(e);
        }
    };

    info!("User '{}' created post {}", user.username, post_id);
    Ok(Redirect::to(&profile_url(&user.username)))
}

/// GET /posts/{post_id}/edit: the bound form, for the author only.
pub async fn post_edit_form(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(post_id): Path<i64>,
) -> Result<Response, ApiError> {
    let (post, groups) = state
        .run_db(move |db| {
            let post = db.get_post(post_id)?.ok_or(ApiError::NotFound)?;
            Ok((post, db.list_groups()?))
        })
        .await?;

    if post.author_id != user.id {
        return Ok(Redirect::to(&post_url(post_id)).into_response());
    }

    Ok(Json(PostFormResponse {
        is_edit: true,
        post: Some(post_response(post)),
        groups: groups.into_iter().map(group_response).collect(),
    })
    .into_response())
}

/// POST /posts/{post_id}/edit
///
/// Anyone but the author is sent back to the post untouched. Without a new
/// upload the current image is kept.
pub async fn post_edit(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(post_id): Path<i64>,
    multipart: Multipart,
) -> Result<Redirect, ApiError> {
    let post = state
        .run_db(move |db| db.get_post(post_id)?.ok_or(ApiError::NotFound))
        .await?;

    if post.author_id != user.id {
        debug!("User '{}' may not edit post {}", user.username, post_id);
        return Ok(Redirect::to(&post_url(post_id)));
    }

    let form = PostForm::from_multipart(multipart).await?;
    let valid = state.run_db(move |db| form.validate(db)).await?;

    let new_image = store_image(&state, &valid).await?;
    let fields = valid.into_fields(new_image.clone().or(post.image));
    let updated = state
        .run_db(move |db| Ok(db.update_post(post_id, &fields)?))
        .await;

    match updated {
        Ok(true) => {}
        Ok(false) => {
            // Deleted while the form was in flight.
            if let Some(path) = new_image {
                state.media.discard(&path).await;
            }
            return Err(ApiError::NotFound);
        }
        Err(e) => {
            if let Some(path) = new_image {
                state.media.discard(&path).await;
            }
            return Err(e);
        }
    }

    info!("User '{}' edited post {}", user.username, post_id);
    Ok(Redirect::to(&post_url(post_id)))
}

/// POST /posts/{post_id}/comment: always back to the post, unusable input is dropped.
pub async fn add_comment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(post_id): Path<i64>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> Result<Redirect, ApiError> {
    let text = match &payload {
        Ok(Json(req)) => CommentForm::validate(req),
        Err(rejection) => {
            debug!("Unreadable comment payload: {}", rejection);
            None
        }
    };

    let author_id = user.id.clone();
    let comment_id = state
        .run_db(move |db| {
            db.get_post(post_id)?.ok_or(ApiError::NotFound)?;
            match text {
                Some(text) => Ok(Some(db.insert_comment(post_id, &author_id, &text)?)),
                None => Ok(None),
            }
        })
        .await?;

    match comment_id {
        Some(id) => info!("User '{}' commented on post {} ({})", user.username, post_id, id),
        None => debug!("Dropped empty comment by '{}' on post {}", user.username, post_id),
    }

    Ok(Redirect::to(&post_url(post_id)))
}

/// Writes the validated upload, if any, and returns its media path.
async fn store_image(state: &AppState, valid: &ValidPost) -> Result<Option<String>, ApiError> {
    match &valid.image {
        Some(image) => Ok(Some(state.media.save_post_image(image).await?)),
        None => Ok(None),
    }
}
