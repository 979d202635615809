use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::debug;

use yatube_db::{Database, PostFilter};
use yatube_types::api::{
    AuthorResponse, GroupFeedResponse, PageResponse, PostDetailResponse, PostResponse,
    ProfileResponse,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::pagination::{PAGE_SIZE, PageQuery, paginate, requested_page};
use crate::views::{comment_response, group_response, post_response};

/// Newest-first page of posts matching `filter`.
fn post_page(
    db: &Database,
    filter: PostFilter<'_>,
    raw_page: Option<&str>,
) -> Result<PageResponse<PostResponse>, ApiError> {
    let count = db.count_posts(filter)?;
    let page = paginate(count, raw_page, PAGE_SIZE, |limit, offset| {
        db.list_posts(filter, limit, offset)
    })?;
    Ok(page.into_response(post_response))
}

/// GET /: the global feed, served from the feed cache while fresh.
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let requested = requested_page(query.page.as_deref());
    if let Some(body) = state.feed_cache.get(requested) {
        debug!("Feed cache hit for page {}", requested);
        return Ok(json_body(body));
    }

    let page = state
        .run_db(move |db| post_page(db, PostFilter::All, query.page.as_deref()))
        .await?;

    let body = Bytes::from(serde_json::to_vec(&page).map_err(anyhow::Error::from)?);
    // Tokens past the last page render that page but are not cached under their own number.
    state.feed_cache.insert(page.number, body.clone());
    Ok(json_body(body))
}

fn json_body(body: Bytes) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// GET /group/{slug}
pub async fn group_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<GroupFeedResponse>, ApiError> {
    let response = state
        .run_db(move |db| {
            let group = db.get_group_by_slug(&slug)?.ok_or(ApiError::NotFound)?;
            let filter = PostFilter::Group(group.id);

            let posts = db
                .list_posts(filter, PAGE_SIZE, 0)?
                .into_iter()
                .map(post_response)
                .collect();
            let page = post_page(db, filter, query.page.as_deref())?;

            Ok(GroupFeedResponse {
                group: group_response(group),
                posts,
                page,
            })
        })
        .await?;

    Ok(Json(response))
}

/// GET /profile/{username}
pub async fn profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
    viewer: Option<Extension<CurrentUser>>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let viewer_id = viewer.map(|Extension(user)| user.id);

    let response = state
        .run_db(move |db| {
            let author = db.get_user_by_username(&username)?.ok_or(ApiError::NotFound)?;
            let page = post_page(db, PostFilter::Author(&author.id), query.page.as_deref())?;

            let following = match viewer_id {
                Some(viewer_id) => db.is_following(&viewer_id, &author.id)?,
                None => false,
            };

            Ok(ProfileResponse {
                author: AuthorResponse {
                    username: author.username,
                    first_name: author.first_name,
                    last_name: author.last_name,
                    post_count: page.count as i64,
                },
                following,
                page,
            })
        })
        .await?;

    Ok(Json(response))
}

/// GET /posts/{post_id}
pub async fn post_detail(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<PostDetailResponse>, ApiError> {
    let response = state
        .run_db(move |db| {
            let post = db.get_post(post_id)?.ok_or(ApiError::NotFound)?;
            let post_count = db.count_posts(PostFilter::Author(&post.author_id))? as i64;
            let comments = db
                .get_comments(post_id)?
                .into_iter()
                .map(comment_response)
                .collect();

            Ok(PostDetailResponse {
                post: post_response(post),
                post_count,
                comments,
            })
        })
        .await?;

    Ok(Json(response))
}

/// GET /follow: posts by the authors the requester follows.
pub async fn follow_index(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PageResponse<PostResponse>>, ApiError> {
    let page = state
        .run_db(move |db| post_page(db, PostFilter::FollowedBy(&user.id), query.page.as_deref()))
        .await?;

    Ok(Json(page))
}
