use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::services::ServeDir;

use crate::auth::{self, AppState};
use crate::media::MEDIA_URL;
use crate::middleware::{identify, require_auth};
use crate::{feeds, follows, posts};

/// All application routes. Transport layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(feeds::index))
        .route("/group/{slug}", get(feeds::group_posts))
        .route("/profile/{username}", get(feeds::profile))
        .route("/posts/{post_id}", get(feeds::post_detail))
        .route("/auth/signup", get(auth::signup_form).post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route_layer(middleware::from_fn_with_state(state.clone(), identify))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/create", get(posts::post_create_form).post(posts::post_create))
        .route("/posts/{post_id}/edit", get(posts::post_edit_form).post(posts::post_edit))
        .route("/posts/{post_id}/comment", post(posts::add_comment))
        .route("/follow", get(feeds::follow_index))
        .route("/profile/{username}/follow", post(follows::profile_follow))
        .route("/profile/{username}/unfollow", post(follows::profile_unfollow))
        .route(
            "/auth/password_change",
            get(auth::password_change_form).post(auth::password_change),
        )
        .route("/auth/password_change/done", get(auth::password_change_done))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service(MEDIA_URL, ServeDir::new(state.media.root()))
}
