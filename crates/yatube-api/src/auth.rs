use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{
    Extension, Json,
    extract::State,
    response::{IntoResponse, Redirect},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand_core::OsRng;
use tracing::{error, info};
use uuid::Uuid;

use yatube_db::Database;
use yatube_types::api::{
    Claims, FormFieldsResponse, LoginRequest, LoginResponse, PasswordChangeDoneResponse,
    PasswordChangeRequest, SignupRequest,
};

use crate::cache::FeedCache;
use crate::error::ApiError;
use crate::forms::{PasswordChangeForm, SignupForm};
use crate::media::MediaStore;
use crate::middleware::CurrentUser;

/// Bearer tokens stay valid this long.
const TOKEN_LIFETIME_DAYS: i64 = 30;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub feed_cache: FeedCache,
    pub media: MediaStore,
}

impl AppStateInner {
    /// Runs blocking database work off the async runtime.
    pub async fn run_db<F, T>(self: &Arc<Self>, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&state.db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal(e.into())
            })?
    }
}

pub async fn signup_form() -> Json<FormFieldsResponse> {
    Json(FormFieldsResponse {
        fields: SignupForm::FIELDS.iter().map(|f| f.to_string()).collect(),
    })
}

/// POST /auth/signup: creates the account, then sends the client to the global feed.
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = state
        .run_db(move |db| {
            let form = SignupForm::validate(req, db)?;
            form.save(db)
        })
        .await?;

    info!("User '{}' signed up", username);
    Ok(Redirect::to("/"))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .run_db(move |db| {
            let user = db
                .get_user_by_username(&req.username)?
                .ok_or(ApiError::InvalidCredentials)?;
            if !verify_password(&req.password, &user.password)? {
                return Err(ApiError::InvalidCredentials);
            }
            Ok(user)
        })
        .await?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id '{}': {}", user.id, e)))?;

    let token = create_token(&state.jwt_secret, user_id, &user.username)?;

    Ok(Json(LoginResponse {
        user_id,
        username: user.username,
        token,
    }))
}

pub async fn password_change_form() -> Json<FormFieldsResponse> {
    Json(FormFieldsResponse {
        fields: PasswordChangeForm::FIELDS.iter().map(|f| f.to_string()).collect(),
    })
}

pub async fn password_change(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<PasswordChangeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user.id.clone();
    state
        .run_db(move |db| {
            let row = db.get_user_by_id(&user_id)?.ok_or(ApiError::NotFound)?;
            let form = PasswordChangeForm::validate(req, &row.password)?;
            let password_hash = hash_password(&form.new_password)?;
            db.update_password(&user_id, &password_hash)?;
            Ok(())
        })
        .await?;

    info!("User '{}' changed their password", user.username);
    Ok(Redirect::to("/auth/password_change/done"))
}

pub async fn password_change_done(
    Extension(user): Extension<CurrentUser>,
) -> Json<PasswordChangeDoneResponse> {
    Json(PasswordChangeDoneResponse {
        username: user.username,
        message: "Your password was changed.".to_string(),
    })
}

/// Argon2id hash in PHC string format.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
pub fn verify_password(password: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("stored password hash is invalid: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn create_token(secret: &str, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
