use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Token claims --

/// Bearer token claims. `sub` is the user id, `username` is carried along so
/// handlers can build redirects without a lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Accounts --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasswordChangeRequest {
    pub old_password: String,
    pub new_password1: String,
    pub new_password2: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordChangeDoneResponse {
    pub username: String,
    pub message: String,
}

/// Empty-form description returned by the GET side of form routes.
#[derive(Debug, Serialize, Deserialize)]
pub struct FormFieldsResponse {
    pub fields: Vec<String>,
}

// -- Groups --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupResponse {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// Group reference embedded in a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
}

// -- Posts --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: i64,
    pub text: String,
    pub author: String,
    pub group: Option<GroupSummary>,
    /// Public URL of the attached image, if any.
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupFeedResponse {
    pub group: GroupResponse,
    /// Newest posts of the group, at most one page worth.
    pub posts: Vec<PostResponse>,
    pub page: PageResponse<PostResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorResponse {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub post_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub author: AuthorResponse,
    pub following: bool,
    pub page: PageResponse<PostResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostDetailResponse {
    pub post: PostResponse,
    /// Number of posts written by the post's author.
    pub post_count: i64,
    pub comments: Vec<CommentResponse>,
}

/// Form context for the create/edit post pages.
#[derive(Debug, Serialize, Deserialize)]
pub struct PostFormResponse {
    pub is_edit: bool,
    pub post: Option<PostResponse>,
    pub groups: Vec<GroupResponse>,
}

// -- Comments --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: i64,
    pub post_id: i64,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Field name -> messages. Keys are form field names.
#[derive(Debug, Serialize, Deserialize)]
pub struct FormErrorsResponse {
    pub errors: BTreeMap<String, Vec<String>>,
}
