pub mod auth;
pub mod cache;
pub mod error;
pub mod feeds;
pub mod follows;
pub mod forms;
pub mod media;
pub mod middleware;
pub mod pagination;
pub mod posts;
pub mod routes;
pub mod views;

pub use auth::{AppState, AppStateInner};
pub use routes::router;
