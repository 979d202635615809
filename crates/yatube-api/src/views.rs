//! Row -> response conversions and the URLs handlers redirect to.

use chrono::{DateTime, Utc};
use tracing::warn;
use url::form_urlencoded::byte_serialize;

use yatube_db::models::{CommentRow, GroupRow, PostRow};
use yatube_types::api::{CommentResponse, GroupResponse, GroupSummary, PostResponse};

use crate::media;

pub fn post_response(row: PostRow) -> PostResponse {
    let group = match (row.group_id, row.group_title, row.group_slug) {
        (Some(id), Some(title), Some(slug)) => Some(GroupSummary { id, title, slug }),
        _ => None,
    };

    PostResponse {
        id: row.id,
        created_at: parse_timestamp(&row.created_at, "post", row.id),
        text: row.text,
        author: row.author_username,
        group,
        image: row.image.as_deref().map(media::url_for),
    }
}

pub fn comment_response(row: CommentRow) -> CommentResponse {
    CommentResponse {
        id: row.id,
        post_id: row.post_id,
        created_at: parse_timestamp(&row.created_at, "comment", row.id),
        author: row.author_username,
        text: row.text,
    }
}

pub fn group_response(row: GroupRow) -> GroupResponse {
    GroupResponse {
        id: row.id,
        title: row.title,
        slug: row.slug,
        description: row.description,
    }
}

fn parse_timestamp(raw: &str, kind: &str, id: i64) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by hand may use SQLite's "YYYY-MM-DD HH:MM:SS".
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on {} {}: {}", raw, kind, id, e);
            DateTime::default()
        })
}

fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

pub fn profile_url(username: &str) -> String {
    format!("/profile/{}", encode(username))
}

pub fn post_url(post_id: i64) -> String {
    format!("/posts/{}", post_id)
}

pub fn login_url(next: &str) -> String {
    format!("/auth/login?next={}", encode(next))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_timestamp_formats() {
        let precise = parse_timestamp("2023-02-08T10:11:12.345Z", "post", 1);
        assert_eq!(precise.timestamp_subsec_millis(), 345);

        let plain = parse_timestamp("2023-02-08 10:11:12", "post", 1);
        assert_eq!(plain.timestamp(), precise.timestamp());
    }

    #[test]
    fn urls_escape_user_input() {
        assert_eq!(profile_url("leo"), "/profile/leo");
        assert_eq!(profile_url("a+b@c"), "/profile/a%2Bb%40c");
        assert_eq!(login_url("/create?x=1"), "/auth/login?next=%2Fcreate%3Fx%3D1");
    }

    #[test]
    fn post_without_group_has_no_group_summary() {
        let row = PostRow {
            id: 7,
            text: "hello".into(),
            author_id: "u1".into(),
            author_username: "leo".into(),
            group_id: None,
            group_title: None,
            group_slug: None,
            image: Some("posts/a.gif".into()),
            created_at: "2023-02-08T10:11:12.000Z".into(),
        };
        let response = post_response(row);
        assert!(response.group.is_none());
        assert_eq!(response.image.as_deref(), Some("/media/posts/a.gif"));
    }
}
