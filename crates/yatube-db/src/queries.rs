use crate::models::{
    CommentRow, FollowOutcome, GroupRow, PostFields, PostRow, UnfollowOutcome, UserRow,
};
use crate::Database;
use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode, Row, params_from_iter};

const POST_SELECT: &str = "
    SELECT p.id, p.text, p.author_id, u.username, p.group_id, g.title, g.slug, p.image, p.created_at
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN post_groups g ON g.id = p.group_id";

/// Which posts a feed is built from.
#[derive(Debug, Clone, Copy)]
pub enum PostFilter<'a> {
    All,
    Group(i64),
    /// Posts written by the given user id.
    Author(&'a str),
    /// Posts whose author is followed by the given user id.
    FollowedBy(&'a str),
}

impl PostFilter<'_> {
    fn where_clause(&self) -> (&'static str, Vec<Value>) {
        match *self {
            PostFilter::All => ("", vec![]),
            PostFilter::Group(id) => ("WHERE p.group_id = ?1", vec![Value::Integer(id)]),
            PostFilter::Author(id) => ("WHERE p.author_id = ?1", vec![Value::Text(id.to_string())]),
            PostFilter::FollowedBy(id) => (
                "WHERE p.author_id IN (SELECT author_id FROM follows WHERE user_id = ?1)",
                vec![Value::Text(id.to_string())],
            ),
        }
    }
}

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        first_name: &str,
        last_name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, username, first_name, last_name, email, password)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (id, username, first_name, last_name, email, password_hash),
            );
            match inserted {
                Ok(_) => Ok(true),
                // The username lost a race with another signup.
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn update_password(&self, id: &str, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password = ?1 WHERE id = ?2",
                (password_hash, id),
            )?;
            Ok(changed == 1)
        })
    }

    /// Deletes the user together with their posts, comments and follow edges.
    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])? == 1))
    }

    // -- Groups --

    pub fn create_group(&self, title: &str, slug: &str, description: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO post_groups (title, slug, description) VALUES (?1, ?2, ?3)",
                (title, slug, description),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_group_by_slug(&self, slug: &str) -> Result<Option<GroupRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, title, slug, description FROM post_groups WHERE slug = ?1",
                [slug],
                map_group,
            )
            .optional()
        })
    }

    pub fn get_group_by_id(&self, id: i64) -> Result<Option<GroupRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, title, slug, description FROM post_groups WHERE id = ?1",
                [id],
                map_group,
            )
            .optional()
        })
    }

    pub fn list_groups(&self) -> Result<Vec<GroupRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, title, slug, description FROM post_groups ORDER BY title, id")?;
            let rows = stmt
                .query_map([], map_group)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Deletes the group. Posts that referenced it keep existing with no group.
    pub fn delete_group(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM post_groups WHERE id = ?1", [id])? == 1))
    }

    // -- Posts --

    pub fn insert_post(&self, author_id: &str, fields: &PostFields) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (text, author_id, group_id, image) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![fields.text, author_id, fields.group_id, fields.image],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Overwrites text, group and image of a post. Author and timestamp never change.
    pub fn update_post(&self, id: i64, fields: &PostFields) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET text = ?1, group_id = ?2, image = ?3 WHERE id = ?4",
                rusqlite::params![fields.text, fields.group_id, fields.image, id],
            )?;
            Ok(changed == 1)
        })
    }

    pub fn get_post(&self, id: i64) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!("{POST_SELECT} WHERE p.id = ?1");
            conn.query_row(&sql, [id], map_post).optional()
        })
    }

    /// Deletes the post and, through the schema, its comments.
    pub fn delete_post(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM posts WHERE id = ?1", [id])? == 1))
    }

    pub fn count_posts(&self, filter: PostFilter<'_>) -> Result<usize> {
        let (clause, params) = filter.where_clause();
        self.with_conn(|conn| {
            let sql = format!("SELECT COUNT(*) FROM posts p {clause}");
            let count: i64 = conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
            Ok(count as usize)
        })
    }

    /// Newest-first window of posts matching `filter`.
    pub fn list_posts(
        &self,
        filter: PostFilter<'_>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PostRow>> {
        let (clause, mut params) = filter.where_clause();
        let limit_idx = params.len() + 1;
        let offset_idx = params.len() + 2;
        params.push(Value::Integer(limit as i64));
        params.push(Value::Integer(offset as i64));

        self.with_conn(|conn| {
            let sql = format!(
                "{POST_SELECT} {clause}
                 ORDER BY p.created_at DESC, p.id DESC
                 LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), map_post)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Comments --

    pub fn insert_comment(&self, post_id: i64, author_id: &str, text: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (post_id, author_id, text) VALUES (?1, ?2, ?3)",
                rusqlite::params![post_id, author_id, text],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Comments of a post, oldest first.
    pub fn get_comments(&self, post_id: i64) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.post_id, c.author_id, u.username, c.text, c.created_at
                 FROM comments c
                 JOIN users u ON u.id = c.author_id
                 WHERE c.post_id = ?1
                 ORDER BY c.created_at ASC, c.id ASC",
            )?;
            let rows = stmt
                .query_map([post_id], |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        author_id: row.get(2)?,
                        author_username: row.get(3)?,
                        text: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Follows --

    /// NOT_FOLLOWING -> FOLLOWING. Self-follows and repeats write nothing.
    pub fn follow(&self, user_id: &str, author_id: &str) -> Result<FollowOutcome> {
        if user_id == author_id {
            return Ok(FollowOutcome::SelfFollow);
        }

        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO follows (user_id, author_id) VALUES (?1, ?2)",
                (user_id, author_id),
            )?;
            if inserted == 1 {
                Ok(FollowOutcome::Followed)
            } else {
                Ok(FollowOutcome::AlreadyFollowing)
            }
        })
    }

    /// FOLLOWING -> NOT_FOLLOWING. A missing edge is reported, not raised.
    pub fn unfollow(&self, user_id: &str, author_id: &str) -> Result<UnfollowOutcome> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM follows WHERE user_id = ?1 AND author_id = ?2",
                (user_id, author_id),
            )?;
            if deleted == 0 {
                Ok(UnfollowOutcome::NotFollowing)
            } else {
                Ok(UnfollowOutcome::Unfollowed)
            }
        })
    }

    pub fn is_following(&self, user_id: &str, author_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM follows WHERE user_id = ?1 AND author_id = ?2",
                    (user_id, author_id),
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, username, first_name, last_name, email, password, created_at
         FROM users WHERE {column} = ?1"
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                first_name: row.get(2)?,
                last_name: row.get(3)?,
                email: row.get(4)?,
                password: row.get(5)?,
                created_at: row.get(6)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn map_group(row: &Row<'_>) -> rusqlite::Result<GroupRow> {
    Ok(GroupRow {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
    })
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        text: row.get(1)?,
        author_id: row.get(2)?,
        author_username: row.get(3)?,
        group_id: row.get(4)?,
        group_title: row.get(5)?,
        group_slug: row.get(6)?,
        image: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_users() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u-alice", "alice", "Alice", "A", "alice@example.com", "hash").unwrap();
        db.create_user("u-bob", "bob", "", "", "", "hash").unwrap();
        db
    }

    fn post(text: &str, group_id: Option<i64>) -> PostFields {
        PostFields {
            text: text.to_string(),
            group_id,
            image: None,
        }
    }

    fn follow_edges(db: &Database) -> i64 {
        db.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM follows", [], |r| r.get(0))?))
            .unwrap()
    }

    #[test]
    fn taken_username_is_reported_not_raised() {
        let db = db_with_users();
        assert!(!db.create_user("u-other", "alice", "", "", "", "hash").unwrap());
        assert!(db.create_user("u-carol", "carol", "", "", "", "hash").unwrap());
        assert_eq!(db.get_user_by_username("alice").unwrap().unwrap().id, "u-alice");
    }

    #[test]
    fn posts_are_listed_newest_first() {
        let db = db_with_users();
        let first = db.insert_post("u-alice", &post("first", None)).unwrap();
        let second = db.insert_post("u-alice", &post("second", None)).unwrap();

        let rows = db.list_posts(PostFilter::All, 10, 0).unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second, first]);
        assert_eq!(rows[0].author_username, "alice");
    }

    #[test]
    fn comments_are_listed_oldest_first() {
        let db = db_with_users();
        let post_id = db.insert_post("u-alice", &post("text", None)).unwrap();
        let c1 = db.insert_comment(post_id, "u-bob", "one").unwrap();
        let c2 = db.insert_comment(post_id, "u-alice", "two").unwrap();

        let ids: Vec<i64> = db.get_comments(post_id).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![c1, c2]);
    }

    #[test]
    fn filters_select_matching_posts() {
        let db = db_with_users();
        let group = db.create_group("Rust", "rust", "All about Rust").unwrap();
        db.insert_post("u-alice", &post("in group", Some(group))).unwrap();
        db.insert_post("u-bob", &post("no group", None)).unwrap();

        assert_eq!(db.count_posts(PostFilter::All).unwrap(), 2);
        assert_eq!(db.count_posts(PostFilter::Group(group)).unwrap(), 1);
        assert_eq!(db.count_posts(PostFilter::Author("u-bob")).unwrap(), 1);

        let in_group = db.list_posts(PostFilter::Group(group), 10, 0).unwrap();
        assert_eq!(in_group[0].group_slug.as_deref(), Some("rust"));
    }

    #[test]
    fn limit_and_offset_window_the_feed() {
        let db = db_with_users();
        for i in 0..13 {
            db.insert_post("u-alice", &post(&format!("post {i}"), None)).unwrap();
        }
        assert_eq!(db.list_posts(PostFilter::All, 10, 0).unwrap().len(), 10);
        assert_eq!(db.list_posts(PostFilter::All, 10, 10).unwrap().len(), 3);
    }

    #[test]
    fn follow_is_idempotent_and_rejects_self() {
        let db = db_with_users();
        assert_eq!(db.follow("u-bob", "u-alice").unwrap(), FollowOutcome::Followed);
        assert_eq!(db.follow("u-bob", "u-alice").unwrap(), FollowOutcome::AlreadyFollowing);
        assert_eq!(db.follow("u-bob", "u-bob").unwrap(), FollowOutcome::SelfFollow);
        assert_eq!(follow_edges(&db), 1);
        assert!(db.is_following("u-bob", "u-alice").unwrap());
        assert!(!db.is_following("u-alice", "u-bob").unwrap());
    }

    #[test]
    fn unfollow_reports_missing_edge() {
        let db = db_with_users();
        db.follow("u-bob", "u-alice").unwrap();
        assert_eq!(db.unfollow("u-bob", "u-alice").unwrap(), UnfollowOutcome::Unfollowed);
        assert_eq!(db.unfollow("u-bob", "u-alice").unwrap(), UnfollowOutcome::NotFollowing);
        assert_eq!(follow_edges(&db), 0);
    }

    #[test]
    fn follow_feed_contains_only_followed_authors() {
        let db = db_with_users();
        db.create_user("u-carol", "carol", "", "", "", "hash").unwrap();
        db.insert_post("u-alice", &post("by alice", None)).unwrap();
        db.insert_post("u-carol", &post("by carol", None)).unwrap();
        db.follow("u-bob", "u-alice").unwrap();

        let feed = db.list_posts(PostFilter::FollowedBy("u-bob"), 10, 0).unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].author_username, "alice");
        assert_eq!(db.count_posts(PostFilter::FollowedBy("u-carol")).unwrap(), 0);
    }

    #[test]
    fn deleting_group_keeps_posts_without_group() {
        let db = db_with_users();
        let group = db.create_group("Rust", "rust", "").unwrap();
        let post_id = db.insert_post("u-alice", &post("text", Some(group))).unwrap();

        assert!(db.delete_group(group).unwrap());
        let row = db.get_post(post_id).unwrap().unwrap();
        assert_eq!(row.group_id, None);
        assert_eq!(row.group_title, None);
    }

    #[test]
    fn deleting_user_cascades() {
        let db = db_with_users();
        let alice_post = db.insert_post("u-alice", &post("alice", None)).unwrap();
        let bob_post = db.insert_post("u-bob", &post("bob", None)).unwrap();
        db.insert_comment(bob_post, "u-alice", "nice").unwrap();
        db.follow("u-alice", "u-bob").unwrap();

        assert!(db.delete_user("u-alice").unwrap());
        assert!(db.get_post(alice_post).unwrap().is_none());
        assert!(db.get_comments(bob_post).unwrap().is_empty());
        assert_eq!(follow_edges(&db), 0);
    }

    #[test]
    fn deleting_post_removes_comments() {
        let db = db_with_users();
        let post_id = db.insert_post("u-alice", &post("text", None)).unwrap();
        db.insert_comment(post_id, "u-bob", "hi").unwrap();

        assert!(db.delete_post(post_id).unwrap());
        let left: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM comments", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(left, 0);
    }

    #[test]
    fn update_post_changes_only_target_row() {
        let db = db_with_users();
        let group = db.create_group("Rust", "rust", "").unwrap();
        let target = db.insert_post("u-alice", &post("old", None)).unwrap();
        let other = db.insert_post("u-alice", &post("untouched", None)).unwrap();

        assert!(db.update_post(target, &post("new", Some(group))).unwrap());

        let updated = db.get_post(target).unwrap().unwrap();
        assert_eq!(updated.text, "new");
        assert_eq!(updated.group_id, Some(group));
        assert_eq!(db.get_post(other).unwrap().unwrap().text, "untouched");
    }

    #[test]
    fn migrations_are_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| crate::migrations::run(conn)).unwrap();
        assert!(db.list_groups().unwrap().is_empty());
    }
}
