//! CRUD operations for [`Post`] records, including the like/dislike
//! reaction sets.

use chrono::Utc;
use rusqlite::{params, Connection};

use gazette_shared::{AccountType, IdSet, NotificationKind, PostId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{NewNotification, Post};
use crate::notifications::insert_notification;
use crate::users::{conversion, fetch_user, not_found, parse_set, parse_ts};
use crate::StoreEvent;

const POST_COLUMNS: &str = "id, title, content, image_url, author_id, author_name, \
     author_photo_url, author_account_type, likes, dislikes, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new post, snapshotting the author's name, photo, and
    /// account type onto the row.
    pub fn create_post(
        &self,
        author: &UserId,
        title: &str,
        content: &str,
        image_url: Option<String>,
    ) -> Result<Post> {
        if title.trim().is_empty() || content.trim().is_empty() {
            return Err(StoreError::invalid("Title and content are required"));
        }

        let profile = fetch_user(self.conn(), author)?;

        let post = Post {
            id: PostId::new(),
            title: title.to_string(),
            content: content.to_string(),
            image_url,
            author_id: profile.uid,
            author_name: profile.display_name,
            author_photo_url: profile.photo_url,
            author_account_type: profile.account_type,
            likes: IdSet::new(),
            dislikes: IdSet::new(),
            created_at: Utc::now(),
        };

        self.conn().execute(
            "INSERT INTO posts (id, title, content, image_url, author_id, author_name,
                                author_photo_url, author_account_type, likes, dislikes,
                                created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                post.id.to_string(),
                post.title,
                post.content,
                post.image_url,
                post.author_id.to_string(),
                post.author_name,
                post.author_photo_url,
                post.author_account_type.as_str(),
                serde_json::to_string(&post.likes)?,
                serde_json::to_string(&post.dislikes)?,
                post.created_at.to_rfc3339(),
            ],
        )?;

        tracing::debug!(id = %post.id, author = %post.author_id, "created post");
        self.feed().publish(StoreEvent::PostCreated {
            id: post.id,
            author: post.author_id,
        });
        Ok(post)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single post by id.
    pub fn get_post(&self, id: &PostId) -> Result<Post> {
        fetch_post(self.conn(), id)
    }

    /// List all posts, newest first.
    pub fn list_posts(&self) -> Result<Vec<Post>> {
        self.query_posts(
            &format!("SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC"),
            params![],
        )
    }

    /// List one author's posts, newest first.
    pub fn list_posts_by_author(&self, author: &UserId) -> Result<Vec<Post>> {
        self.query_posts(
            &format!(
                "SELECT {POST_COLUMNS} FROM posts WHERE author_id = ?1 ORDER BY created_at DESC"
            ),
            params![author.to_string()],
        )
    }

    fn query_posts(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Post>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params, row_to_post)?;

        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Edit a post's title, content, and (optionally) image.
    ///
    /// Only the author may edit; `new_image_url = None` leaves the current
    /// image in place.
    pub fn update_post(
        &self,
        id: &PostId,
        editor: &UserId,
        title: &str,
        content: &str,
        new_image_url: Option<String>,
    ) -> Result<Post> {
        if title.trim().is_empty() || content.trim().is_empty() {
            return Err(StoreError::invalid("Title and content are required"));
        }

        let post = fetch_post(self.conn(), id)?;
        if post.author_id != *editor {
            return Err(StoreError::invalid("Only the author can edit this post"));
        }

        let image_url = new_image_url.or(post.image_url);
        self.conn().execute(
            "UPDATE posts SET title = ?1, content = ?2, image_url = ?3 WHERE id = ?4",
            params![title, content, image_url, id.to_string()],
        )?;

        self.feed().publish(StoreEvent::PostUpdated { id: *id });
        fetch_post(self.conn(), id)
    }

    /// Toggle `uid`'s like on a post.  Returns `true` if the post is liked
    /// after the call.
    ///
    /// Liking removes any standing dislike by the same user, so the two
    /// reaction sets stay disjoint per user.  A fresh like notifies the
    /// post's author.
    pub fn toggle_like(&mut self, id: &PostId, uid: &UserId) -> Result<bool> {
        self.toggle_reaction(id, uid, Reaction::Like)
    }

    /// Toggle `uid`'s dislike on a post.  Returns `true` if the post is
    /// disliked after the call.
    pub fn toggle_dislike(&mut self, id: &PostId, uid: &UserId) -> Result<bool> {
        self.toggle_reaction(id, uid, Reaction::Dislike)
    }

    fn toggle_reaction(&mut self, id: &PostId, uid: &UserId, reaction: Reaction) -> Result<bool> {
        let mut events = Vec::new();
        let active;

        let tx = self.conn_mut().transaction()?;
        {
            let mut post = fetch_post(&tx, id)?;

            let (set, opposite) = match reaction {
                Reaction::Like => (&mut post.likes, &mut post.dislikes),
                Reaction::Dislike => (&mut post.dislikes, &mut post.likes),
            };

            if set.contains(uid) {
                set.remove(uid);
                active = false;
            } else {
                set.insert(*uid);
                opposite.remove(uid);
                active = true;
            }

            tx.execute(
                "UPDATE posts SET likes = ?1, dislikes = ?2 WHERE id = ?3",
                params![
                    serde_json::to_string(&post.likes)?,
                    serde_json::to_string(&post.dislikes)?,
                    id.to_string(),
                ],
            )?;

            if active && reaction == Reaction::Like {
                let liker = fetch_user(&tx, uid)?;
                let created = insert_notification(
                    &tx,
                    &NewNotification {
                        recipient_id: post.author_id,
                        sender_id: *uid,
                        sender_name: liker.display_name,
                        sender_photo_url: liker.photo_url,
                        kind: NotificationKind::Like,
                        post_id: Some(*id),
                        post_title: Some(post.title.clone()),
                        comment_text: None,
                    },
                )?;
                if let Some(n) = created {
                    events.push(StoreEvent::NotificationCreated {
                        recipient: n.recipient_id,
                        kind: n.kind,
                    });
                }
            }

            events.push(StoreEvent::PostUpdated { id: *id });
        }
        tx.commit()?;

        for event in events {
            self.feed().publish(event);
        }
        Ok(active)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a post and its comments.  Only the author may delete.
    ///
    /// Returns the deleted post so the caller can clean up its image blob.
    pub fn delete_post(&mut self, id: &PostId, caller: &UserId) -> Result<Post> {
        let post;

        let tx = self.conn_mut().transaction()?;
        {
            post = fetch_post(&tx, id)?;
            if post.author_id != *caller {
                return Err(StoreError::invalid("Only the author can delete this post"));
            }

            tx.execute(
                "DELETE FROM comments WHERE post_id = ?1",
                params![id.to_string()],
            )?;
            tx.execute("DELETE FROM posts WHERE id = ?1", params![id.to_string()])?;
        }
        tx.commit()?;

        tracing::debug!(id = %id, "deleted post");
        self.feed().publish(StoreEvent::PostDeleted { id: *id });
        Ok(post)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reaction {
    Like,
    Dislike,
}

/// Fetch a post on an explicit connection (usable inside a transaction).
pub(crate) fn fetch_post(conn: &Connection, id: &PostId) -> Result<Post> {
    conn.query_row(
        &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
        params![id.to_string()],
        row_to_post,
    )
    .map_err(not_found)
}

/// Map a `rusqlite::Row` to a [`Post`].
fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    let id_str: String = row.get(0)?;
    let title: String = row.get(1)?;
    let content: String = row.get(2)?;
    let image_url: Option<String> = row.get(3)?;
    let author_str: String = row.get(4)?;
    let author_name: String = row.get(5)?;
    let author_photo_url: Option<String> = row.get(6)?;
    let account_type_str: Option<String> = row.get(7)?;
    let likes_raw: String = row.get(8)?;
    let dislikes_raw: String = row.get(9)?;
    let created_str: String = row.get(10)?;

    let id = PostId::parse(&id_str).map_err(|e| conversion(0, e))?;
    let author_id = UserId::parse(&author_str).map_err(|e| conversion(4, e))?;

    Ok(Post {
        id,
        title,
        content,
        image_url,
        author_id,
        author_name,
        author_photo_url,
        author_account_type: AccountType::from_db(account_type_str.as_deref()),
        likes: parse_set(8, &likes_raw)?,
        dislikes: parse_set(9, &dislikes_raw)?,
        created_at: parse_ts(10, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gazette_shared::NotificationKind;

    use crate::testutil::{open_test_db, seed_user};

    #[test]
    fn create_snapshots_author_fields() {
        let (db, _dir) = open_test_db();
        let author = seed_user(&db, "ada@example.org");
        db.update_profile(&author.uid, "Ada", "", Some("/uploads/avatars/ada.png"))
            .unwrap();

        let post = db
            .create_post(&author.uid, "Engines", "Analytical ones.", None)
            .unwrap();
        assert_eq!(post.author_name, "Ada");
        assert_eq!(post.author_photo_url.as_deref(), Some("/uploads/avatars/ada.png"));
        assert_eq!(post.author_account_type, AccountType::Public);

        let fetched = db.get_post(&post.id).unwrap();
        assert_eq!(fetched, post);
    }

    #[test]
    fn empty_title_or_content_rejected() {
        let (db, _dir) = open_test_db();
        let author = seed_user(&db, "ada@example.org");

        assert!(matches!(
            db.create_post(&author.uid, "  ", "body", None).unwrap_err(),
            StoreError::InvalidOperation(_)
        ));
        assert!(matches!(
            db.create_post(&author.uid, "title", "", None).unwrap_err(),
            StoreError::InvalidOperation(_)
        ));
    }

    #[test]
    fn list_is_newest_first() {
        let (db, _dir) = open_test_db();
        let author = seed_user(&db, "ada@example.org");
        for i in 0..3 {
            db.create_post(&author.uid, &format!("p{i}"), "body", None).unwrap();
        }

        let posts = db.list_posts().unwrap();
        assert_eq!(posts.len(), 3);
        for pair in posts.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }
    }

    #[test]
    fn only_author_can_edit_or_delete() {
        let (mut db, _dir) = open_test_db();
        let author = seed_user(&db, "ada@example.org");
        let other = seed_user(&db, "eve@example.org");
        let post = db.create_post(&author.uid, "title", "body", None).unwrap();

        assert!(matches!(
            db.update_post(&post.id, &other.uid, "new", "new", None).unwrap_err(),
            StoreError::InvalidOperation(_)
        ));
        assert!(matches!(
            db.delete_post(&post.id, &other.uid).unwrap_err(),
            StoreError::InvalidOperation(_)
        ));

        let updated = db
            .update_post(&post.id, &author.uid, "new title", "new body", None)
            .unwrap();
        assert_eq!(updated.title, "new title");

        db.delete_post(&post.id, &author.uid).unwrap();
        assert!(matches!(
            db.get_post(&post.id).unwrap_err(),
            StoreError::NotFound
        ));
    }

    #[test]
    fn like_toggles_and_notifies_author_once() {
        let (mut db, _dir) = open_test_db();
        let author = seed_user(&db, "ada@example.org");
        let reader = seed_user(&db, "bob@example.org");
        let post = db.create_post(&author.uid, "title", "body", None).unwrap();

        assert!(db.toggle_like(&post.id, &reader.uid).unwrap());
        let liked = db.get_post(&post.id).unwrap();
        assert!(liked.likes.contains(&reader.uid));

        let notifications = db.list_notifications(&author.uid).unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::Like);
        assert_eq!(notifications[0].post_id, Some(post.id));

        // Un-like removes the reaction without a second notification.
        assert!(!db.toggle_like(&post.id, &reader.uid).unwrap());
        assert!(db.get_post(&post.id).unwrap().likes.is_empty());
        assert_eq!(db.list_notifications(&author.uid).unwrap().len(), 1);
    }

    #[test]
    fn like_and_dislike_stay_disjoint_per_user() {
        let (mut db, _dir) = open_test_db();
        let author = seed_user(&db, "ada@example.org");
        let reader = seed_user(&db, "bob@example.org");
        let post = db.create_post(&author.uid, "title", "body", None).unwrap();

        db.toggle_like(&post.id, &reader.uid).unwrap();
        db.toggle_dislike(&post.id, &reader.uid).unwrap();

        let fetched = db.get_post(&post.id).unwrap();
        assert!(!fetched.likes.contains(&reader.uid));
        assert!(fetched.dislikes.contains(&reader.uid));
    }

    #[test]
    fn own_like_does_not_notify() {
        let (mut db, _dir) = open_test_db();
        let author = seed_user(&db, "ada@example.org");
        let post = db.create_post(&author.uid, "title", "body", None).unwrap();

        db.toggle_like(&post.id, &author.uid).unwrap();
        assert!(db.list_notifications(&author.uid).unwrap().is_empty());
    }
}
