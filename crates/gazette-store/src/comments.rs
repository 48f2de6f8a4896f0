//! Comments on posts.

use chrono::Utc;
use rusqlite::params;

use gazette_shared::{CommentId, NotificationKind, PostId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Comment, NewNotification};
use crate::notifications::insert_notification;
use crate::posts::fetch_post;
use crate::users::{conversion, fetch_user, parse_ts};
use crate::StoreEvent;

impl Database {
    /// Add a comment to a post and notify the post's author.
    pub fn add_comment(&mut self, post_id: &PostId, author: &UserId, body: &str) -> Result<Comment> {
        if body.trim().is_empty() {
            return Err(StoreError::invalid("Comment cannot be empty"));
        }

        let mut events = Vec::new();
        let comment;

        let tx = self.conn_mut().transaction()?;
        {
            let post = fetch_post(&tx, post_id)?;
            let profile = fetch_user(&tx, author)?;

            comment = Comment {
                id: CommentId::new(),
                post_id: *post_id,
                author_id: profile.uid,
                author_name: profile.display_name.clone(),
                author_photo_url: profile.photo_url.clone(),
                body: body.to_string(),
                created_at: Utc::now(),
            };

            tx.execute(
                "INSERT INTO comments (id, post_id, author_id, author_name,
                                       author_photo_url, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    comment.id.to_string(),
                    comment.post_id.to_string(),
                    comment.author_id.to_string(),
                    comment.author_name,
                    comment.author_photo_url,
                    comment.body,
                    comment.created_at.to_rfc3339(),
                ],
            )?;

            let created = insert_notification(
                &tx,
                &NewNotification {
                    recipient_id: post.author_id,
                    sender_id: profile.uid,
                    sender_name: profile.display_name,
                    sender_photo_url: profile.photo_url,
                    kind: NotificationKind::Comment,
                    post_id: Some(*post_id),
                    post_title: Some(post.title),
                    comment_text: Some(comment.body.clone()),
                },
            )?;

            events.push(StoreEvent::CommentAdded {
                post_id: *post_id,
                author: *author,
            });
            if let Some(n) = created {
                events.push(StoreEvent::NotificationCreated {
                    recipient: n.recipient_id,
                    kind: n.kind,
                });
            }
        }
        tx.commit()?;

        for event in events {
            self.feed().publish(event);
        }
        Ok(comment)
    }

    /// List a post's comments, oldest first.
    pub fn list_comments(&self, post_id: &PostId) -> Result<Vec<Comment>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, post_id, author_id, author_name, author_photo_url, body, created_at
             FROM comments
             WHERE post_id = ?1
             ORDER BY created_at ASC",
        )?;

        let rows = stmt.query_map(params![post_id.to_string()], |row| {
            let id_str: String = row.get(0)?;
            let post_str: String = row.get(1)?;
            let author_str: String = row.get(2)?;
            let author_name: String = row.get(3)?;
            let author_photo_url: Option<String> = row.get(4)?;
            let body: String = row.get(5)?;
            let created_str: String = row.get(6)?;

            let id = uuid::Uuid::parse_str(&id_str).map_err(|e| conversion(0, e))?;
            let post_id = PostId::parse(&post_str).map_err(|e| conversion(1, e))?;
            let author_id = UserId::parse(&author_str).map_err(|e| conversion(2, e))?;

            Ok(Comment {
                id: CommentId(id),
                post_id,
                author_id,
                author_name,
                author_photo_url,
                body,
                created_at: parse_ts(6, &created_str)?,
            })
        })?;

        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }
}
