//! Structured notification events: append, list, unread count, bulk
//! mark-as-read.

use chrono::Utc;
use rusqlite::{params, Connection};

use gazette_shared::constants::NOTIFICATION_PAGE_SIZE;
use gazette_shared::{NotificationId, NotificationKind, PostId, UserId};

use crate::database::Database;
use crate::error::Result;
use crate::models::{NewNotification, Notification};
use crate::users::{conversion, parse_ts};
use crate::StoreEvent;

impl Database {
    /// Append a notification.
    ///
    /// Self-notifications (recipient == sender) are silently skipped and
    /// return `None`.
    pub fn create_notification(&self, new: &NewNotification) -> Result<Option<Notification>> {
        let created = insert_notification(self.conn(), new)?;
        if let Some(n) = &created {
            self.feed().publish(StoreEvent::NotificationCreated {
                recipient: n.recipient_id,
                kind: n.kind,
            });
        }
        Ok(created)
    }

    /// List a recipient's notifications, newest first.
    pub fn list_notifications(&self, recipient: &UserId) -> Result<Vec<Notification>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, recipient_id, sender_id, sender_name, sender_photo_url,
                    kind, post_id, post_title, comment_text, is_read, created_at
             FROM notifications
             WHERE recipient_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(
            params![recipient.to_string(), NOTIFICATION_PAGE_SIZE],
            row_to_notification,
        )?;

        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?);
        }
        Ok(notifications)
    }

    /// Number of unread notifications for a recipient.
    pub fn unread_notification_count(&self, recipient: &UserId) -> Result<u32> {
        let count: u32 = self.conn().query_row(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND is_read = 0",
            params![recipient.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Mark every unread notification for `recipient` as read.
    ///
    /// Returns the number of rows updated; a recipient with nothing unread
    /// is a successful no-op.
    pub fn mark_notifications_read(&self, recipient: &UserId) -> Result<usize> {
        let affected = self.conn().execute(
            "UPDATE notifications SET is_read = 1 WHERE recipient_id = ?1 AND is_read = 0",
            params![recipient.to_string()],
        )?;
        if affected > 0 {
            tracing::debug!(recipient = %recipient, count = affected, "marked notifications read");
        }
        Ok(affected)
    }
}

/// Insert on an explicit connection, usable inside an enclosing transaction.
pub(crate) fn insert_notification(
    conn: &Connection,
    new: &NewNotification,
) -> Result<Option<Notification>> {
    if new.recipient_id == new.sender_id {
        return Ok(None);
    }

    let notification = Notification {
        id: NotificationId::new(),
        recipient_id: new.recipient_id,
        sender_id: new.sender_id,
        sender_name: new.sender_name.clone(),
        sender_photo_url: new.sender_photo_url.clone(),
        kind: new.kind,
        post_id: new.post_id,
        post_title: new.post_title.clone(),
        comment_text: new.comment_text.clone(),
        is_read: false,
        created_at: Utc::now(),
    };

    conn.execute(
        "INSERT INTO notifications (id, recipient_id, sender_id, sender_name,
                                    sender_photo_url, kind, post_id, post_title,
                                    comment_text, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            notification.id.to_string(),
            notification.recipient_id.to_string(),
            notification.sender_id.to_string(),
            notification.sender_name,
            notification.sender_photo_url,
            notification.kind.as_str(),
            notification.post_id.map(|p| p.to_string()),
            notification.post_title,
            notification.comment_text,
            notification.is_read as i64,
            notification.created_at.to_rfc3339(),
        ],
    )?;

    Ok(Some(notification))
}

/// Map a `rusqlite::Row` to a [`Notification`].
fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let id_str: String = row.get(0)?;
    let recipient_str: String = row.get(1)?;
    let sender_str: String = row.get(2)?;
    let sender_name: String = row.get(3)?;
    let sender_photo_url: Option<String> = row.get(4)?;
    let kind_str: String = row.get(5)?;
    let post_id_str: Option<String> = row.get(6)?;
    let post_title: Option<String> = row.get(7)?;
    let comment_text: Option<String> = row.get(8)?;
    let is_read: bool = row.get(9)?;
    let created_str: String = row.get(10)?;

    let id = uuid::Uuid::parse_str(&id_str).map_err(|e| conversion(0, e))?;
    let recipient_id = UserId::parse(&recipient_str).map_err(|e| conversion(1, e))?;
    let sender_id = UserId::parse(&sender_str).map_err(|e| conversion(2, e))?;
    let kind = NotificationKind::from_str(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            format!("unknown notification kind: {kind_str}").into(),
        )
    })?;
    let post_id = post_id_str
        .map(|s| PostId::parse(&s))
        .transpose()
        .map_err(|e| conversion(6, e))?;

    Ok(Notification {
        id: NotificationId(id),
        recipient_id,
        sender_id,
        sender_name,
        sender_photo_url,
        kind,
        post_id,
        post_title,
        comment_text,
        is_read,
        created_at: parse_ts(10, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{open_test_db, seed_user};

    fn payload(recipient: &UserId, sender: &UserId) -> NewNotification {
        NewNotification {
            recipient_id: *recipient,
            sender_id: *sender,
            sender_name: "sender".into(),
            sender_photo_url: None,
            kind: NotificationKind::Like,
            post_id: Some(PostId::new()),
            post_title: Some("A post".into()),
            comment_text: None,
        }
    }

    #[test]
    fn self_notification_is_skipped() {
        let (db, _dir) = open_test_db();
        let user = seed_user(&db, "a@example.org");

        let created = db.create_notification(&payload(&user.uid, &user.uid)).unwrap();
        assert!(created.is_none());
        assert!(db.list_notifications(&user.uid).unwrap().is_empty());
    }

    #[test]
    fn unread_count_and_mark_read() {
        let (db, _dir) = open_test_db();
        let a = seed_user(&db, "a@example.org");
        let b = seed_user(&db, "b@example.org");

        db.create_notification(&payload(&a.uid, &b.uid)).unwrap();
        db.create_notification(&payload(&a.uid, &b.uid)).unwrap();
        db.create_notification(&payload(&b.uid, &a.uid)).unwrap();

        assert_eq!(db.unread_notification_count(&a.uid).unwrap(), 2);

        assert_eq!(db.mark_notifications_read(&a.uid).unwrap(), 2);
        assert_eq!(db.unread_notification_count(&a.uid).unwrap(), 0);
        // Only a's rows were touched.
        assert_eq!(db.unread_notification_count(&b.uid).unwrap(), 1);

        // Nothing left unread: successful no-op.
        assert_eq!(db.mark_notifications_read(&a.uid).unwrap(), 0);
    }

    #[test]
    fn list_is_newest_first() {
        let (db, _dir) = open_test_db();
        let a = seed_user(&db, "a@example.org");
        let b = seed_user(&db, "b@example.org");

        for _ in 0..3 {
            db.create_notification(&payload(&a.uid, &b.uid)).unwrap();
        }

        let listed = db.list_notifications(&a.uid).unwrap();
        assert_eq!(listed.len(), 3);
        for pair in listed.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }
    }
}
