//! Direct-message conversations.
//!
//! A chat's id is derived from its two member uids (sorted, joined with
//! `_`), so opening a chat is idempotent: the same pair always maps to the
//! same row.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use gazette_shared::constants::MESSAGE_PAGE_SIZE;
use gazette_shared::{ChatId, MessageId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Chat, ChatMember, LastMessage, Message};
use crate::users::{conversion, fetch_user, not_found, parse_ts};
use crate::StoreEvent;

impl Database {
    /// Fetch the chat between two users, creating it if absent.
    ///
    /// Fails with `InvalidOperation` on a self-chat and `NotFound` if either
    /// profile is missing.
    pub fn open_chat(&self, me: &UserId, other: &UserId) -> Result<Chat> {
        if me == other {
            return Err(StoreError::invalid("You cannot message yourself"));
        }

        let id = ChatId::for_members(me, other);
        if let Some(existing) = self.find_chat(&id)? {
            return Ok(existing);
        }

        let my_profile = fetch_user(self.conn(), me)?;
        let other_profile = fetch_user(self.conn(), other)?;

        let chat = Chat {
            id: id.clone(),
            members: vec![
                ChatMember {
                    uid: my_profile.uid,
                    display_name: my_profile.display_name,
                    photo_url: my_profile.photo_url,
                },
                ChatMember {
                    uid: other_profile.uid,
                    display_name: other_profile.display_name,
                    photo_url: other_profile.photo_url,
                },
            ],
            last_message: None,
            last_activity: Utc::now(),
        };

        let (lo, hi) = if me <= other { (me, other) } else { (other, me) };
        self.conn().execute(
            "INSERT INTO chats (id, member_a, member_b, member_info, last_message, last_activity)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
            params![
                chat.id.as_str(),
                lo.to_string(),
                hi.to_string(),
                serde_json::to_string(&chat.members)?,
                chat.last_activity.to_rfc3339(),
            ],
        )?;

        tracing::debug!(id = %chat.id, "created chat");
        Ok(chat)
    }

    /// Fetch a chat by id.
    pub fn get_chat(&self, id: &ChatId) -> Result<Chat> {
        self.find_chat(id)?.ok_or(StoreError::NotFound)
    }

    fn find_chat(&self, id: &ChatId) -> Result<Option<Chat>> {
        self.conn()
            .query_row(
                "SELECT id, member_info, last_message, last_activity FROM chats WHERE id = ?1",
                params![id.as_str()],
                row_to_chat,
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }

    /// List a user's chats, most recent activity first.
    pub fn list_chats(&self, uid: &UserId) -> Result<Vec<Chat>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, member_info, last_message, last_activity
             FROM chats
             WHERE member_a = ?1 OR member_b = ?1
             ORDER BY last_activity DESC",
        )?;

        let rows = stmt.query_map(params![uid.to_string()], row_to_chat)?;

        let mut chats = Vec::new();
        for row in rows {
            chats.push(row?);
        }
        Ok(chats)
    }

    /// Append a message and refresh the chat's last-message summary in one
    /// transaction.
    pub fn send_message(&mut self, chat_id: &ChatId, sender: &UserId, body: &str) -> Result<Message> {
        if body.trim().is_empty() {
            return Err(StoreError::invalid("Message text cannot be empty"));
        }

        let message;

        let tx = self.conn_mut().transaction()?;
        {
            // The chat must exist before anything is written.
            tx.query_row(
                "SELECT id FROM chats WHERE id = ?1",
                params![chat_id.as_str()],
                |row| row.get::<_, String>(0),
            )
            .map_err(not_found)?;

            let profile = fetch_user(&tx, sender)?;

            message = Message {
                id: MessageId::new(),
                chat_id: chat_id.clone(),
                sender_id: profile.uid,
                sender_name: profile.display_name,
                sender_photo_url: profile.photo_url,
                body: body.to_string(),
                created_at: Utc::now(),
            };

            tx.execute(
                "INSERT INTO messages (id, chat_id, sender_id, sender_name,
                                       sender_photo_url, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    message.id.to_string(),
                    message.chat_id.as_str(),
                    message.sender_id.to_string(),
                    message.sender_name,
                    message.sender_photo_url,
                    message.body,
                    message.created_at.to_rfc3339(),
                ],
            )?;

            let summary = LastMessage {
                body: message.body.clone(),
                sender_id: message.sender_id,
                created_at: message.created_at,
            };
            tx.execute(
                "UPDATE chats SET last_message = ?1, last_activity = ?2 WHERE id = ?3",
                params![
                    serde_json::to_string(&summary)?,
                    message.created_at.to_rfc3339(),
                    chat_id.as_str(),
                ],
            )?;
        }
        tx.commit()?;

        self.feed().publish(StoreEvent::MessageSent {
            chat_id: chat_id.clone(),
            sender: *sender,
        });
        Ok(message)
    }

    /// List a chat's messages, oldest first.
    pub fn list_messages(&self, chat_id: &ChatId, limit: Option<u32>) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, chat_id, sender_id, sender_name, sender_photo_url, body, created_at
             FROM messages
             WHERE chat_id = ?1
             ORDER BY created_at ASC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(
            params![chat_id.as_str(), limit.unwrap_or(MESSAGE_PAGE_SIZE)],
            row_to_message,
        )?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }
}

/// Map a `rusqlite::Row` to a [`Chat`].
fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chat> {
    let id: String = row.get(0)?;
    let member_info_raw: String = row.get(1)?;
    let last_message_raw: Option<String> = row.get(2)?;
    let last_activity_str: String = row.get(3)?;

    let members: Vec<ChatMember> =
        serde_json::from_str(&member_info_raw).map_err(|e| conversion(1, e))?;
    let last_message: Option<LastMessage> = last_message_raw
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| conversion(2, e))?;

    Ok(Chat {
        id: ChatId(id),
        members,
        last_message,
        last_activity: parse_ts(3, &last_activity_str)?,
    })
}

/// Map a `rusqlite::Row` to a [`Message`].
fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let chat_id: String = row.get(1)?;
    let sender_str: String = row.get(2)?;
    let sender_name: String = row.get(3)?;
    let sender_photo_url: Option<String> = row.get(4)?;
    let body: String = row.get(5)?;
    let created_str: String = row.get(6)?;

    let id = uuid::Uuid::parse_str(&id_str).map_err(|e| conversion(0, e))?;
    let sender_id = UserId::parse(&sender_str).map_err(|e| conversion(2, e))?;

    Ok(Message {
        id: MessageId(id),
        chat_id: ChatId(chat_id),
        sender_id,
        sender_name,
        sender_photo_url,
        body,
        created_at: parse_ts(6, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{open_test_db, seed_user};

    #[test]
    fn open_chat_is_idempotent_and_order_independent() {
        let (db, _dir) = open_test_db();
        let a = seed_user(&db, "a@example.org");
        let b = seed_user(&db, "b@example.org");

        let first = db.open_chat(&a.uid, &b.uid).unwrap();
        let second = db.open_chat(&b.uid, &a.uid).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.members.len(), 2);
        assert_eq!(db.list_chats(&a.uid).unwrap().len(), 1);
    }

    #[test]
    fn self_chat_rejected() {
        let (db, _dir) = open_test_db();
        let a = seed_user(&db, "a@example.org");

        assert!(matches!(
            db.open_chat(&a.uid, &a.uid).unwrap_err(),
            StoreError::InvalidOperation(_)
        ));
    }

    #[test]
    fn chat_with_missing_user_is_not_found() {
        let (db, _dir) = open_test_db();
        let a = seed_user(&db, "a@example.org");

        assert!(matches!(
            db.open_chat(&a.uid, &UserId::new()).unwrap_err(),
            StoreError::NotFound
        ));
    }

    #[test]
    fn send_message_updates_last_message_summary() {
        let (mut db, _dir) = open_test_db();
        let a = seed_user(&db, "a@example.org");
        let b = seed_user(&db, "b@example.org");
        let chat = db.open_chat(&a.uid, &b.uid).unwrap();

        db.send_message(&chat.id, &a.uid, "hello").unwrap();
        db.send_message(&chat.id, &b.uid, "hi back").unwrap();

        let reloaded = db.get_chat(&chat.id).unwrap();
        let last = reloaded.last_message.unwrap();
        assert_eq!(last.body, "hi back");
        assert_eq!(last.sender_id, b.uid);

        let messages = db.list_messages(&chat.id, None).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].body, "hello");
        assert_eq!(messages[1].body, "hi back");
    }

    #[test]
    fn empty_message_rejected() {
        let (mut db, _dir) = open_test_db();
        let a = seed_user(&db, "a@example.org");
        let b = seed_user(&db, "b@example.org");
        let chat = db.open_chat(&a.uid, &b.uid).unwrap();

        assert!(matches!(
            db.send_message(&chat.id, &a.uid, "  ").unwrap_err(),
            StoreError::InvalidOperation(_)
        ));
    }

    #[test]
    fn message_to_missing_chat_is_not_found() {
        let (mut db, _dir) = open_test_db();
        let a = seed_user(&db, "a@example.org");

        assert!(matches!(
            db.send_message(&ChatId("nope".into()), &a.uid, "hello").unwrap_err(),
            StoreError::NotFound
        ));
    }

    #[test]
    fn chats_ordered_by_recent_activity() {
        let (mut db, _dir) = open_test_db();
        let a = seed_user(&db, "a@example.org");
        let b = seed_user(&db, "b@example.org");
        let c = seed_user(&db, "c@example.org");

        let with_b = db.open_chat(&a.uid, &b.uid).unwrap();
        let with_c = db.open_chat(&a.uid, &c.uid).unwrap();

        db.send_message(&with_b.id, &a.uid, "first").unwrap();
        db.send_message(&with_c.id, &a.uid, "second").unwrap();

        let chats = db.list_chats(&a.uid).unwrap();
        assert_eq!(chats.len(), 2);
        assert!(chats[0].last_activity >= chats[1].last_activity);
    }
}
