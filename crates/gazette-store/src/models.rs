//! Domain model structs persisted in the database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer.  None of them carries credential material;
//! password hashes live in a separate [`AuthRecord`] that never leaves the
//! auth path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gazette_shared::{
    AccountType, ChatId, CommentId, IdSet, MessageId, NotificationId, NotificationKind, PostId,
    UserId,
};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A user profile.  The primary key is the uid assigned at first sign-in.
///
/// The three relationship fields are sets of uids with union/remove
/// semantics; `followers`/`following` satisfy edge symmetry (`B` follows `A`
/// iff `A` is in `B.following` and `B` is in `A.followers`), and
/// `follow_requests` is disjoint from `followers` for every pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub uid: UserId,
    pub email: String,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub bio: String,
    pub account_type: AccountType,
    /// Uids that follow this user.
    pub followers: IdSet,
    /// Uids this user follows.
    pub following: IdSet,
    /// Uids awaiting this user's approval (private accounts only).
    pub follow_requests: IdSet,
    pub created_at: DateTime<Utc>,
}

/// Credential material for one user, kept out of [`UserProfile`].
#[derive(Debug, Clone)]
pub struct AuthRecord {
    pub uid: UserId,
    /// Hex-encoded BLAKE3 password derivation.
    pub password_hash: String,
    /// Hex-encoded random salt.
    pub password_salt: String,
}

/// An authenticated session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub uid: UserId,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

/// A blog post.  Author fields are a snapshot taken at creation time;
/// `author_account_type` is refreshed by the account-type fan-out so that
/// visibility checks never need an author-lookup join.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub author_id: UserId,
    pub author_name: String,
    pub author_photo_url: Option<String>,
    pub author_account_type: AccountType,
    pub likes: IdSet,
    pub dislikes: IdSet,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

/// A comment on a post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: UserId,
    pub author_name: String,
    pub author_photo_url: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Denormalized member snapshot stored on the chat document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMember {
    pub uid: UserId,
    pub display_name: String,
    pub photo_url: Option<String>,
}

/// Summary of the most recent message, updated on every send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LastMessage {
    pub body: String,
    pub sender_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// A direct-message conversation between exactly two users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chat {
    pub id: ChatId,
    pub members: Vec<ChatMember>,
    pub last_message: Option<LastMessage>,
    pub last_activity: DateTime<Utc>,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub sender_photo_url: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// A structured notification event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: UserId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub sender_photo_url: Option<String>,
    pub kind: NotificationKind,
    pub post_id: Option<PostId>,
    pub post_title: Option<String>,
    pub comment_text: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Payload for appending a notification; id / read-state / timestamp are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: UserId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub sender_photo_url: Option<String>,
    pub kind: NotificationKind,
    pub post_id: Option<PostId>,
    pub post_title: Option<String>,
    pub comment_text: Option<String>,
}
