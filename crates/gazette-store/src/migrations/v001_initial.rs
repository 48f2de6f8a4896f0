//! v001 -- Initial schema creation.
//!
//! Creates the seven core tables: `users`, `sessions`, `posts`, `comments`,
//! `chats`, `messages`, and `notifications`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
--
-- Relationship fields are JSON arrays of uids, mutated only through
-- set-union / set-remove.  account_type is nullable: legacy rows decode
-- as 'public' at the model boundary.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    uid             TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    email           TEXT NOT NULL UNIQUE,
    password_hash   TEXT NOT NULL,               -- hex-encoded BLAKE3 derivation
    password_salt   TEXT NOT NULL,               -- hex-encoded random salt
    display_name    TEXT NOT NULL,
    photo_url       TEXT,
    bio             TEXT NOT NULL DEFAULT '',
    account_type    TEXT,                        -- 'public' | 'private' | NULL
    followers       TEXT NOT NULL DEFAULT '[]',  -- JSON array of uids
    following       TEXT NOT NULL DEFAULT '[]',
    follow_requests TEXT NOT NULL DEFAULT '[]',
    created_at      TEXT NOT NULL                -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Sessions
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sessions (
    token      TEXT PRIMARY KEY NOT NULL,        -- hex-encoded random token
    uid        TEXT NOT NULL,                    -- FK -> users(uid)
    created_at TEXT NOT NULL,

    FOREIGN KEY (uid) REFERENCES users(uid) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_sessions_uid ON sessions(uid);

-- ----------------------------------------------------------------
-- Posts
--
-- author_* columns are a denormalized snapshot of the author at
-- post-creation time; author_account_type is kept consistent by the
-- account-type fan-out.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS posts (
    id                  TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    title               TEXT NOT NULL,
    content             TEXT NOT NULL,
    image_url           TEXT,
    author_id           TEXT NOT NULL,              -- FK -> users(uid)
    author_name         TEXT NOT NULL,
    author_photo_url    TEXT,
    author_account_type TEXT,
    likes               TEXT NOT NULL DEFAULT '[]', -- JSON array of uids
    dislikes            TEXT NOT NULL DEFAULT '[]',
    created_at          TEXT NOT NULL,

    FOREIGN KEY (author_id) REFERENCES users(uid) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_posts_author_created
    ON posts(author_id, created_at DESC);

-- ----------------------------------------------------------------
-- Comments
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS comments (
    id               TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    post_id          TEXT NOT NULL,                 -- FK -> posts(id)
    author_id        TEXT NOT NULL,
    author_name      TEXT NOT NULL,
    author_photo_url TEXT,
    body             TEXT NOT NULL,
    created_at       TEXT NOT NULL,

    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_comments_post_ts
    ON comments(post_id, created_at ASC);

-- ----------------------------------------------------------------
-- Chats
--
-- id is the two member uids sorted and joined with '_', so the same
-- pair always maps to the same row.  member_info and last_message are
-- denormalized JSON snapshots.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chats (
    id            TEXT PRIMARY KEY NOT NULL,
    member_a      TEXT NOT NULL,                    -- lower uid
    member_b      TEXT NOT NULL,                    -- higher uid
    member_info   TEXT NOT NULL,                    -- JSON array of member snapshots
    last_message  TEXT,                             -- JSON summary, NULL until first send
    last_activity TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chats_member_a ON chats(member_a);
CREATE INDEX IF NOT EXISTS idx_chats_member_b ON chats(member_b);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id               TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    chat_id          TEXT NOT NULL,                 -- FK -> chats(id)
    sender_id        TEXT NOT NULL,
    sender_name      TEXT NOT NULL,
    sender_photo_url TEXT,
    body             TEXT NOT NULL,
    created_at       TEXT NOT NULL,

    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_chat_ts
    ON messages(chat_id, created_at ASC);

-- ----------------------------------------------------------------
-- Notifications
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS notifications (
    id               TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    recipient_id     TEXT NOT NULL,
    sender_id        TEXT NOT NULL,
    sender_name      TEXT NOT NULL,
    sender_photo_url TEXT,
    kind             TEXT NOT NULL,                 -- 'like' | 'comment' | 'follow_request'
    post_id          TEXT,
    post_title       TEXT,
    comment_text     TEXT,
    is_read          INTEGER NOT NULL DEFAULT 0,    -- boolean 0/1
    created_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notifications_recipient
    ON notifications(recipient_id, is_read, created_at DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
