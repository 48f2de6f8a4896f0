//! CRUD operations for [`UserProfile`], auth records, and sessions.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use gazette_shared::constants::{USER_SEARCH_RESULT_LIMIT, USER_SEARCH_SCAN_LIMIT};
use gazette_shared::{AccountType, IdSet, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{AuthRecord, Session, UserProfile};

const USER_COLUMNS: &str = "uid, email, display_name, photo_url, bio, account_type, \
     followers, following, follow_requests, created_at";

/// Which relationship-set column to load or store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SetField {
    Followers,
    Following,
    FollowRequests,
}

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Create the profile and auth record at first sign-in.
    ///
    /// New accounts start public with empty relationship sets.  A duplicate
    /// email is an `InvalidOperation`.
    pub fn create_user(
        &self,
        email: &str,
        display_name: &str,
        password_hash: &str,
        password_salt: &str,
    ) -> Result<UserProfile> {
        let existing: Option<String> = self
            .conn()
            .query_row(
                "SELECT uid FROM users WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(StoreError::invalid("Email is already registered"));
        }

        let profile = UserProfile {
            uid: UserId::new(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            photo_url: None,
            bio: String::new(),
            account_type: AccountType::default(),
            followers: IdSet::new(),
            following: IdSet::new(),
            follow_requests: IdSet::new(),
            created_at: Utc::now(),
        };

        self.conn().execute(
            "INSERT INTO users (uid, email, password_hash, password_salt, display_name,
                                photo_url, bio, account_type, followers, following,
                                follow_requests, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                profile.uid.to_string(),
                profile.email,
                password_hash,
                password_salt,
                profile.display_name,
                profile.photo_url,
                profile.bio,
                profile.account_type.as_str(),
                serde_json::to_string(&profile.followers)?,
                serde_json::to_string(&profile.following)?,
                serde_json::to_string(&profile.follow_requests)?,
                profile.created_at.to_rfc3339(),
            ],
        )?;

        tracing::info!(uid = %profile.uid, "created user");
        Ok(profile)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single profile by uid.
    pub fn get_user(&self, uid: &UserId) -> Result<UserProfile> {
        fetch_user(self.conn(), uid)
    }

    /// Fetch a single profile by email.
    pub fn get_user_by_email(&self, email: &str) -> Result<UserProfile> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                row_to_user,
            )
            .map_err(not_found)
    }

    /// Fetch credential material by email.  Never exposed past the auth path.
    pub fn get_auth_record(&self, email: &str) -> Result<AuthRecord> {
        self.conn()
            .query_row(
                "SELECT uid, password_hash, password_salt FROM users WHERE email = ?1",
                params![email],
                |row| {
                    let uid_str: String = row.get(0)?;
                    let uid = UserId::parse(&uid_str).map_err(|e| conversion(0, e))?;
                    Ok(AuthRecord {
                        uid,
                        password_hash: row.get(1)?,
                        password_salt: row.get(2)?,
                    })
                },
            )
            .map_err(not_found)
    }

    /// Case-insensitive substring search over display name and email.
    ///
    /// Scans a bounded window of profiles and filters in memory, mirroring
    /// the search behavior of the original product surface.
    pub fn search_users(&self, query: &str) -> Result<Vec<UserProfile>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![USER_SEARCH_SCAN_LIMIT], row_to_user)?;

        let mut matches = Vec::new();
        for row in rows {
            let profile = row?;
            if profile.display_name.to_lowercase().contains(&needle)
                || profile.email.to_lowercase().contains(&needle)
            {
                matches.push(profile);
                if matches.len() >= USER_SEARCH_RESULT_LIMIT {
                    break;
                }
            }
        }
        Ok(matches)
    }

    /// Batch profile lookup for follower/following lists.
    ///
    /// Queries in chunks; ids with no matching profile are skipped.
    pub fn get_profiles(&self, ids: &[UserId]) -> Result<Vec<UserProfile>> {
        let mut profiles = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(gazette_shared::constants::FOLLOW_LIST_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let mut stmt = self.conn().prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE uid IN ({placeholders})"
            ))?;

            let rows = stmt.query_map(
                rusqlite::params_from_iter(chunk.iter().map(|id| id.to_string())),
                row_to_user,
            )?;
            for row in rows {
                profiles.push(row?);
            }
        }
        Ok(profiles)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Update the mutable profile fields.
    ///
    /// Account-type changes go through
    /// [`update_account_type`](Database::update_account_type) instead, which
    /// also fans the new value out to the author's posts.
    pub fn update_profile(
        &self,
        uid: &UserId,
        display_name: &str,
        bio: &str,
        photo_url: Option<&str>,
    ) -> Result<UserProfile> {
        let affected = self.conn().execute(
            "UPDATE users SET display_name = ?1, bio = ?2, photo_url = ?3 WHERE uid = ?4",
            params![display_name, bio, photo_url, uid.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        let profile = fetch_user(self.conn(), uid)?;
        self.feed().publish(crate::StoreEvent::ProfileUpdated { uid: *uid });
        Ok(profile)
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Persist a new session token for `uid`.
    pub fn create_session(&self, uid: &UserId, token: &str) -> Result<Session> {
        let session = Session {
            token: token.to_string(),
            uid: *uid,
            created_at: Utc::now(),
        };
        self.conn().execute(
            "INSERT INTO sessions (token, uid, created_at) VALUES (?1, ?2, ?3)",
            params![
                session.token,
                session.uid.to_string(),
                session.created_at.to_rfc3339(),
            ],
        )?;
        Ok(session)
    }

    /// Resolve a session token to the owning profile.
    pub fn session_user(&self, token: &str) -> Result<UserProfile> {
        let uid_str: String = self
            .conn()
            .query_row(
                "SELECT uid FROM sessions WHERE token = ?1",
                params![token],
                |row| row.get(0),
            )
            .map_err(not_found)?;

        let uid = UserId::parse(&uid_str)?;
        fetch_user(self.conn(), &uid)
    }

    /// Delete a session.  Returns `true` if a row was deleted; deleting an
    /// unknown token is a successful no-op.
    pub fn delete_session(&self, token: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers shared with the relationship manager
// ---------------------------------------------------------------------------

/// Fetch a profile on an explicit connection (usable inside a transaction).
pub(crate) fn fetch_user(conn: &Connection, uid: &UserId) -> Result<UserProfile> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE uid = ?1"),
        params![uid.to_string()],
        row_to_user,
    )
    .map_err(not_found)
}

/// Load one relationship-set column.  `NotFound` if the user is missing.
pub(crate) fn load_user_set(conn: &Connection, uid: &UserId, field: SetField) -> Result<IdSet> {
    let sql = match field {
        SetField::Followers => "SELECT followers FROM users WHERE uid = ?1",
        SetField::Following => "SELECT following FROM users WHERE uid = ?1",
        SetField::FollowRequests => "SELECT follow_requests FROM users WHERE uid = ?1",
    };
    let raw: String = conn
        .query_row(sql, params![uid.to_string()], |row| row.get(0))
        .map_err(not_found)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Store one relationship-set column.
pub(crate) fn store_user_set(
    conn: &Connection,
    uid: &UserId,
    field: SetField,
    set: &IdSet,
) -> Result<()> {
    let sql = match field {
        SetField::Followers => "UPDATE users SET followers = ?1 WHERE uid = ?2",
        SetField::Following => "UPDATE users SET following = ?1 WHERE uid = ?2",
        SetField::FollowRequests => "UPDATE users SET follow_requests = ?1 WHERE uid = ?2",
    };
    let affected = conn.execute(sql, params![serde_json::to_string(set)?, uid.to_string()])?;
    if affected == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

/// Map `QueryReturnedNoRows` to [`StoreError::NotFound`].
pub(crate) fn not_found(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}

/// Wrap a decode error for use inside a `rusqlite` row closure.
pub(crate) fn conversion(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

/// Parse an RFC-3339 timestamp column.
pub(crate) fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion(idx, e))
}

/// Parse a JSON relationship-set column.
pub(crate) fn parse_set(idx: usize, raw: &str) -> rusqlite::Result<IdSet> {
    serde_json::from_str(raw).map_err(|e| conversion(idx, e))
}

/// Map a `rusqlite::Row` to a [`UserProfile`].
///
/// This is the single place where a missing or unrecognized `account_type`
/// becomes `Public`.
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserProfile> {
    let uid_str: String = row.get(0)?;
    let email: String = row.get(1)?;
    let display_name: String = row.get(2)?;
    let photo_url: Option<String> = row.get(3)?;
    let bio: String = row.get(4)?;
    let account_type_str: Option<String> = row.get(5)?;
    let followers_raw: String = row.get(6)?;
    let following_raw: String = row.get(7)?;
    let requests_raw: String = row.get(8)?;
    let created_str: String = row.get(9)?;

    let uid = UserId::parse(&uid_str).map_err(|e| conversion(0, e))?;
    let account_type = AccountType::from_db(account_type_str.as_deref());

    Ok(UserProfile {
        uid,
        email,
        display_name,
        photo_url,
        bio,
        account_type,
        followers: parse_set(6, &followers_raw)?,
        following: parse_set(7, &following_raw)?,
        follow_requests: parse_set(8, &requests_raw)?,
        created_at: parse_ts(9, &created_str)?,
    })
}
