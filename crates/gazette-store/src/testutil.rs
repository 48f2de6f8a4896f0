//! Shared fixtures for the store test suites.

use crate::database::Database;
use crate::models::UserProfile;

/// Open a fresh on-disk database in a temp directory.
pub(crate) fn open_test_db() -> (Database, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_at(&dir.path().join("test.db")).unwrap();
    (db, dir)
}

/// Create a user whose display name equals its email.
pub(crate) fn seed_user(db: &Database, email: &str) -> UserProfile {
    db.create_user(email, email, "00", "00").unwrap()
}
