/// Application name
pub const APP_NAME: &str = "Gazette";

/// Maximum uploaded image size in bytes (10 MiB)
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Maximum number of profiles scanned by a user search
pub const USER_SEARCH_SCAN_LIMIT: u32 = 100;

/// Maximum number of results returned by a user search
pub const USER_SEARCH_RESULT_LIMIT: usize = 10;

/// Chunk size for batched follower/following profile lookups
pub const FOLLOW_LIST_CHUNK: usize = 30;

/// Default page size when listing chat messages
pub const MESSAGE_PAGE_SIZE: u32 = 50;

/// Default number of notifications returned per listing
pub const NOTIFICATION_PAGE_SIZE: u32 = 50;

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LEN: usize = 6;

/// Password salt size in bytes
pub const PASSWORD_SALT_SIZE: usize = 16;

/// Session token size in bytes (hex-encoded on the wire)
pub const SESSION_TOKEN_SIZE: usize = 32;

/// Key derivation context for password hashing (BLAKE3)
pub const KDF_CONTEXT_PASSWORD: &str = "gazette-password-hash-v1";

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;
