pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: i64 = 3000;
pub const DEFAULT_RUST_LOG: &str = "info,tower_http=info";
pub const DEFAULT_DB_MAX_CONNECTIONS: i64 = 10;
pub const DEFAULT_DB_MIN_IDLE: i64 = 2;
pub const DEFAULT_REQUIRE_APPROVAL: bool = true;
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 15 * 60;
pub const DEFAULT_REFRESH_TTL_DAYS: i64 = 30;
pub const DEFAULT_STORAGE_REGION: &str = "us-east-1";
pub const DEFAULT_STORAGE_BUCKET: &str = "avatars";
pub const DEFAULT_PRESIGN_TTL_SECS: i64 = 15 * 60;
pub const DEFAULT_MAX_AVATAR_BYTES: i64 = 5 * 1024 * 1024;
