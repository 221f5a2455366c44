use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A stored user profile, keyed by the caller-supplied account uid.
///
/// Identity fields mirror whatever the frontend's auth provider reports at
/// sign-in; absent fields overwrite stored values with NULL on purpose, so a
/// user dropping their photo drops it here too.
#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)] // All fields populated by FromRow; some accessed only via route serialization
pub struct UserProfile {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    /// Refreshed server-side on every save.
    pub last_login: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
