use sqlx::PgPool;

use super::models::UserProfile;

/// Create or update a user profile in one statement.
///
/// Every save overwrites the identity fields with exactly what the caller
/// sent (NULL included) and refreshes last_login server-side. No retry: the
/// caller surfaces a failed save as-is.
pub async fn upsert_user_profile(
    pool: &PgPool,
    uid: &str,
    email: Option<&str>,
    display_name: Option<&str>,
    photo_url: Option<&str>,
) -> Result<UserProfile, sqlx::Error> {
    sqlx::query_as::<_, UserProfile>(
        "INSERT INTO user_profiles (uid, email, display_name, photo_url, last_login)
         VALUES ($1, $2, $3, $4, NOW())
         ON CONFLICT (uid) DO UPDATE
         SET email = EXCLUDED.email,
             display_name = EXCLUDED.display_name,
             photo_url = EXCLUDED.photo_url,
             last_login = NOW()
         RETURNING uid, email, display_name, photo_url, last_login, created_at",
    )
    .bind(uid)
    .bind(email)
    .bind(display_name)
    .bind(photo_url)
    .fetch_one(pool)
    .await
}
