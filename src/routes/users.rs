//! User profile HTTP endpoint.
//!
//! - POST /save_user — upsert the caller's profile after a frontend sign-in

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::queries;
use crate::errors::{AppError, ErrorResponse};
use crate::routes::predict::AppState;

/// Profile save request. Wire names are camelCase because the frontend
/// forwards its auth provider's payload untouched.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SaveUserRequest {
    /// Account uid; required and non-empty
    pub uid: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SaveUserResponse {
    pub status: String,
    pub uid: String,
}

/// Create or update the caller's profile.
///
/// One upsert, no retry: identity fields are overwritten with exactly what
/// was sent (absent fields clear stored values) and the login timestamp is
/// refreshed server-side.
#[utoipa::path(
    post,
    path = "/save_user",
    tag = "Users",
    request_body = SaveUserRequest,
    responses(
        (status = 201, description = "Profile created or updated", body = SaveUserResponse),
        (status = 400, description = "Missing 'uid' in request body", body = ErrorResponse),
        (status = 500, description = "Profile store unavailable or save failed", body = ErrorResponse),
    )
)]
pub async fn save_user(
    State(state): State<AppState>,
    Json(request): Json<SaveUserRequest>,
) -> Result<(StatusCode, Json<SaveUserResponse>), AppError> {
    let uid = request
        .uid
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing 'uid' in request body".to_string()))?;

    let pool = state
        .profiles
        .as_ref()
        .ok_or_else(|| AppError::NotReady("User profile store is not initialized".to_string()))?;

    let profile = queries::upsert_user_profile(
        pool,
        &uid,
        request.email.as_deref(),
        request.display_name.as_deref(),
        request.photo_url.as_deref(),
    )
    .await?;

    tracing::info!("Saved profile for uid {}", profile.uid);

    Ok((
        StatusCode::CREATED,
        Json(SaveUserResponse {
            status: "success".to_string(),
            uid: profile.uid,
        }),
    ))
}
