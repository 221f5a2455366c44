//! Liveness endpoint.

/// Plaintext liveness banner on the service root.
///
/// No backend checks: the banner answers even when the model, scaler or
/// profile store failed to load, so a deployment can be probed before its
/// artifacts are in place.
#[utoipa::path(
    get,
    path = "/",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up", body = String),
    )
)]
pub async fn liveness() -> &'static str {
    "Crop prediction service is running. Use /predict_live and /save_user."
}
