//! Prediction HTTP endpoint.
//!
//! - POST /predict_live — run the full pipeline for one point: assemble the
//!   12-month series, normalize, infer, decide, report.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::errors::{AppError, ErrorResponse};
use crate::services::decision::{self, PREDICTION_THRESHOLD};
use crate::services::imagery::{GeoPoint, ImageryClient};
use crate::services::inference::{prepare_model_input, CropClassifier, FeatureScaler};
use crate::services::timeseries::{
    assemble_series, index_series, BSI_OFFSET, DEFAULT_YEAR_RANGE, NDVI_OFFSET, NDWI_OFFSET,
};

/// Shared application state, constructed once at startup.
///
/// Artifact slots are `Option`: a failed load at startup leaves the process
/// serving and the dependent endpoint answering 500.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) imagery: ImageryClient,
    pub(crate) model: Option<Arc<CropClassifier>>,
    pub(crate) scaler: Option<Arc<FeatureScaler>>,
    pub(crate) profiles: Option<sqlx::PgPool>,
    /// Serializes live predictions: one request at a time drives the imagery
    /// platform and the model.
    pub(crate) predict_gate: Arc<tokio::sync::Mutex<()>>,
    pub(crate) model_version: String,
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Prediction request body.
///
/// All fields are modeled as `Option` so presence is validated by hand and a
/// missing coordinate produces this API's JSON error, not a framework
/// rejection.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PredictRequest {
    /// Latitude in decimal degrees (WGS84)
    pub lat: Option<f64>,
    /// Longitude in decimal degrees (WGS84)
    pub lon: Option<f64>,
    /// Season to analyse, e.g. "2020-2021". Defaults to the model's
    /// reference season when absent.
    pub year: Option<String>,
}

/// Report metadata echoed back with every prediction.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReportDetails {
    /// Model version plus the season the data was drawn from,
    /// e.g. "v2.1 (Data: 2020-2021)"
    pub model_version: String,
    /// Decision threshold applied to the raw probability
    pub prediction_threshold: f64,
}

/// The analysed point, echoed back from the request.
#[derive(Debug, Serialize, ToSchema)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Monthly index series for the frontend charts. A null entry is a month
/// without a usable observation and renders as a gap.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChartData {
    /// Month labels, "YYYY-MM", season order
    pub months: Vec<String>,
    pub ndvi_values: Vec<Option<f64>>,
    pub ndwi_values: Vec<Option<f64>>,
    pub bsi_values: Vec<Option<f64>>,
}

/// Season-mean index statistics backing the non-crop sub-classification.
/// Null when every month of the channel was missing.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubclassMetrics {
    pub ndwi_mean: Option<f64>,
    pub bsi_mean: Option<f64>,
}

/// Full prediction report.
#[derive(Debug, Serialize, ToSchema)]
pub struct PredictResponse {
    pub report_details: ReportDetails,
    pub coordinates: Coordinates,
    /// Display label, e.g. "CROP" or "NON-CROP (Identified as Water)"
    pub prediction_label: String,
    /// Raw model probability of crop, before thresholding
    pub raw_probability_crop: f64,
    /// Confidence of the reported label, formatted as "NN.NN%"
    pub confidence: String,
    pub chart_data: ChartData,
    pub subclass_metrics: SubclassMetrics,
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Run a live prediction for one ground point.
///
/// Assembles a June-to-May multi-sensor series from the imagery platform,
/// normalizes it with the trained scaler, runs the classifier and applies
/// the layered decision policy. Months without usable observations degrade
/// to gaps instead of failing the request.
#[utoipa::path(
    post,
    path = "/predict_live",
    tag = "Prediction",
    request_body = PredictRequest,
    responses(
        (status = 200, description = "Prediction report with chart data", body = PredictResponse),
        (status = 400, description = "Missing 'lat' or 'lon' in request body", body = ErrorResponse),
        (status = 500, description = "Model not loaded, or the pipeline failed", body = ErrorResponse),
    )
)]
pub async fn predict_live(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, AppError> {
    // Validate the body before touching any backend — a malformed request
    // must never reach the imagery platform.
    let (lat, lon) = match (request.lat, request.lon) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => {
            return Err(AppError::BadRequest(
                "Missing 'lat' or 'lon' in request body".to_string(),
            ))
        }
    };

    let model = state
        .model
        .as_ref()
        .ok_or_else(|| AppError::NotReady("Model is not loaded".to_string()))?;
    let scaler = state
        .scaler
        .as_ref()
        .ok_or_else(|| AppError::NotReady("Feature scaler is not loaded".to_string()))?;

    let year = request
        .year
        .unwrap_or_else(|| DEFAULT_YEAR_RANGE.to_string());
    let point = GeoPoint { lon, lat };

    tracing::info!(
        "Prediction requested for ({}, {}), season {}",
        lat,
        lon,
        year
    );

    // One live prediction at a time; the gate covers assembly and inference.
    let _gate = state.predict_gate.lock().await;

    let series = assemble_series(&state.imagery, point, &year).await;
    let input = prepare_model_input(&series.values, scaler)?;
    let probability = model.predict_probability(&input)?;

    let ndvi_values = index_series(&series.values, NDVI_OFFSET);
    let ndwi_values = index_series(&series.values, NDWI_OFFSET);
    let bsi_values = index_series(&series.values, BSI_OFFSET);

    let decision = decision::classify(probability, &ndwi_values, &bsi_values);

    tracing::info!(
        "Prediction for ({}, {}): {} (p = {:.4})",
        lat,
        lon,
        decision.label.as_str(),
        probability
    );

    Ok(Json(PredictResponse {
        report_details: ReportDetails {
            model_version: format!("{} (Data: {})", state.model_version, year),
            prediction_threshold: PREDICTION_THRESHOLD,
        },
        coordinates: Coordinates { lat, lon },
        prediction_label: decision.label.as_str().to_string(),
        raw_probability_crop: probability,
        confidence: format!("{:.2}%", decision.confidence * 100.0),
        chart_data: ChartData {
            months: series.months,
            ndvi_values,
            ndwi_values,
            bsi_values,
        },
        subclass_metrics: SubclassMetrics {
            ndwi_mean: decision.ndwi_mean,
            bsi_mean: decision.bsi_mean,
        },
    }))
}
