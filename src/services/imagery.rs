//! Imagery platform client.
//!
//! Fetches point-sampled satellite scenes from the imagery aggregation
//! platform. One call returns every scene of a collection that covers the
//! requested point within a date range, already reduced to per-band values at
//! the sampling scale. The platform applies metadata filters (instrument
//! mode, polarisation) server-side; radiometric screening stays client-side.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::errors::AppError;

/// Sentinel-2 surface reflectance collection (optical).
pub const OPTICAL_COLLECTION: &str = "sentinel2-l2a";
/// Sentinel-1 ground-range-detected collection (radar).
pub const RADAR_COLLECTION: &str = "sentinel1-grd";

/// Ground resolution (metres) of the point-sampling reducer.
const SAMPLE_SCALE_M: f64 = 10.0;

/// A WGS84 ground point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

/// Client for the imagery platform's scene-sampling API.
#[derive(Debug, Clone)]
pub struct ImageryClient {
    client: reqwest::Client,
    base_url: String,
    project: String,
}

/// A scene-sampling request, built up filter by filter and executed through
/// the client's explicit fetch methods.
#[derive(Debug, Clone)]
pub struct SceneQuery {
    collection: String,
    point: GeoPoint,
    /// Acquisition window, `[start, end)`.
    start: NaiveDate,
    end: NaiveDate,
    scale_m: f64,
    instrument_mode: Option<String>,
    polarisations: Vec<String>,
}

impl SceneQuery {
    pub fn new(collection: &str, point: GeoPoint, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            collection: collection.to_string(),
            point,
            start,
            end,
            scale_m: SAMPLE_SCALE_M,
            instrument_mode: None,
            polarisations: Vec::new(),
        }
    }

    /// Restrict to scenes acquired in the given instrument mode.
    pub fn instrument_mode(mut self, mode: &str) -> Self {
        self.instrument_mode = Some(mode.to_string());
        self
    }

    /// Require the given polarisation; may be called once per polarisation.
    pub fn polarisation(mut self, pol: &str) -> Self {
        self.polarisations.push(pol.to_string());
        self
    }

    fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("lon", self.point.lon.to_string()),
            ("lat", self.point.lat.to_string()),
            ("start", self.start.to_string()),
            ("end", self.end.to_string()),
            ("scale", format!("{}", self.scale_m)),
        ];
        if let Some(mode) = &self.instrument_mode {
            params.push(("mode", mode.clone()));
        }
        for pol in &self.polarisations {
            params.push(("polarisation", pol.clone()));
        }
        params
    }
}

// --- Imagery platform JSON response types ---

#[derive(Debug, Deserialize)]
struct OpticalSceneList {
    scenes: Vec<OpticalScene>,
}

/// One point-sampled optical scene.
#[derive(Debug, Clone, Deserialize)]
pub struct OpticalScene {
    pub bands: OpticalBands,
}

/// Raw optical band values at the sampled point.
///
/// Every band is nullable: off-footprint pixels, detector gaps, and bands the
/// platform could not resolve all arrive as `null` and must not abort the
/// request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpticalBands {
    /// Cloud bitmask (bit 10 opaque cloud, bit 11 cirrus).
    #[serde(rename = "QA60")]
    pub qa60: Option<u16>,
    /// Scene classification code.
    #[serde(rename = "SCL")]
    pub scl: Option<u8>,
    /// Blue, raw reflectance (scaled integers).
    #[serde(rename = "B2")]
    pub b2: Option<f64>,
    /// Green.
    #[serde(rename = "B3")]
    pub b3: Option<f64>,
    /// Red.
    #[serde(rename = "B4")]
    pub b4: Option<f64>,
    /// Near-infrared.
    #[serde(rename = "B8")]
    pub b8: Option<f64>,
    /// Short-wave infrared.
    #[serde(rename = "B11")]
    pub b11: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RadarSceneList {
    scenes: Vec<RadarScene>,
}

/// One point-sampled radar scene.
#[derive(Debug, Clone, Deserialize)]
pub struct RadarScene {
    pub bands: RadarBands,
}

/// Radar backscatter (dB) at the sampled point, nullable like the optical
/// bands.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RadarBands {
    #[serde(rename = "VV")]
    pub vv: Option<f64>,
    #[serde(rename = "VH")]
    pub vh: Option<f64>,
}

impl ImageryClient {
    pub fn new(base_url: &str, project: &str) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            project: project.to_string(),
        }
    }

    /// Execute a query against an optical collection.
    pub async fn fetch_optical_scenes(
        &self,
        query: &SceneQuery,
    ) -> Result<Vec<OpticalScene>, AppError> {
        let list: OpticalSceneList = self.fetch_scene_list(query).await?;
        Ok(list.scenes)
    }

    /// Execute a query against a radar collection.
    pub async fn fetch_radar_scenes(
        &self,
        query: &SceneQuery,
    ) -> Result<Vec<RadarScene>, AppError> {
        let list: RadarSceneList = self.fetch_scene_list(query).await?;
        Ok(list.scenes)
    }

    async fn fetch_scene_list<T: serde::de::DeserializeOwned>(
        &self,
        query: &SceneQuery,
    ) -> Result<T, AppError> {
        let url = format!(
            "{}/v1/projects/{}/collections/{}/samples",
            self.base_url, self.project, query.collection
        );

        let response = self
            .client
            .get(&url)
            .query(&query.query_params())
            .send()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("imagery request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "imagery platform returned HTTP {}",
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("imagery JSON parse error: {}", e)))
    }
}
