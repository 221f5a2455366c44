//! Twelve-month multi-sensor time-series assembly.
//!
//! Builds the model's input series for one ground point: a fixed grid of
//! 12 monthly composites × 10 channels (2 radar + 5 optical bands + 3
//! indices), flattened month-major. Gaps survive as `None` all the way to
//! the normalizer — a cloudy month must degrade the input, never the
//! request.

use chrono::NaiveDate;

use crate::errors::AppError;
use crate::helpers;
use crate::services::imagery::{
    GeoPoint, ImageryClient, SceneQuery, OPTICAL_COLLECTION, RADAR_COLLECTION,
};
use crate::services::spectral::{self, OpticalObservation};

/// Months in one input series.
pub const MONTHS_PER_SERIES: usize = 12;
/// Channels per monthly composite.
pub const CHANNELS_PER_MONTH: usize = 10;
/// Flattened model input length.
pub const FEATURE_LEN: usize = MONTHS_PER_SERIES * CHANNELS_PER_MONTH;

/// Growing seasons are anchored at June: windows run June 1 of the start
/// year through June 1 of the following year.
const SEASON_START_MONTH: u32 = 6;

/// Season used when the request's year string cannot be parsed.
pub const DEFAULT_START_YEAR: i32 = 2020;
/// Year-range label matching `DEFAULT_START_YEAR`.
pub const DEFAULT_YEAR_RANGE: &str = "2020-2021";

/// Sentinel-1 acquisition mode required for comparable backscatter.
const RADAR_INSTRUMENT_MODE: &str = "IW";

/// Channel offsets of the derived indices within each month block.
pub const NDVI_OFFSET: usize = 7;
pub const NDWI_OFFSET: usize = 8;
pub const BSI_OFFSET: usize = 9;

/// A `[start, end)` acquisition window covering one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl MonthWindow {
    /// Chart label for this month, e.g. "2020-06".
    pub fn label(&self) -> String {
        self.start.format("%Y-%m").to_string()
    }
}

/// Parse the leading start year of a "YYYY-YYYY" season string.
///
/// Malformed or implausible input falls back to `DEFAULT_START_YEAR` with a
/// warning; a bad year degrades the window choice, never the request.
pub fn parse_start_year(year: &str) -> i32 {
    let parsed = year
        .split('-')
        .next()
        .map(str::trim)
        .and_then(|y| y.parse::<i32>().ok())
        .filter(|y| (1900..=2100).contains(y));

    match parsed {
        Some(y) => y,
        None => {
            tracing::warn!(
                "Could not parse start year from '{}', defaulting to {}",
                year,
                DEFAULT_START_YEAR
            );
            DEFAULT_START_YEAR
        }
    }
}

/// The 12 consecutive month windows of one growing season.
pub fn season_windows(start_year: i32) -> Vec<MonthWindow> {
    let mut boundaries = Vec::with_capacity(MONTHS_PER_SERIES + 1);
    let mut year = start_year;
    let mut month = SEASON_START_MONTH;
    for _ in 0..=MONTHS_PER_SERIES {
        boundaries.push(first_of_month(year, month));
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }

    boundaries
        .windows(2)
        .map(|pair| MonthWindow {
            start: pair[0],
            end: pair[1],
        })
        .collect()
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    // Years are clamped to 1900..=2100 before we get here.
    NaiveDate::from_ymd_opt(year, month, 1).expect("first of month is a valid date")
}

/// One month's composited observation across both sensors.
///
/// Each channel is the median of the channel's valid per-scene values within
/// the window; a channel with no valid value stays `None`. `Default` is the
/// fully missing month.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlyObservation {
    pub vh: Option<f64>,
    pub vv: Option<f64>,
    pub b2: Option<f64>,
    pub b3: Option<f64>,
    pub b4: Option<f64>,
    pub b8: Option<f64>,
    pub b11: Option<f64>,
    pub ndvi: Option<f64>,
    pub ndwi: Option<f64>,
    pub bsi: Option<f64>,
}

impl MonthlyObservation {
    /// Channels in the order the model was trained on:
    /// [VH, VV, B2, B3, B4, B8, B11, NDVI, NDWI, BSI].
    /// Reordering these silently invalidates every prediction.
    pub fn channels(&self) -> [Option<f64>; CHANNELS_PER_MONTH] {
        [
            self.vh, self.vv, self.b2, self.b3, self.b4, self.b8, self.b11, self.ndvi, self.ndwi,
            self.bsi,
        ]
    }
}

/// A fully assembled input series: `FEATURE_LEN` ordered slots plus the
/// month labels for charting.
#[derive(Debug, Clone)]
pub struct FeatureSeries {
    pub values: Vec<Option<f64>>,
    pub months: Vec<String>,
}

/// Per-month values of one channel: every `CHANNELS_PER_MONTH`-th slot
/// starting at `offset`.
pub fn index_series(values: &[Option<f64>], offset: usize) -> Vec<Option<f64>> {
    values
        .iter()
        .skip(offset)
        .step_by(CHANNELS_PER_MONTH)
        .copied()
        .collect()
}

/// Composite one month at one point.
///
/// `Ok` with all-missing channels means the month genuinely had no usable
/// observations; `Err` means a query failed and the caller decides how to
/// degrade.
pub async fn extract_month(
    client: &ImageryClient,
    point: GeoPoint,
    window: MonthWindow,
) -> Result<MonthlyObservation, AppError> {
    let optical_query = SceneQuery::new(OPTICAL_COLLECTION, point, window.start, window.end);
    let optical_scenes = client.fetch_optical_scenes(&optical_query).await?;
    let optical: Vec<OpticalObservation> = optical_scenes
        .iter()
        .filter_map(|scene| spectral::screen_clouds(&scene.bands))
        .map(|surface| spectral::derive_indices(&surface))
        .collect();

    let radar_query = SceneQuery::new(RADAR_COLLECTION, point, window.start, window.end)
        .instrument_mode(RADAR_INSTRUMENT_MODE)
        .polarisation("VV")
        .polarisation("VH");
    let radar = client.fetch_radar_scenes(&radar_query).await?;

    tracing::debug!(
        "Month {}: {} optical scenes ({} clear), {} radar scenes",
        window.label(),
        optical_scenes.len(),
        optical.len(),
        radar.len()
    );

    Ok(MonthlyObservation {
        vh: helpers::median(radar.iter().filter_map(|s| s.bands.vh).collect()),
        vv: helpers::median(radar.iter().filter_map(|s| s.bands.vv).collect()),
        b2: helpers::median(optical.iter().filter_map(|o| o.b2).collect()),
        b3: helpers::median(optical.iter().filter_map(|o| o.b3).collect()),
        b4: helpers::median(optical.iter().filter_map(|o| o.b4).collect()),
        b8: helpers::median(optical.iter().filter_map(|o| o.b8).collect()),
        b11: helpers::median(optical.iter().filter_map(|o| o.b11).collect()),
        ndvi: helpers::median(optical.iter().filter_map(|o| o.ndvi).collect()),
        ndwi: helpers::median(optical.iter().filter_map(|o| o.ndwi).collect()),
        bsi: helpers::median(optical.iter().filter_map(|o| o.bsi).collect()),
    })
}

/// Assemble the full season series for one point.
///
/// Months are fetched sequentially and a failed month is substituted with an
/// all-missing composite after a warning, so the result always holds exactly
/// `FEATURE_LEN` slots and `MONTHS_PER_SERIES` labels.
pub async fn assemble_series(client: &ImageryClient, point: GeoPoint, year: &str) -> FeatureSeries {
    let start_year = parse_start_year(year);
    let windows = season_windows(start_year);

    let mut values = Vec::with_capacity(FEATURE_LEN);
    let mut months = Vec::with_capacity(MONTHS_PER_SERIES);

    for window in windows {
        let label = window.label();
        let observation = match extract_month(client, point, window).await {
            Ok(obs) => obs,
            Err(e) => {
                tracing::warn!("Extraction failed for month {}: {}", label, e);
                MonthlyObservation::default()
            }
        };
        values.extend(observation.channels());
        months.push(label);
    }

    FeatureSeries { values, months }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_start_year_season_range() {
        assert_eq!(parse_start_year("2020-2021"), 2020);
        assert_eq!(parse_start_year("2018-2019"), 2018);
    }

    #[test]
    fn test_parse_start_year_bare_year() {
        assert_eq!(parse_start_year("2019"), 2019);
    }

    #[test]
    fn test_parse_start_year_malformed_defaults() {
        assert_eq!(parse_start_year("twenty-twenty"), DEFAULT_START_YEAR);
        assert_eq!(parse_start_year(""), DEFAULT_START_YEAR);
        assert_eq!(parse_start_year("-2021"), DEFAULT_START_YEAR);
    }

    #[test]
    fn test_parse_start_year_implausible_defaults() {
        assert_eq!(parse_start_year("999999-x"), DEFAULT_START_YEAR);
        assert_eq!(parse_start_year("1500-1501"), DEFAULT_START_YEAR);
    }

    #[test]
    fn test_season_windows_shape() {
        let windows = season_windows(2020);
        assert_eq!(windows.len(), MONTHS_PER_SERIES);
        assert_eq!(
            windows[0].start,
            NaiveDate::from_ymd_opt(2020, 6, 1).unwrap()
        );
        assert_eq!(windows[0].end, NaiveDate::from_ymd_opt(2020, 7, 1).unwrap());
        assert_eq!(
            windows[11].start,
            NaiveDate::from_ymd_opt(2021, 5, 1).unwrap()
        );
        assert_eq!(
            windows[11].end,
            NaiveDate::from_ymd_opt(2021, 6, 1).unwrap()
        );
    }

    #[test]
    fn test_season_windows_year_rollover() {
        let windows = season_windows(2020);
        // December window crosses into January of the next year
        assert_eq!(
            windows[6].start,
            NaiveDate::from_ymd_opt(2020, 12, 1).unwrap()
        );
        assert_eq!(windows[6].end, NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
    }

    #[test]
    fn test_season_windows_are_contiguous() {
        let windows = season_windows(2019);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_month_window_label() {
        let windows = season_windows(2020);
        assert_eq!(windows[0].label(), "2020-06");
        assert_eq!(windows[7].label(), "2021-01");
        assert_eq!(windows[11].label(), "2021-05");
    }

    #[test]
    fn test_channels_order() {
        let obs = MonthlyObservation {
            vh: Some(0.0),
            vv: Some(1.0),
            b2: Some(2.0),
            b3: Some(3.0),
            b4: Some(4.0),
            b8: Some(5.0),
            b11: Some(6.0),
            ndvi: Some(7.0),
            ndwi: Some(8.0),
            bsi: Some(9.0),
        };
        let channels = obs.channels();
        for (i, value) in channels.iter().enumerate() {
            assert_eq!(*value, Some(i as f64));
        }
    }

    #[test]
    fn test_index_series_offsets() {
        // Two months of channels, values encode month*100 + channel
        let mut values = Vec::new();
        for month in 0..2 {
            for channel in 0..CHANNELS_PER_MONTH {
                values.push(Some((month * 100 + channel) as f64));
            }
        }

        assert_eq!(
            index_series(&values, NDVI_OFFSET),
            vec![Some(7.0), Some(107.0)]
        );
        assert_eq!(
            index_series(&values, NDWI_OFFSET),
            vec![Some(8.0), Some(108.0)]
        );
        assert_eq!(
            index_series(&values, BSI_OFFSET),
            vec![Some(9.0), Some(109.0)]
        );
    }

    fn june_2020() -> MonthWindow {
        MonthWindow {
            start: NaiveDate::from_ymd_opt(2020, 6, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2020, 7, 1).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_extract_month_composites_medians() {
        let server = MockServer::start().await;

        // Two clear scenes plus one cloudy scene that must be screened out.
        Mock::given(method("GET"))
            .and(path(
                "/v1/projects/agrovision/collections/sentinel2-l2a/samples",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "scenes": [
                    { "id": "a", "bands": { "QA60": 0, "SCL": 4,
                        "B2": 400.0, "B3": 600.0, "B4": 800.0, "B8": 3000.0, "B11": 1500.0 } },
                    { "id": "b", "bands": { "QA60": 0, "SCL": 5,
                        "B2": 600.0, "B3": 800.0, "B4": 1000.0, "B8": 2600.0, "B11": 1700.0 } },
                    { "id": "c", "bands": { "QA60": 1024, "SCL": 8,
                        "B2": 9000.0, "B3": 9000.0, "B4": 9000.0, "B8": 9000.0, "B11": 9000.0 } }
                ]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(
                "/v1/projects/agrovision/collections/sentinel1-grd/samples",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "scenes": [
                    { "id": "r1", "bands": { "VV": -11.0, "VH": -17.0 } },
                    { "id": "r2", "bands": { "VV": -12.5, "VH": -18.5 } }
                ]
            })))
            .mount(&server)
            .await;

        let client = ImageryClient::new(&server.uri(), "agrovision");
        let point = GeoPoint {
            lon: 77.59,
            lat: 12.97,
        };

        let obs = extract_month(&client, point, june_2020()).await.unwrap();

        // Even count: medians average the two clear scenes
        assert!((obs.b2.unwrap() - 0.05).abs() < 1e-9);
        assert!((obs.b8.unwrap() - 0.28).abs() < 1e-9);
        assert!((obs.vv.unwrap() - (-11.75)).abs() < 1e-9);
        assert!((obs.vh.unwrap() - (-17.75)).abs() < 1e-9);

        let ndvi_a = (0.3 - 0.08) / (0.3 + 0.08);
        let ndvi_b = (0.26 - 0.10) / (0.26 + 0.10);
        assert!((obs.ndvi.unwrap() - (ndvi_a + ndvi_b) / 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_extract_month_no_scenes_is_ok_all_missing() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "scenes": [] })),
            )
            .mount(&server)
            .await;

        let client = ImageryClient::new(&server.uri(), "agrovision");
        let point = GeoPoint { lon: 8.5, lat: 47.4 };

        let obs = extract_month(&client, point, june_2020()).await.unwrap();
        assert_eq!(obs, MonthlyObservation::default());
    }

    #[tokio::test]
    async fn test_extract_month_platform_failure_is_err() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ImageryClient::new(&server.uri(), "agrovision");
        let point = GeoPoint { lon: 8.5, lat: 47.4 };

        let result = extract_month(&client, point, june_2020()).await;
        assert!(matches!(result, Err(AppError::ExternalServiceError(_))));
    }

    #[tokio::test]
    async fn test_assemble_series_full_shape_on_empty_months() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "scenes": [] })),
            )
            .mount(&server)
            .await;

        let client = ImageryClient::new(&server.uri(), "agrovision");
        let point = GeoPoint {
            lon: 77.59,
            lat: 12.97,
        };

        let series = assemble_series(&client, point, "2020-2021").await;
        assert_eq!(series.values.len(), FEATURE_LEN);
        assert_eq!(series.months.len(), MONTHS_PER_SERIES);
        assert_eq!(series.months[0], "2020-06");
        assert_eq!(series.months[11], "2021-05");
        assert!(series.values.iter().all(|v| v.is_none()));
    }

    #[tokio::test]
    async fn test_assemble_series_degrades_on_platform_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = ImageryClient::new(&server.uri(), "agrovision");
        let point = GeoPoint {
            lon: 77.59,
            lat: 12.97,
        };

        // Every month fails, yet the series still has its full shape.
        let series = assemble_series(&client, point, "2020-2021").await;
        assert_eq!(series.values.len(), FEATURE_LEN);
        assert_eq!(series.months.len(), MONTHS_PER_SERIES);
        assert!(series.values.iter().all(|v| v.is_none()));
    }

    #[tokio::test]
    async fn test_assemble_series_places_month_data_at_right_offset() {
        let server = MockServer::start().await;

        // June gets one clear optical scene; every other request sees no scenes.
        Mock::given(method("GET"))
            .and(path(
                "/v1/projects/agrovision/collections/sentinel2-l2a/samples",
            ))
            .and(query_param("start", "2020-06-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "scenes": [
                    { "id": "a", "bands": { "QA60": 0, "SCL": 4,
                        "B2": 400.0, "B3": 600.0, "B4": 800.0, "B8": 3000.0, "B11": 1500.0 } }
                ]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "scenes": [] })),
            )
            .mount(&server)
            .await;

        let client = ImageryClient::new(&server.uri(), "agrovision");
        let point = GeoPoint {
            lon: 77.59,
            lat: 12.97,
        };

        let series = assemble_series(&client, point, "2020-2021").await;

        // Radar channels of June missing, optical present
        assert_eq!(series.values[0], None); // VH
        assert_eq!(series.values[1], None); // VV
        assert!((series.values[2].unwrap() - 0.04).abs() < 1e-9); // B2
        assert!((series.values[6].unwrap() - 0.15).abs() < 1e-9); // B11

        // July onwards fully missing
        assert!(series.values[CHANNELS_PER_MONTH..].iter().all(|v| v.is_none()));
    }
}
