//! Final label decision from model probability and index statistics.
//!
//! The classifier only separates crop from non-crop. Non-crop ground gets a
//! coarse sub-classification from season-mean spectral indices: standing
//! water shows a high NDWI mean, bare soil a high BSI mean, and whatever
//! matches neither is reported as built-up/other.

use crate::helpers::mean_ignoring_missing;

/// Crop decision threshold on the raw model probability (strict greater-than).
pub const PREDICTION_THRESHOLD: f64 = 0.4;
/// Season-mean NDWI above which non-crop ground is called water.
pub const WATER_MEAN_THRESHOLD: f64 = 0.1;
/// Season-mean BSI above which non-crop ground is called barren soil.
pub const BARE_SOIL_MEAN_THRESHOLD: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryLabel {
    Crop,
    NonCrop,
}

/// User-facing label, reported verbatim in the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayLabel {
    Crop,
    Water,
    BarrenSoil,
    BuiltUp,
}

impl DisplayLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayLabel::Crop => "CROP",
            DisplayLabel::Water => "NON-CROP (Identified as Water)",
            DisplayLabel::BarrenSoil => "NON-CROP (Identified as Barren Soil)",
            DisplayLabel::BuiltUp => "NON-CROP (Identified as Built-up/Other)",
        }
    }
}

/// The complete outcome of the decision policy for one prediction.
#[derive(Debug, Clone)]
pub struct Decision {
    pub binary: BinaryLabel,
    /// Probability of the chosen side: `p` for crop, `1 - p` for non-crop.
    pub confidence: f64,
    pub label: DisplayLabel,
    /// Season mean of the NDWI channel, `None` when every month is missing.
    pub ndwi_mean: Option<f64>,
    /// Season mean of the BSI channel.
    pub bsi_mean: Option<f64>,
}

/// Apply the layered decision policy.
///
/// Water is checked before bare soil on purpose: flooded fields satisfy both
/// index thresholds and must be reported as water. An undefined mean (all
/// twelve months missing) satisfies neither threshold.
pub fn classify(
    probability: f64,
    ndwi_series: &[Option<f64>],
    bsi_series: &[Option<f64>],
) -> Decision {
    let binary = if probability > PREDICTION_THRESHOLD {
        BinaryLabel::Crop
    } else {
        BinaryLabel::NonCrop
    };
    let confidence = match binary {
        BinaryLabel::Crop => probability,
        BinaryLabel::NonCrop => 1.0 - probability,
    };

    let ndwi_mean = mean_ignoring_missing(ndwi_series);
    let bsi_mean = mean_ignoring_missing(bsi_series);

    let label = match binary {
        BinaryLabel::Crop => DisplayLabel::Crop,
        BinaryLabel::NonCrop => {
            if ndwi_mean.is_some_and(|m| m > WATER_MEAN_THRESHOLD) {
                DisplayLabel::Water
            } else if bsi_mean.is_some_and(|m| m > BARE_SOIL_MEAN_THRESHOLD) {
                DisplayLabel::BarrenSoil
            } else {
                DisplayLabel::BuiltUp
            }
        }
    };

    Decision {
        binary,
        confidence,
        label,
        ndwi_mean,
        bsi_mean,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_series() -> Vec<Option<f64>> {
        vec![None; 12]
    }

    fn flat_series(value: f64) -> Vec<Option<f64>> {
        vec![Some(value); 12]
    }

    #[test]
    fn test_high_probability_is_crop() {
        let decision = classify(0.9, &no_series(), &no_series());
        assert_eq!(decision.binary, BinaryLabel::Crop);
        assert_eq!(decision.label, DisplayLabel::Crop);
        assert_eq!(decision.label.as_str(), "CROP");
        assert!((decision.confidence - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_is_strict() {
        // Exactly at the threshold stays non-crop
        let decision = classify(0.4, &no_series(), &no_series());
        assert_eq!(decision.binary, BinaryLabel::NonCrop);
        assert!((decision.confidence - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_low_probability_confidence_is_complement() {
        let decision = classify(0.1, &no_series(), &no_series());
        assert_eq!(decision.binary, BinaryLabel::NonCrop);
        assert!((decision.confidence - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_water_wins_over_bare_soil() {
        // Both means above their thresholds: water takes precedence
        let decision = classify(0.2, &flat_series(0.3), &flat_series(0.2));
        assert_eq!(decision.label, DisplayLabel::Water);
        assert_eq!(
            decision.label.as_str(),
            "NON-CROP (Identified as Water)"
        );
    }

    #[test]
    fn test_bare_soil_when_not_water() {
        let decision = classify(0.2, &flat_series(0.05), &flat_series(0.2));
        assert_eq!(decision.label, DisplayLabel::BarrenSoil);
    }

    #[test]
    fn test_water_threshold_is_strict() {
        // Mean exactly 0.1 is not water; BSI mean below threshold → built-up
        let decision = classify(0.2, &flat_series(0.1), &flat_series(0.0));
        assert_eq!(decision.label, DisplayLabel::BuiltUp);
    }

    #[test]
    fn test_undefined_means_fall_through_to_built_up() {
        let decision = classify(0.2, &no_series(), &no_series());
        assert_eq!(decision.label, DisplayLabel::BuiltUp);
        assert_eq!(decision.ndwi_mean, None);
        assert_eq!(decision.bsi_mean, None);
        assert!(decision.confidence >= 0.5);
    }

    #[test]
    fn test_crop_skips_sub_classification() {
        // Even a watery index profile stays CROP when the model says crop
        let decision = classify(0.95, &flat_series(0.5), &flat_series(0.5));
        assert_eq!(decision.label, DisplayLabel::Crop);
    }

    #[test]
    fn test_means_skip_missing_months() {
        let mut ndwi = no_series();
        ndwi[2] = Some(0.4);
        ndwi[9] = Some(0.2);
        let decision = classify(0.2, &ndwi, &no_series());
        assert!((decision.ndwi_mean.unwrap() - 0.3).abs() < 1e-12);
        assert_eq!(decision.label, DisplayLabel::Water);
    }
}
