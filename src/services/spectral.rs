//! Optical scene screening and spectral index derivation.
//!
//! Pure per-scene math: no I/O. A raw optical sample either survives cloud
//! screening as scaled surface reflectance or is discarded whole; surviving
//! scenes get three derived indices appended (NDVI, NDWI, BSI). Individual
//! band gaps stay `None` and flow through untouched.

use crate::services::imagery::OpticalBands;

/// Divisor converting raw reflectance integers to [0, 1] surface reflectance.
pub const REFLECTANCE_SCALE: f64 = 10_000.0;

/// QA60 bit 10: opaque cloud.
const QA_CLOUD_BIT: u16 = 1 << 10;
/// QA60 bit 11: cirrus.
const QA_CIRRUS_BIT: u16 = 1 << 11;

/// Scene classification codes accepted as valid ground: vegetation (4),
/// bare soil (5), water (6), unclassified (7), snow/ice (11). Everything
/// else (shadow, cloud probabilities, saturated) invalidates the sample.
const CLEAR_SCL_CODES: [u8; 5] = [4, 5, 6, 7, 11];

/// Surface reflectance bands of one screened scene, scaled to [0, 1].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceBands {
    pub b2: Option<f64>,
    pub b3: Option<f64>,
    pub b4: Option<f64>,
    pub b8: Option<f64>,
    pub b11: Option<f64>,
}

/// The 8 optical channels of one scene: 5 reflectance bands plus the derived
/// indices.
#[derive(Debug, Clone, Default)]
pub struct OpticalObservation {
    pub b2: Option<f64>,
    pub b3: Option<f64>,
    pub b4: Option<f64>,
    pub b8: Option<f64>,
    pub b11: Option<f64>,
    pub ndvi: Option<f64>,
    pub ndwi: Option<f64>,
    pub bsi: Option<f64>,
}

/// Screen one raw optical sample for cloud contamination.
///
/// Returns `None` (discard the scene) when:
/// - QA60 has the opaque-cloud or cirrus bit set,
/// - SCL is not one of the accepted ground codes,
/// - QA60 or SCL is absent — an unscreenable sample counts as contaminated.
///
/// Surviving bands are divided by `REFLECTANCE_SCALE`; absent bands stay
/// absent.
pub fn screen_clouds(bands: &OpticalBands) -> Option<SurfaceBands> {
    let qa60 = bands.qa60?;
    let scl = bands.scl?;

    if qa60 & (QA_CLOUD_BIT | QA_CIRRUS_BIT) != 0 {
        return None;
    }
    if !CLEAR_SCL_CODES.contains(&scl) {
        return None;
    }

    let scale = |v: Option<f64>| v.map(|x| x / REFLECTANCE_SCALE);
    Some(SurfaceBands {
        b2: scale(bands.b2),
        b3: scale(bands.b3),
        b4: scale(bands.b4),
        b8: scale(bands.b8),
        b11: scale(bands.b11),
    })
}

/// Normalized difference of two bands: (a - b) / (a + b).
///
/// `None` when either operand is missing or the denominator is zero — a
/// 0/0 index is a gap, not a number.
pub fn normalized_difference(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    let (a, b) = (a?, b?);
    let denom = a + b;
    if denom == 0.0 {
        return None;
    }
    Some((a - b) / denom)
}

/// Bare soil index:
/// ((B11 + B4) - (B8 + B2)) / ((B11 + B4) + (B8 + B2)).
///
/// `None` on any missing operand or a zero denominator.
pub fn bare_soil_index(
    b2: Option<f64>,
    b4: Option<f64>,
    b8: Option<f64>,
    b11: Option<f64>,
) -> Option<f64> {
    let swir_red = b11? + b4?;
    let nir_blue = b8? + b2?;
    let denom = swir_red + nir_blue;
    if denom == 0.0 {
        return None;
    }
    Some((swir_red - nir_blue) / denom)
}

/// Append the derived indices to one screened scene:
/// NDVI = nd(B8, B4), NDWI = nd(B3, B11), BSI as above.
pub fn derive_indices(bands: &SurfaceBands) -> OpticalObservation {
    OpticalObservation {
        b2: bands.b2,
        b3: bands.b3,
        b4: bands.b4,
        b8: bands.b8,
        b11: bands.b11,
        ndvi: normalized_difference(bands.b8, bands.b4),
        ndwi: normalized_difference(bands.b3, bands.b11),
        bsi: bare_soil_index(bands.b2, bands.b4, bands.b8, bands.b11),
    }
}
