//! Feature normalization and classifier inference.
//!
//! Both trained artifacts load once at startup: the scaler export (per-feature
//! mean/scale, JSON) and the ONNX classifier. Per request, a 120-slot gapped
//! series becomes the model's (1, 12, 10) input and one crop probability
//! comes back.

use ndarray::Array2;
use ort::session::Session;
use serde::Deserialize;
use std::path::Path;

use crate::errors::AppError;
use crate::services::timeseries::{CHANNELS_PER_MONTH, FEATURE_LEN, MONTHS_PER_SERIES};

/// Value substituted for missing features before scaling. The model was
/// trained with the same imputation.
const IMPUTED_VALUE: f64 = 0.0;

#[derive(Debug, Deserialize)]
struct ScalerParams {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

/// Per-feature affine transform exported from training:
/// scaled[i] = (x[i] - mean[i]) / scale[i].
#[derive(Debug, Clone)]
pub struct FeatureScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl FeatureScaler {
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::InternalError(format!(
                "Failed to read scaler from {}: {}",
                path.display(),
                e
            ))
        })?;
        let params: ScalerParams = serde_json::from_str(&raw).map_err(|e| {
            AppError::InternalError(format!("Failed to parse scaler {}: {}", path.display(), e))
        })?;
        Self::from_params(params)
    }

    fn from_params(params: ScalerParams) -> Result<Self, AppError> {
        if params.mean.len() != FEATURE_LEN || params.scale.len() != FEATURE_LEN {
            return Err(AppError::InternalError(format!(
                "Scaler length mismatch: expected {} features, got mean {} / scale {}",
                FEATURE_LEN,
                params.mean.len(),
                params.scale.len()
            )));
        }
        Ok(Self {
            mean: params.mean,
            scale: params.scale,
        })
    }

    fn transform(&self, features: &mut [f64]) {
        for (i, v) in features.iter_mut().enumerate() {
            *v = (*v - self.mean[i]) / self.scale[i];
        }
    }
}

/// Prepare a gapped feature series for the classifier.
///
/// In order:
/// 1. force-pad a short series to `FEATURE_LEN` with missing slots,
/// 2. impute missing slots with `IMPUTED_VALUE`,
/// 3. apply the scaler,
/// 4. zero any value that is not a finite f32 after scaling,
/// 5. reshape row-major into the month × channel grid.
///
/// The result is always a fully finite (12, 10) grid.
pub fn prepare_model_input(
    values: &[Option<f64>],
    scaler: &FeatureScaler,
) -> Result<Array2<f32>, AppError> {
    let mut padded = values.to_vec();
    if padded.len() < FEATURE_LEN {
        tracing::warn!(
            "Feature series has {} slots, padding to {}",
            padded.len(),
            FEATURE_LEN
        );
        padded.resize(FEATURE_LEN, None);
    }

    let missing = padded.iter().filter(|v| v.is_none()).count();
    if missing > 0 {
        tracing::warn!(
            "Imputing {} of {} missing features with {}",
            missing,
            FEATURE_LEN,
            IMPUTED_VALUE
        );
    }

    let mut features: Vec<f64> = padded.iter().map(|v| v.unwrap_or(IMPUTED_VALUE)).collect();
    scaler.transform(&mut features);

    let scaled: Vec<f32> = features
        .into_iter()
        .map(|v| {
            let v = v as f32;
            if v.is_finite() {
                v
            } else {
                0.0
            }
        })
        .collect();

    Array2::from_shape_vec((MONTHS_PER_SERIES, CHANNELS_PER_MONTH), scaled)
        .map_err(|e| AppError::InternalError(format!("Failed to shape model input: {}", e)))
}

/// The pretrained crop/non-crop classifier.
///
/// ort sessions need exclusive access to run, so the session sits behind a
/// lock. Predictions are serialized at the endpoint, the lock just keeps the
/// wrapper safe to share.
pub struct CropClassifier {
    session: parking_lot::RwLock<Session>,
    input_name: String,
    output_name: String,
}

impl std::fmt::Debug for CropClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CropClassifier")
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .finish()
    }
}

impl CropClassifier {
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        tracing::info!("Loading classifier from {}", path.display());

        let session = Session::builder()
            .map_err(|e| AppError::InternalError(format!("Failed to create session builder: {}", e)))?
            .commit_from_file(path)
            .map_err(|e| {
                AppError::InternalError(format!(
                    "Failed to load model from {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let input_name = session
            .inputs()
            .iter()
            .map(|input| input.name().to_string())
            .next()
            .ok_or_else(|| AppError::InternalError("Model declares no inputs".to_string()))?;
        let output_name = session
            .outputs()
            .iter()
            .map(|output| output.name().to_string())
            .next()
            .ok_or_else(|| AppError::InternalError("Model declares no outputs".to_string()))?;

        tracing::info!(
            "Classifier loaded: input '{}', output '{}'",
            input_name,
            output_name
        );

        Ok(Self {
            session: parking_lot::RwLock::new(session),
            input_name,
            output_name,
        })
    }

    /// Run the classifier on one prepared (12, 10) grid and return the raw
    /// crop probability.
    pub fn predict_probability(&self, input: &Array2<f32>) -> Result<f64, AppError> {
        let shape: Vec<i64> = vec![1, MONTHS_PER_SERIES as i64, CHANNELS_PER_MONTH as i64];
        let data: Vec<f32> = input.iter().copied().collect();

        let tensor = ort::value::Tensor::from_array((shape, data))
            .map_err(|e| AppError::InternalError(format!("Failed to create input tensor: {}", e)))?;

        let mut session = self.session.write();
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| AppError::InternalError(format!("Inference failed: {}", e)))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            AppError::InternalError(format!("Model output '{}' missing", self.output_name))
        })?;

        let (_, values) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| AppError::InternalError(format!("Failed to read model output: {}", e)))?;

        let probability = values
            .first()
            .copied()
            .ok_or_else(|| AppError::InternalError("Model returned an empty output".to_string()))?;

        Ok(f64::from(probability))
    }
}
