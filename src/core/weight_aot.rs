use crate::io::AcquisitionMetadata;
use crate::types::{BandStack, CompositeError, CompositeResult, WeightImage};
use ndarray::{ArrayView2, Axis, Zip};
use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};

/// AOT weighting parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AotWeightParams {
    /// Weight given at or beyond `aot_max`
    #[serde(alias = "waotmin")]
    pub min_weight: f32,
    /// Weight given at zero AOT
    #[serde(alias = "waotmax")]
    pub max_weight: f32,
    /// Physical AOT at which the weight reaches `min_weight`
    #[serde(alias = "aotmax")]
    pub aot_max: i32,
}

impl Default for AotWeightParams {
    fn default() -> Self {
        Self {
            min_weight: 0.33,
            max_weight: 1.0,
            aot_max: 50,
        }
    }
}

/// Linear weight on aerosol optical thickness
///
/// Weight falls from `max_weight` at AOT 0 to `min_weight` at `aot_max` and
/// saturates outside that range.
#[derive(Debug, Clone, Copy)]
pub struct WeightOnAot {
    params: AotWeightParams,
    aot_quantification: f32,
    aot_band_index: usize,
}

impl WeightOnAot {
    pub fn new(params: AotWeightParams, aot_quantification: f64, aot_band_index: i32) -> CompositeResult<Self> {
        if !aot_quantification.is_finite() || aot_quantification == 0.0 {
            return Err(CompositeError::Configuration(format!(
                "AOT quantification value must be finite and non-zero, got {}",
                aot_quantification
            )));
        }
        if params.aot_max <= 0 {
            return Err(CompositeError::Configuration(format!(
                "AOT max must be positive, got {}",
                params.aot_max
            )));
        }
        if !params.min_weight.is_finite() || !params.max_weight.is_finite() {
            return Err(CompositeError::Configuration(
                "AOT weights must be finite".to_string(),
            ));
        }
        if params.max_weight < params.min_weight {
            return Err(CompositeError::Configuration(format!(
                "Max AOT weight {} is below min AOT weight {}",
                params.max_weight, params.min_weight
            )));
        }
        if aot_band_index < 0 {
            return Err(CompositeError::Configuration(
                "Product has no AOT band".to_string(),
            ));
        }

        log::debug!(
            "AOT weight: quantification={}, band={}, params={:?}",
            aot_quantification,
            aot_band_index,
            params
        );

        Ok(Self {
            params,
            aot_quantification: aot_quantification as f32,
            aot_band_index: aot_band_index as usize,
        })
    }

    /// Configure from loaded product metadata
    pub fn from_metadata(metadata: &AcquisitionMetadata, params: AotWeightParams) -> CompositeResult<Self> {
        Self::new(params, metadata.aot_quantification(), metadata.aot_band_index())
    }

    pub fn params(&self) -> &AotWeightParams {
        &self.params
    }

    pub fn aot_band_index(&self) -> usize {
        self.aot_band_index
    }

    /// Weight for one raw AOT digital value
    ///
    /// NaN values get the min weight. Infinite values saturate like any
    /// out-of-range value.
    pub fn weight(&self, digital_value: f32) -> f32 {
        let aot = digital_value / self.aot_quantification;
        let ratio = aot / self.params.aot_max as f32;
        let t = if ratio.is_nan() { 1.0 } else { ratio.clamp(0.0, 1.0) };
        self.params.max_weight - t * (self.params.max_weight - self.params.min_weight)
    }

    /// Weights for a single AOT band
    pub fn apply_band<T>(&self, aot_band: ArrayView2<T>) -> WeightImage
    where
        T: AsPrimitive<f32> + Send + Sync,
    {
        let zip = Zip::from(&aot_band);

        #[cfg(feature = "parallel")]
        let weights = zip.par_map_collect(|v| self.weight(v.as_()));
        #[cfg(not(feature = "parallel"))]
        let weights = zip.map_collect(|v| self.weight(v.as_()));

        weights
    }

    /// Weights for the AOT band of a (band, rows, cols) stack
    pub fn apply<T>(&self, stack: &BandStack<T>) -> CompositeResult<WeightImage>
    where
        T: AsPrimitive<f32> + Send + Sync,
    {
        let (bands, rows, cols) = stack.dim();
        if self.aot_band_index >= bands {
            return Err(CompositeError::InputShape(format!(
                "AOT band {} requested from a raster with {} bands",
                self.aot_band_index, bands
            )));
        }

        log::info!("Computing AOT weights for {}x{} raster", rows, cols);
        Ok(self.apply_band(stack.index_axis(Axis(0), self.aot_band_index)))
    }
}
