use crate::core::gaussian_filter::{GaussianParams, GaussianSmoothing};
use crate::types::{CompositeError, CompositeResult, WeightImage};
use ndarray::{ArrayView2, Zip};
use num_traits::Zero;
use serde::{Deserialize, Serialize};

/// Cloud weighting parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CloudWeightParams {
    /// Sigma of the narrow blur, in pixels
    #[serde(alias = "sigmasmallcld")]
    pub sigma_small: f32,
    /// Sigma of the wide blur, in pixels
    #[serde(alias = "sigmalargecld")]
    pub sigma_large: f32,
}

impl Default for CloudWeightParams {
    fn default() -> Self {
        Self {
            sigma_small: 2.0,
            sigma_large: 10.0,
        }
    }
}

/// Weight decreasing towards clouds
///
/// The binary cloud mask is blurred at two scales and each blur, rescaled to
/// [0, 1], lowers the weight multiplicatively.
#[derive(Debug, Clone)]
pub struct WeightOnClouds {
    small: GaussianSmoothing,
    large: GaussianSmoothing,
}

impl WeightOnClouds {
    pub fn new(params: CloudWeightParams) -> CompositeResult<Self> {
        if params.sigma_small > params.sigma_large {
            return Err(CompositeError::Configuration(format!(
                "Small cloud sigma {} exceeds large cloud sigma {}",
                params.sigma_small, params.sigma_large
            )));
        }

        Ok(Self {
            small: GaussianSmoothing::new(GaussianParams { sigma: params.sigma_small })?,
            large: GaussianSmoothing::new(GaussianParams { sigma: params.sigma_large })?,
        })
    }

    /// Cloud weight for a mask where any non-zero pixel is cloud
    pub fn apply<T>(&self, cloud_mask: ArrayView2<T>) -> WeightImage
    where
        T: Zero + Copy,
    {
        let (rows, cols) = cloud_mask.dim();
        log::info!("Computing cloud weights for {}x{} mask", rows, cols);

        let binary = cloud_mask.mapv(|v| if v.is_zero() { 0.0f32 } else { 1.0 });
        let cloud_count = binary.iter().filter(|v| **v > 0.0).count();
        log::debug!("{} cloudy pixels out of {}", cloud_count, rows * cols);

        let near = self.small.apply(&binary);
        let far = self.large.apply(&binary);

        Zip::from(&near)
            .and(&far)
            .map_collect(|&n, &f| ((1.0 - n) * (1.0 - f)).clamp(0.0, 1.0))
    }
}
