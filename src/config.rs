use crate::core::{
    AotWeightParams, CloudWeightParams, GaussianParams, GaussianSmoothing, TotalWeight, TotalWeightParams,
    WeightOnAot, WeightOnClouds,
};
use crate::io::AcquisitionMetadata;
use crate::types::{CompositeError, CompositeResult};
use serde::{Deserialize, Serialize};

/// Caller-owned configuration of a weight computation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConfig {
    /// Requested raster resolution in meters, -1 for native
    pub resolution: i32,
    pub aot: AotWeightParams,
    /// Smoothing applied to the AOT weight raster, none when absent
    pub smoothing: Option<GaussianParams>,
    pub clouds: CloudWeightParams,
    pub total: TotalWeightParams,
    /// Centre of the synthesis period, `YYYYMMDD`
    pub synthesis_date: Option<String>,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            resolution: -1,
            aot: AotWeightParams::default(),
            smoothing: None,
            clouds: CloudWeightParams::default(),
            total: TotalWeightParams::default(),
            synthesis_date: None,
        }
    }
}

impl WeightConfig {
    /// Check every product-independent parameter
    pub fn validate(&self) -> CompositeResult<()> {
        if self.resolution == 0 || self.resolution < -1 {
            return Err(CompositeError::Configuration(format!(
                "Resolution must be positive or -1, got {}",
                self.resolution
            )));
        }

        // Quantification and band index come from the product, use neutral stand-ins
        WeightOnAot::new(self.aot, 1.0, 0)?;
        if let Some(smoothing) = self.smoothing {
            GaussianSmoothing::new(smoothing)?;
        }
        WeightOnClouds::new(self.clouds)?;
        if let Some(date) = &self.synthesis_date {
            TotalWeight::new(self.total, date)?;
        }

        Ok(())
    }

    pub fn aot_weight(&self, metadata: &AcquisitionMetadata) -> CompositeResult<WeightOnAot> {
        WeightOnAot::from_metadata(metadata, self.aot)
    }

    pub fn smoothing(&self) -> CompositeResult<Option<GaussianSmoothing>> {
        self.smoothing.map(GaussianSmoothing::new).transpose()
    }

    pub fn cloud_weight(&self) -> CompositeResult<WeightOnClouds> {
        WeightOnClouds::new(self.clouds)
    }

    pub fn total_weight(&self) -> CompositeResult<TotalWeight> {
        let date = self.synthesis_date.as_deref().ok_or_else(|| {
            CompositeError::Configuration("No synthesis date configured".to_string())
        })?;
        TotalWeight::new(self.total, date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = WeightConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.smoothing().unwrap().is_none());
        assert!(config.total_weight().is_err());
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let config = WeightConfig {
            aot: AotWeightParams {
                aot_max: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CompositeError::Configuration(_))));

        let config = WeightConfig {
            smoothing: Some(GaussianParams { sigma: -2.0 }),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WeightConfig {
            resolution: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WeightConfig {
            synthesis_date: Some("mid-july".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
