use crate::io::AcquisitionMetadata;
use crate::types::{CompositeError, CompositeResult, WeightImage};
use chrono::NaiveDate;
use ndarray::Zip;
use serde::{Deserialize, Serialize};

/// Total weight parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TotalWeightParams {
    /// Constant weight of the acquiring sensor
    #[serde(alias = "weightsensor")]
    pub weight_on_sensor: f32,
    /// Weight of an acquisition `half_synthesis` days or more from the synthesis date
    #[serde(alias = "wdatemin")]
    pub weight_on_date_min: f32,
    /// Half width of the synthesis period, in days
    #[serde(alias = "halfsynthesis")]
    pub half_synthesis: u32,
}

impl Default for TotalWeightParams {
    fn default() -> Self {
        Self {
            weight_on_sensor: 1.0,
            weight_on_date_min: 0.5,
            half_synthesis: 15,
        }
    }
}

/// Combines sensor, date, AOT and cloud weights of one acquisition
#[derive(Debug, Clone)]
pub struct TotalWeight {
    params: TotalWeightParams,
    synthesis_date: NaiveDate,
}

impl TotalWeight {
    /// `synthesis_date` is the centre of the synthesis period, as `YYYYMMDD`
    pub fn new(params: TotalWeightParams, synthesis_date: &str) -> CompositeResult<Self> {
        if !(params.weight_on_sensor > 0.0 && params.weight_on_sensor <= 1.0) {
            return Err(CompositeError::Configuration(format!(
                "Sensor weight must be in (0, 1], got {}",
                params.weight_on_sensor
            )));
        }
        if !(0.0..=1.0).contains(&params.weight_on_date_min) {
            return Err(CompositeError::Configuration(format!(
                "Minimum date weight must be in [0, 1], got {}",
                params.weight_on_date_min
            )));
        }
        if params.half_synthesis == 0 {
            return Err(CompositeError::Configuration(
                "Half synthesis period must be at least one day".to_string(),
            ));
        }

        let synthesis_date = parse_date(synthesis_date)?;
        Ok(Self {
            params,
            synthesis_date,
        })
    }

    /// Weight of an acquisition date (`YYYYMMDD`) relative to the synthesis date
    pub fn date_weight(&self, acquisition_date: &str) -> CompositeResult<f32> {
        let date = parse_date(acquisition_date)?;
        let days = (date - self.synthesis_date).num_days().abs() as f32;

        let w_min = self.params.weight_on_date_min;
        let weight = 1.0 - days / self.params.half_synthesis as f32 * (1.0 - w_min);
        Ok(weight.clamp(w_min, 1.0))
    }

    /// Scalar part of the total weight for one product
    pub fn product_weight(&self, metadata: &AcquisitionMetadata) -> CompositeResult<f32> {
        let date_weight = self.date_weight(metadata.acquisition_date())?;
        log::debug!(
            "{} acquired {}: sensor weight {}, date weight {}",
            metadata.mission(),
            metadata.acquisition_date(),
            self.params.weight_on_sensor,
            date_weight
        );
        Ok(self.params.weight_on_sensor * date_weight)
    }

    /// Per-pixel total weight
    pub fn apply(
        &self,
        metadata: &AcquisitionMetadata,
        aot_weights: &WeightImage,
        cloud_weights: &WeightImage,
    ) -> CompositeResult<WeightImage> {
        if aot_weights.dim() != cloud_weights.dim() {
            return Err(CompositeError::InputShape(format!(
                "AOT weights are {:?} but cloud weights are {:?}",
                aot_weights.dim(),
                cloud_weights.dim()
            )));
        }

        let product_weight = self.product_weight(metadata)?;
        log::info!("Combining weights with product weight {}", product_weight);

        let zip = Zip::from(aot_weights).and(cloud_weights);

        #[cfg(feature = "parallel")]
        let total = zip.par_map_collect(|&aot, &cloud| product_weight * aot * cloud);
        #[cfg(not(feature = "parallel"))]
        let total = zip.map_collect(|&aot, &cloud| product_weight * aot * cloud);

        Ok(total)
    }
}

fn parse_date(date: &str) -> CompositeResult<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), "%Y%m%d").map_err(|e| {
        CompositeError::Configuration(format!("Invalid date '{}', expected YYYYMMDD: {}", date, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ProductMetadata;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn metadata_acquired(date: &str) -> AcquisitionMetadata {
        let product = ProductMetadata {
            mission: "SENTINEL-2A".to_string(),
            acquisition_date: date.to_string(),
            red_band_index: 2,
            green_band_index: 1,
            nir_band_index: 3,
            ..Default::default()
        };
        AcquisitionMetadata::from_product(product, 10).unwrap()
    }

    #[test]
    fn test_date_weight() {
        let total = TotalWeight::new(TotalWeightParams::default(), "20160115").unwrap();
        assert_relative_eq!(total.date_weight("20160115").unwrap(), 1.0);
        assert_relative_eq!(total.date_weight("20160122").unwrap(), 1.0 - 7.0 / 15.0 * 0.5, epsilon = 1e-6);
        assert_relative_eq!(total.date_weight("20160108").unwrap(), 1.0 - 7.0 / 15.0 * 0.5, epsilon = 1e-6);
        assert_relative_eq!(total.date_weight("20160130").unwrap(), 0.5, epsilon = 1e-6);
        assert_relative_eq!(total.date_weight("20160301").unwrap(), 0.5);
    }

    #[test]
    fn test_date_weight_across_years() {
        let total = TotalWeight::new(TotalWeightParams::default(), "20160105").unwrap();
        assert_relative_eq!(total.date_weight("20151231").unwrap(), 1.0 - 5.0 / 15.0 * 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_invalid_configuration() {
        let params = TotalWeightParams::default();
        assert!(TotalWeight::new(params, "2016-01-15").is_err());
        assert!(TotalWeight::new(TotalWeightParams { half_synthesis: 0, ..params }, "20160115").is_err());
        assert!(TotalWeight::new(TotalWeightParams { weight_on_sensor: 0.0, ..params }, "20160115").is_err());
        assert!(TotalWeight::new(TotalWeightParams { weight_on_date_min: 1.5, ..params }, "20160115").is_err());

        let total = TotalWeight::new(params, "20160115").unwrap();
        assert!(matches!(total.date_weight(""), Err(CompositeError::Configuration(_))));
    }

    #[test]
    fn test_total_weight() {
        let params = TotalWeightParams {
            weight_on_sensor: 0.8,
            ..Default::default()
        };
        let total = TotalWeight::new(params, "20160115").unwrap();
        let metadata = metadata_acquired("20160130");

        let aot = Array2::from_shape_vec((1, 2), vec![1.0f32, 0.5]).unwrap();
        let cloud = Array2::from_shape_vec((1, 2), vec![0.5f32, 1.0]).unwrap();
        let weights = total.apply(&metadata, &aot, &cloud).unwrap();

        assert_relative_eq!(weights[[0, 0]], 0.8 * 0.5 * 0.5, epsilon = 1e-6);
        assert_relative_eq!(weights[[0, 1]], 0.8 * 0.5 * 0.5, epsilon = 1e-6);

        let mismatched = Array2::<f32>::zeros((2, 2));
        assert!(matches!(
            total.apply(&metadata, &aot, &mismatched),
            Err(CompositeError::InputShape(_))
        ));
    }
}
