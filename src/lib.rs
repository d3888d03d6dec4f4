//! Per-pixel quality weights for optical time-series compositing
//!
//! Normalizes L2A product metadata (Sentinel-2, Landsat 8, SPOT Take5) and
//! derives the AOT, cloud and mask rasters a compositing stage uses to pick
//! the best observation for each pixel.

pub mod types;
pub mod io;
pub mod core;
pub mod config;

// Re-export main types
pub use crate::types::{AngleModel, BandStack, CompositeError, CompositeResult, MaskStack, Mission, WeightImage};
pub use crate::io::{AcquisitionMetadata, ProductFormat, ProductMetadata};
pub use crate::core::{
    AotWeightParams, CloudWeightParams, GaussianParams, GaussianSmoothing, MaskDecomposition, TotalWeight,
    TotalWeightParams, WeightOnAot, WeightOnClouds,
};
pub use crate::config::WeightConfig;

#[cfg(feature = "python")]
mod python {
    use crate::core::{
        AotWeightParams, CloudWeightParams, GaussianParams, GaussianSmoothing, MaskDecomposition, WeightOnAot,
        WeightOnClouds,
    };
    use crate::io::AcquisitionMetadata;
    use crate::types::CompositeError;
    use numpy::{IntoPyArray, PyArray2, PyArray3, PyReadonlyArray2, PyReadonlyArray3};
    use pyo3::exceptions::{PyRuntimeError, PyValueError};
    use pyo3::prelude::*;
    use pyo3::types::PyDict;

    fn to_py_err(e: CompositeError) -> PyErr {
        match e {
            CompositeError::Configuration(_) | CompositeError::InputShape(_) => PyValueError::new_err(e.to_string()),
            _ => PyRuntimeError::new_err(e.to_string()),
        }
    }

    /// AOT weights for a single AOT band
    #[pyfunction]
    fn weight_on_aot<'py>(
        py: Python<'py>,
        aot: PyReadonlyArray2<f32>,
        aot_quantification: f64,
        waotmin: f32,
        waotmax: f32,
        aotmax: i32,
    ) -> PyResult<&'py PyArray2<f32>> {
        let params = AotWeightParams {
            min_weight: waotmin,
            max_weight: waotmax,
            aot_max: aotmax,
        };
        let transform = WeightOnAot::new(params, aot_quantification, 0).map_err(to_py_err)?;
        Ok(transform.apply_band(aot.as_array()).into_pyarray(py))
    }

    /// Gaussian smoothing with rescale to the input range
    #[pyfunction]
    fn gaussian_smooth<'py>(py: Python<'py>, image: PyReadonlyArray2<f32>, sigma: f32) -> PyResult<&'py PyArray2<f32>> {
        let filter = GaussianSmoothing::new(GaussianParams { sigma }).map_err(to_py_err)?;
        Ok(filter.apply_view(image.as_array()).into_pyarray(py))
    }

    /// Cloud, water and snow flags from (band, rows, cols) mask stacks
    #[pyfunction]
    fn decompose_masks<'py>(
        py: Python<'py>,
        cloud_mask: PyReadonlyArray3<u16>,
        div_mask: PyReadonlyArray3<u16>,
    ) -> PyResult<&'py PyArray3<u16>> {
        let cloud = cloud_mask.as_array().to_owned();
        let div = div_mask.as_array().to_owned();
        let flags = MaskDecomposition::new().apply_rasters(&cloud, &div).map_err(to_py_err)?;
        Ok(flags.into_pyarray(py))
    }

    /// Cloud weights from a binary cloud mask
    #[pyfunction]
    fn weight_on_clouds<'py>(
        py: Python<'py>,
        cloud_mask: PyReadonlyArray2<u8>,
        sigma_small: f32,
        sigma_large: f32,
    ) -> PyResult<&'py PyArray2<f32>> {
        let weights = WeightOnClouds::new(CloudWeightParams { sigma_small, sigma_large }).map_err(to_py_err)?;
        Ok(weights.apply(cloud_mask.as_array()).into_pyarray(py))
    }

    /// Normalized metadata of a product as a dict
    #[pyfunction]
    fn read_metadata<'py>(py: Python<'py>, path: String, resolution: i32) -> PyResult<&'py PyDict> {
        let mut metadata = AcquisitionMetadata::new();
        metadata.load(&path, resolution).map_err(to_py_err)?;

        let dict = PyDict::new(py);
        dict.set_item("mission", metadata.mission())?;
        dict.set_item("acquisition_date", metadata.acquisition_date())?;
        dict.set_item("day_of_year", metadata.acquisition_day_of_year())?;
        dict.set_item("resolution", metadata.resolution())?;
        dict.set_item("reflectance_quantification", metadata.reflectance_quantification())?;
        dict.set_item("aot_quantification", metadata.aot_quantification())?;
        dict.set_item("aot_no_data", metadata.aot_no_data())?;
        dict.set_item("aot_band_index", metadata.aot_band_index())?;
        dict.set_item("red_band_index", metadata.red_band_index())?;
        dict.set_item("green_band_index", metadata.green_band_index())?;
        dict.set_item("nir_band_index", metadata.nir_band_index())?;
        let solar = metadata.solar_mean_angle();
        dict.set_item("solar_angles", (solar.azimuth, solar.zenith))?;
        let sensor = metadata.scene_sensor_mean_angle();
        dict.set_item("sensor_angles", (sensor.azimuth, sensor.zenith))?;
        dict.set_item("relative_azimuth", metadata.relative_azimuth())?;
        dict.set_item("aot_file", metadata.aot_file_name())?;
        dict.set_item("cloud_file", metadata.cloud_file_name())?;
        dict.set_item("water_file", metadata.water_file_name())?;
        dict.set_item("snow_file", metadata.snow_file_name())?;
        dict.set_item("image_file", metadata.image_file_name())?;
        Ok(dict)
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(weight_on_aot, m)?)?;
        m.add_function(wrap_pyfunction!(gaussian_smooth, m)?)?;
        m.add_function(wrap_pyfunction!(decompose_masks, m)?)?;
        m.add_function(wrap_pyfunction!(weight_on_clouds, m)?)?;
        m.add_function(wrap_pyfunction!(read_metadata, m)?)?;
        Ok(())
    }
}
