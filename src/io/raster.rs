use crate::types::{BandStack, CompositeError, CompositeResult, WeightImage};
use gdal::raster::Buffer;
use gdal::{Dataset, DriverManager};
use ndarray::{Array2, Array3};
use std::path::Path;

/// Georeferencing of a raster grid, copied onto derived outputs
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGrid {
    pub geo_transform: [f64; 6],
    pub projection: String,
    pub width: usize,
    pub height: usize,
}

/// GDAL-backed reading and writing of weight and mask rasters
pub struct RasterIo;

impl RasterIo {
    /// Read the grid description of a raster
    pub fn read_grid<P: AsRef<Path>>(path: P) -> CompositeResult<RasterGrid> {
        let dataset = Dataset::open(path.as_ref())?;
        let (width, height) = dataset.raster_size();
        Ok(RasterGrid {
            geo_transform: dataset.geo_transform()?,
            projection: dataset.projection(),
            width,
            height,
        })
    }

    /// Read one band (zero-based) as f32
    pub fn read_band<P: AsRef<Path>>(path: P, band_index: usize) -> CompositeResult<WeightImage> {
        log::info!("Reading band {} from: {}", band_index, path.as_ref().display());

        let dataset = Dataset::open(path.as_ref())?;
        let (width, height) = dataset.raster_size();
        let band_count = dataset.raster_count() as usize;
        if band_index >= band_count {
            return Err(CompositeError::InputShape(format!(
                "Band {} requested from a raster with {} bands",
                band_index, band_count
            )));
        }

        let rasterband = dataset.rasterband(band_index as isize + 1)?;
        let band_data = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;

        Array2::from_shape_vec((height, width), band_data.data)
            .map_err(|e| CompositeError::InputShape(format!("Failed to reshape band data: {}", e)))
    }

    /// Read every band of a raster into a (band, rows, cols) stack
    pub fn read_stack<P: AsRef<Path>>(path: P) -> CompositeResult<BandStack<f32>> {
        log::info!("Reading raster stack: {}", path.as_ref().display());

        let dataset = Dataset::open(path.as_ref())?;
        let (width, height) = dataset.raster_size();
        let band_count = dataset.raster_count() as usize;

        let mut flat = Vec::with_capacity(band_count * width * height);
        for band in 1..=band_count {
            let rasterband = dataset.rasterband(band as isize)?;
            let band_data = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
            flat.extend(band_data.data);
        }

        Array3::from_shape_vec((band_count, height, width), flat)
            .map_err(|e| CompositeError::InputShape(format!("Failed to reshape raster stack: {}", e)))
    }

    /// Write a single-band float raster as GeoTIFF on the given grid
    pub fn write_weight<P: AsRef<Path>>(
        output_path: P,
        image: &WeightImage,
        grid: &RasterGrid,
    ) -> CompositeResult<()> {
        log::info!("Writing weight raster: {}", output_path.as_ref().display());

        let (height, width) = image.dim();
        if (height, width) != (grid.height, grid.width) {
            return Err(CompositeError::InputShape(format!(
                "Weight raster {}x{} does not match grid {}x{}",
                height, width, grid.height, grid.width
            )));
        }

        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let mut dataset = driver.create_with_band_type::<f32, _>(
            output_path.as_ref(),
            width as isize,
            height as isize,
            1,
        )?;
        dataset.set_geo_transform(&grid.geo_transform)?;
        if !grid.projection.is_empty() {
            dataset.set_projection(&grid.projection)?;
        }

        let mut rasterband = dataset.rasterband(1)?;
        let flat_data: Vec<f32> = image.iter().cloned().collect();
        let buffer = Buffer::new((width, height), flat_data);
        rasterband.write((0, 0), (width, height), &buffer)?;

        log::debug!("Wrote {}x{} weight raster", width, height);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_roundtrip_keeps_grid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.tif");

        let grid = RasterGrid {
            geo_transform: [300000.0, 10.0, 0.0, 5000000.0, 0.0, -10.0],
            projection: String::new(),
            width: 3,
            height: 2,
        };
        let image = Array2::from_shape_vec((2, 3), vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]).unwrap();

        RasterIo::write_weight(&path, &image, &grid).unwrap();
        let read = RasterIo::read_band(&path, 0).unwrap();
        assert_eq!(read, image);
        assert_eq!(RasterIo::read_grid(&path).unwrap().geo_transform, grid.geo_transform);

        assert!(matches!(
            RasterIo::read_band(&path, 1),
            Err(CompositeError::InputShape(_))
        ));
    }
}
