//! I/O modules for reading product metadata and rasters

pub mod metadata;
pub mod maccs;
pub mod spot;
#[cfg(feature = "gdal")]
pub mod raster;

pub use metadata::{AcquisitionMetadata, ProductFormat, ProductMetadata};
#[cfg(feature = "gdal")]
pub use raster::RasterIo;
