use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

/// Single-band floating point raster (rows x cols)
pub type WeightImage = Array2<f32>;

/// Multi-band raster stack (band x rows x cols)
pub type BandStack<T> = Array3<T>;

/// Packed bit mask raster stack as delivered by L2A products
pub type MaskStack = Array3<u16>;

/// Mean azimuth/zenith pair, in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AngleModel {
    pub azimuth: f64,
    pub zenith: f64,
}

impl AngleModel {
    pub fn new(azimuth: f64, zenith: f64) -> Self {
        Self { azimuth, zenith }
    }

    /// Unweighted mean of a set of angles, `None` when the set is empty
    pub fn mean_of(angles: &[AngleModel]) -> Option<AngleModel> {
        if angles.is_empty() {
            return None;
        }

        let count = angles.len() as f64;
        let (azimuth, zenith) = angles
            .iter()
            .fold((0.0, 0.0), |(az, zen), a| (az + a.azimuth, zen + a.zenith));

        Some(AngleModel {
            azimuth: azimuth / count,
            zenith: zenith / count,
        })
    }
}

/// Missions whose products can be normalized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mission {
    Sentinel2,
    Landsat8,
    Spot4,
    Spot5,
}

impl Mission {
    /// Map a mission label as written in product metadata
    pub fn from_label(label: &str) -> Option<Mission> {
        let upper = label.trim().to_uppercase();
        if upper.starts_with("SENTINEL-2") || upper.starts_with("SENTINEL2") {
            Some(Mission::Sentinel2)
        } else if upper.starts_with("LANDSAT_8") || upper.starts_with("LANDSAT8") || upper == "LANDSAT-8" {
            Some(Mission::Landsat8)
        } else if upper.starts_with("SPOT4") || upper == "SPOT-4" {
            Some(Mission::Spot4)
        } else if upper.starts_with("SPOT5") || upper == "SPOT-5" {
            Some(Mission::Spot5)
        } else {
            None
        }
    }

    /// Band names holding (green, red, nir) for this mission, in preference order
    pub(crate) fn vnir_band_names(&self) -> (&'static [&'static str], &'static [&'static str], &'static [&'static str]) {
        const S2_NIR: &[&str] = &["B8", "B8A"];
        const L8_NIR: &[&str] = &["B5"];
        const OLI_MSI_GREEN: &[&str] = &["B3"];
        const OLI_MSI_RED: &[&str] = &["B4"];
        const HRV_GREEN: &[&str] = &["XS1"];
        const HRV_RED: &[&str] = &["XS2"];
        const HRV_NIR: &[&str] = &["XS3"];

        match self {
            Mission::Sentinel2 => (OLI_MSI_GREEN, OLI_MSI_RED, S2_NIR),
            Mission::Landsat8 => (OLI_MSI_GREEN, OLI_MSI_RED, L8_NIR),
            Mission::Spot4 | Mission::Spot5 => (HRV_GREEN, HRV_RED, HRV_NIR),
        }
    }
}

impl std::fmt::Display for Mission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mission::Sentinel2 => write!(f, "SENTINEL-2"),
            Mission::Landsat8 => write!(f, "LANDSAT_8"),
            Mission::Spot4 => write!(f, "SPOT4"),
            Mission::Spot5 => write!(f, "SPOT5"),
        }
    }
}

/// Error types for weight computation
#[derive(Debug, thiserror::Error)]
pub enum CompositeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata parse error: {0}")]
    MetadataParse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Input shape error: {0}")]
    InputShape(String),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),

    #[error("GDAL error: {0}")]
    Gdal(String),
}

#[cfg(feature = "gdal")]
impl From<gdal::errors::GdalError> for CompositeError {
    fn from(e: gdal::errors::GdalError) -> Self {
        CompositeError::Gdal(e.to_string())
    }
}

/// Result type for weight computation
pub type CompositeResult<T> = Result<T, CompositeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_of_angles() {
        let angles = [AngleModel::new(10.0, 5.0), AngleModel::new(20.0, 15.0)];
        let mean = AngleModel::mean_of(&angles).unwrap();
        assert_eq!(mean, AngleModel::new(15.0, 10.0));
        assert!(AngleModel::mean_of(&[]).is_none());
    }

    #[test]
    fn test_mission_labels() {
        assert_eq!(Mission::from_label("SENTINEL-2A"), Some(Mission::Sentinel2));
        assert_eq!(Mission::from_label(" sentinel-2b "), Some(Mission::Sentinel2));
        assert_eq!(Mission::from_label("LANDSAT_8"), Some(Mission::Landsat8));
        assert_eq!(Mission::from_label("SPOT4"), Some(Mission::Spot4));
        assert_eq!(Mission::from_label("SPOT5"), Some(Mission::Spot5));
        assert_eq!(Mission::from_label("TERRASAR-X"), None);
    }

    #[test]
    fn test_mission_display_round_trips_label() {
        for mission in [Mission::Sentinel2, Mission::Landsat8, Mission::Spot4, Mission::Spot5] {
            assert_eq!(Mission::from_label(&mission.to_string()), Some(mission));
        }
    }
}
