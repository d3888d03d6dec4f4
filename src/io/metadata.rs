use crate::io::{maccs, spot};
use crate::types::{AngleModel, CompositeError, CompositeResult};
use chrono::{Datelike, NaiveDate};
use quick_xml::de::DeError;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Metadata fields extracted from one product by a format parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMetadata {
    pub mission: String,
    /// Acquisition date as `YYYYMMDD`
    pub acquisition_date: String,

    /// Divisor converting reflectance digital values to reflectance
    pub reflectance_quantification: f64,
    /// Divisor converting AOT digital values to optical thickness
    pub aot_quantification: f64,
    pub aot_no_data: f64,

    // Band positions within the product raster stacks, -1 when absent
    pub aot_band_index: i32,
    pub red_band_index: i32,
    pub green_band_index: i32,
    pub nir_band_index: i32,

    pub solar_mean_angle: AngleModel,
    /// One entry per spectral band, in band order
    pub sensor_band_mean_angles: Vec<AngleModel>,

    pub aot_file_name: String,
    pub cloud_file_name: String,
    pub water_file_name: String,
    pub snow_file_name: String,
    pub image_file_name: String,
}

impl Default for ProductMetadata {
    fn default() -> Self {
        Self {
            mission: String::new(),
            acquisition_date: String::new(),
            reflectance_quantification: 1.0,
            aot_quantification: 0.0,
            aot_no_data: 0.0,
            aot_band_index: -1,
            red_band_index: -1,
            green_band_index: -1,
            nir_band_index: -1,
            solar_mean_angle: AngleModel::default(),
            sensor_band_mean_angles: Vec::new(),
            aot_file_name: String::new(),
            cloud_file_name: String::new(),
            water_file_name: String::new(),
            snow_file_name: String::new(),
            image_file_name: String::new(),
        }
    }
}

impl ProductMetadata {
    /// Check the fields every consumer relies on
    fn validate_required(&self) -> CompositeResult<()> {
        if self.mission.trim().is_empty() {
            return Err(CompositeError::MetadataParse(
                "Mission could not be determined".to_string(),
            ));
        }

        let bands = [
            ("red", self.red_band_index),
            ("green", self.green_band_index),
            ("nir", self.nir_band_index),
        ];
        for (name, index) in bands {
            if index < 0 {
                return Err(CompositeError::MetadataParse(format!(
                    "The {} band index could not be determined for mission {}",
                    name, self.mission
                )));
            }
        }

        Ok(())
    }
}

/// Supported metadata file layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductFormat {
    /// MACCS/MAJA L2A header (Sentinel-2, Landsat 8)
    Maccs,
    /// SPOT4/SPOT5 Take5 metadata
    Spot,
}

impl ProductFormat {
    /// Detect the layout from the document root element
    pub fn detect(xml_content: &str) -> CompositeResult<ProductFormat> {
        let mut reader = Reader::from_str(xml_content);

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                    let root = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    return match root.as_str() {
                        "Earth_Explorer_Header" => Ok(ProductFormat::Maccs),
                        "METADATA" => Ok(ProductFormat::Spot),
                        other => Err(CompositeError::MetadataParse(format!(
                            "Unsupported metadata root element: {}",
                            other
                        ))),
                    };
                }
                Ok(Event::Eof) => {
                    return Err(CompositeError::MetadataParse(
                        "Metadata document has no root element".to_string(),
                    ))
                }
                Err(e) => {
                    return Err(CompositeError::XmlParsing(format!(
                        "Failed to read metadata root: {}",
                        e
                    )))
                }
                _ => {}
            }
        }
    }

    /// Run the parser for this layout
    pub fn parse(
        &self,
        xml_content: &str,
        file_path: &Path,
        resolution: i32,
    ) -> CompositeResult<ProductMetadata> {
        match self {
            ProductFormat::Maccs => maccs::parse_header(xml_content, file_path, resolution),
            ProductFormat::Spot => spot::parse_metadata(xml_content, file_path),
        }
    }
}

/// Normalized acquisition metadata for one product
///
/// Populated once through [`AcquisitionMetadata::load`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionMetadata {
    file_path: String,
    resolution: i32,
    product: ProductMetadata,
}

impl Default for AcquisitionMetadata {
    fn default() -> Self {
        Self {
            file_path: String::new(),
            resolution: -1,
            product: ProductMetadata::default(),
        }
    }
}

impl AcquisitionMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from fields produced by an external parser
    pub fn from_product(product: ProductMetadata, resolution: i32) -> CompositeResult<Self> {
        product.validate_required()?;
        Ok(Self {
            file_path: String::new(),
            resolution,
            product,
        })
    }

    /// Restore every field to its default
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Load a product metadata file at the requested resolution (-1 for native)
    ///
    /// On failure the instance is left in its reset state. A document that is
    /// not well-formed XML fails with `XmlParsing`. A missing or malformed
    /// field fails with `MetadataParse`.
    pub fn load<P: AsRef<Path>>(&mut self, file_path: P, resolution: i32) -> CompositeResult<()> {
        self.reset();

        let path = file_path.as_ref();
        log::info!("Loading product metadata: {}", path.display());
        self.file_path = path.display().to_string();
        self.resolution = resolution;

        match Self::parse_file(path, resolution) {
            Ok(product) => {
                log::debug!(
                    "Loaded {} product acquired {} (red={}, green={}, nir={}, aot={})",
                    product.mission,
                    product.acquisition_date,
                    product.red_band_index,
                    product.green_band_index,
                    product.nir_band_index,
                    product.aot_band_index
                );
                self.product = product;
                Ok(())
            }
            Err(e) => {
                log::warn!("Failed to load metadata {}: {}", path.display(), e);
                self.reset();
                Err(e)
            }
        }
    }

    fn parse_file(path: &Path, resolution: i32) -> CompositeResult<ProductMetadata> {
        let xml_content = std::fs::read_to_string(path)?;
        let format = ProductFormat::detect(&xml_content)?;
        log::debug!("Detected {:?} metadata layout", format);

        let product = format.parse(&xml_content, path, resolution)?;
        product.validate_required()?;
        Ok(product)
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn resolution(&self) -> i32 {
        self.resolution
    }

    pub fn product(&self) -> &ProductMetadata {
        &self.product
    }

    pub fn mission(&self) -> &str {
        &self.product.mission
    }

    pub fn acquisition_date(&self) -> &str {
        &self.product.acquisition_date
    }

    pub fn reflectance_quantification(&self) -> f64 {
        self.product.reflectance_quantification
    }

    pub fn aot_quantification(&self) -> f64 {
        self.product.aot_quantification
    }

    pub fn aot_no_data(&self) -> f64 {
        self.product.aot_no_data
    }

    pub fn aot_band_index(&self) -> i32 {
        self.product.aot_band_index
    }

    pub fn red_band_index(&self) -> i32 {
        self.product.red_band_index
    }

    pub fn green_band_index(&self) -> i32 {
        self.product.green_band_index
    }

    pub fn nir_band_index(&self) -> i32 {
        self.product.nir_band_index
    }

    pub fn aot_file_name(&self) -> &str {
        &self.product.aot_file_name
    }

    pub fn cloud_file_name(&self) -> &str {
        &self.product.cloud_file_name
    }

    pub fn water_file_name(&self) -> &str {
        &self.product.water_file_name
    }

    pub fn snow_file_name(&self) -> &str {
        &self.product.snow_file_name
    }

    pub fn image_file_name(&self) -> &str {
        &self.product.image_file_name
    }

    pub fn solar_mean_angle(&self) -> AngleModel {
        self.product.solar_mean_angle
    }

    pub fn sensor_band_mean_angles(&self) -> &[AngleModel] {
        &self.product.sensor_band_mean_angles
    }

    pub fn has_band_mean_angles(&self) -> bool {
        !self.product.sensor_band_mean_angles.is_empty()
    }

    /// Acquisition date as a zero-based day of year (Jan 1 = 0), -1 if the
    /// date is not `YYYYMMDD`
    pub fn acquisition_day_of_year(&self) -> i32 {
        match NaiveDate::parse_from_str(&self.product.acquisition_date, "%Y%m%d") {
            Ok(date) => date.ordinal0() as i32,
            Err(_) => -1,
        }
    }

    /// Mean viewing angle over all bands
    pub fn scene_sensor_mean_angle(&self) -> AngleModel {
        AngleModel::mean_of(&self.product.sensor_band_mean_angles)
            .unwrap_or_else(|| self.sensor_mean_angle(0))
    }

    /// Viewing angle for one band
    ///
    /// An out-of-range band falls back to the first band, then to zero angles.
    pub fn sensor_mean_angle(&self, band_index: i32) -> AngleModel {
        let angles = &self.product.sensor_band_mean_angles;
        if band_index >= 0 && (band_index as usize) < angles.len() {
            return angles[band_index as usize];
        }

        match angles.first() {
            Some(first) => {
                log::warn!(
                    "No viewing angles for band {}, using band 0 of {}",
                    band_index,
                    angles.len()
                );
                *first
            }
            None => AngleModel::default(),
        }
    }

    /// Sensor azimuth relative to the anti-solar direction, in [-180, 180]
    pub fn relative_azimuth(&self) -> f64 {
        let solar = self.solar_mean_angle();
        let sensor = self.scene_sensor_mean_angle();

        let mut relative = sensor.azimuth - 180.0 - solar.azimuth;
        if relative < -180.0 {
            relative += 360.0;
        }
        if relative > 180.0 {
            relative -= 360.0;
        }
        relative
    }
}

/// Reduce an ISO-like timestamp (`2016-05-10T10:40:32`, `UTC=...`) to `YYYYMMDD`
/// Classify a deserialization failure of a product document
pub(crate) fn document_error(kind: &str, e: DeError) -> CompositeError {
    match e {
        DeError::InvalidXml(_) | DeError::UnexpectedEof => {
            CompositeError::XmlParsing(format!("Failed to read {}: {}", kind, e))
        }
        _ => CompositeError::MetadataParse(format!("Invalid {}: {}", kind, e)),
    }
}

pub(crate) fn compact_date(text: &str) -> Option<String> {
    let pattern = Regex::new(r"(\d{4})-(\d{2})-(\d{2})").ok()?;
    let captures = pattern.captures(text)?;
    Some(format!("{}{}{}", &captures[1], &captures[2], &captures[3]))
}

/// Convert a published quantification multiplier into the divisor used here
pub(crate) fn invert_quantification(name: &str, value: Option<f64>) -> CompositeResult<Option<f64>> {
    match value {
        None => Ok(None),
        Some(v) if v.is_finite() && v > 0.0 => Ok(Some(1.0 / v)),
        Some(v) => Err(CompositeError::MetadataParse(format!(
            "Invalid {} quantification value: {}",
            name, v
        ))),
    }
}

/// Position of the first matching band name, -1 if none matches
pub(crate) fn band_position(bands: &[String], candidates: &[&str]) -> i32 {
    candidates
        .iter()
        .find_map(|name| bands.iter().position(|b| b.trim() == *name))
        .map(|i| i as i32)
        .unwrap_or(-1)
}
