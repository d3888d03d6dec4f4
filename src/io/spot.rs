use crate::io::metadata::{band_position, compact_date, document_error, ProductMetadata};
use crate::types::{AngleModel, CompositeError, CompositeResult, Mission};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::path::Path;

const DEFAULT_REFLECTANCE_QUANTIFICATION: f64 = 1000.0;
const DEFAULT_AOT_QUANTIFICATION: f64 = 1000.0;
const DEFAULT_AOT_NO_DATA: f64 = -10000.0;

/// SPOT4/SPOT5 Take5 metadata structures
#[derive(Debug, Deserialize)]
pub struct SpotMetadata {
    #[serde(rename = "HEADER")]
    pub header: SpotHeader,
    #[serde(rename = "FILES")]
    pub files: SpotFiles,
    #[serde(rename = "RADIOMETRY")]
    pub radiometry: SpotRadiometry,
    #[serde(rename = "GEOMETRY")]
    pub geometry: Option<SpotGeometry>,
}

#[derive(Debug, Deserialize)]
pub struct SpotHeader {
    #[serde(rename = "PLATEFORM")]
    pub platform: String,
    #[serde(rename = "DATE_PDV")]
    pub date_pdv: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SpotFiles {
    #[serde(rename = "ORTHO_SURF_CORR_ENV")]
    pub ortho_surf_corr_env: Option<String>,
    #[serde(rename = "ORTHO_SURF_AOT")]
    pub ortho_surf_aot: Option<String>,
    #[serde(rename = "MASK_NUAGE")]
    pub mask_nuage: Option<String>,
    #[serde(rename = "MASK_DIV")]
    pub mask_div: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SpotRadiometry {
    /// Semicolon separated band names, e.g. `XS1;XS2;XS3;SWIR`
    #[serde(rename = "BANDS")]
    pub bands: String,
    #[serde(rename = "QUANTIFICATION_VALUE")]
    pub quantification_value: Option<f64>,
    #[serde(rename = "AOT_QUANTIFICATION_VALUE")]
    pub aot_quantification_value: Option<f64>,
    #[serde(rename = "AOT_NODATA_VALUE")]
    pub aot_nodata_value: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct SpotGeometry {
    #[serde(rename = "SOLAR_ANGLES")]
    pub solar_angles: Option<SpotAngles>,
    #[serde(rename = "VIEWING_ANGLES")]
    pub viewing_angles: Option<SpotAngles>,
}

#[derive(Debug, Deserialize)]
pub struct SpotAngles {
    #[serde(rename = "AZIMUTH")]
    pub azimuth: f64,
    #[serde(rename = "ZENITH")]
    pub zenith: f64,
}

/// Parse SPOT Take5 metadata into normalized product fields
pub(crate) fn parse_metadata(xml_content: &str, metadata_path: &Path) -> CompositeResult<ProductMetadata> {
    let metadata = from_str::<SpotMetadata>(xml_content).map_err(|e| document_error("SPOT metadata", e))?;

    let mission_label = metadata.header.platform.trim().to_string();
    let mission = Mission::from_label(&mission_label).ok_or_else(|| {
        CompositeError::MetadataParse(format!("Unsupported SPOT platform: {}", mission_label))
    })?;

    let bands: Vec<String> = metadata
        .radiometry
        .bands
        .split(';')
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .collect();
    log::debug!("{} bands: {:?}", mission, bands);

    let (green, red, nir) = mission.vnir_band_names();
    let radiometry = &metadata.radiometry;
    let mut product = ProductMetadata {
        mission: mission_label,
        green_band_index: band_position(&bands, green),
        red_band_index: band_position(&bands, red),
        nir_band_index: band_position(&bands, nir),
        aot_band_index: 0,
        reflectance_quantification: radiometry
            .quantification_value
            .unwrap_or(DEFAULT_REFLECTANCE_QUANTIFICATION),
        aot_quantification: radiometry
            .aot_quantification_value
            .unwrap_or(DEFAULT_AOT_QUANTIFICATION),
        aot_no_data: radiometry.aot_nodata_value.unwrap_or(DEFAULT_AOT_NO_DATA),
        ..Default::default()
    };

    if let Some(date) = metadata.header.date_pdv.as_deref().and_then(compact_date) {
        product.acquisition_date = date;
    }

    if let Some(geometry) = &metadata.geometry {
        if let Some(solar) = &geometry.solar_angles {
            product.solar_mean_angle = AngleModel::new(solar.azimuth, solar.zenith);
        }
        if let Some(viewing) = &geometry.viewing_angles {
            product.sensor_band_mean_angles = vec![AngleModel::new(viewing.azimuth, viewing.zenith)];
        }
    }

    let dir = metadata_path.parent().unwrap_or_else(|| Path::new(""));
    let resolve = |name: &Option<String>| -> String {
        match name.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => dir.join(n).display().to_string(),
            _ => String::new(),
        }
    };

    let files = &metadata.files;
    product.image_file_name = resolve(&files.ortho_surf_corr_env);
    product.aot_file_name = resolve(&files.ortho_surf_aot);
    product.cloud_file_name = resolve(&files.mask_nuage);
    product.water_file_name = resolve(&files.mask_div);
    product.snow_file_name = product.water_file_name.clone();

    Ok(product)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPOT4_METADATA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<METADATA>
  <HEADER>
    <PLATEFORM>SPOT4</PLATEFORM>
    <DATE_PDV>2013-02-19 10:28:15.250</DATE_PDV>
  </HEADER>
  <FILES>
    <ORTHO_SURF_CORR_ENV>SPOT4_HRVIR_XS_20130219_N2A_ORTHO_SURF_CORR_ENV.TIF</ORTHO_SURF_CORR_ENV>
    <ORTHO_SURF_AOT>SPOT4_HRVIR_XS_20130219_N2A_AOT.TIF</ORTHO_SURF_AOT>
    <MASK_NUAGE>MASK/SPOT4_HRVIR_XS_20130219_N2A_NUA.TIF</MASK_NUAGE>
    <MASK_DIV>MASK/SPOT4_HRVIR_XS_20130219_N2A_DIV.TIF</MASK_DIV>
  </FILES>
  <RADIOMETRY>
    <BANDS>XS1;XS2;XS3;SWIR</BANDS>
  </RADIOMETRY>
  <GEOMETRY>
    <SOLAR_ANGLES>
      <AZIMUTH>155.2</AZIMUTH>
      <ZENITH>58.4</ZENITH>
    </SOLAR_ANGLES>
    <VIEWING_ANGLES>
      <AZIMUTH>102.0</AZIMUTH>
      <ZENITH>12.5</ZENITH>
    </VIEWING_ANGLES>
  </GEOMETRY>
</METADATA>"#;

    #[test]
    fn test_spot4_metadata() {
        let path = Path::new("/take5/SPOT4_HRVIR_XS_20130219_N2A.xml");
        let product = parse_metadata(SPOT4_METADATA, path).unwrap();

        assert_eq!(product.mission, "SPOT4");
        assert_eq!(product.acquisition_date, "20130219");
        assert_eq!(product.green_band_index, 0);
        assert_eq!(product.red_band_index, 1);
        assert_eq!(product.nir_band_index, 2);
        assert_eq!(product.aot_band_index, 0);
        assert_eq!(product.reflectance_quantification, 1000.0);
        assert_eq!(product.aot_quantification, 1000.0);
        assert_eq!(product.aot_no_data, -10000.0);
        assert_eq!(product.solar_mean_angle, AngleModel::new(155.2, 58.4));
        assert_eq!(product.sensor_band_mean_angles, vec![AngleModel::new(102.0, 12.5)]);
        assert_eq!(
            product.cloud_file_name,
            "/take5/MASK/SPOT4_HRVIR_XS_20130219_N2A_NUA.TIF"
        );
        assert_eq!(product.water_file_name, "/take5/MASK/SPOT4_HRVIR_XS_20130219_N2A_DIV.TIF");
        assert_eq!(product.snow_file_name, product.water_file_name);
    }

    #[test]
    fn test_missing_platform_is_metadata_error() {
        let xml = SPOT4_METADATA.replace("<PLATEFORM>SPOT4</PLATEFORM>", "");
        assert!(matches!(
            parse_metadata(&xml, Path::new("meta.xml")),
            Err(CompositeError::MetadataParse(_))
        ));
    }

    #[test]
    fn test_missing_bands_leave_indices_unset() {
        let xml = SPOT4_METADATA.replace("XS1;XS2;XS3;SWIR", "SWIR");
        let product = parse_metadata(&xml, Path::new("meta.xml")).unwrap();
        assert_eq!(product.red_band_index, -1);
        assert_eq!(product.green_band_index, -1);
        assert_eq!(product.nir_band_index, -1);
    }
}
