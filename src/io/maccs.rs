use crate::io::metadata::{band_position, compact_date, document_error, invert_quantification, ProductMetadata};
use crate::types::{AngleModel, CompositeError, CompositeResult, Mission};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// AOT is the second band of the ATB raster, after water vapour
const ATB_AOT_BAND_INDEX: i32 = 1;

/// MACCS/MAJA L2A header structures
/// This represents the root <Earth_Explorer_Header> element directly
#[derive(Debug, Deserialize)]
pub struct MaccsHeader {
    #[serde(rename = "Fixed_Header")]
    pub fixed_header: FixedHeader,
    #[serde(rename = "Variable_Header")]
    pub variable_header: VariableHeader,
}

#[derive(Debug, Deserialize)]
pub struct FixedHeader {
    #[serde(rename = "Mission")]
    pub mission: String,
}

#[derive(Debug, Deserialize)]
pub struct VariableHeader {
    #[serde(rename = "Specific_Product_Header")]
    pub specific_product_header: SpecificProductHeader,
}

#[derive(Debug, Deserialize)]
pub struct SpecificProductHeader {
    #[serde(rename = "Product_Information")]
    pub product_information: ProductInformation,
    #[serde(rename = "Image_Information")]
    pub image_information: ImageInformation,
}

#[derive(Debug, Deserialize)]
pub struct ProductInformation {
    #[serde(rename = "Acquisition_Date_Time")]
    pub acquisition_date_time: Option<String>,
    #[serde(rename = "Solar_Angles")]
    pub solar_angles: Option<AngleEntry>,
    #[serde(rename = "Mean_Viewing_Incidence_Angle_List")]
    pub viewing_angle_list: Option<ViewingAngleList>,
}

#[derive(Debug, Deserialize)]
pub struct AngleEntry {
    #[serde(rename = "Azimuth")]
    pub azimuth: f64,
    #[serde(rename = "Zenith")]
    pub zenith: f64,
}

#[derive(Debug, Deserialize)]
pub struct ViewingAngleList {
    #[serde(rename = "Mean_Viewing_Incidence_Angle", default)]
    pub angles: Vec<AngleEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ImageInformation {
    #[serde(rename = "Reflectance_Quantification_Value")]
    pub reflectance_quantification: Option<f64>,
    #[serde(rename = "AOT_Quantification_Value")]
    pub aot_quantification: Option<f64>,
    #[serde(rename = "AOT_Nodata_Value")]
    pub aot_no_data: Option<f64>,
    #[serde(rename = "Band_Resolution_List")]
    pub band_resolution_list: BandResolutionList,
}

#[derive(Debug, Deserialize)]
pub struct BandResolutionList {
    #[serde(rename = "Band_Resolution", default)]
    pub groups: Vec<BandResolution>,
}

#[derive(Debug, Deserialize)]
pub struct BandResolution {
    #[serde(rename = "Resolution")]
    pub resolution: i32,
    #[serde(rename = "Band_List")]
    pub band_list: BandList,
}

#[derive(Debug, Deserialize)]
pub struct BandList {
    #[serde(rename = "Band", default)]
    pub bands: Vec<String>,
}

/// Parse a MACCS header into normalized product fields
pub(crate) fn parse_header(
    xml_content: &str,
    header_path: &Path,
    resolution: i32,
) -> CompositeResult<ProductMetadata> {
    let header = from_str::<MaccsHeader>(xml_content).map_err(|e| document_error("MACCS header", e))?;

    let mission_label = header.fixed_header.mission.trim().to_string();
    let mission = Mission::from_label(&mission_label).ok_or_else(|| {
        CompositeError::MetadataParse(format!("Unsupported MACCS mission: {}", mission_label))
    })?;

    let specific = &header.variable_header.specific_product_header;
    let info = &specific.product_information;
    let image = &specific.image_information;

    let groups = &image.band_resolution_list.groups;
    let group_index = select_resolution_group(groups, resolution)?;
    let bands = &groups[group_index].band_list.bands;
    log::debug!(
        "{} header, using {} m band group {} of {}: {:?}",
        mission,
        groups[group_index].resolution,
        group_index + 1,
        groups.len(),
        bands
    );

    let (green, red, nir) = mission.vnir_band_names();
    let mut product = ProductMetadata {
        mission: mission_label,
        green_band_index: band_position(bands, green),
        red_band_index: band_position(bands, red),
        nir_band_index: band_position(bands, nir),
        aot_band_index: ATB_AOT_BAND_INDEX,
        ..Default::default()
    };

    if let Some(date) = info.acquisition_date_time.as_deref().and_then(compact_date) {
        product.acquisition_date = date;
    }

    if let Some(q) = invert_quantification("reflectance", image.reflectance_quantification)? {
        product.reflectance_quantification = q;
    }
    if let Some(q) = invert_quantification("AOT", image.aot_quantification)? {
        product.aot_quantification = q;
    }
    if let Some(no_data) = image.aot_no_data {
        product.aot_no_data = no_data;
    }

    if let Some(solar) = &info.solar_angles {
        product.solar_mean_angle = AngleModel::new(solar.azimuth, solar.zenith);
    }
    if let Some(list) = &info.viewing_angle_list {
        product.sensor_band_mean_angles = list
            .angles
            .iter()
            .map(|a| AngleModel::new(a.azimuth, a.zenith))
            .collect();
    }

    let suffix = if groups.len() > 1 {
        format!("_R{}", group_index + 1)
    } else {
        String::new()
    };
    product.aot_file_name = raster_file_name(header_path, "ATB", &suffix);
    product.cloud_file_name = raster_file_name(header_path, "CLD", &suffix);
    product.water_file_name = raster_file_name(header_path, "MSK", &suffix);
    product.snow_file_name = product.water_file_name.clone();
    product.image_file_name = raster_file_name(header_path, "FRE", &suffix);

    Ok(product)
}

/// Pick the band group for a requested resolution, -1 selecting the first group
fn select_resolution_group(groups: &[BandResolution], resolution: i32) -> CompositeResult<usize> {
    if groups.is_empty() {
        return Err(CompositeError::MetadataParse(
            "MACCS header lists no band resolutions".to_string(),
        ));
    }

    if resolution == -1 {
        return Ok(0);
    }

    groups
        .iter()
        .position(|g| g.resolution == resolution)
        .ok_or_else(|| {
            CompositeError::MetadataParse(format!(
                "Resolution {} m not available, product offers {:?}",
                resolution,
                groups.iter().map(|g| g.resolution).collect::<Vec<_>>()
            ))
        })
}

/// `<dir>/<stem>.DBL.DIR/<stem>_<kind><suffix>.DBL.TIF`
fn raster_file_name(header_path: &Path, kind: &str, suffix: &str) -> String {
    let stem = header_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let dir = header_path.parent().map(Path::to_path_buf).unwrap_or_default();

    let path: PathBuf = dir
        .join(format!("{}.DBL.DIR", stem))
        .join(format!("{}_{}{}.DBL.TIF", stem, kind, suffix));
    path.display().to_string()
}
