//! Core per-pixel weight transforms

pub mod mask_handler;
pub mod weight_aot;
pub mod gaussian_filter;
pub mod weight_clouds;
pub mod total_weight;

// Re-export main types
pub use mask_handler::{MaskDecomposition, MASK_CLOUD, MASK_SNOW, MASK_WATER};
pub use weight_aot::{AotWeightParams, WeightOnAot};
pub use gaussian_filter::{GaussianParams, GaussianSmoothing};
pub use weight_clouds::{CloudWeightParams, WeightOnClouds};
pub use total_weight::{TotalWeight, TotalWeightParams};
