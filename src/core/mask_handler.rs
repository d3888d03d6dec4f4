use crate::types::{BandStack, CompositeError, CompositeResult};
use ndarray::{s, Axis, Zip};
use num_traits::{NumCast, PrimInt};

pub const MASK_CLOUD: u16 = 0x01;
pub const CLOUD_BIT_POS: usize = 0;
pub const MASK_WATER: u16 = 0x02;
pub const WATER_BIT_POS: usize = 1;
pub const MASK_SNOW: u16 = 0x04;
pub const SNOW_BIT_POS: usize = 2;

/// Splits packed L2A quality masks into cloud, water and snow flags
///
/// The cloud flag comes from the first mask, water and snow from the second.
/// Only the first component of each mask pixel is read.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskDecomposition;

impl MaskDecomposition {
    pub fn new() -> Self {
        Self
    }

    /// Decompose one pixel given the first component of each mask
    pub fn apply<T: PrimInt>(&self, cloud_mask: T, div_mask: T) -> [T; 3] {
        [
            extract_flag(cloud_mask, MASK_CLOUD, CLOUD_BIT_POS),
            extract_flag(div_mask, MASK_WATER, WATER_BIT_POS),
            extract_flag(div_mask, MASK_SNOW, SNOW_BIT_POS),
        ]
    }

    /// Decompose one multi-component pixel
    pub fn apply_pixel<T: PrimInt>(&self, cloud_mask: &[T], div_mask: &[T]) -> CompositeResult<[T; 3]> {
        match (cloud_mask.first(), div_mask.first()) {
            (Some(&a), Some(&b)) => Ok(self.apply(a, b)),
            _ => Err(CompositeError::InputShape(
                "Mask pixels must carry at least one component".to_string(),
            )),
        }
    }

    /// Decompose two (band, rows, cols) mask stacks into a (3, rows, cols) flag stack
    pub fn apply_rasters<T>(&self, cloud_mask: &BandStack<T>, div_mask: &BandStack<T>) -> CompositeResult<BandStack<T>>
    where
        T: PrimInt + Send + Sync,
    {
        let (a_bands, a_rows, a_cols) = cloud_mask.dim();
        let (b_bands, b_rows, b_cols) = div_mask.dim();

        if a_bands == 0 || b_bands == 0 {
            return Err(CompositeError::InputShape(
                "Mask rasters must have at least one band".to_string(),
            ));
        }
        if (a_rows, a_cols) != (b_rows, b_cols) {
            return Err(CompositeError::InputShape(format!(
                "Cloud mask is {}x{} but water/snow mask is {}x{}",
                a_rows, a_cols, b_rows, b_cols
            )));
        }

        log::debug!("Decomposing {}x{} mask rasters", a_rows, a_cols);

        let cloud_band = cloud_mask.index_axis(Axis(0), 0);
        let div_band = div_mask.index_axis(Axis(0), 0);

        let mut flags = BandStack::<T>::zeros((3, a_rows, a_cols));
        let (cloud, water, snow) = flags.multi_slice_mut((s![0, .., ..], s![1, .., ..], s![2, .., ..]));

        let zip = Zip::from(cloud).and(water).and(snow).and(&cloud_band).and(&div_band);
        let decompose = |c: &mut T, w: &mut T, sn: &mut T, &a: &T, &b: &T| {
            let [cloud_flag, water_flag, snow_flag] = self.apply(a, b);
            *c = cloud_flag;
            *w = water_flag;
            *sn = snow_flag;
        };

        #[cfg(feature = "parallel")]
        zip.par_for_each(decompose);
        #[cfg(not(feature = "parallel"))]
        zip.for_each(decompose);

        Ok(flags)
    }
}

/// `(value & mask) >> bit_pos`, with the mask widened to the pixel type
fn extract_flag<T: PrimInt>(value: T, mask: u16, bit_pos: usize) -> T {
    let mask = <T as NumCast>::from(mask).unwrap_or_else(|| T::one() << bit_pos);
    (value & mask) >> bit_pos
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_masks_match_bit_positions() {
        assert_eq!(MASK_CLOUD, 1 << CLOUD_BIT_POS);
        assert_eq!(MASK_WATER, 1 << WATER_BIT_POS);
        assert_eq!(MASK_SNOW, 1 << SNOW_BIT_POS);
    }

    #[test]
    fn test_pixel_decomposition() {
        let handler = MaskDecomposition::new();
        assert_eq!(handler.apply_pixel(&[0x05u16], &[0x06u16]).unwrap(), [1, 1, 1]);
        assert_eq!(handler.apply_pixel(&[0x00u16], &[0x00u16]).unwrap(), [0, 0, 0]);
        // Water bit in the cloud mask and cloud bit in the other mask are ignored
        assert_eq!(handler.apply(0x02u8, 0x01u8), [0, 0, 0]);
        assert_eq!(handler.apply(0xFFu8, 0x04u8), [1, 0, 1]);
        assert_eq!(handler.apply(-1i16, 0x02i16), [1, 1, 0]);
    }

    #[test]
    fn test_extra_components_ignored() {
        let handler = MaskDecomposition::new();
        assert_eq!(handler.apply_pixel(&[0x00u16, 0xFF], &[0x02u16, 0xFF]).unwrap(), [0, 1, 0]);
        assert!(matches!(
            handler.apply_pixel::<u16>(&[], &[1]),
            Err(CompositeError::InputShape(_))
        ));
    }

    #[test]
    fn test_raster_decomposition() {
        let cloud = Array3::from_shape_vec((1, 2, 2), vec![1u16, 0, 3, 0]).unwrap();
        let div = Array3::from_shape_vec((2, 2, 2), vec![2u16, 4, 6, 0, 9, 9, 9, 9]).unwrap();

        let flags = MaskDecomposition::new().apply_rasters(&cloud, &div).unwrap();
        assert_eq!(flags.dim(), (3, 2, 2));
        assert_eq!(flags.index_axis(Axis(0), 0).iter().cloned().collect::<Vec<_>>(), vec![1, 0, 1, 0]);
        assert_eq!(flags.index_axis(Axis(0), 1).iter().cloned().collect::<Vec<_>>(), vec![1, 0, 1, 0]);
        assert_eq!(flags.index_axis(Axis(0), 2).iter().cloned().collect::<Vec<_>>(), vec![0, 1, 1, 0]);
    }

    #[test]
    fn test_raster_shape_mismatch() {
        let handler = MaskDecomposition::new();
        let a = Array3::<u16>::zeros((1, 2, 2));
        let b = Array3::<u16>::zeros((1, 2, 3));
        assert!(matches!(handler.apply_rasters(&a, &b), Err(CompositeError::InputShape(_))));

        let empty = Array3::<u16>::zeros((0, 2, 2));
        assert!(matches!(handler.apply_rasters(&empty, &a), Err(CompositeError::InputShape(_))));
    }
}
