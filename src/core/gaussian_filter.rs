use crate::types::{CompositeError, CompositeResult, WeightImage};
use ndarray::{Array2, ArrayView2, ArrayViewMut1, Axis};
use serde::{Deserialize, Serialize};

/// Kernel half-width in standard deviations
const KERNEL_TRUNCATION_SIGMAS: f32 = 3.0;

/// Largest accepted sigma in pixels, keeping the kernel at most 6001 taps
pub const MAX_SIGMA: f32 = 1000.0;

/// Gaussian smoothing parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianParams {
    /// Standard deviation in pixels
    pub sigma: f32,
}

impl Default for GaussianParams {
    fn default() -> Self {
        Self { sigma: 1.0 }
    }
}

/// Separable discrete Gaussian smoothing of a weight raster, followed by a
/// linear rescale back to the input value range.
///
/// Borders are extended by replicating the edge pixel. NaN pixels propagate
/// into their neighbourhood.
#[derive(Debug, Clone)]
pub struct GaussianSmoothing {
    sigma: f32,
    kernel: Vec<f32>,
}

impl GaussianSmoothing {
    pub fn new(params: GaussianParams) -> CompositeResult<Self> {
        if !params.sigma.is_finite() || params.sigma <= 0.0 {
            return Err(CompositeError::Configuration(format!(
                "Gaussian sigma must be positive, got {}",
                params.sigma
            )));
        }
        if params.sigma > MAX_SIGMA {
            return Err(CompositeError::Configuration(format!(
                "Gaussian sigma {} exceeds the maximum of {} pixels",
                params.sigma, MAX_SIGMA
            )));
        }

        Ok(Self {
            sigma: params.sigma,
            kernel: Self::build_kernel(params.sigma),
        })
    }

    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    /// Normalized kernel taps, centre tap in the middle
    pub fn kernel(&self) -> &[f32] {
        &self.kernel
    }

    fn build_kernel(sigma: f32) -> Vec<f32> {
        let radius = ((KERNEL_TRUNCATION_SIGMAS * sigma).ceil() as usize).max(1);
        let two_sigma_sq = 2.0 * sigma as f64 * sigma as f64;

        let taps: Vec<f64> = (0..=2 * radius)
            .map(|i| {
                let x = i as f64 - radius as f64;
                (-x * x / two_sigma_sq).exp()
            })
            .collect();
        let sum: f64 = taps.iter().sum();

        taps.iter().map(|t| (t / sum) as f32).collect()
    }

    /// Smooth and rescale a weight raster
    pub fn apply(&self, image: &WeightImage) -> WeightImage {
        self.apply_view(image.view())
    }

    pub fn apply_view(&self, image: ArrayView2<f32>) -> WeightImage {
        let (rows, cols) = image.dim();
        if rows == 0 || cols == 0 {
            return image.to_owned();
        }

        log::debug!(
            "Gaussian smoothing {}x{} raster, sigma={}, {} taps",
            rows,
            cols,
            self.sigma,
            self.kernel.len()
        );

        let horizontal = self.convolve_rows(image);
        let smoothed = self.convolve_columns(horizontal.view());

        rescale_to_range(smoothed, finite_range(image.iter()))
    }

    fn convolve_rows(&self, image: ArrayView2<f32>) -> WeightImage {
        let (rows, cols) = image.dim();
        let radius = self.kernel.len() / 2;
        let mut output = Array2::<f32>::zeros((rows, cols));

        for_each_row(&mut output, |i, mut out_row| {
            let in_row = image.row(i);
            for j in 0..cols {
                let mut acc = 0.0f32;
                for (k, tap) in self.kernel.iter().enumerate() {
                    let jj = clamp_index(j as isize + k as isize - radius as isize, cols);
                    acc += tap * in_row[jj];
                }
                out_row[j] = acc;
            }
        });

        output
    }

    fn convolve_columns(&self, image: ArrayView2<f32>) -> WeightImage {
        let (rows, cols) = image.dim();
        let radius = self.kernel.len() / 2;
        let mut output = Array2::<f32>::zeros((rows, cols));

        for_each_row(&mut output, |i, mut out_row| {
            for (k, tap) in self.kernel.iter().enumerate() {
                let ii = clamp_index(i as isize + k as isize - radius as isize, rows);
                out_row.scaled_add(*tap, &image.row(ii));
            }
        });

        output
    }
}

/// Replicate-edge border policy
fn clamp_index(index: isize, len: usize) -> usize {
    index.clamp(0, len as isize - 1) as usize
}

fn for_each_row<F>(output: &mut WeightImage, f: F)
where
    F: Fn(usize, ArrayViewMut1<f32>) + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        output
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(i, row)| f(i, row));
    }
    #[cfg(not(feature = "parallel"))]
    {
        output
            .axis_iter_mut(Axis(0))
            .enumerate()
            .for_each(|(i, row)| f(i, row));
    }
}

/// Min and max over finite values
pub(crate) fn finite_range<'a, I>(values: I) -> Option<(f32, f32)>
where
    I: IntoIterator<Item = &'a f32>,
{
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |range, &v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Linearly map the smoothed range onto `target`, leaving the raster as is
/// when either range is degenerate
fn rescale_to_range(mut smoothed: WeightImage, target: Option<(f32, f32)>) -> WeightImage {
    let source = finite_range(smoothed.iter());
    let ((src_min, src_max), (dst_min, dst_max)) = match (source, target) {
        (Some(s), Some(t)) if s.1 > s.0 && t.1 > t.0 => (s, t),
        _ => {
            log::warn!("Degenerate value range, skipping intensity rescale");
            return smoothed;
        }
    };

    let scale = (dst_max - dst_min) / (src_max - src_min);
    smoothed.mapv_inplace(|v| (dst_min + (v - src_min) * scale).clamp(dst_min, dst_max));
    smoothed
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn gradient_image(rows: usize, cols: usize) -> WeightImage {
        Array2::from_shape_fn((rows, cols), |(i, j)| {
            0.33 + 0.67 * (((i * 7 + j * 13) % 17) as f32 / 16.0)
        })
    }

    #[test]
    fn test_invalid_sigma() {
        for sigma in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                GaussianSmoothing::new(GaussianParams { sigma }),
                Err(CompositeError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_oversized_sigma_rejected() {
        for sigma in [MAX_SIGMA * 1.5, 1e9, 1e18, f32::MAX] {
            assert!(matches!(
                GaussianSmoothing::new(GaussianParams { sigma }),
                Err(CompositeError::Configuration(_))
            ));
        }

        let widest = GaussianSmoothing::new(GaussianParams { sigma: MAX_SIGMA }).unwrap();
        assert_eq!(widest.kernel().len(), 6001);
    }

    #[test]
    fn test_kernel_is_normalized_and_symmetric() {
        let filter = GaussianSmoothing::new(GaussianParams { sigma: 1.5 }).unwrap();
        let kernel = filter.kernel();
        assert_eq!(kernel.len(), 2 * 5 + 1);
        assert_relative_eq!(kernel.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        for k in 0..kernel.len() / 2 {
            assert_relative_eq!(kernel[k], kernel[kernel.len() - 1 - k]);
        }
        assert!(kernel[5] > kernel[4]);
    }

    #[test]
    fn test_small_sigma_is_identity() {
        let image = gradient_image(12, 9);
        let filter = GaussianSmoothing::new(GaussianParams { sigma: 0.05 }).unwrap();
        let smoothed = filter.apply(&image);

        for (a, b) in image.iter().zip(smoothed.iter()) {
            assert!((a - b).abs() < 1e-5, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_constant_image_unchanged() {
        let image = Array2::from_elem((6, 5), 0.75f32);
        let filter = GaussianSmoothing::new(GaussianParams { sigma: 2.0 }).unwrap();
        let smoothed = filter.apply(&image);
        for v in smoothed.iter() {
            assert_relative_eq!(*v, 0.75, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_rescale_keeps_input_range() {
        let image = gradient_image(20, 20);
        let (lo, hi) = finite_range(image.iter()).unwrap();

        let filter = GaussianSmoothing::new(GaussianParams { sigma: 1.0 }).unwrap();
        let smoothed = filter.apply(&image);
        let (s_lo, s_hi) = finite_range(smoothed.iter()).unwrap();

        assert_relative_eq!(s_lo, lo, epsilon = 1e-5);
        assert_relative_eq!(s_hi, hi, epsilon = 1e-5);
    }

    #[test]
    fn test_edge_is_feathered() {
        // Hard vertical edge between weight 0 and weight 1
        let image = Array2::from_shape_fn((8, 10), |(_, j)| if j < 5 { 0.0f32 } else { 1.0 });
        let filter = GaussianSmoothing::new(GaussianParams { sigma: 1.0 }).unwrap();
        let smoothed = filter.apply(&image);

        for i in 0..8 {
            assert!(smoothed[[i, 4]] > 0.0 && smoothed[[i, 4]] < 0.5);
            assert!(smoothed[[i, 5]] > 0.5 && smoothed[[i, 5]] < 1.0);
            // Replicated borders keep the far columns flat
            assert_relative_eq!(smoothed[[i, 0]], 0.0, epsilon = 1e-5);
            assert_relative_eq!(smoothed[[i, 9]], 1.0, epsilon = 1e-5);
            for j in 1..10 {
                assert!(smoothed[[i, j]] >= smoothed[[i, j - 1]]);
            }
        }
    }

    #[test]
    fn test_empty_image() {
        let filter = GaussianSmoothing::new(GaussianParams::default()).unwrap();
        let empty = Array2::<f32>::zeros((0, 4));
        assert_eq!(filter.apply(&empty).dim(), (0, 4));
    }
}
