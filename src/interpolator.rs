use crate::enums::Interpolation;
use crate::pixel::PixelComponent;

use ndarray::{ArrayView2, ArrayView3, ArrayViewMut3, Axis};

pub(crate) struct Interpolator;

impl Interpolator {
    /// Matrix size that gives every axis the finest of the three spacings.
    /// `spacing` is (x, y, z), `original_dim` is (depth, height, width).
    pub(crate) fn get_isotropic_dimensions(
        spacing: [f64; 3],
        original_dim: (usize, usize, usize),
    ) -> (u32, u32, u32) {
        let [x_spacing, y_spacing, z_spacing] = spacing;
        let min_spacing = x_spacing.min(y_spacing).min(z_spacing);
        let inv_min_spacing = 1.0 / min_spacing;

        let new_x = (original_dim.2 as f64 * x_spacing * inv_min_spacing) as u32;
        let new_y = (original_dim.1 as f64 * y_spacing * inv_min_spacing) as u32;
        let new_z = (original_dim.0 as f64 * z_spacing * inv_min_spacing) as u32;

        (new_z, new_y, new_x)
    }

    #[inline]
    pub(crate) fn bilinear_interpolate(slice: &ArrayView2<f64>, y: f64, x: f64) -> f64 {
        let (height, width) = slice.dim();

        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let y1 = (y0 + 1).min(height - 1);
        let x1 = (x0 + 1).min(width - 1);

        let dy = y - y0 as f64;
        let dx = x - x0 as f64;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let v00 = slice[[y0, x0]];
        let v01 = slice[[y0, x1]];
        let v10 = slice[[y1, x0]];
        let v11 = slice[[y1, x1]];

        let v0 = v00.mul_add(one_minus_dx, v01 * dx);
        let v1 = v10.mul_add(one_minus_dx, v11 * dx);

        v0.mul_add(one_minus_dy, v1 * dy)
    }

    /// Source rows and weight of the second one for sampling at `y`, or
    /// `None` if `y` lies outside the frame
    #[inline]
    fn source_rows(y: f64, rows: usize, interpolation: Interpolation) -> Option<(usize, usize, f64)> {
        let last = (rows - 1) as f64;
        match interpolation {
            Interpolation::Nearest => {
                if y < -0.5 || y >= last + 0.5 {
                    return None;
                }
                let row = (y.round().max(0.0) as usize).min(rows - 1);
                Some((row, row, 0.0))
            }
            Interpolation::Linear => {
                const EDGE: f64 = 1e-6;
                if y < -EDGE || y > last + EDGE {
                    return None;
                }
                let y = y.clamp(0.0, last);
                let y0 = y.floor() as usize;
                let y1 = (y0 + 1).min(rows - 1);
                Some((y0, y1, y - y0 as f64))
            }
        }
    }

    /// Write `source` (rows, columns, components) into `target`, moved down by
    /// `offset` rows. Target rows no source row covers keep their value.
    pub(crate) fn shift_rows<T: PixelComponent>(
        source: ArrayView3<T>,
        mut target: ArrayViewMut3<T>,
        offset: f64,
        interpolation: Interpolation,
    ) {
        let rows = source.len_of(Axis(0));
        if rows == 0 {
            return;
        }

        for (target_row, mut lane) in target.axis_iter_mut(Axis(0)).enumerate() {
            let Some((y0, y1, weight)) =
                Self::source_rows(target_row as f64 - offset, rows, interpolation)
            else {
                continue;
            };

            if weight == 0.0 {
                lane.assign(&source.index_axis(Axis(0), y0));
                continue;
            }

            let upper = source.index_axis(Axis(0), y0);
            let lower = source.index_axis(Axis(0), y1);
            ndarray::Zip::from(&mut lane)
                .and(&upper)
                .and(&lower)
                .for_each(|out, &a, &b| {
                    *out = T::from_f64(a.to_f64().mul_add(1.0 - weight, b.to_f64() * weight));
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array3, array};

    fn column(values: &[u16]) -> Array3<u16> {
        Array3::from_shape_fn((values.len(), 1, 1), |(y, _, _)| values[y])
    }

    #[test]
    fn integral_shift_copies_rows() {
        let source = column(&[10, 20, 30]);
        let mut target = Array3::from_elem((5, 1, 1), 0u16);
        Interpolator::shift_rows(source.view(), target.view_mut(), 2.0, Interpolation::Linear);
        assert_eq!(target.iter().copied().collect::<Vec<_>>(), vec![0, 0, 10, 20, 30]);
    }

    #[test]
    fn fractional_shift_interpolates_linearly() {
        let source = column(&[10, 20, 30]);
        let mut target = Array3::from_elem((4, 1, 1), 0u16);
        Interpolator::shift_rows(source.view(), target.view_mut(), 0.5, Interpolation::Linear);
        assert_eq!(target.iter().copied().collect::<Vec<_>>(), vec![0, 15, 25, 0]);
    }

    #[test]
    fn fractional_shift_with_nearest_neighbour() {
        let source = column(&[10, 20, 30]);
        let mut target = Array3::from_elem((4, 1, 1), 0u16);
        Interpolator::shift_rows(source.view(), target.view_mut(), 0.4, Interpolation::Nearest);
        assert_eq!(target.iter().copied().collect::<Vec<_>>(), vec![10, 20, 30, 0]);
    }

    #[test]
    fn bilinear_centre_is_the_mean() {
        let slice = array![[0.0, 2.0], [4.0, 6.0]];
        assert_abs_diff_eq!(
            Interpolator::bilinear_interpolate(&slice.view(), 0.5, 0.5),
            3.0
        );
    }

    #[test]
    fn isotropic_dimensions_follow_the_finest_spacing() {
        assert_eq!(
            Interpolator::get_isotropic_dimensions([0.5, 0.5, 2.0], (10, 64, 32)),
            (40, 64, 32)
        );
    }
}
