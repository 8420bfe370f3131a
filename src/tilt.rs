//! Gantry tilt detection.
//!
//! CT scanners with a tilted gantry produce slices that are parallel to each
//! other but whose origins do not lie on a line along the slice normal: each
//! slice is shifted a constant amount along its column direction ("up").
//! Such a stack can be turned into a regular grid by shearing every slice
//! back by `index * shift_per_slice`. Any other kind of shear (a shift along
//! the row direction, or shifts that are not linear in the slice index) is
//! not a gantry tilt and the slices have to be split into separate blocks.

use crate::config::{OriginTolerance, Tolerances};
use crate::error::{Error, Result};
use crate::geometry::{SliceGeometry, distance_from_line};

use glam::DVec3;
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GantryTiltInfo {
    shift_up: f64,
    shift_right: f64,
    shift_normal: f64,
    slices_apart: usize,
    up: DVec3,
    shear_epsilon: f64,
}

impl Default for GantryTiltInfo {
    fn default() -> Self {
        Self {
            shift_up: 0.0,
            shift_right: 0.0,
            shift_normal: 0.0,
            slices_apart: 1,
            up: DVec3::Y,
            shear_epsilon: Tolerances::default().shear_mm,
        }
    }
}

impl GantryTiltInfo {
    /// No tilt at all
    pub fn none() -> Self {
        Self::default()
    }

    /// Compare two slice origins `slices_apart` slices apart. `right` and
    /// `up` are the row and column directions of the slices.
    pub fn between(
        origin1: DVec3,
        origin2: DVec3,
        right: DVec3,
        up: DVec3,
        slices_apart: usize,
        shear_epsilon: f64,
    ) -> Self {
        let normal = right.cross(up);
        let offset = origin2 - origin1;
        let mut info = Self {
            shift_normal: offset.dot(normal) / normal.length(),
            slices_apart: slices_apart.max(1),
            up: up.normalize_or_zero(),
            shear_epsilon,
            ..Self::default()
        };

        let distance = distance_from_line(origin2, origin1, normal);
        if distance > shear_epsilon {
            info.shift_right = offset.dot(right) / right.length();
            info.shift_up = offset.dot(up) / up.length();
            debug!(
                "  slices look sheared: origin off the normal line by {distance:.4} mm \
                 (shift up {:.4}, right {:.4}, normal {:.4})",
                info.shift_up, info.shift_right, info.shift_normal
            );
        }
        info
    }

    pub fn is_sheared(&self) -> bool {
        self.shift_right.abs() > self.shear_epsilon || self.shift_up.abs() > self.shear_epsilon
    }

    pub fn is_regular_gantry_tilt(&self) -> bool {
        self.shift_right.abs() < self.shear_epsilon && self.shift_up.abs() > self.shear_epsilon
    }

    /// Slices must be sheared back before they form a regular grid
    pub fn correction_required(&self) -> bool {
        self.is_regular_gantry_tilt()
    }

    pub fn tilt_angle_degrees(&self) -> f64 {
        if !self.is_sheared() {
            return 0.0;
        }
        self.shift_up.abs().atan2(self.shift_normal.abs()).to_degrees()
    }

    /// Shift along the column direction between neighbouring slices, in mm
    pub fn shift_per_slice(&self) -> f64 {
        self.shift_up / self.slices_apart as f64
    }

    pub fn shift_vector_per_slice(&self) -> DVec3 {
        self.up * self.shift_per_slice()
    }

    /// Distance between neighbouring slices along the normal
    pub fn real_z_spacing(&self) -> f64 {
        self.shift_normal.abs() / self.slices_apart as f64
    }

    /// Total extent the corrected volume grows along the column direction
    pub fn tilt_corrected_additional_size(&self) -> f64 {
        self.shift_up.abs()
    }

    pub fn slices_apart(&self) -> usize {
        self.slices_apart
    }
}

/// Decides whether an ordered list of slices is a regular gantry tilt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GantryTiltAnalyzer {
    pub origin_tolerance: OriginTolerance,
    pub shear_epsilon: f64,
    pub angle_tolerance: f64,
}

impl Default for GantryTiltAnalyzer {
    fn default() -> Self {
        Self::from(&Tolerances::default())
    }
}

impl From<&Tolerances> for GantryTiltAnalyzer {
    fn from(tolerances: &Tolerances) -> Self {
        Self {
            origin_tolerance: tolerances.origin,
            shear_epsilon: tolerances.shear_mm,
            angle_tolerance: tolerances.tilt_angle_deg,
        }
    }
}

impl GantryTiltAnalyzer {
    /// Analyze the ordered slices of one block.
    ///
    /// # Errors
    ///
    /// [`Error::NoTiltApplicable`] if the slices are sheared in a way that
    /// a per-slice shift cannot correct; the caller should split the block.
    pub fn analyze(&self, slices: &[SliceGeometry]) -> Result<GantryTiltInfo> {
        let (Some(first), Some(last)) = (slices.first(), slices.last()) else {
            return Ok(GantryTiltInfo::none());
        };
        if slices.len() < 2 {
            return Ok(GantryTiltInfo::none());
        }

        let origins: Option<Vec<DVec3>> = slices.iter().map(|slice| slice.origin).collect();
        let Some(origins) = origins else {
            return Err(Error::NoTiltApplicable(
                "not all slices carry a position".to_string(),
            ));
        };
        let first_origin = origins[0];
        let last_origin = origins[origins.len() - 1];
        let slices_apart = slices.len() - 1;

        let info = GantryTiltInfo::between(
            first_origin,
            last_origin,
            first.right,
            first.up,
            slices_apart,
            self.shear_epsilon,
        );
        debug!(
            "Tilt analysis of {} slices: spacing along normal {:.4} mm, shift per slice {:.4} mm",
            slices.len(),
            info.real_z_spacing(),
            info.shift_per_slice()
        );

        if !info.is_sheared() {
            return Ok(info);
        }
        if !info.is_regular_gantry_tilt() {
            return Err(Error::NoTiltApplicable(format!(
                "slices are shifted {:.4} mm along the row direction",
                info.shift_right
            )));
        }

        let step = (last_origin - first_origin) / slices_apart as f64;
        let allowed = self.origin_tolerance.resolve(step.length());
        for (index, origin) in origins.iter().enumerate() {
            let predicted = first_origin + step * index as f64;
            let residual = (*origin - predicted).length();
            if residual > allowed {
                return Err(Error::NoTiltApplicable(format!(
                    "slice {index} is {residual:.4} mm off the tilted grid (allowed {allowed:.4})"
                )));
            }
        }

        let angle = info.tilt_angle_degrees();
        if let Some(recorded) = last.recorded_tilt.or(first.recorded_tilt)
            && (recorded.abs() - angle).abs() > self.angle_tolerance
        {
            return Err(Error::NoTiltApplicable(format!(
                "computed tilt of {angle:.3} degrees contradicts the recorded {recorded:.3} degrees"
            )));
        }

        debug!("  regular gantry tilt of {angle:.3} degrees");
        Ok(info)
    }
}
