//! Parsing of the spatial attributes of a frame.

use crate::error::Result;
use crate::tag_cache::{FrameId, TagCache};

use dicom_dictionary_std::tags;
use glam::DVec3;
use log::error;

/// Split a multi-valued decimal string (`"1.5\\-2\\3e1"`) into numbers.
/// Returns `None` if any component is not a number.
pub fn parse_decimals(text: &str) -> Option<Vec<f64>> {
    if text.trim().is_empty() {
        return Some(Vec::new());
    }
    text.split('\\')
        .map(|part| part.trim().parse::<f64>().ok())
        .collect()
}

/// Image Position (Patient): exactly three values
pub fn parse_point(text: &str) -> Option<DVec3> {
    match parse_decimals(text)?.as_slice() {
        [x, y, z] => Some(DVec3::new(*x, *y, *z)),
        [] => None,
        values => {
            error!(
                "Image Position (Patient) has {} instead of 3 values: '{text}'",
                values.len()
            );
            None
        }
    }
}

/// Image Orientation (Patient): row direction ("right") and column
/// direction ("up"). Returns `None` for malformed or collinear vectors.
pub fn parse_orientation(text: &str) -> Option<(DVec3, DVec3)> {
    let values = parse_decimals(text)?;
    let [rx, ry, rz, ux, uy, uz] = values.as_slice() else {
        if !values.is_empty() {
            error!(
                "Image Orientation (Patient) has {} instead of 6 values: '{text}'",
                values.len()
            );
        }
        return None;
    };

    let right = DVec3::new(*rx, *ry, *rz);
    let up = DVec3::new(*ux, *uy, *uz);
    if right.cross(up).length_squared() < f64::EPSILON {
        error!("Image Orientation (Patient) contains collinear vectors: '{text}'");
        return None;
    }
    Some((right, up))
}

/// Pixel Spacing as (spacing between columns, spacing between rows), i.e.
/// (x, y). DICOM stores the row spacing first.
pub fn parse_pixel_spacing(text: &str) -> Option<(f64, f64)> {
    match parse_decimals(text)?.as_slice() {
        [row_spacing, column_spacing, ..] if *row_spacing > 0.0 && *column_spacing > 0.0 => {
            Some((*column_spacing, *row_spacing))
        }
        _ => None,
    }
}

/// First value of a decimal string
pub fn parse_scalar(text: &str) -> Option<f64> {
    parse_decimals(text)?.first().copied()
}

/// Spatial description of one frame as far as sorting and tilt analysis need it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceGeometry {
    pub origin: Option<DVec3>,
    pub right: DVec3,
    pub up: DVec3,
    pub has_orientation: bool,
    /// Gantry/Detector Tilt as recorded in the header, degrees
    pub recorded_tilt: Option<f64>,
}

impl SliceGeometry {
    pub fn new(origin: DVec3, right: DVec3, up: DVec3) -> Self {
        Self {
            origin: Some(origin),
            right,
            up,
            has_orientation: true,
            recorded_tilt: None,
        }
    }

    pub fn from_cache(cache: &TagCache, frame: FrameId) -> Result<Self> {
        let origin = parse_point(cache.tag_value(frame, tags::IMAGE_POSITION_PATIENT)?);
        let orientation = parse_orientation(cache.tag_value(frame, tags::IMAGE_ORIENTATION_PATIENT)?);
        let recorded_tilt = parse_scalar(cache.tag_value(frame, tags::GANTRY_DETECTOR_TILT)?);

        let (right, up) = orientation.unwrap_or((DVec3::X, DVec3::Y));
        Ok(Self {
            origin,
            right,
            up,
            has_orientation: orientation.is_some(),
            recorded_tilt,
        })
    }

    pub fn normal(&self) -> DVec3 {
        self.right.cross(self.up)
    }
}

/// Position of `point` projected onto the line through `line_origin` along
/// `direction`
pub fn project_point_on_line(point: DVec3, line_origin: DVec3, direction: DVec3) -> DVec3 {
    let factor = (point - line_origin).dot(direction) / direction.length_squared();
    line_origin + factor * direction
}

/// Distance of `point` from the line through `line_origin` along `direction`
pub fn distance_from_line(point: DVec3, line_origin: DVec3, direction: DVec3) -> f64 {
    (point - line_origin).cross(direction).length() / direction.length()
}
