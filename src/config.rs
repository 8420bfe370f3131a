use crate::enums::Interpolation;
use crate::error::Result;
use crate::tag::TagPath;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Maximum distance between a slice origin and the position predicted from
/// the first two slices of its block
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OriginTolerance {
    /// A fixed distance in mm
    Millimetres(f64),
    /// A fraction of the distance between neighbouring slices, so that thick
    /// slices with imprecise positions still form one block
    FractionOfSpacing(f64),
}

impl OriginTolerance {
    /// Fraction used when an adaptive tolerance is asked for without a value
    pub const DEFAULT_FRACTION: f64 = 0.3;

    /// Tolerance in mm for slices `step_length` mm apart
    pub fn resolve(&self, step_length: f64) -> f64 {
        match *self {
            OriginTolerance::Millimetres(mm) => mm,
            OriginTolerance::FractionOfSpacing(fraction) => fraction * step_length.abs(),
        }
    }
}

impl Default for OriginTolerance {
    fn default() -> Self {
        OriginTolerance::Millimetres(0.005)
    }
}

impl fmt::Display for OriginTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OriginTolerance::Millimetres(mm) => write!(f, "{mm} mm"),
            OriginTolerance::FractionOfSpacing(fraction) => {
                write!(f, "{fraction} x inter-slice distance")
            }
        }
    }
}

/// Geometric tolerances, in millimetres or degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub origin: OriginTolerance,
    /// Distance from the normal line above which two slices count as sheared
    pub shear_mm: f64,
    /// Maximum difference between the recorded and the computed tilt angle
    pub tilt_angle_deg: f64,
    /// Decimal places of Image Orientation (Patient) that separate series
    pub orientation_decimals: u32,
    /// Decimal places of the slice position used when sorting
    pub position_decimals: u32,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            origin: OriginTolerance::default(),
            shear_mm: 0.001,
            tilt_angle_deg: 0.25,
            orientation_decimals: 5,
            position_decimals: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Group gantry-tilted slices into one block and shear them back
    pub correct_tilt: bool,
    /// Merge 3D blocks at identical positions into one 3D+t volume
    pub group_3d_plus_t: bool,
    /// Keep tilted blocks that consist of two slices only
    pub accept_two_slice_groups: bool,
    pub tolerances: Tolerances,
    pub interpolation: Interpolation,
    /// Extra attributes copied into each volume's metadata
    pub additional_tags: Vec<TagPath>,
    /// Descend into sub-directories in [`crate::VolumeLoader::load_from_directory`]
    pub recursive: bool,
    /// Scan files and assemble blocks on the rayon pool
    pub parallel: bool,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            correct_tilt: true,
            group_3d_plus_t: true,
            accept_two_slice_groups: false,
            tolerances: Tolerances::default(),
            interpolation: Interpolation::default(),
            additional_tags: Vec::new(),
            recursive: false,
            parallel: true,
            cancel: None,
        }
    }
}

impl ReaderConfig {
    pub fn with_tilt_correction(mut self, correct_tilt: bool) -> Self {
        self.correct_tilt = correct_tilt;
        self
    }

    pub fn with_3d_plus_t(mut self, group: bool) -> Self {
        self.group_3d_plus_t = group;
        self
    }

    pub fn with_two_slice_groups(mut self, accept: bool) -> Self {
        self.accept_two_slice_groups = accept;
        self
    }

    pub fn with_tolerances(mut self, tolerances: Tolerances) -> Self {
        self.tolerances = tolerances;
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_recursion(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Request an additional attribute by textual tag path.
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidArgument`] if the path does not name exactly
    /// one tag.
    pub fn with_additional_tag(mut self, path: &str) -> Result<Self> {
        self.additional_tags.push(TagPath::parse(path)?);
        Ok(self)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}
