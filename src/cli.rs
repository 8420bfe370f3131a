use crate::config::{OriginTolerance, ReaderConfig, Tolerances};
use crate::enums::Interpolation;
use crate::error::Result;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Sort DICOM files into series and assemble them into 3D/4D volumes
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// DICOM files and/or directories
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Descend into sub-directories
    #[arg(short, long)]
    pub recursive: bool,

    /// Split gantry-tilted series instead of shearing them back
    #[arg(long)]
    pub no_tilt_correction: bool,

    /// Keep repeated acquisitions of the same positions as separate volumes
    #[arg(long = "no-4d")]
    pub no_4d: bool,

    /// Maximum deviation of a slice position from the regular grid, in mm
    #[arg(long, value_name = "MM")]
    pub origin_tolerance: Option<f64>,

    /// Allow slice positions to deviate by a fraction of the inter-slice
    /// distance instead, e.g. `--adaptive-origin-tolerance=0.5` (0.3 if no
    /// value is given)
    #[arg(
        long,
        value_name = "FRACTION",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "0.3",
        conflicts_with = "origin_tolerance"
    )]
    pub adaptive_origin_tolerance: Option<f64>,

    /// Resampling used for tilt correction and previews
    #[arg(long, value_enum, default_value_t = InterpolationArg::Linear)]
    pub interpolation: InterpolationArg,

    /// Additional attribute to report per volume, e.g. "0008,0060" or
    /// "StudyDescription"
    #[arg(short, long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Write a PNG of the centre axial slice of every volume into DIR
    #[arg(long, value_name = "DIR")]
    pub preview: Option<PathBuf>,

    /// Number of worker threads (default: one per core)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Log sorting decisions
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationArg {
    Nearest,
    Linear,
}

impl From<InterpolationArg> for Interpolation {
    fn from(arg: InterpolationArg) -> Self {
        match arg {
            InterpolationArg::Nearest => Interpolation::Nearest,
            InterpolationArg::Linear => Interpolation::Linear,
        }
    }
}

impl Args {
    /// Reader configuration for these arguments.
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidArgument`] for tags that do not name exactly
    /// one attribute.
    pub fn reader_config(&self) -> Result<ReaderConfig> {
        let mut tolerances = Tolerances::default();
        if let Some(mm) = self.origin_tolerance {
            tolerances.origin = OriginTolerance::Millimetres(mm);
        }
        if let Some(fraction) = self.adaptive_origin_tolerance {
            tolerances.origin = OriginTolerance::FractionOfSpacing(fraction);
        }

        self.tags.iter().try_fold(
            ReaderConfig::default()
                .with_recursion(self.recursive)
                .with_tilt_correction(!self.no_tilt_correction)
                .with_3d_plus_t(!self.no_4d)
                .with_tolerances(tolerances)
                .with_interpolation(self.interpolation.into()),
            |config, tag| config.with_additional_tag(tag),
        )
    }
}
