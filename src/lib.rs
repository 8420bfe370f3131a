//! # DICOM volume assembler
//!
//! This crate turns an unordered set of DICOM files into image volumes.
//!
//! Loading happens in three stages:
//!  - Scanning: a [`TagScanner`] reads the requested attributes of every
//!    frame of every file once and keeps them in a [`TagCache`]. Files that
//!    cannot be parsed are reported and skipped.
//!  - Sorting: a [`SortingChain`] separates the frames into series and
//!    orders them, then an [`EquiDistantBlocksSorter`] splits every series
//!    into blocks of evenly spaced slices. Blocks that repeat the same
//!    positions are condensed into a single 3D+t block, and gantry tilted
//!    blocks are recognised by the [`GantryTiltAnalyzer`].
//!  - Assembly: every block is read into a 5-dimensional array
//!    (time, slice, row, column, component) of the component type its
//!    pixel format maps to. Tilted slices are shifted back onto a
//!    rectangular grid.
//!
//! If the environment supports it files are scanned and blocks are
//! assembled in parallel using rayon. The resulting [`Volume`] can be
//! sliced in the three medical axes:
//!  - Axial
//!  - Coronal
//!  - Sagittal
//!
//! # Examples
//!
//! ## Reading a directory into volumes
//!
//! Load all files from the dicom/ directory, then save the image at the
//! centre of the first volume in the Sagittal axis.
//!
//! ```no_run
//! # use dicom_volume_assembler::{Interpolation, Orientation, ReaderConfig, VolumeLoader};
//! let loader = VolumeLoader::new(ReaderConfig::default());
//! let result = loader
//!     .load_from_directory("dicom")
//!     .expect("should have loaded files from directory");
//! for diagnostic in &result.diagnostics {
//!     eprintln!("{}: {}", diagnostic.subject, diagnostic.error);
//! }
//! let volume = &result.volumes[0];
//! let image = volume
//!     .get_image_from_axis(volume.dim().3 / 2, Orientation::Sagittal, Interpolation::Linear)
//!     .expect("should have returned image at center of volume");
//! image.save("result.png").expect("should have written the image");
//! ```

pub mod assembler;
pub mod block;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod enums;
pub mod error;
pub mod frame_source;
pub mod geometry;
mod interpolator;
pub mod pixel;
pub mod scanner;
pub mod sorter;
pub mod tag;
pub mod tag_cache;
pub mod tilt;
pub mod volume;
pub mod volume_loader;

pub use block::ImageBlockDescriptor;
pub use config::{OriginTolerance, ReaderConfig, Tolerances};
pub use enums::{
    ComponentType, Components, Interpolation, Orientation, PixelType, ReaderImplementationLevel,
    SortBy,
};
pub use error::{Diagnostic, Error, Result};
pub use scanner::TagScanner;
pub use sorter::{
    DatasetSorter, EquiDistantBlocksSorter, FilenameSorter, SortByCriteria, SortingChain,
    TagBasedSorter,
};
pub use tag::TagPath;
pub use tag_cache::TagCache;
pub use tilt::{GantryTiltAnalyzer, GantryTiltInfo};
pub use volume::{Volume, VolumeData, VolumeMetadata};
pub use volume_loader::{LoadResult, VolumeLoader};
