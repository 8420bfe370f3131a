//! Description of one image block: the frames that make up a volume and the
//! geometry they share.

use crate::enums::ReaderImplementationLevel;
use crate::error::{Error, Result};
use crate::geometry::{SliceGeometry, parse_pixel_spacing, parse_scalar};
use crate::pixel::PixelFormat;
use crate::tag_cache::{FrameId, TagCache};
use crate::tilt::GantryTiltInfo;

use dicom::core::Tag;
use dicom_dictionary_std::tags;
use glam::DVec3;
use log::debug;

/// Position and axes of a block in patient space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockGeometry {
    /// Centre of the first voxel
    pub origin: DVec3,
    /// Spacing along x (columns), y (rows) and z (slices), in mm
    pub spacing: [f64; 3],
    pub right: DVec3,
    pub up: DVec3,
    pub slice_direction: DVec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlockDescriptor {
    /// Time-major: all slices of time step 0, then time step 1, ...
    pub frames: Vec<FrameId>,
    pub time_steps: usize,
    pub slices: usize,
    pub rows: usize,
    pub columns: usize,
    pub pixel_format: PixelFormat,
    pub geometry: BlockGeometry,
    pub tilt: GantryTiltInfo,
    pub series_uid: String,
    pub modality: String,
    pub sop_class_uid: String,
    pub implementation_level: ReaderImplementationLevel,
    pub block_uid: String,
}

/// Tags [`ImageBlockDescriptor::new`] reads besides those of the sorters
pub const DESCRIPTOR_TAGS: [Tag; 10] = [
    tags::ROWS,
    tags::COLUMNS,
    tags::PIXEL_SPACING,
    tags::IMAGER_PIXEL_SPACING,
    tags::SPACING_BETWEEN_SLICES,
    tags::SLICE_THICKNESS,
    tags::SERIES_INSTANCE_UID,
    tags::MODALITY,
    tags::SOP_CLASS_UID,
    tags::NUMBER_OF_FRAMES,
];

fn dimension(cache: &TagCache, frame: FrameId, tag: Tag) -> Result<usize> {
    let value = cache.tag_value(frame, tag)?;
    value
        .trim()
        .parse()
        .ok()
        .filter(|&n: &usize| n > 0)
        .ok_or_else(|| Error::mismatch(cache.frame(frame), format!("invalid {tag} value '{value}'")))
}

impl ImageBlockDescriptor {
    /// Describe a block made of `time_steps`, each an ordered list of slices.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for an empty block or time steps of
    /// differing length; [`Error::GeometryMismatch`] if the first frame
    /// lacks a valid matrix size.
    pub fn new(time_steps: Vec<Vec<FrameId>>, cache: &TagCache, tilt: GantryTiltInfo) -> Result<Self> {
        let slices = time_steps.first().map_or(0, Vec::len);
        if slices == 0 {
            return Err(Error::InvalidArgument("image block without frames".to_string()));
        }
        if time_steps.iter().any(|step| step.len() != slices) {
            return Err(Error::InvalidArgument(
                "time steps of an image block differ in their number of slices".to_string(),
            ));
        }

        let first_step = &time_steps[0];
        let first = first_step[0];
        let last = first_step[slices - 1];
        let text = |tag: Tag| -> Result<String> { Ok(cache.tag_value(first, tag)?.to_string()) };

        let rows = dimension(cache, first, tags::ROWS)?;
        let columns = dimension(cache, first, tags::COLUMNS)?;
        let pixel_format = PixelFormat::from_cache(cache, first)?;

        let first_slice = SliceGeometry::from_cache(cache, first)?;
        let last_slice = SliceGeometry::from_cache(cache, last)?;
        let normal = first_slice.normal().normalize_or_zero();

        let (spacing_x, spacing_y) = parse_pixel_spacing(&text(tags::PIXEL_SPACING)?)
            .or(parse_pixel_spacing(&text(tags::IMAGER_PIXEL_SPACING)?))
            .unwrap_or((1.0, 1.0));

        let mut slice_direction = normal;
        let spacing_z = match (first_slice.origin, last_slice.origin) {
            _ if tilt.correction_required() => tilt.real_z_spacing(),
            (Some(a), Some(b)) if slices > 1 && a.distance(b) > 0.0 => {
                if (b - a).dot(normal) < 0.0 {
                    slice_direction = -normal;
                }
                (b - a).dot(normal).abs() / (slices - 1) as f64
            }
            _ => parse_scalar(&text(tags::SPACING_BETWEEN_SLICES)?)
                .or(parse_scalar(&text(tags::SLICE_THICKNESS)?))
                .filter(|spacing| *spacing > 0.0)
                .unwrap_or(1.0),
        };

        let mut origin = first_slice.origin.unwrap_or(DVec3::ZERO);
        if tilt.correction_required() {
            let total_shift = tilt.shift_per_slice() * (slices - 1) as f64;
            origin += first_slice.up.normalize_or_zero() * total_shift.min(0.0);
        }

        let sop_class_uid = text(tags::SOP_CLASS_UID)?;
        let block = Self {
            frames: time_steps.into_iter().flatten().collect(),
            time_steps: 0,
            slices,
            rows,
            columns,
            pixel_format,
            geometry: BlockGeometry {
                origin,
                spacing: [spacing_x, spacing_y, spacing_z],
                right: first_slice.right.normalize_or_zero(),
                up: first_slice.up.normalize_or_zero(),
                slice_direction,
            },
            tilt,
            series_uid: text(tags::SERIES_INSTANCE_UID)?,
            modality: text(tags::MODALITY)?,
            implementation_level: ReaderImplementationLevel::from_sop_class_uid(&sop_class_uid),
            sop_class_uid,
            block_uid: String::new(),
        };
        let time_steps = block.frames.len() / slices;
        debug!(
            "Image block: {time_steps} x {slices} x {rows} x {columns}, spacing {:?}",
            block.geometry.spacing
        );
        Ok(Self { time_steps, ..block })
    }

    pub fn with_block_uid(mut self, block_uid: impl Into<String>) -> Self {
        self.block_uid = block_uid.into();
        self
    }

    /// Frame shown at slice `z` of time step `t`
    pub fn frame_at(&self, t: usize, z: usize) -> FrameId {
        self.frames[t * self.slices + z]
    }

    /// Rows added to every slice so that sheared slices fit the grid
    pub fn tilt_extra_rows(&self) -> usize {
        if !self.tilt.correction_required() || self.slices < 2 {
            return 0;
        }
        let total_shift = self.tilt.shift_per_slice().abs() * (self.slices - 1) as f64;
        (total_shift / self.geometry.spacing[1]).ceil() as usize
    }

    /// Row offset, in fractional rows, at which slice `z` is written
    pub fn tilt_row_offset(&self, z: usize) -> f64 {
        if !self.tilt.correction_required() {
            return 0.0;
        }
        let per_slice = self.tilt.shift_per_slice();
        let total_shift = per_slice * (self.slices - 1) as f64;
        (z as f64 * per_slice - total_shift.min(0.0)) / self.geometry.spacing[1]
    }
}

/// Merge consecutive 3D blocks into 3D+t blocks.
///
/// A block joins the run started by an earlier block if both hold the same
/// number of frames and share the position strings of their first and last
/// frame.
pub fn condense_time_steps(
    blocks: Vec<Vec<FrameId>>,
    cache: &TagCache,
) -> Result<Vec<Vec<Vec<FrameId>>>> {
    let position = |frame: FrameId| cache.tag_value(frame, tags::IMAGE_POSITION_PATIENT);
    let mut condensed: Vec<Vec<Vec<FrameId>>> = Vec::new();

    for block in blocks {
        let joins = match condensed.last().and_then(|run| run.first()) {
            Some(head) => match (head.first(), head.last(), block.first(), block.last()) {
                (Some(&hf), Some(&hl), Some(&bf), Some(&bl)) => {
                    head.len() == block.len()
                        && !position(hf)?.is_empty()
                        && !position(hl)?.is_empty()
                        && position(hf)? == position(bf)?
                        && position(hl)? == position(bl)?
                }
                _ => false,
            },
            None => false,
        };

        match condensed.last_mut() {
            Some(run) if joins => {
                debug!("  3D+t: block of {} frames joins as time step {}", block.len(), run.len());
                run.push(block);
            }
            _ => condensed.push(vec![block]),
        }
    }
    Ok(condensed)
}
