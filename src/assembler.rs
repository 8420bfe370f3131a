//! Streams the frames of an image block into a typed volume.

use crate::block::ImageBlockDescriptor;
use crate::config::ReaderConfig;
use crate::error::{Error, Result};
use crate::frame_source::{FrameSource, RawFrame};
use crate::interpolator::Interpolator;
use crate::pixel::PixelComponent;
use crate::tag_cache::{FrameHandle, TagCache};
use crate::volume::{Volume, VolumeMetadata};

use log::{debug, warn};
use ndarray::{Array3, Array5, s};
use std::mem;

pub struct BlockAssembler<'a> {
    block: &'a ImageBlockDescriptor,
    cache: &'a TagCache,
    source: &'a dyn FrameSource,
    config: &'a ReaderConfig,
}

impl<'a> BlockAssembler<'a> {
    pub fn new(
        block: &'a ImageBlockDescriptor,
        cache: &'a TagCache,
        source: &'a dyn FrameSource,
        config: &'a ReaderConfig,
    ) -> Self {
        Self {
            block,
            cache,
            source,
            config,
        }
    }

    /// Build the volume with component type `T` and `C` components per voxel.
    ///
    /// # Errors
    ///
    /// [`Error::GeometryMismatch`] if a frame differs from the block in size
    /// or pixel format, [`Error::Cancelled`] if the cancel flag was raised,
    /// or any error of the frame source.
    pub fn assemble<T: PixelComponent, const C: usize>(&self) -> Result<Volume> {
        let block = self.block;
        let extra_rows = block.tilt_extra_rows();
        let shape = (
            block.time_steps,
            block.slices,
            block.rows + extra_rows,
            block.columns,
            C,
        );
        debug!(
            "Assembling {} as {shape:?} volume of {}",
            block.block_uid,
            std::any::type_name::<T>()
        );
        let mut data = Array5::from_elem(shape, T::LOWEST);
        if self.config.is_cancelled() {
            warn!("Assembly of {} cancelled", block.block_uid);
            return Err(Error::Cancelled);
        }

        let handles: Vec<&FrameHandle> = block
            .frames
            .iter()
            .map(|frame| self.cache.frame(*frame))
            .collect();
        let mut read = 0;
        self.source
            .read_frames(&handles, &block.pixel_format, &mut |raw| {
                let handle = handles.get(read).ok_or_else(|| {
                    Error::mismatch(&block.block_uid, "frame source returned too many frames")
                })?;
                let (t, z) = (read / block.slices, read % block.slices);
                read += 1;

                let pixels = self.decode::<T, C>(handle, raw)?;
                let mut target = data.slice_mut(s![t, z, .., .., ..]);
                let offset = block.tilt_row_offset(z);
                if extra_rows == 0 && offset == 0.0 {
                    target.assign(&pixels);
                } else {
                    Interpolator::shift_rows(
                        pixels.view(),
                        target,
                        offset,
                        self.config.interpolation,
                    );
                }

                if self.config.is_cancelled() {
                    warn!("Assembly of {} cancelled", block.block_uid);
                    return Err(Error::Cancelled);
                }
                Ok(())
            })?;

        if read != handles.len() {
            return Err(Error::mismatch(
                &block.block_uid,
                format!("read {read} of {} frames", handles.len()),
            ));
        }

        Ok(Volume::new(T::wrap(data), block.geometry, self.metadata()))
    }

    /// Check a raw frame against the block and convert it to
    /// `(rows, columns, components)`
    fn decode<T: PixelComponent, const C: usize>(
        &self,
        handle: &FrameHandle,
        raw: RawFrame,
    ) -> Result<Array3<T>> {
        let block = self.block;
        if (raw.rows, raw.columns) != (block.rows, block.columns) {
            return Err(Error::mismatch(
                handle,
                format!(
                    "{}x{} pixels instead of {}x{}",
                    raw.columns, raw.rows, block.columns, block.rows
                ),
            ));
        }

        let expected = &block.pixel_format;
        let actual = &raw.format;
        if (actual.bits_allocated, actual.pixel_representation, actual.samples_per_pixel, actual.kind)
            != (expected.bits_allocated, expected.pixel_representation, expected.samples_per_pixel, expected.kind)
            || actual.samples_per_pixel as usize != C
        {
            return Err(Error::mismatch(
                handle,
                format!("{actual} instead of {expected}"),
            ));
        }

        let length = block.rows * block.columns * C * mem::size_of::<T>();
        let Some(bytes) = raw.bytes.get(..length) else {
            return Err(Error::mismatch(
                handle,
                format!("{} bytes of pixel data, expected {length}", raw.bytes.len()),
            ));
        };
        let values: Vec<T> = bytemuck::pod_collect_to_vec(bytes);

        let pixels = if C > 1 && actual.planar_configuration == 1 {
            Array3::from_shape_vec((C, block.rows, block.columns), values)
                .map(|planes| planes.permuted_axes([1, 2, 0]).as_standard_layout().into_owned())
        } else {
            Array3::from_shape_vec((block.rows, block.columns, C), values)
        };
        pixels.map_err(|e| Error::mismatch(handle, e.to_string()))
    }

    fn metadata(&self) -> VolumeMetadata {
        let block = self.block;
        let mut source_files = Vec::new();
        for frame in &block.frames {
            let path = self.cache.frame(*frame).path();
            if source_files.last().is_none_or(|last: &std::path::PathBuf| last != path) {
                source_files.push(path.to_path_buf());
            }
        }

        let additional = match block.frames.first() {
            Some(&first) => self
                .config
                .additional_tags
                .iter()
                .map(|path| {
                    let value = self.cache.tag_value(first, path.tag()).unwrap_or_default();
                    (path.tag(), value.to_string())
                })
                .collect(),
            None => Vec::new(),
        };

        VolumeMetadata {
            series_uid: block.series_uid.clone(),
            modality: block.modality.clone(),
            sop_class_uid: block.sop_class_uid.clone(),
            implementation_level: block.implementation_level,
            block_uid: block.block_uid.clone(),
            tilt_corrected: block.tilt.correction_required(),
            source_files,
            additional,
        }
    }
}
