use crate::block::BlockGeometry;
use crate::enums::{
    ComponentType, Components, Interpolation, Orientation, PixelType, ReaderImplementationLevel,
};
use crate::interpolator::Interpolator;
use crate::pixel::PixelComponent;

use dicom::core::Tag;
use glam::DVec3;
use image::ImageBuffer;
use image::Luma;
use ndarray::Array2;
use ndarray::Array5;
use ndarray::s;
use rayon::prelude::*;
use std::path::PathBuf;

/// Voxels of a volume, indexed `[t, z, y, x, component]`
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeData {
    U8(Array5<u8>),
    I8(Array5<i8>),
    U16(Array5<u16>),
    I16(Array5<i16>),
    U32(Array5<u32>),
    I32(Array5<i32>),
    F32(Array5<f32>),
    F64(Array5<f64>),
}

macro_rules! with_array {
    ($data:expr, $array:ident => $body:expr) => {
        match $data {
            VolumeData::U8($array) => $body,
            VolumeData::I8($array) => $body,
            VolumeData::U16($array) => $body,
            VolumeData::I16($array) => $body,
            VolumeData::U32($array) => $body,
            VolumeData::I32($array) => $body,
            VolumeData::F32($array) => $body,
            VolumeData::F64($array) => $body,
        }
    };
}

impl VolumeData {
    /// (time steps, slices, rows, columns, components)
    pub fn dim(&self) -> (usize, usize, usize, usize, usize) {
        with_array!(self, array => array.dim())
    }

    pub fn component_type(&self) -> ComponentType {
        match self {
            VolumeData::U8(_) => ComponentType::U8,
            VolumeData::I8(_) => ComponentType::I8,
            VolumeData::U16(_) => ComponentType::U16,
            VolumeData::I16(_) => ComponentType::I16,
            VolumeData::U32(_) => ComponentType::U32,
            VolumeData::I32(_) => ComponentType::I32,
            VolumeData::F32(_) => ComponentType::F32,
            VolumeData::F64(_) => ComponentType::F64,
        }
    }

    /// Raw voxel memory in native byte order
    pub fn as_bytes(&self) -> &[u8] {
        with_array!(self, array => array
            .as_slice_memory_order()
            .map(bytemuck::cast_slice)
            .unwrap_or_default())
    }

    pub fn voxel_f64(&self, index: (usize, usize, usize, usize, usize)) -> Option<f64> {
        with_array!(self, array => array.get(index).map(|v| v.to_f64()))
    }

    /// One component of one time step as `[z, y, x]` doubles
    fn component_f64(&self, t: usize, c: usize) -> ndarray::Array3<f64> {
        with_array!(self, array => array.slice(s![t, .., .., .., c]).mapv(PixelComponent::to_f64))
    }
}

/// Descriptive attributes carried along with the voxels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeMetadata {
    pub series_uid: String,
    pub modality: String,
    pub sop_class_uid: String,
    pub implementation_level: ReaderImplementationLevel,
    pub block_uid: String,
    /// Slices were sheared back onto a regular grid
    pub tilt_corrected: bool,
    /// Files the volume was read from, in first-use order
    pub source_files: Vec<PathBuf>,
    /// Additionally requested attributes of the first frame
    pub additional: Vec<(Tag, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    data: VolumeData,
    pixel_type: PixelType,
    geometry: BlockGeometry,
    metadata: VolumeMetadata,
}

impl Volume {
    pub fn new(data: VolumeData, geometry: BlockGeometry, metadata: VolumeMetadata) -> Self {
        let components = match data.dim().4 {
            3 => Components::Rgb,
            _ => Components::Scalar,
        };
        Self {
            pixel_type: PixelType::new(data.component_type(), components),
            data,
            geometry,
            metadata,
        }
    }

    /// Get the dimensions of the volume (time steps, depth, height, width, components)
    pub fn dim(&self) -> (usize, usize, usize, usize, usize) {
        self.data.dim()
    }

    pub fn time_steps(&self) -> usize {
        self.dim().0
    }

    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &VolumeData {
        &self.data
    }

    pub fn into_data(self) -> VolumeData {
        self.data
    }

    pub fn geometry(&self) -> &BlockGeometry {
        &self.geometry
    }

    pub fn origin(&self) -> DVec3 {
        self.geometry.origin
    }

    /// (x, y, z) in mm
    pub fn spacing(&self) -> [f64; 3] {
        self.geometry.spacing
    }

    pub fn metadata(&self) -> &VolumeMetadata {
        &self.metadata
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_bytes()
    }

    pub fn voxel_f64(&self, t: usize, z: usize, y: usize, x: usize, c: usize) -> Option<f64> {
        self.data.voxel_f64((t, z, y, x, c))
    }

    /// Min/max normalisation of a value to the grey range
    #[inline]
    fn normalize_to_u8(value: f64, min: f64, max: f64) -> u8 {
        if max <= min {
            return 0;
        }
        (((value - min) / (max - min)) * 255.0).clamp(0.0, 255.0) as u8
    }

    /// Slice of the first time step and component, as doubles.
    /// Axial slices are indexed by z, coronal by y and sagittal by x.
    pub fn get_slice_from_axis(&self, index: usize, orientation: &Orientation) -> Option<Array2<f64>> {
        if !self.is_valid_index(index, orientation) {
            return None;
        }
        let data = self.data.component_f64(0, 0);
        let slice = match orientation {
            Orientation::Axial => data.slice(s![index, .., ..]),
            Orientation::Coronal => data.slice(s![.., index, ..]),
            Orientation::Sagittal => data.slice(s![.., .., index]),
        };
        Some(slice.to_owned())
    }

    fn get_output_dimensions(&self, orientation: &Orientation) -> (u32, u32) {
        let (_, depth, height, width, _) = self.dim();
        let interpolated_dim =
            Interpolator::get_isotropic_dimensions(self.geometry.spacing, (depth, height, width));
        // Always return (width, height) - standard image convention
        match orientation {
            Orientation::Axial => (interpolated_dim.2, interpolated_dim.1),
            Orientation::Coronal => (interpolated_dim.2, interpolated_dim.0),
            Orientation::Sagittal => (interpolated_dim.1, interpolated_dim.0),
        }
    }

    fn slice_to_image(slice: &Array2<f64>) -> Option<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let (height, width) = slice.dim();
        let (min, max) = min_max(slice);
        let pixel_data: Vec<u8> = slice
            .into_par_iter()
            .map(|&v| Self::normalize_to_u8(v, min, max))
            .collect();
        ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
    }

    /// Grey preview of a slice. With [`Interpolation::Linear`] coronal and
    /// sagittal slices are resampled to isotropic pixels.
    pub fn get_image_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
        interpolation: Interpolation,
    ) -> Option<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let slice = self.get_slice_from_axis(index, &orientation)?;

        match interpolation {
            Interpolation::Nearest => Self::slice_to_image(&slice),
            Interpolation::Linear => {
                // Axial doesn't need interpolation (already isotropic in-plane)
                if matches!(orientation, Orientation::Axial) {
                    return Self::slice_to_image(&slice);
                }
                let (width, height) = self.get_output_dimensions(&orientation);
                Self::interpolate_slice(&slice, width, height)
            }
        }
    }

    fn interpolate_slice(
        slice: &Array2<f64>,
        width: u32,
        height: u32,
    ) -> Option<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let (slice_height, slice_width) = slice.dim();
        if slice_height == 0 || slice_width == 0 {
            return None;
        }
        let (min, max) = min_max(slice);
        let view = slice.view();

        let pixel_data: Vec<u8> = (0..height)
            .into_par_iter()
            .flat_map(|y| {
                (0..width)
                    .map(|x| {
                        // normalized coordinates with half-pixel offset
                        let norm_x = (x as f64 + 0.5) / width as f64;
                        let norm_y = (y as f64 + 0.5) / height as f64;

                        let src_x = norm_x * slice_width as f64 - 0.5;
                        let src_y = norm_y * slice_height as f64 - 0.5;

                        let src_x = src_x.max(0.0).min((slice_width - 1) as f64);
                        let src_y = src_y.max(0.0).min((slice_height - 1) as f64);

                        let value = Interpolator::bilinear_interpolate(&view, src_y, src_x);
                        Self::normalize_to_u8(value, min, max)
                    })
                    .collect::<Vec<u8>>()
            })
            .collect();

        ImageBuffer::from_raw(width, height, pixel_data)
    }

    fn is_valid_index(&self, index: usize, orientation: &Orientation) -> bool {
        let (time_steps, depth, height, width, components) = self.dim();
        if time_steps == 0 || components == 0 {
            return false;
        }
        let max_index = match orientation {
            Orientation::Axial => depth,
            Orientation::Coronal => height,
            Orientation::Sagittal => width,
        };
        index < max_index
    }
}

fn min_max(slice: &Array2<f64>) -> (f64, f64) {
    slice
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &v| {
            (min.min(v), max.max(v))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume() -> Volume {
        // 1 time step, 2 slices, 3 rows, 4 columns, value = 100 z + 10 y + x
        let data = Array5::from_shape_fn((1, 2, 3, 4, 1), |(_, z, y, x, _)| {
            (100 * z + 10 * y + x) as i16
        });
        Volume::new(
            VolumeData::I16(data),
            BlockGeometry {
                origin: DVec3::ZERO,
                spacing: [1.0, 1.0, 2.0],
                right: DVec3::X,
                up: DVec3::Y,
                slice_direction: DVec3::Z,
            },
            VolumeMetadata::default(),
        )
    }

    #[test]
    fn reports_type_and_dimensions() {
        let volume = volume();
        assert_eq!(volume.dim(), (1, 2, 3, 4, 1));
        assert_eq!(volume.pixel_type().to_string(), "i16");
        assert_eq!(volume.as_bytes().len(), 2 * 3 * 4 * 2);
        assert_eq!(volume.voxel_f64(0, 1, 2, 3, 0), Some(123.0));
        assert_eq!(volume.voxel_f64(0, 2, 0, 0, 0), None);
    }

    #[test]
    fn slices_along_each_axis() {
        let volume = volume();
        let axial = volume.get_slice_from_axis(1, &Orientation::Axial).unwrap();
        assert_eq!(axial.dim(), (3, 4));
        assert_eq!(axial[[2, 3]], 123.0);

        let coronal = volume.get_slice_from_axis(2, &Orientation::Coronal).unwrap();
        assert_eq!(coronal.dim(), (2, 4));
        assert_eq!(coronal[[1, 0]], 120.0);

        let sagittal = volume.get_slice_from_axis(3, &Orientation::Sagittal).unwrap();
        assert_eq!(sagittal.dim(), (2, 3));
        assert!(volume.get_slice_from_axis(4, &Orientation::Sagittal).is_none());
    }

    #[test]
    fn images_are_normalised_to_the_full_grey_range() {
        let volume = volume();
        let image = volume
            .get_image_from_axis(0, Orientation::Axial, Interpolation::Nearest)
            .unwrap();
        assert_eq!(image.dimensions(), (4, 3));
        assert_eq!(image.get_pixel(0, 0).0, [0]);
        assert_eq!(image.get_pixel(3, 2).0, [255]);

        let resampled = volume
            .get_image_from_axis(0, Orientation::Sagittal, Interpolation::Linear)
            .unwrap();
        assert_eq!(resampled.dimensions(), (3, 4));
    }
}
