//! Pixel formats and the component types a volume can be built from.

use crate::enums::{ComponentType, Components, PixelType};
use crate::error::{Error, Result};
use crate::tag_cache::{FrameId, PixelDataKind, TagCache};
use crate::volume::VolumeData;

use dicom::core::Tag;
use dicom_dictionary_std::tags;
use ndarray::Array5;
use std::fmt;

/// Storage properties of the pixels of one frame, as recorded in its header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelFormat {
    pub bits_allocated: u16,
    pub pixel_representation: u16,
    pub samples_per_pixel: u16,
    /// 0: interleaved (`RGBRGB...`), 1: planar (`RR..GG..BB..`)
    pub planar_configuration: u16,
    pub kind: PixelDataKind,
}

impl PixelFormat {
    /// Tags [`PixelFormat::from_cache`] reads
    pub const TAGS: [Tag; 4] = [
        tags::BITS_ALLOCATED,
        tags::PIXEL_REPRESENTATION,
        tags::SAMPLES_PER_PIXEL,
        tags::PLANAR_CONFIGURATION,
    ];

    pub fn from_cache(cache: &TagCache, frame: FrameId) -> Result<Self> {
        let number = |tag: Tag| -> Result<Option<u16>> {
            Ok(cache.tag_value(frame, tag)?.trim().parse().ok())
        };
        let kind = cache.frame(frame).pixel_data();
        let bits_allocated = match kind {
            PixelDataKind::Float => 32,
            PixelDataKind::DoubleFloat => 64,
            PixelDataKind::Integer => number(tags::BITS_ALLOCATED)?.unwrap_or(0),
        };

        Ok(Self {
            bits_allocated,
            pixel_representation: number(tags::PIXEL_REPRESENTATION)?.unwrap_or(0),
            samples_per_pixel: number(tags::SAMPLES_PER_PIXEL)?.unwrap_or(1),
            planar_configuration: number(tags::PLANAR_CONFIGURATION)?.unwrap_or(0),
            kind,
        })
    }

    /// Map the format to one of the supported pixel types.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedPixelType`] for anything outside the 16 supported
    /// combinations, e.g. 12 bit packed data or 4 samples per pixel.
    pub fn pixel_type(&self) -> Result<PixelType> {
        let components = match self.samples_per_pixel {
            1 => Components::Scalar,
            3 => Components::Rgb,
            _ => return Err(Error::UnsupportedPixelType(self.to_string())),
        };
        let component = match (self.kind, self.bits_allocated, self.pixel_representation) {
            (PixelDataKind::Float, 32, _) => ComponentType::F32,
            (PixelDataKind::DoubleFloat, 64, _) => ComponentType::F64,
            (PixelDataKind::Integer, 8, 0) => ComponentType::U8,
            (PixelDataKind::Integer, 8, 1) => ComponentType::I8,
            (PixelDataKind::Integer, 16, 0) => ComponentType::U16,
            (PixelDataKind::Integer, 16, 1) => ComponentType::I16,
            (PixelDataKind::Integer, 32, 0) => ComponentType::U32,
            (PixelDataKind::Integer, 32, 1) => ComponentType::I32,
            _ => return Err(Error::UnsupportedPixelType(self.to_string())),
        };
        Ok(PixelType::new(component, components))
    }

    pub fn bytes_per_frame(&self, rows: usize, columns: usize) -> usize {
        rows * columns * self.samples_per_pixel as usize * (self.bits_allocated as usize).div_ceil(8)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} pixel data, {} bits allocated, representation {}, {} sample(s) per pixel",
            self.kind, self.bits_allocated, self.pixel_representation, self.samples_per_pixel
        )
    }
}

/// A numeric type volumes can be stored in
pub trait PixelComponent:
    bytemuck::Pod + Default + PartialOrd + fmt::Debug + Send + Sync + 'static
{
    const COMPONENT_TYPE: ComponentType;

    /// Value of voxels no frame covers
    const LOWEST: Self;

    fn to_f64(self) -> f64;

    /// Rounded and clamped to the representable range
    fn from_f64(value: f64) -> Self;

    fn wrap(data: Array5<Self>) -> VolumeData;
}

macro_rules! integer_component {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl PixelComponent for $ty {
                const COMPONENT_TYPE: ComponentType = ComponentType::$variant;
                const LOWEST: Self = <$ty>::MIN;

                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn from_f64(value: f64) -> Self {
                    value.round().clamp(<$ty>::MIN as f64, <$ty>::MAX as f64) as $ty
                }

                fn wrap(data: Array5<Self>) -> VolumeData {
                    VolumeData::$variant(data)
                }
            }
        )*
    };
}

macro_rules! float_component {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl PixelComponent for $ty {
                const COMPONENT_TYPE: ComponentType = ComponentType::$variant;
                const LOWEST: Self = <$ty>::MIN;

                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn from_f64(value: f64) -> Self {
                    value as $ty
                }

                fn wrap(data: Array5<Self>) -> VolumeData {
                    VolumeData::$variant(data)
                }
            }
        )*
    };
}

integer_component!(u8 => U8, i8 => I8, u16 => U16, i16 => I16, u32 => U32, i32 => I32);
float_component!(f32 => F32, f64 => F64);
