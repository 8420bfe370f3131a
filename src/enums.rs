use dicom::core::Tag;
use dicom_dictionary_std::uids;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Axial,
    Coronal,
    Sagittal,
}

/// Resampling used when shifting tilted slices back onto a regular grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    Nearest,
    #[default]
    Linear,
}

/// Numeric type of one pixel component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl ComponentType {
    pub const ALL: [ComponentType; 8] = [
        ComponentType::U8,
        ComponentType::I8,
        ComponentType::U16,
        ComponentType::I16,
        ComponentType::U32,
        ComponentType::I32,
        ComponentType::F32,
        ComponentType::F64,
    ];

    pub fn bytes(self) -> usize {
        match self {
            ComponentType::U8 | ComponentType::I8 => 1,
            ComponentType::U16 | ComponentType::I16 => 2,
            ComponentType::U32 | ComponentType::I32 | ComponentType::F32 => 4,
            ComponentType::F64 => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Components {
    Scalar,
    Rgb,
}

impl Components {
    pub fn count(self) -> usize {
        match self {
            Components::Scalar => 1,
            Components::Rgb => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelType {
    pub component: ComponentType,
    pub components: Components,
}

impl PixelType {
    pub fn new(component: ComponentType, components: Components) -> Self {
        Self {
            component,
            components,
        }
    }

    /// Every combination the dispatcher can assemble
    pub fn all() -> impl Iterator<Item = PixelType> {
        ComponentType::ALL.into_iter().flat_map(|component| {
            [Components::Scalar, Components::Rgb]
                .into_iter()
                .map(move |components| PixelType::new(component, components))
        })
    }

    pub fn bytes_per_pixel(self) -> usize {
        self.component.bytes() * self.components.count()
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.component {
            ComponentType::U8 => "u8",
            ComponentType::I8 => "i8",
            ComponentType::U16 => "u16",
            ComponentType::I16 => "i16",
            ComponentType::U32 => "u32",
            ComponentType::I32 => "i32",
            ComponentType::F32 => "f32",
            ComponentType::F64 => "f64",
        };
        match self.components {
            Components::Scalar => write!(f, "{name}"),
            Components::Rgb => write!(f, "rgb<{name}>"),
        }
    }
}

/// One ordering criterion of [`crate::sorter::SortByCriteria`]
#[derive(Debug, Clone, PartialEq)]
pub enum SortBy {
    /// Distance of Image Position (Patient) along the slice normal,
    /// compared after rounding to `decimals` places
    ImagePosition { decimals: u32 },
    /// Raw tag value, compared as a number if `numeric` and parseable
    Tag { tag: Tag, numeric: bool },
    /// File path, then frame index
    Filename,
}

/// How well the geometry of an image storage class is understood by the
/// assembler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderImplementationLevel {
    /// No SOP Class UID was recorded
    #[default]
    Unknown,
    /// Geometry and pixel data are read as intended
    Supported,
    /// Read, but some attributes of the class are not interpreted
    PartlySupported,
    /// Pixel data is read, the geometry may be meaningless
    Implemented,
    Unsupported,
}

impl ReaderImplementationLevel {
    pub fn from_sop_class_uid(uid: &str) -> Self {
        match uid {
            "" => Self::Unknown,
            uids::CT_IMAGE_STORAGE
            | uids::MR_IMAGE_STORAGE
            | uids::POSITRON_EMISSION_TOMOGRAPHY_IMAGE_STORAGE
            | uids::COMPUTED_RADIOGRAPHY_IMAGE_STORAGE
            | uids::DIGITAL_X_RAY_IMAGE_STORAGE_FOR_PRESENTATION
            | uids::DIGITAL_X_RAY_IMAGE_STORAGE_FOR_PROCESSING => Self::Supported,
            uids::NUCLEAR_MEDICINE_IMAGE_STORAGE => Self::PartlySupported,
            uids::SECONDARY_CAPTURE_IMAGE_STORAGE => Self::Implemented,
            _ => Self::Unsupported,
        }
    }
}

impl fmt::Display for ReaderImplementationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Supported => "supported",
            Self::PartlySupported => "partly-supported",
            Self::Implemented => "implemented",
            Self::Unsupported => "unsupported",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implementation_level_follows_the_storage_class() {
        let level = ReaderImplementationLevel::from_sop_class_uid;
        assert_eq!(level(uids::CT_IMAGE_STORAGE), ReaderImplementationLevel::Supported);
        assert_eq!(
            level(uids::DIGITAL_X_RAY_IMAGE_STORAGE_FOR_PROCESSING),
            ReaderImplementationLevel::Supported
        );
        assert_eq!(
            level(uids::NUCLEAR_MEDICINE_IMAGE_STORAGE),
            ReaderImplementationLevel::PartlySupported
        );
        assert_eq!(
            level(uids::SECONDARY_CAPTURE_IMAGE_STORAGE),
            ReaderImplementationLevel::Implemented
        );
        assert_eq!(level(""), ReaderImplementationLevel::Unknown);
        // ultrasound
        assert_eq!(
            level("1.2.840.10008.5.1.4.1.1.6.1"),
            ReaderImplementationLevel::Unsupported
        );
        assert_eq!(ReaderImplementationLevel::PartlySupported.to_string(), "partly-supported");
    }
}
