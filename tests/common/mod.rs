#![allow(dead_code)]

use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::dictionary_std::{tags, uids};
use dicom::object::{FileMetaTableBuilder, InMemDicomObject};
use std::path::{Path, PathBuf};

pub const AXIAL: &str = "1\\0\\0\\0\\1\\0";

/// A 16 bit unsigned slice, 4x3 pixels unless changed
#[derive(Debug, Clone)]
pub struct Slice {
    pub series_uid: String,
    pub position: [f64; 3],
    pub orientation: String,
    pub rows: u16,
    pub columns: u16,
    pub frames: u16,
    pub instance_number: u32,
    pub gantry_tilt: Option<f64>,
    pub extra: Vec<(Tag, VR, String)>,
    /// Value of every pixel of frame `f` is `fill + f`
    pub fill: u16,
    /// Store 32 bit Float Pixel Data instead of 16 bit integers
    pub float: bool,
}

impl Slice {
    pub fn at(series_uid: &str, z: f64, fill: u16) -> Self {
        Self {
            series_uid: series_uid.to_string(),
            position: [0.0, 0.0, z],
            orientation: AXIAL.to_string(),
            rows: 3,
            columns: 4,
            frames: 1,
            instance_number: 1,
            gantry_tilt: None,
            extra: Vec::new(),
            fill,
            float: false,
        }
    }

    pub fn with_position(mut self, position: [f64; 3]) -> Self {
        self.position = position;
        self
    }

    pub fn with_frames(mut self, frames: u16) -> Self {
        self.frames = frames;
        self
    }

    pub fn as_float(mut self) -> Self {
        self.float = true;
        self
    }

    pub fn with_gantry_tilt(mut self, degrees: f64) -> Self {
        self.gantry_tilt = Some(degrees);
        self
    }

    pub fn with_element(mut self, tag: Tag, vr: VR, value: &str) -> Self {
        self.extra.push((tag, vr, value.to_string()));
        self
    }

    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let sop_instance_uid = format!("{}.{}", self.series_uid, name.len() + self.fill as usize);
        let mut obj = InMemDicomObject::new_empty();

        let text = |tag: Tag, vr: VR, value: &str| {
            DataElement::new(tag, vr, PrimitiveValue::from(value.to_string()))
        };
        let ushort = |tag: Tag, value: u16| DataElement::new(tag, VR::US, PrimitiveValue::from(value));

        obj.put(text(tags::SOP_CLASS_UID, VR::UI, uids::CT_IMAGE_STORAGE));
        obj.put(text(tags::SOP_INSTANCE_UID, VR::UI, &sop_instance_uid));
        obj.put(text(tags::MODALITY, VR::CS, "CT"));
        obj.put(text(tags::STUDY_INSTANCE_UID, VR::UI, "1.2.3"));
        obj.put(text(tags::SERIES_INSTANCE_UID, VR::UI, &self.series_uid));
        obj.put(text(
            tags::INSTANCE_NUMBER,
            VR::IS,
            &self.instance_number.to_string(),
        ));
        let [x, y, z] = self.position;
        obj.put(text(
            tags::IMAGE_POSITION_PATIENT,
            VR::DS,
            &format!("{x}\\{y}\\{z}"),
        ));
        obj.put(text(tags::IMAGE_ORIENTATION_PATIENT, VR::DS, &self.orientation));
        obj.put(text(tags::PIXEL_SPACING, VR::DS, "0.5\\0.5"));
        obj.put(text(tags::SLICE_THICKNESS, VR::DS, "1"));
        if let Some(tilt) = self.gantry_tilt {
            obj.put(text(tags::GANTRY_DETECTOR_TILT, VR::DS, &tilt.to_string()));
        }
        if self.frames > 1 {
            obj.put(text(tags::NUMBER_OF_FRAMES, VR::IS, &self.frames.to_string()));
        }
        for (tag, vr, value) in &self.extra {
            obj.put(text(*tag, *vr, value));
        }

        obj.put(text(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2"));
        obj.put(ushort(tags::SAMPLES_PER_PIXEL, 1));
        obj.put(ushort(tags::ROWS, self.rows));
        obj.put(ushort(tags::COLUMNS, self.columns));
        let pixels_per_frame = self.rows as usize * self.columns as usize;
        let values = (0..self.frames)
            .flat_map(|frame| std::iter::repeat_n(self.fill + frame, pixels_per_frame));
        if self.float {
            obj.put(ushort(tags::BITS_ALLOCATED, 32));
            obj.put(DataElement::new(
                tags::FLOAT_PIXEL_DATA,
                VR::OF,
                PrimitiveValue::F32(values.map(f32::from).collect()),
            ));
        } else {
            obj.put(ushort(tags::BITS_ALLOCATED, 16));
            obj.put(ushort(tags::BITS_STORED, 16));
            obj.put(ushort(tags::HIGH_BIT, 15));
            obj.put(ushort(tags::PIXEL_REPRESENTATION, 0));
            obj.put(DataElement::new(
                tags::PIXEL_DATA,
                VR::OW,
                PrimitiveValue::U16(values.collect()),
            ));
        }

        let file = obj
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                    .media_storage_sop_class_uid(uids::CT_IMAGE_STORAGE)
                    .media_storage_sop_instance_uid(&sop_instance_uid),
            )
            .expect("should have built the file meta group");

        let path = dir.join(name);
        file.write_to_file(&path)
            .expect("should have written the DICOM file");
        path
    }
}

/// Write a Basic Text SR document: no image matrix, no position, no pixels
pub fn write_report(dir: &Path, name: &str, series_uid: &str) -> PathBuf {
    let sop_class = "1.2.840.10008.5.1.4.1.1.88.11";
    let sop_instance_uid = format!("{series_uid}.1");
    let text = |tag: Tag, vr: VR, value: &str| {
        DataElement::new(tag, vr, PrimitiveValue::from(value.to_string()))
    };

    let mut obj = InMemDicomObject::new_empty();
    obj.put(text(tags::SOP_CLASS_UID, VR::UI, sop_class));
    obj.put(text(tags::SOP_INSTANCE_UID, VR::UI, &sop_instance_uid));
    obj.put(text(tags::MODALITY, VR::CS, "SR"));
    obj.put(text(tags::STUDY_INSTANCE_UID, VR::UI, "1.2.3"));
    obj.put(text(tags::SERIES_INSTANCE_UID, VR::UI, series_uid));
    obj.put(text(tags::VALUE_TYPE, VR::CS, "CONTAINER"));

    let file = obj
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                .media_storage_sop_class_uid(sop_class)
                .media_storage_sop_instance_uid(&sop_instance_uid),
        )
        .expect("should have built the file meta group");

    let path = dir.join(name);
    file.write_to_file(&path)
        .expect("should have written the DICOM file");
    path
}

/// Write `slices` as `<prefix><index>.dcm` and return their paths in order
pub fn write_series(dir: &Path, prefix: &str, slices: &[Slice]) -> Vec<PathBuf> {
    slices
        .iter()
        .enumerate()
        .map(|(index, slice)| slice.write(dir, &format!("{prefix}{index:03}.dcm")))
        .collect()
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
