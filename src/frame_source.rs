use crate::error::{Error, Result};
use crate::pixel::PixelFormat;
use crate::tag_cache::{FrameHandle, PixelDataKind};

use dicom::core::Tag;
use dicom::object::{DefaultDicomObject, open_file};
use dicom::pixeldata::PixelDecoder;
use dicom_dictionary_std::tags;
use log::trace;

/// Pixel bytes of a single frame, components in native byte order
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub rows: usize,
    pub columns: usize,
    pub format: PixelFormat,
    pub bytes: Vec<u8>,
}

/// Receives the frames of [`FrameSource::read_frames`] one at a time
pub type FrameSink<'a> = dyn FnMut(RawFrame) -> Result<()> + 'a;

/// Provides the pixel data of frames referenced by the tag cache
pub trait FrameSource: Send + Sync {
    fn read_frame(&self, frame: &FrameHandle, format: &PixelFormat) -> Result<RawFrame>;

    /// Read `frames` in order and hand each one to `sink`, stopping at the
    /// first error. Sources backed by files override this to open every
    /// file once per run of consecutive frames from it.
    fn read_frames(
        &self,
        frames: &[&FrameHandle],
        format: &PixelFormat,
        sink: &mut FrameSink<'_>,
    ) -> Result<()> {
        for frame in frames {
            sink(self.read_frame(frame, format)?)?;
        }
        Ok(())
    }
}

/// Reads frames from DICOM files on disk.
///
/// Native pixel data is sliced directly out of the pixel data element;
/// encapsulated data is decoded frame by frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct DicomFileFrameSource;

fn dimension(obj: &DefaultDicomObject, frame: &FrameHandle, tag: Tag) -> Result<usize> {
    obj.element(tag)
        .map_err(|e| Error::mismatch(frame, e.to_string()))?
        .to_int::<u32>()
        .map(|value| value as usize)
        .map_err(|e| Error::mismatch(frame, e.to_string()))
}

impl DicomFileFrameSource {
    /// Frames of one opened file
    fn read_from_object(
        obj: &DefaultDicomObject,
        frames: &[&FrameHandle],
        format: &PixelFormat,
        sink: &mut FrameSink<'_>,
    ) -> Result<()> {
        let Some(first) = frames.first() else {
            return Ok(());
        };
        let rows = dimension(obj, first, tags::ROWS)?;
        let columns = dimension(obj, first, tags::COLUMNS)?;

        let pixel_tag = match first.pixel_data() {
            PixelDataKind::Integer => tags::PIXEL_DATA,
            PixelDataKind::Float => tags::FLOAT_PIXEL_DATA,
            PixelDataKind::DoubleFloat => tags::DOUBLE_FLOAT_PIXEL_DATA,
        };
        let element = obj
            .element(pixel_tag)
            .map_err(|e| Error::mismatch(first, e.to_string()))?;

        if element.value().fragments().is_some() {
            let decoded_format = PixelFormat {
                planar_configuration: 0,
                ..*format
            };
            for frame in frames {
                let decoded = obj.decode_pixel_data_frame(frame.frame_index())?;
                sink(RawFrame {
                    rows,
                    columns,
                    format: decoded_format,
                    bytes: decoded.data().to_vec(),
                })?;
            }
            return Ok(());
        }

        let bytes = element
            .to_bytes()
            .map_err(|e| Error::mismatch(first, e.to_string()))?;
        let frame_length = format.bytes_per_frame(rows, columns);
        for frame in frames {
            let offset = frame.frame_index() as usize * frame_length;
            let frame_bytes = bytes.get(offset..offset + frame_length).ok_or_else(|| {
                Error::mismatch(
                    frame,
                    format!(
                        "pixel data holds {} bytes, frame needs bytes {offset}..{}",
                        bytes.len(),
                        offset + frame_length
                    ),
                )
            })?;
            sink(RawFrame {
                rows,
                columns,
                format: *format,
                bytes: frame_bytes.to_vec(),
            })?;
        }
        Ok(())
    }
}

impl FrameSource for DicomFileFrameSource {
    fn read_frame(&self, frame: &FrameHandle, format: &PixelFormat) -> Result<RawFrame> {
        let mut read = None;
        self.read_frames(&[frame], format, &mut |raw| {
            read = Some(raw);
            Ok(())
        })?;
        read.ok_or_else(|| Error::mismatch(frame, "no pixel data"))
    }

    fn read_frames(
        &self,
        frames: &[&FrameHandle],
        format: &PixelFormat,
        sink: &mut FrameSink<'_>,
    ) -> Result<()> {
        for run in frames.chunk_by(|a, b| a.path() == b.path()) {
            let path = run[0].path();
            trace!("Reading pixel data of {} frame(s) from {}", run.len(), path.display());
            let obj = open_file(path).map_err(|e| Error::unreadable(path, e))?;
            Self::read_from_object(&obj, run, format, sink)?;
        }
        Ok(())
    }
}
