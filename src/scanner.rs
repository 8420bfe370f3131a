use crate::error::{Diagnostic, Error, Result};
use crate::tag::{TagPath, TagSet};
use crate::tag_cache::{FrameId, PixelDataKind, TagCache};

use dicom::core::Tag;
use dicom::object::{InMemDicomObject, OpenFileOptions};
use dicom_dictionary_std::tags;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of a scan: the tag cache plus one diagnostic per skipped file
#[derive(Debug)]
pub struct ScanReport {
    pub cache: Arc<TagCache>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Reads the requested tags of a list of files into a [`TagCache`]
pub struct TagScanner {
    files: Vec<PathBuf>,
    tags: TagSet,
    parallel: bool,
    report: Option<ScanReport>,
}

struct ScannedFile {
    number_of_frames: u32,
    pixel_data: PixelDataKind,
    values: Vec<String>,
}

impl TagScanner {
    pub fn new<P: Into<PathBuf>>(files: impl IntoIterator<Item = P>) -> Self {
        Self {
            files: files.into_iter().map(Into::into).collect(),
            tags: TagSet::new(),
            parallel: true,
            report: None,
        }
    }

    /// Scan files on the rayon pool (default) or sequentially
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn add_tag(&mut self, tag: Tag) {
        if self.tags.insert(tag) {
            self.report = None;
        }
    }

    pub fn add_tags(&mut self, tags: impl IntoIterator<Item = Tag>) {
        for tag in tags {
            self.add_tag(tag);
        }
    }

    /// Request a tag by textual path.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the path does not name exactly one tag.
    pub fn add_tag_path(&mut self, path: &str) -> Result<()> {
        let path = TagPath::parse(path)?;
        self.add_tag(path.tag());
        Ok(())
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Scan all files. Files that cannot be read are excluded from the
    /// cache and reported as diagnostics.
    pub fn scan(&mut self) -> &ScanReport {
        let tag_list = self.tags.as_slice();
        let results: Vec<Result<ScannedFile>> = if self.parallel {
            self.files
                .par_iter()
                .map(|path| scan_file(path, tag_list))
                .collect()
        } else {
            self.files
                .iter()
                .map(|path| scan_file(path, tag_list))
                .collect()
        };

        let mut builder = TagCache::builder(self.tags.clone());
        let mut diagnostics = Vec::new();
        for (path, result) in self.files.iter().zip(results) {
            match result {
                Ok(file) => {
                    builder.add_file(path, file.number_of_frames, file.pixel_data, file.values);
                }
                Err(error) => {
                    warn!("Skipping {}: {error}", path.display());
                    diagnostics.push(Diagnostic::new(path.display().to_string(), error));
                }
            }
        }

        let cache = builder.build();
        info!(
            "Scanned {} files ({} frames, {} tags), {} skipped",
            self.files.len(),
            cache.len(),
            self.tags.len(),
            diagnostics.len()
        );

        self.report.insert(ScanReport {
            cache: Arc::new(cache),
            diagnostics,
        })
    }

    /// # Errors
    ///
    /// [`Error::NotScanned`] before [`TagScanner::scan`] was called.
    pub fn report(&self) -> Result<&ScanReport> {
        self.report.as_ref().ok_or(Error::NotScanned)
    }

    /// Take the scan result out of the scanner.
    ///
    /// # Errors
    ///
    /// [`Error::NotScanned`] before [`TagScanner::scan`] was called.
    pub fn into_report(self) -> Result<ScanReport> {
        self.report.ok_or(Error::NotScanned)
    }

    /// # Errors
    ///
    /// [`Error::NotScanned`] before [`TagScanner::scan`] was called.
    pub fn cache(&self) -> Result<Arc<TagCache>> {
        self.report().map(|report| Arc::clone(&report.cache))
    }

    /// # Errors
    ///
    /// [`Error::NotScanned`] before scanning, [`Error::TagNotScanned`] for
    /// tags that were not requested.
    pub fn tag_value(&self, frame: FrameId, tag: Tag) -> Result<&str> {
        self.report()?.cache.tag_value(frame, tag)
    }
}

fn scan_file(path: &Path, tag_list: &[Tag]) -> Result<ScannedFile> {
    if path.file_name().is_some_and(|name| name == "DICOMDIR") {
        return Err(Error::unreadable(
            path,
            std::io::Error::other("DICOMDIR files do not contain images"),
        ));
    }

    // stops ahead of all three pixel data elements, so no payload is read
    let obj = OpenFileOptions::new()
        .read_until(tags::FLOAT_PIXEL_DATA)
        .open_file(path)
        .map_err(|e| Error::unreadable(path, e))?;

    let values = tag_list.iter().map(|&tag| element_text(&obj, tag)).collect();
    let number_of_frames = element_text(&obj, tags::NUMBER_OF_FRAMES)
        .parse::<u32>()
        .ok()
        .filter(|&n| n > 0)
        .unwrap_or(1);
    let pixel_data = pixel_data_kind(path, &element_text(&obj, tags::BITS_ALLOCATED))?;

    debug!(
        "  scanned {} ({number_of_frames} frame(s), {pixel_data:?} pixel data)",
        path.display()
    );

    Ok(ScannedFile {
        number_of_frames,
        pixel_data,
        values,
    })
}

/// Which pixel data element a file carries.
///
/// Float and Double Float Pixel Data need 32 and 64 bits per sample, so only
/// such files are opened a second time up to the integer Pixel Data
/// element. That second read does load a float payload into memory; integer
/// images never pay for it.
fn pixel_data_kind(path: &Path, bits_allocated: &str) -> Result<PixelDataKind> {
    if !matches!(bits_allocated, "32" | "64") {
        return Ok(PixelDataKind::Integer);
    }
    let obj = OpenFileOptions::new()
        .read_until(tags::PIXEL_DATA)
        .open_file(path)
        .map_err(|e| Error::unreadable(path, e))?;
    Ok(if obj.element(tags::FLOAT_PIXEL_DATA).is_ok() {
        PixelDataKind::Float
    } else if obj.element(tags::DOUBLE_FLOAT_PIXEL_DATA).is_ok() {
        PixelDataKind::DoubleFloat
    } else {
        PixelDataKind::Integer
    })
}

/// Text form of an element, multiple values joined by `\`. Absent elements
/// and values without a text form (sequences, binary data) become empty.
pub(crate) fn element_text(obj: &InMemDicomObject, tag: Tag) -> String {
    obj.element(tag)
        .ok()
        .and_then(|element| element.to_str().ok())
        .map(|text| text.trim_matches(|c: char| c == '\0' || c == ' ').to_string())
        .unwrap_or_default()
}
