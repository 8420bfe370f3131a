//! Read-only store of scanned tag values.
//!
//! Frames live in a single frame table owned by the cache and are referred to
//! by [`FrameId`]. Tag values are stored once per file; all frames of a
//! multi-frame file share the row of their file.

use crate::error::{Error, Result};
use crate::tag::TagSet;

use dicom::core::Tag;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

/// Which pixel data element a file carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelDataKind {
    #[default]
    Integer,
    Float,
    DoubleFloat,
}

/// One 2D frame: file path plus frame index inside that file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameHandle {
    path: PathBuf,
    file_index: usize,
    frame_index: u32,
    pixel_data: PixelDataKind,
}

impl FrameHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Position of the file in the scanned file list
    pub fn file_index(&self) -> usize {
        self.file_index
    }

    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    pub fn pixel_data(&self) -> PixelDataKind {
        self.pixel_data
    }

    /// Key for filename ordering: the whole path compared as a plain
    /// string, then the frame index
    pub fn filename_key(&self) -> (&OsStr, u32) {
        (self.path.as_os_str(), self.frame_index)
    }
}

impl fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.path.display(), self.frame_index)
    }
}

/// Index of a frame in a [`TagCache`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(usize);

impl FrameId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagCache {
    tags: TagSet,
    columns: HashMap<Tag, usize>,
    frames: Vec<FrameHandle>,
    rows: Vec<Vec<String>>,
}

impl TagCache {
    pub fn builder(tags: TagSet) -> TagCacheBuilder {
        TagCacheBuilder::new(tags)
    }

    /// Raw value of `tag` for `frame`, empty if the file lacks the attribute.
    ///
    /// # Errors
    ///
    /// [`Error::TagNotScanned`] if `tag` was not part of the scan.
    pub fn tag_value(&self, frame: FrameId, tag: Tag) -> Result<&str> {
        let column = *self.columns.get(&tag).ok_or(Error::TagNotScanned(tag))?;
        let file = self.frames[frame.0].file_index;
        Ok(self.rows[file][column].as_str())
    }

    pub fn frame(&self, frame: FrameId) -> &FrameHandle {
        &self.frames[frame.0]
    }

    pub fn frames(&self) -> &[FrameHandle] {
        &self.frames
    }

    /// All frames in scan order
    pub fn frame_ids(&self) -> Vec<FrameId> {
        (0..self.frames.len()).map(FrameId).collect()
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

pub struct TagCacheBuilder {
    cache: TagCache,
}

impl TagCacheBuilder {
    fn new(tags: TagSet) -> Self {
        let columns = tags.iter().enumerate().map(|(i, tag)| (tag, i)).collect();
        Self {
            cache: TagCache {
                tags,
                columns,
                frames: Vec::new(),
                rows: Vec::new(),
            },
        }
    }

    /// Register a file and its frames. `values` are given in the order of the
    /// scanned tag set; missing trailing values are stored as empty strings.
    pub fn add_file(
        &mut self,
        path: impl Into<PathBuf>,
        number_of_frames: u32,
        pixel_data: PixelDataKind,
        mut values: Vec<String>,
    ) -> &mut Self {
        let path = path.into();
        let file_index = self.cache.rows.len();
        values.resize(self.cache.tags.len(), String::new());
        self.cache.rows.push(values);

        for frame_index in 0..number_of_frames.max(1) {
            self.cache.frames.push(FrameHandle {
                path: path.clone(),
                file_index,
                frame_index,
                pixel_data,
            });
        }
        self
    }

    pub fn build(self) -> TagCache {
        self.cache
    }
}
