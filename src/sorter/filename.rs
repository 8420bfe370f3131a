use super::{DatasetSorter, same_sorter};
use crate::error::Result;
use crate::tag_cache::{FrameId, TagCache};

use dicom::core::Tag;
use std::any::Any;
use std::fmt;

/// Orders frames lexicographically by file path, then by frame index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilenameSorter;

impl DatasetSorter for FilenameSorter {
    fn tags_of_interest(&self) -> Vec<Tag> {
        Vec::new()
    }

    fn sort(&self, frames: &[FrameId], cache: &TagCache) -> Result<Vec<Vec<FrameId>>> {
        if frames.is_empty() {
            return Ok(Vec::new());
        }
        let mut sorted = frames.to_vec();
        sorted.sort_by(|a, b| {
            cache
                .frame(*a)
                .filename_key()
                .cmp(&cache.frame(*b).filename_key())
        });
        Ok(vec![sorted])
    }

    fn print_configuration(&self, out: &mut dyn fmt::Write, indent: &str) -> fmt::Result {
        writeln!(out, "{indent}Sort by filename")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn equals(&self, other: &dyn DatasetSorter) -> bool {
        same_sorter(self, other)
    }
}
