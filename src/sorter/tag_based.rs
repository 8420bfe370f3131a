use super::{DatasetSorter, same_sorter};
use crate::error::Result;
use crate::geometry::parse_decimals;
use crate::tag_cache::{FrameId, TagCache};

use dicom::core::Tag;
use dicom_dictionary_std::tags;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// How a tag value is normalised before frames are compared
#[derive(Debug, Clone, PartialEq)]
pub enum ValueProcessor {
    Exact,
    /// Parse a multi-valued decimal string and round each value, so that
    /// tiny numeric noise does not separate frames
    RoundedDecimals(u32),
}

impl ValueProcessor {
    fn process(&self, value: &str) -> String {
        match self {
            ValueProcessor::Exact => value.to_string(),
            ValueProcessor::RoundedDecimals(decimals) => match parse_decimals(value) {
                Some(values) if !values.is_empty() => values
                    .iter()
                    .map(|v| {
                        let rounded = format!("{v:.prec$}", prec = *decimals as usize);
                        // "-0.00000" and "0.00000" must group together
                        if rounded.trim_start_matches('-').chars().all(|c| c == '0' || c == '.') {
                            rounded.trim_start_matches('-').to_string()
                        } else {
                            rounded
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\\"),
                _ => value.to_string(),
            },
        }
    }
}

/// Splits frames into groups whose distinguishing tags are equal
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TagBasedSorter {
    distinguishing: Vec<(Tag, ValueProcessor)>,
}

impl TagBasedSorter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames that can never share a volume: different series, matrix size,
    /// pixel spacing, slice thickness, frame count, pixel format or
    /// orientation
    pub fn series_default(orientation_decimals: u32) -> Self {
        [
            tags::SERIES_INSTANCE_UID,
            tags::ROWS,
            tags::COLUMNS,
            tags::PIXEL_SPACING,
            tags::IMAGER_PIXEL_SPACING,
            tags::SLICE_THICKNESS,
            tags::NUMBER_OF_FRAMES,
            tags::BITS_ALLOCATED,
            tags::PIXEL_REPRESENTATION,
            tags::SAMPLES_PER_PIXEL,
        ]
        .into_iter()
        .fold(Self::new(), |sorter, tag| {
            sorter.with_distinguishing_tag(tag, ValueProcessor::Exact)
        })
        .with_distinguishing_tag(
            tags::IMAGE_ORIENTATION_PATIENT,
            ValueProcessor::RoundedDecimals(orientation_decimals),
        )
    }

    pub fn with_distinguishing_tag(mut self, tag: Tag, processor: ValueProcessor) -> Self {
        self.distinguishing.push((tag, processor));
        self
    }

    pub fn distinguishing_tags(&self) -> &[(Tag, ValueProcessor)] {
        &self.distinguishing
    }

    fn group_key(&self, frame: FrameId, cache: &TagCache) -> Result<Vec<String>> {
        self.distinguishing
            .iter()
            .map(|(tag, processor)| Ok(processor.process(cache.tag_value(frame, *tag)?)))
            .collect()
    }
}

impl DatasetSorter for TagBasedSorter {
    fn tags_of_interest(&self) -> Vec<Tag> {
        self.distinguishing.iter().map(|(tag, _)| *tag).collect()
    }

    fn sort(&self, frames: &[FrameId], cache: &TagCache) -> Result<Vec<Vec<FrameId>>> {
        let mut index_of_key: HashMap<Vec<String>, usize> = HashMap::new();
        let mut groups: Vec<Vec<FrameId>> = Vec::new();

        for &frame in frames {
            let key = self.group_key(frame, cache)?;
            let index = *index_of_key.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[index].push(frame);
        }
        Ok(groups)
    }

    fn print_configuration(&self, out: &mut dyn fmt::Write, indent: &str) -> fmt::Result {
        writeln!(out, "{indent}Tag based sorting:")?;
        for (tag, processor) in &self.distinguishing {
            writeln!(out, "{indent}  Split on {tag} ({processor:?})")?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn equals(&self, other: &dyn DatasetSorter) -> bool {
        same_sorter(self, other)
    }
}
