use super::{DatasetSorter, same_sorter};
use crate::enums::SortBy;
use crate::error::Result;
use crate::geometry::{SliceGeometry, parse_scalar};
use crate::tag_cache::{FrameId, TagCache};

use dicom::core::Tag;
use dicom_dictionary_std::tags;
use std::any::Any;
use std::cmp::Ordering;
use std::ffi::OsString;
use std::fmt;

/// Orders frames by a list of criteria, the first one dominating.
///
/// Always returns a single group. Frames that compare equal on every
/// criterion keep their input order.
#[derive(Debug, Clone, PartialEq)]
pub struct SortByCriteria {
    criteria: Vec<SortBy>,
}

/// Value of one criterion for one frame
#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Position(i64),
    Number(f64),
    Text(String),
    Path(OsString, u32),
    Missing,
}

impl SortKey {
    fn rank(&self) -> u8 {
        match self {
            SortKey::Position(_) | SortKey::Number(_) | SortKey::Path(..) => 0,
            SortKey::Text(_) => 1,
            SortKey::Missing => 2,
        }
    }

    /// Total order; values present sort before missing ones
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Position(a), SortKey::Position(b)) => a.cmp(b),
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (SortKey::Path(a, i), SortKey::Path(b, j)) => a.cmp(b).then(i.cmp(j)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl SortByCriteria {
    pub fn new(criteria: Vec<SortBy>) -> Self {
        Self { criteria }
    }

    /// Position along the slice normal, Acquisition Number, Acquisition
    /// Time, Trigger Time and finally the file name
    pub fn default_order(position_decimals: u32) -> Self {
        Self::new(vec![
            SortBy::ImagePosition {
                decimals: position_decimals,
            },
            SortBy::Tag {
                tag: tags::ACQUISITION_NUMBER,
                numeric: true,
            },
            SortBy::Tag {
                tag: tags::ACQUISITION_TIME,
                numeric: true,
            },
            SortBy::Tag {
                tag: tags::TRIGGER_TIME,
                numeric: true,
            },
            SortBy::Filename,
        ])
    }

    pub fn criteria(&self) -> &[SortBy] {
        &self.criteria
    }

    fn key(criterion: &SortBy, frame: FrameId, cache: &TagCache) -> Result<SortKey> {
        Ok(match criterion {
            SortBy::ImagePosition { decimals } => {
                let slice = SliceGeometry::from_cache(cache, frame)?;
                match slice.origin {
                    Some(origin) => {
                        let distance = origin.dot(slice.normal().normalize_or_zero());
                        let scale = 10f64.powi(*decimals as i32);
                        SortKey::Position((distance * scale).round() as i64)
                    }
                    None => SortKey::Missing,
                }
            }
            SortBy::Tag { tag, numeric } => {
                let value = cache.tag_value(frame, *tag)?;
                if value.is_empty() {
                    SortKey::Missing
                } else if let Some(number) = parse_scalar(value).filter(|_| *numeric) {
                    SortKey::Number(number)
                } else {
                    SortKey::Text(value.to_string())
                }
            }
            SortBy::Filename => {
                let (path, frame_index) = cache.frame(frame).filename_key();
                SortKey::Path(path.to_os_string(), frame_index)
            }
        })
    }
}

impl DatasetSorter for SortByCriteria {
    fn tags_of_interest(&self) -> Vec<Tag> {
        self.criteria
            .iter()
            .flat_map(|criterion| match criterion {
                SortBy::ImagePosition { .. } => vec![
                    tags::IMAGE_POSITION_PATIENT,
                    tags::IMAGE_ORIENTATION_PATIENT,
                    tags::GANTRY_DETECTOR_TILT,
                ],
                SortBy::Tag { tag, .. } => vec![*tag],
                SortBy::Filename => Vec::new(),
            })
            .collect()
    }

    fn sort(&self, frames: &[FrameId], cache: &TagCache) -> Result<Vec<Vec<FrameId>>> {
        if frames.is_empty() {
            return Ok(Vec::new());
        }

        let mut keyed = frames
            .iter()
            .map(|&frame| {
                let keys = self
                    .criteria
                    .iter()
                    .map(|criterion| Self::key(criterion, frame, cache))
                    .collect::<Result<Vec<_>>>()?;
                Ok((frame, keys))
            })
            .collect::<Result<Vec<_>>>()?;

        keyed.sort_by(|(_, a), (_, b)| {
            a.iter()
                .zip(b)
                .map(|(x, y)| x.compare(y))
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        });

        Ok(vec![keyed.into_iter().map(|(frame, _)| frame).collect()])
    }

    fn print_configuration(&self, out: &mut dyn fmt::Write, indent: &str) -> fmt::Result {
        writeln!(out, "{indent}Sort by criteria:")?;
        for criterion in &self.criteria {
            match criterion {
                SortBy::ImagePosition { decimals } => {
                    writeln!(out, "{indent}  position along normal ({decimals} decimals)")?
                }
                SortBy::Tag { tag, numeric: true } => writeln!(out, "{indent}  {tag} (numeric)")?,
                SortBy::Tag { tag, numeric: false } => writeln!(out, "{indent}  {tag}")?,
                SortBy::Filename => writeln!(out, "{indent}  filename")?,
            }
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
