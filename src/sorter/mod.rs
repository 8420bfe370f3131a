//! Partitioning and ordering of frames.
//!
//! A [`SortingChain`] applies its [`DatasetSorter`] stages hierarchically:
//! every stage runs independently inside each group produced by the stage
//! before it. Concatenating the final groups in order gives the frame order
//! used to build image blocks.

mod criteria;
mod equidistant;
mod filename;
mod tag_based;

pub use criteria::SortByCriteria;
pub use equidistant::EquiDistantBlocksSorter;
pub use filename::FilenameSorter;
pub use tag_based::{TagBasedSorter, ValueProcessor};

use crate::config::Tolerances;
use crate::error::Result;
use crate::tag::TagSet;
use crate::tag_cache::{FrameId, TagCache};

use dicom::core::Tag;
use log::debug;
use std::any::Any;
use std::fmt;

pub trait DatasetSorter: fmt::Debug + Send + Sync {
    /// Tags the sorter reads; they must be part of the scan
    fn tags_of_interest(&self) -> Vec<Tag>;

    /// Partition `frames` into ordered groups. Frames with equal sort keys
    /// keep their input order.
    fn sort(&self, frames: &[FrameId], cache: &TagCache) -> Result<Vec<Vec<FrameId>>>;

    fn print_configuration(&self, out: &mut dyn fmt::Write, indent: &str) -> fmt::Result;

    fn as_any(&self) -> &dyn Any;

    /// Value equality across trait objects
    fn equals(&self, other: &dyn DatasetSorter) -> bool;
}

impl PartialEq for dyn DatasetSorter {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

/// `equals` for sorters that implement `PartialEq`
pub(crate) fn same_sorter<S: DatasetSorter + PartialEq + 'static>(
    this: &S,
    other: &dyn DatasetSorter,
) -> bool {
    other
        .as_any()
        .downcast_ref::<S>()
        .is_some_and(|other| other == this)
}

#[derive(Debug, Default)]
pub struct SortingChain {
    stages: Vec<Box<dyn DatasetSorter>>,
}

impl SortingChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Separate series by their distinguishing tags, then order each series
    /// by position, acquisition number, acquisition time, trigger time and
    /// finally filename.
    pub fn default_chain(tolerances: &Tolerances) -> Self {
        Self::new()
            .with_sorter(TagBasedSorter::series_default(tolerances.orientation_decimals))
            .with_sorter(SortByCriteria::default_order(tolerances.position_decimals))
    }

    pub fn with_sorter(mut self, sorter: impl DatasetSorter + 'static) -> Self {
        self.add_sorter(Box::new(sorter), false);
        self
    }

    pub fn add_sorter(&mut self, sorter: Box<dyn DatasetSorter>, at_front: bool) {
        if at_front {
            self.stages.insert(0, sorter);
        } else {
            self.stages.push(sorter);
        }
    }

    pub fn stages(&self) -> &[Box<dyn DatasetSorter>] {
        &self.stages
    }

    pub fn tags_of_interest(&self) -> TagSet {
        self.stages
            .iter()
            .flat_map(|stage| stage.tags_of_interest())
            .collect()
    }

    pub fn run(&self, frames: &[FrameId], cache: &TagCache) -> Result<Vec<Vec<FrameId>>> {
        run_stages(
            self.stages.iter().map(|stage| stage.as_ref()),
            frames,
            cache,
        )
    }

    pub fn print_configuration(&self, out: &mut dyn fmt::Write, indent: &str) -> fmt::Result {
        for (index, stage) in self.stages.iter().enumerate() {
            writeln!(out, "{indent}Sorting step {index}:")?;
            stage.print_configuration(out, &format!("{indent}  "))?;
        }
        Ok(())
    }
}

impl PartialEq for SortingChain {
    fn eq(&self, other: &Self) -> bool {
        self.stages.len() == other.stages.len()
            && self
                .stages
                .iter()
                .zip(&other.stages)
                .all(|(a, b)| a.equals(b.as_ref()))
    }
}

pub(crate) fn run_stages<'a>(
    stages: impl IntoIterator<Item = &'a dyn DatasetSorter>,
    frames: &[FrameId],
    cache: &TagCache,
) -> Result<Vec<Vec<FrameId>>> {
    let mut groups = if frames.is_empty() {
        Vec::new()
    } else {
        vec![frames.to_vec()]
    };

    for (index, stage) in stages.into_iter().enumerate() {
        debug!("Sorting step {index} ({stage:?}): {} group(s) input", groups.len());
        let mut next = Vec::with_capacity(groups.len());
        for (group_index, group) in groups.iter().enumerate() {
            let output = stage.sort(group, cache)?;
            debug!(
                "  group {group_index} ({} frames) -> {} group(s)",
                group.len(),
                output.len()
            );
            for (block, frames) in output.iter().enumerate() {
                for frame in frames {
                    debug!("    OUTPUT({block}) {}", cache.frame(*frame));
                }
            }
            next.extend(output);
        }
        groups = next;
    }
    Ok(groups)
}


#[cfg(test)]
mod tests {
    use super::test_support::cache_with;
    use super::*;
    use dicom_dictionary_std::tags;

    fn names(cache: &TagCache, groups: &[Vec<FrameId>]) -> Vec<Vec<String>> {
        groups
            .iter()
            .map(|group| {
                group
                    .iter()
                    .map(|id| cache.frame(*id).path().display().to_string())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn later_stages_refine_each_group_independently() {
        let cache = cache_with(
            &[tags::SERIES_INSTANCE_UID],
            &[
                ("d.dcm", &["2"]),
                ("b.dcm", &["1"]),
                ("c.dcm", &["2"]),
                ("a.dcm", &["1"]),
            ],
        );
        let chain = SortingChain::new()
            .with_sorter(
                TagBasedSorter::new().with_distinguishing_tag(tags::SERIES_INSTANCE_UID, ValueProcessor::Exact),
            )
            .with_sorter(FilenameSorter);

        let groups = chain.run(&cache.frame_ids(), &cache).unwrap();
        assert_eq!(
            names(&cache, &groups),
            vec![vec!["c.dcm", "d.dcm"], vec!["a.dcm", "b.dcm"]]
        );
    }

    #[test]
    fn empty_input_yields_no_groups() {
        let cache = cache_with(&[tags::SERIES_INSTANCE_UID], &[]);
        let chain = SortingChain::default_chain(&Tolerances::default());
        assert!(chain.run(&[], &cache).unwrap().is_empty());
    }

    #[test]
    fn chains_compare_by_value() {
        let tolerances = Tolerances::default();
        assert_eq!(
            SortingChain::default_chain(&tolerances),
            SortingChain::default_chain(&tolerances)
        );
        assert_ne!(
            SortingChain::default_chain(&tolerances),
            SortingChain::new().with_sorter(FilenameSorter)
        );
    }

    #[test]
    fn sorters_can_be_added_at_the_front() {
        let mut chain = SortingChain::new().with_sorter(FilenameSorter);
        chain.add_sorter(Box::new(TagBasedSorter::series_default(5)), true);

        assert!(chain.stages()[0].as_any().is::<TagBasedSorter>());
        let mut text = String::new();
        chain.print_configuration(&mut text, "").unwrap();
        assert!(text.contains("Sorting step 1"));
    }

    #[test]
    fn tags_of_interest_are_merged() {
        let chain = SortingChain::default_chain(&Tolerances::default());
        let tags_of_interest = chain.tags_of_interest();
        assert!(tags_of_interest.contains(tags::SERIES_INSTANCE_UID));
        assert!(tags_of_interest.contains(tags::IMAGE_POSITION_PATIENT));
        assert!(tags_of_interest.contains(tags::ACQUISITION_NUMBER));
    }
}
