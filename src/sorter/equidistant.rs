use super::{DatasetSorter, same_sorter};
use crate::config::{OriginTolerance, ReaderConfig};
use crate::error::Result;
use crate::geometry::SliceGeometry;
use crate::tag_cache::{FrameId, TagCache};
use crate::tilt::GantryTiltInfo;

use dicom::core::Tag;
use dicom_dictionary_std::tags;
use glam::DVec3;
use log::debug;
use std::any::Any;
use std::fmt;

/// Splits spatially sorted frames into blocks of equidistant slices.
///
/// The distance between the first two slices of a block fixes the step that
/// every further slice must follow. Frames that do not fit are set aside and
/// analysed again, which yields the next block, until no frames remain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquiDistantBlocksSorter {
    pub origin_tolerance: OriginTolerance,
    pub shear_epsilon: f64,
    pub angle_tolerance: f64,
    /// Accept slices that are sheared by a regular gantry tilt
    pub accept_tilt: bool,
    /// Keep tilted blocks of two slices instead of splitting them up
    pub accept_two_slice_groups: bool,
}

impl Default for EquiDistantBlocksSorter {
    fn default() -> Self {
        Self::from_config(&ReaderConfig::default())
    }
}

/// Result of one pass over the frames
#[derive(Debug, Default)]
struct Split {
    block: Vec<FrameId>,
    rest: Vec<FrameId>,
    tilted: bool,
}

impl EquiDistantBlocksSorter {
    pub fn from_config(config: &ReaderConfig) -> Self {
        Self {
            origin_tolerance: config.tolerances.origin,
            shear_epsilon: config.tolerances.shear_mm,
            angle_tolerance: config.tolerances.tilt_angle_deg,
            accept_tilt: config.correct_tilt,
            accept_two_slice_groups: config.accept_two_slice_groups,
        }
    }

    pub fn with_tilt_acceptance(mut self, accept_tilt: bool) -> Self {
        self.accept_tilt = accept_tilt;
        self
    }

    fn accepts_pair(&self, tilt: &GantryTiltInfo, recorded_tilt: Option<f64>) -> bool {
        if !self.accept_tilt || !tilt.is_regular_gantry_tilt() {
            return false;
        }
        match recorded_tilt {
            Some(recorded) => {
                debug!(
                    "    comparing recorded tilt {recorded:.3} against computed {:.3}",
                    tilt.tilt_angle_degrees()
                );
                (recorded.abs() - tilt.tilt_angle_degrees()).abs() <= self.angle_tolerance
            }
            None => true,
        }
    }

    fn split_once(&self, frames: &[FrameId], cache: &TagCache) -> Result<Split> {
        let mut split = Split::default();
        let mut step: Option<DVec3> = None;
        let mut last_origin: Option<DVec3> = None;
        let mut last_different_origin = DVec3::ZERO;
        let mut previous_accepted: Option<FrameId> = None;

        for (index, &frame) in frames.iter().enumerate() {
            let handle = cache.frame(frame);

            // frames of one multi-frame file stay together
            if let Some(previous) = previous_accepted.map(|id| cache.frame(id))
                && previous.file_index() == handle.file_index()
                && previous.frame_index() + 1 == handle.frame_index()
            {
                split.block.push(frame);
                previous_accepted = Some(frame);
                continue;
            }

            let slice = SliceGeometry::from_cache(cache, frame)?;
            let Some(origin) = slice.origin else {
                if split.block.is_empty() {
                    debug!("  {handle} has no position, loading it on its own");
                    split.block.push(frame);
                    split.rest.extend_from_slice(&frames[index + 1..]);
                    break;
                }
                debug!("  {handle} has no position, set aside");
                split.rest.push(frame);
                previous_accepted = None;
                continue;
            };

            let fits = match (last_origin, step) {
                (Some(last), _) if last == origin => {
                    debug!("  {handle} repeats the previous position, set aside as time step");
                    false
                }
                (Some(_), None) => {
                    let offset = origin - last_different_origin;
                    step = Some(offset);
                    let tilt = GantryTiltInfo::between(
                        last_different_origin,
                        origin,
                        slice.right,
                        slice.up,
                        1,
                        self.shear_epsilon,
                    );
                    if !tilt.is_sheared() {
                        true
                    } else if self.accepts_pair(&tilt, slice.recorded_tilt) {
                        split.tilted = true;
                        true
                    } else {
                        debug!("  {handle} is sheared against its predecessor, set aside");
                        false
                    }
                }
                (Some(_), Some(step)) => {
                    let expected = last_different_origin + step;
                    let error = (expected - origin).length();
                    let allowed = self.origin_tolerance.resolve(step.length());
                    if error > allowed {
                        debug!(
                            "  {handle} does not fit the inter-slice distance \
                             (off by {error:.4} mm, allowed {allowed:.4}), set aside"
                        );
                        false
                    } else {
                        true
                    }
                }
                (None, _) => true,
            };

            if fits {
                split.block.push(frame);
                previous_accepted = Some(frame);
            } else {
                split.rest.push(frame);
                previous_accepted = None;
            }

            if last_origin.is_none() || (fits && last_origin != Some(origin)) {
                last_different_origin = origin;
            }
            last_origin = Some(origin);
        }

        // two tilted slices give no evidence that they belong together
        if split.tilted && split.block.len() == 2 && !self.accept_two_slice_groups {
            debug!("  undoing tilted grouping of two slices");
            if let Some(second) = split.block.pop() {
                split.rest.insert(0, second);
            }
            split.tilted = false;
        }
        Ok(split)
    }
}

impl DatasetSorter for EquiDistantBlocksSorter {
    fn tags_of_interest(&self) -> Vec<Tag> {
        vec![
            tags::IMAGE_POSITION_PATIENT,
            tags::IMAGE_ORIENTATION_PATIENT,
            tags::GANTRY_DETECTOR_TILT,
        ]
    }

    fn sort(&self, frames: &[FrameId], cache: &TagCache) -> Result<Vec<Vec<FrameId>>> {
        let mut groups = Vec::new();
        let mut remaining = frames.to_vec();
        while !remaining.is_empty() {
            let split = self.split_once(&remaining, cache)?;
            debug!(
                "Equidistant block of {} frame(s){}, {} left",
                split.block.len(),
                if split.tilted { " with gantry tilt" } else { "" },
                split.rest.len()
            );
            groups.push(split.block);
            remaining = split.rest;
        }
        Ok(groups)
    }

    fn print_configuration(&self, out: &mut dyn fmt::Write, indent: &str) -> fmt::Result {
        writeln!(out, "{indent}Equidistant blocks:")?;
        writeln!(out, "{indent}  origin tolerance {}", self.origin_tolerance)?;
        writeln!(out, "{indent}  accept gantry tilt: {}", self.accept_tilt)?;
        writeln!(
            out,
            "{indent}  accept tilted blocks of two slices: {}",
            self.accept_two_slice_groups
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn equals(&self, other: &dyn DatasetSorter) -> bool {
        same_sorter(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sorter::test_support::cache_with;
    use crate::tag_cache::PixelDataKind;

    const AXIAL: &str = "1\\0\\0\\0\\1\\0";

    fn positions(origins: &[&str]) -> TagCache {
        let files: Vec<(String, [&str; 2])> = origins
            .iter()
            .enumerate()
            .map(|(i, origin)| (format!("{i:02}.dcm"), [*origin, AXIAL]))
            .collect();
        let files: Vec<(&str, &[&str])> = files
            .iter()
            .map(|(name, values)| (name.as_str(), &values[..]))
            .collect();
        cache_with(
            &[
                tags::IMAGE_POSITION_PATIENT,
                tags::IMAGE_ORIENTATION_PATIENT,
                tags::GANTRY_DETECTOR_TILT,
            ],
            &files,
        )
    }

    fn split(sorter: EquiDistantBlocksSorter, cache: &TagCache) -> Vec<Vec<usize>> {
        let groups = sorter.sort(&cache.frame_ids(), cache).unwrap();
        groups
            .into_iter()
            .map(|group| group.into_iter().map(FrameId::index).collect())
            .collect()
    }

    fn cache_with_tilt_tags(origins: &[String], recorded: &str) -> TagCache {
        let mut builder = TagCache::builder(
            [
                tags::IMAGE_POSITION_PATIENT,
                tags::IMAGE_ORIENTATION_PATIENT,
                tags::GANTRY_DETECTOR_TILT,
            ]
            .into_iter()
            .collect(),
        );
        for (i, origin) in origins.iter().enumerate() {
            builder.add_file(
                format!("{i}.dcm"),
                1,
                PixelDataKind::Integer,
                vec![origin.clone(), AXIAL.to_string(), recorded.to_string()],
            );
        }
        builder.build()
    }

    fn tilted_origins(count: usize) -> Vec<String> {
        let normal_step = 1.0 / 2.0_f64.to_radians().tan();
        (0..count)
            .map(|i| format!("0\\{}\\{}", i as f64, normal_step * i as f64))
            .collect()
    }

    #[test]
    fn regular_stack_is_one_block() {
        let cache = positions(&["0\\0\\0", "0\\0\\1.5", "0\\0\\3", "0\\0\\4.5"]);
        assert_eq!(
            split(EquiDistantBlocksSorter::default(), &cache),
            vec![vec![0, 1, 2, 3]]
        );
    }

    #[test]
    fn gap_splits_the_stack() {
        let cache = positions(&["0\\0\\0", "0\\0\\1", "0\\0\\2", "0\\0\\4", "0\\0\\5"]);
        assert_eq!(
            split(EquiDistantBlocksSorter::default(), &cache),
            vec![vec![0, 1, 2], vec![3, 4]]
        );
    }

    #[test]
    fn origin_tolerance_in_mm_or_relative_to_the_spacing() {
        let cache = positions(&["0\\0\\0", "0\\0\\5", "0\\0\\10.3", "0\\0\\15"]);

        let fixed = EquiDistantBlocksSorter {
            origin_tolerance: OriginTolerance::Millimetres(0.1),
            ..EquiDistantBlocksSorter::default()
        };
        assert_eq!(split(fixed, &cache), vec![vec![0, 1], vec![2, 3]]);

        let adaptive = EquiDistantBlocksSorter {
            origin_tolerance: OriginTolerance::FractionOfSpacing(0.3),
            ..EquiDistantBlocksSorter::default()
        };
        assert_eq!(split(adaptive, &cache), vec![vec![0, 1, 2, 3]]);

        let strict = EquiDistantBlocksSorter {
            origin_tolerance: OriginTolerance::FractionOfSpacing(0.05),
            ..EquiDistantBlocksSorter::default()
        };
        assert_eq!(split(strict, &cache), vec![vec![0, 1], vec![2, 3]]);
    }

    #[test]
    fn repeated_positions_become_separate_time_steps() {
        let cache = positions(&[
            "0\\0\\0", "0\\0\\0", "0\\0\\1", "0\\0\\1", "0\\0\\2", "0\\0\\2",
        ]);
        assert_eq!(
            split(EquiDistantBlocksSorter::default(), &cache),
            vec![vec![0, 2, 4], vec![1, 3, 5]]
        );
    }

    #[test]
    fn frames_without_position_are_loaded_alone() {
        let cache = positions(&["", "0\\0\\0", "0\\0\\1"]);
        assert_eq!(
            split(EquiDistantBlocksSorter::default(), &cache),
            vec![vec![0], vec![1, 2]]
        );

        let cache = positions(&["0\\0\\0", "", "0\\0\\1"]);
        assert_eq!(
            split(EquiDistantBlocksSorter::default(), &cache),
            vec![vec![0, 2], vec![1]]
        );
    }

    #[test]
    fn regular_tilt_is_grouped_when_enabled() {
        let cache = cache_with_tilt_tags(&tilted_origins(4), "2.0");
        assert_eq!(
            split(EquiDistantBlocksSorter::default(), &cache),
            vec![vec![0, 1, 2, 3]]
        );

        let without = EquiDistantBlocksSorter::default().with_tilt_acceptance(false);
        assert_eq!(
            split(without, &cache),
            vec![vec![0], vec![1], vec![2], vec![3]]
        );
    }

    #[test]
    fn contradicting_recorded_angle_prevents_grouping() {
        let cache = cache_with_tilt_tags(&tilted_origins(3), "15");
        assert_eq!(split(EquiDistantBlocksSorter::default(), &cache).len(), 3);
    }

    #[test]
    fn tilted_pair_is_split_unless_allowed() {
        let cache = cache_with_tilt_tags(&tilted_origins(2), "");
        assert_eq!(
            split(EquiDistantBlocksSorter::default(), &cache),
            vec![vec![0], vec![1]]
        );

        let sorter = EquiDistantBlocksSorter {
            accept_two_slice_groups: true,
            ..EquiDistantBlocksSorter::default()
        };
        assert_eq!(split(sorter, &cache), vec![vec![0, 1]]);
    }

    #[test]
    fn multi_frame_file_stays_one_block() {
        let mut builder = TagCache::builder(
            [
                tags::IMAGE_POSITION_PATIENT,
                tags::IMAGE_ORIENTATION_PATIENT,
                tags::GANTRY_DETECTOR_TILT,
            ]
            .into_iter()
            .collect(),
        );
        builder
            .add_file("cine.dcm", 3, PixelDataKind::Integer, vec!["0\\0\\0".into(), AXIAL.into()])
            .add_file("other.dcm", 2, PixelDataKind::Integer, vec!["0\\0\\0".into(), AXIAL.into()]);
        let cache = builder.build();

        assert_eq!(
            split(EquiDistantBlocksSorter::default(), &cache),
            vec![vec![0, 1, 2], vec![3, 4]]
        );
    }
}
