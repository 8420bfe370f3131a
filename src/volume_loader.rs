use crate::block::{DESCRIPTOR_TAGS, ImageBlockDescriptor, condense_time_steps};
use crate::config::ReaderConfig;
use crate::dispatch::assemble_volume;
use crate::error::{Diagnostic, Error, Result};
use crate::frame_source::{DicomFileFrameSource, FrameSource};
use crate::geometry::SliceGeometry;
use crate::pixel::PixelFormat;
use crate::scanner::TagScanner;
use crate::sorter::{DatasetSorter, EquiDistantBlocksSorter, SortingChain};
use crate::tag::TagSet;
use crate::tag_cache::{FrameId, TagCache};
use crate::tilt::{GantryTiltAnalyzer, GantryTiltInfo};
use crate::volume::Volume;

use dicom_dictionary_std::tags;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Volumes that could be built plus everything that went wrong on the way
#[derive(Debug, Default)]
pub struct LoadResult {
    pub volumes: Vec<Volume>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Turns a set of DICOM files into volumes: scan the headers, sort and
/// split the frames into image blocks, then assemble every block.
#[derive(Debug)]
pub struct VolumeLoader {
    config: ReaderConfig,
    chain: SortingChain,
    analyzer: GantryTiltAnalyzer,
}

impl Default for VolumeLoader {
    fn default() -> Self {
        Self::new(ReaderConfig::default())
    }
}

impl VolumeLoader {
    pub fn new(config: ReaderConfig) -> Self {
        let chain = SortingChain::default_chain(&config.tolerances);
        Self::with_sorting_chain(config, chain)
    }

    /// Use a custom chain to separate and order frames. Splitting into
    /// equidistant blocks always follows the chain.
    pub fn with_sorting_chain(config: ReaderConfig, chain: SortingChain) -> Self {
        Self {
            analyzer: GantryTiltAnalyzer::from(&config.tolerances),
            config,
            chain,
        }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn sorting_chain(&self) -> &SortingChain {
        &self.chain
    }

    fn splitter(&self) -> EquiDistantBlocksSorter {
        EquiDistantBlocksSorter::from_config(&self.config)
    }

    /// Every tag sorting, splitting and assembly read
    pub fn required_tags(&self) -> TagSet {
        let mut required = self.chain.tags_of_interest();
        required.extend(self.splitter().tags_of_interest());
        required.extend(DESCRIPTOR_TAGS);
        required.extend(PixelFormat::TAGS);
        required.extend(self.config.additional_tags.iter().map(|path| path.tag()));
        required
    }

    /// Load all volumes found in `paths`.
    ///
    /// # Errors
    ///
    /// [`Error::NoValidImages`] for an empty path list. Unreadable files and
    /// blocks that fail to assemble are reported in
    /// [`LoadResult::diagnostics`] instead.
    pub fn load_from_file_paths(&self, paths: &[impl AsRef<Path>]) -> Result<LoadResult> {
        if paths.is_empty() {
            return Err(Error::NoValidImages);
        }

        let mut scanner = TagScanner::new(paths.iter().map(|path| path.as_ref().to_path_buf()))
            .with_parallelism(self.config.parallel);
        scanner.add_tags(self.required_tags().iter());
        scanner.scan();
        let report = scanner.into_report()?;

        let mut diagnostics = report.diagnostics;
        let (blocks, rejected) = self.analyze(&report.cache)?;
        diagnostics.extend(rejected);
        let (volumes, failures) = self.assemble(&blocks, &report.cache, &DicomFileFrameSource);
        diagnostics.extend(failures);

        info!(
            "Loaded {} volume(s) from {} file(s), {} problem(s)",
            volumes.len(),
            paths.len(),
            diagnostics.len()
        );
        Ok(LoadResult {
            volumes,
            diagnostics,
        })
    }

    /// Load all volumes from the files in `path`, descending into
    /// sub-directories if the configuration asks for it
    pub fn load_from_directory(&self, path: impl AsRef<Path>) -> Result<LoadResult> {
        self.load_from_paths(&[path])
    }

    /// Load files and directories as one input set: directories are expanded
    /// like in [`VolumeLoader::load_from_directory`], then all files are
    /// sorted together.
    pub fn load_from_paths(&self, paths: &[impl AsRef<Path>]) -> Result<LoadResult> {
        let mut files: Vec<PathBuf> = Vec::new();
        for path in paths {
            let path = path.as_ref();
            if path.is_dir() {
                files.extend(self.files_below(path)?);
            } else {
                files.push(path.to_path_buf());
            }
        }

        if files.is_empty() {
            return Err(Error::NoValidImages);
        }
        self.load_from_file_paths(&files)
    }

    fn files_below(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let walker = WalkDir::new(dir).sort_by_file_name();
        let walker = if self.config.recursive {
            walker
        } else {
            walker.max_depth(1)
        };

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        debug!("Found {} file(s) below {}", files.len(), dir.display());
        Ok(files)
    }

    /// Sort and split the frames of `cache` into image blocks.
    ///
    /// Blocks that cannot be described, e.g. documents without an image
    /// matrix, are returned as diagnostics next to the valid blocks.
    ///
    /// # Errors
    ///
    /// [`Error::TagNotScanned`] if `cache` lacks tags the sorters read.
    pub fn analyze(&self, cache: &TagCache) -> Result<(Vec<ImageBlockDescriptor>, Vec<Diagnostic>)> {
        let groups = self.chain.run(&cache.frame_ids(), cache)?;
        let mut blocks = Vec::new();
        let mut rejected = Vec::new();

        for group in &groups {
            for (time_steps, tilt) in self.split_group(group, cache)? {
                let first = time_steps.first().and_then(|step| step.first()).copied();
                match ImageBlockDescriptor::new(time_steps, cache, tilt) {
                    Ok(block) => {
                        let block_uid = format!("{}.{}", block.series_uid, blocks.len());
                        blocks.push(block.with_block_uid(block_uid));
                    }
                    Err(error) => {
                        let subject = first
                            .map(|frame| cache.frame(frame).to_string())
                            .unwrap_or_default();
                        warn!("Not an image block, skipping {subject}: {error}");
                        rejected.push(Diagnostic::new(subject, error));
                    }
                }
            }
        }
        info!(
            "{} frame(s) form {} image block(s), {} rejected",
            cache.len(),
            blocks.len(),
            rejected.len()
        );
        Ok((blocks, rejected))
    }

    /// Equidistant 3D blocks of one sorted group, condensed to 3D+t if
    /// requested, each with its tilt information
    fn split_group(
        &self,
        group: &[FrameId],
        cache: &TagCache,
    ) -> Result<Vec<(Vec<Vec<FrameId>>, GantryTiltInfo)>> {
        let splitter = self.splitter();
        let mut analyzed: Vec<(Vec<FrameId>, GantryTiltInfo)> = Vec::new();

        for block in splitter.sort(group, cache)? {
            match self.analyze_tilt(&block, cache) {
                Ok(tilt) => analyzed.push((block, tilt)),
                Err(Error::NoTiltApplicable(reason)) => {
                    warn!("Splitting block of {} frames: {reason}", block.len());
                    for sub_block in splitter.with_tilt_acceptance(false).sort(&block, cache)? {
                        let tilt = self.analyze_tilt(&sub_block, cache).unwrap_or_default();
                        analyzed.push((sub_block, tilt));
                    }
                }
                Err(error) => return Err(error),
            }
        }

        if !self.config.group_3d_plus_t {
            return Ok(analyzed
                .into_iter()
                .map(|(block, tilt)| (vec![block], tilt))
                .collect());
        }

        let tilts: Vec<GantryTiltInfo> = analyzed.iter().map(|(_, tilt)| *tilt).collect();
        let runs = condense_time_steps(analyzed.into_iter().map(|(block, _)| block).collect(), cache)?;
        let mut first_block = 0;
        let mut condensed = Vec::with_capacity(runs.len());
        for run in runs {
            let tilt = tilts[first_block];
            first_block += run.len();
            condensed.push((run, tilt));
        }
        Ok(condensed)
    }

    fn analyze_tilt(&self, block: &[FrameId], cache: &TagCache) -> Result<GantryTiltInfo> {
        let slices = block
            .iter()
            .map(|frame| SliceGeometry::from_cache(cache, *frame))
            .collect::<Result<Vec<_>>>()?;
        if slices.iter().any(|slice| slice.origin.is_none()) {
            return Ok(GantryTiltInfo::none());
        }

        let tilt = self.analyzer.analyze(&slices)?;
        if tilt.correction_required() && !self.config.correct_tilt {
            return Err(Error::NoTiltApplicable(
                "gantry tilt correction is disabled".to_string(),
            ));
        }
        Ok(tilt)
    }

    /// Assemble every block. Blocks that fail are reported as diagnostics
    /// and do not affect the others.
    pub fn assemble(
        &self,
        blocks: &[ImageBlockDescriptor],
        cache: &TagCache,
        source: &dyn FrameSource,
    ) -> (Vec<Volume>, Vec<Diagnostic>) {
        let build = |block: &ImageBlockDescriptor| assemble_volume(block, cache, source, &self.config);
        let results: Vec<Result<Volume>> = if self.config.parallel {
            blocks.par_iter().map(build).collect()
        } else {
            blocks.iter().map(build).collect()
        };

        let mut volumes = Vec::new();
        let mut diagnostics = Vec::new();
        for (block, result) in blocks.iter().zip(results) {
            match result {
                Ok(volume) => {
                    info!(
                        "Volume {}: {:?} {} ({})",
                        block.block_uid,
                        volume.dim(),
                        volume.pixel_type(),
                        cache
                            .tag_value(block.frames[0], tags::MODALITY)
                            .unwrap_or_default()
                    );
                    volumes.push(volume);
                }
                Err(error) => {
                    warn!("Could not assemble {}: {error}", block.block_uid);
                    diagnostics.push(Diagnostic::new(block.block_uid.clone(), error));
                }
            }
        }
        (volumes, diagnostics)
    }
}
