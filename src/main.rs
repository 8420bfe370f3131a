use anyhow::{Context, Result};
use clap::Parser;
use dicom_volume_assembler::cli::Args;
use dicom_volume_assembler::{
    LoadResult, Orientation, ReaderImplementationLevel, Volume, VolumeLoader,
};
use log::{LevelFilter, error, info};
use std::path::Path;

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp_secs()
        .try_init();

    match run(&args) {
        Ok(0) => {
            error!("No volume could be assembled");
            std::process::exit(1);
        }
        Ok(_) => {}
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    }
}

/// Returns the number of volumes produced
fn run(args: &Args) -> Result<usize> {
    let config = args.reader_config()?;

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to set up the worker threads")?;
    }

    let loader = VolumeLoader::new(config);
    let LoadResult {
        volumes,
        diagnostics,
    } = loader.load_from_paths(&args.paths)?;

    for volume in &volumes {
        println!("{}", describe(volume));
        if let Some(dir) = &args.preview {
            save_preview(volume, dir, args)?;
        }
    }
    for diagnostic in &diagnostics {
        println!("skipped {}: {}", diagnostic.subject, diagnostic.error);
    }
    Ok(volumes.len())
}

fn describe(volume: &Volume) -> String {
    let (t, z, y, x, _) = volume.dim();
    let metadata = volume.metadata();
    let origin = volume.origin();
    let [sx, sy, sz] = volume.spacing();

    let mut line = format!(
        "{} {} {x}x{y}x{z}x{t} {} spacing {sx:.3}/{sy:.3}/{sz:.3} origin {:.2}/{:.2}/{:.2}",
        metadata.block_uid,
        metadata.modality,
        volume.pixel_type(),
        origin.x,
        origin.y,
        origin.z,
    );
    if metadata.implementation_level != ReaderImplementationLevel::Supported {
        line.push_str(&format!(" ({})", metadata.implementation_level));
    }
    if metadata.tilt_corrected {
        line.push_str(" tilt-corrected");
    }
    for (tag, value) in &metadata.additional {
        line.push_str(&format!(" {tag}={value}"));
    }
    line
}

fn save_preview(volume: &Volume, dir: &Path, args: &Args) -> Result<()> {
    let centre = volume.dim().1 / 2;
    let Some(image) = volume.get_image_from_axis(
        centre,
        Orientation::Axial,
        args.interpolation.into(),
    ) else {
        return Ok(());
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("cannot create {}", dir.display()))?;
    let file = dir.join(format!("{}.png", volume.metadata().block_uid));
    image
        .save(&file)
        .with_context(|| format!("cannot write {}", file.display()))?;
    info!("Preview written to {}", file.display());
    Ok(())
}
