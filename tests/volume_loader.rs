mod common;

use approx::assert_abs_diff_eq;
use common::{Slice, write_report, write_series};
use dicom::core::VR;
use dicom_dictionary_std::tags;
use dicom_volume_assembler::{
    ComponentType, Components, Error, Interpolation, Orientation, PixelType, ReaderConfig,
    ReaderImplementationLevel, VolumeLoader,
};
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn loads_a_directory_into_one_volume() {
    common::init_logging();
    let dir = tempdir().unwrap();
    let slices: Vec<Slice> = (0..5)
        .map(|z| Slice::at("1.2.3.4", -10.0 + 2.0 * z as f64, 100 + z))
        .collect();
    write_series(dir.path(), "slice", &slices);

    let loader = VolumeLoader::new(ReaderConfig::default().with_additional_tag("0008,0060").unwrap());
    let result = loader.load_from_directory(dir.path()).unwrap();

    assert!(result.diagnostics.is_empty());
    assert_eq!(result.volumes.len(), 1);
    let volume = &result.volumes[0];
    assert_eq!(volume.dim(), (1, 5, 3, 4, 1));
    assert_eq!(
        volume.pixel_type(),
        PixelType::new(ComponentType::U16, Components::Scalar)
    );
    let [sx, sy, sz] = volume.spacing();
    assert_abs_diff_eq!(sx, 0.5);
    assert_abs_diff_eq!(sy, 0.5);
    assert_abs_diff_eq!(sz, 2.0, epsilon = 1e-9);
    assert_abs_diff_eq!(volume.origin().z, -10.0, epsilon = 1e-9);

    for z in 0..5 {
        assert_eq!(volume.voxel_f64(0, z, 2, 3, 0), Some(100.0 + z as f64));
    }

    let metadata = volume.metadata();
    assert_eq!(metadata.series_uid, "1.2.3.4");
    assert_eq!(metadata.modality, "CT");
    assert_eq!(metadata.implementation_level, ReaderImplementationLevel::Supported);
    assert!(!metadata.tilt_corrected);
    assert_eq!(metadata.source_files.len(), 5);
    assert_eq!(metadata.additional, vec![(tags::MODALITY, "CT".to_string())]);

    let image = volume
        .get_image_from_axis(1, Orientation::Coronal, Interpolation::Linear)
        .unwrap();
    assert_eq!(image.width(), 4);
    assert!(image.height() > 5);
}

#[test]
fn slices_are_ordered_by_position_not_by_file_name() {
    let dir = tempdir().unwrap();
    // file names ascend while positions descend
    let slices: Vec<Slice> = (0..4)
        .map(|i| Slice::at("1.2.3.4", 30.0 - 10.0 * i as f64, 10 * (i + 1)))
        .collect();
    let paths = write_series(dir.path(), "z", &slices);

    let result = VolumeLoader::default().load_from_file_paths(&paths).unwrap();
    let volume = &result.volumes[0];

    assert_eq!(volume.dim().1, 4);
    let values: Vec<f64> = (0..4)
        .filter_map(|z| volume.voxel_f64(0, z, 0, 0, 0))
        .collect();
    assert_eq!(values, vec![40.0, 30.0, 20.0, 10.0]);
    assert_eq!(
        volume.metadata().source_files,
        paths.iter().rev().cloned().collect::<Vec<PathBuf>>()
    );
}

#[test]
fn series_and_gaps_produce_separate_volumes() {
    let dir = tempdir().unwrap();
    let mut slices: Vec<Slice> = (0..3).map(|z| Slice::at("1.1", z as f64, 1)).collect();
    // second series with a gap after its third slice
    slices.extend([0.0, 1.0, 2.0, 5.0, 6.0].map(|z| Slice::at("1.2", z, 2)));
    write_series(dir.path(), "mixed", &slices);

    let result = VolumeLoader::default().load_from_directory(dir.path()).unwrap();

    let mut shapes: Vec<(String, usize)> = result
        .volumes
        .iter()
        .map(|volume| (volume.metadata().series_uid.clone(), volume.dim().1))
        .collect();
    shapes.sort();
    assert_eq!(
        shapes,
        vec![
            ("1.1".to_string(), 3),
            ("1.2".to_string(), 2),
            ("1.2".to_string(), 3)
        ]
    );
    let block_uids: Vec<&str> = result
        .volumes
        .iter()
        .map(|volume| volume.metadata().block_uid.as_str())
        .collect();
    assert_eq!(block_uids.len(), 3);
    assert!(block_uids.iter().all(|uid| uid.starts_with("1.1.") || uid.starts_with("1.2.")));
}

#[test]
fn repeated_acquisitions_are_condensed_to_3d_plus_t() {
    let dir = tempdir().unwrap();
    let slices: Vec<Slice> = (0..2)
        .flat_map(|t| {
            (0..3).map(move |z| {
                Slice::at("1.2.3.4", z as f64, 10 * (t + 1) + z)
                    .with_element(tags::ACQUISITION_NUMBER, VR::IS, &(t + 1).to_string())
            })
        })
        .collect();
    let paths = write_series(dir.path(), "dyn", &slices);

    let result = VolumeLoader::default().load_from_file_paths(&paths).unwrap();
    assert_eq!(result.volumes.len(), 1);
    let volume = &result.volumes[0];
    assert_eq!(volume.dim(), (2, 3, 3, 4, 1));
    assert_eq!(volume.time_steps(), 2);
    for z in 0..3 {
        assert_eq!(volume.voxel_f64(0, z, 1, 1, 0), Some(10.0 + z as f64));
        assert_eq!(volume.voxel_f64(1, z, 1, 1, 0), Some(20.0 + z as f64));
    }

    let separate = VolumeLoader::new(ReaderConfig::default().with_3d_plus_t(false))
        .load_from_file_paths(&paths)
        .unwrap();
    assert_eq!(separate.volumes.len(), 2);
    assert!(separate.volumes.iter().all(|volume| volume.dim().0 == 1));
}

#[test]
fn gantry_tilt_is_corrected_or_split() {
    let dir = tempdir().unwrap();
    // 1 mm shift along y per 2 mm along the slice normal
    let slices: Vec<Slice> = (0..4)
        .map(|i| {
            Slice::at("1.2.3.4", 0.0, 50).with_position([0.0, i as f64, 2.0 * i as f64])
        })
        .collect();
    let paths = write_series(dir.path(), "tilt", &slices);

    let corrected = VolumeLoader::default().load_from_file_paths(&paths).unwrap();
    assert_eq!(corrected.volumes.len(), 1);
    let volume = &corrected.volumes[0];
    assert!(volume.metadata().tilt_corrected);
    // 3 mm total shift at 0.5 mm row spacing adds 6 rows
    assert_eq!(volume.dim(), (1, 4, 9, 4, 1));
    assert_abs_diff_eq!(volume.spacing()[2], 2.0, epsilon = 1e-9);

    let split = VolumeLoader::new(ReaderConfig::default().with_tilt_correction(false))
        .load_from_file_paths(&paths)
        .unwrap();
    assert!(split.volumes.len() > 1);
    assert!(split.volumes.iter().all(|volume| !volume.metadata().tilt_corrected));
    let slices: usize = split.volumes.iter().map(|volume| volume.dim().1).sum();
    assert_eq!(slices, 4);
}

#[test]
fn documents_without_images_do_not_stop_the_load() {
    let dir = tempdir().unwrap();
    let slices: Vec<Slice> = (0..3).map(|z| Slice::at("1.2.3.4", z as f64, 7)).collect();
    write_series(dir.path(), "ct", &slices);
    let report = write_report(dir.path(), "report.dcm", "1.2.3.9");

    let result = VolumeLoader::default().load_from_directory(dir.path()).unwrap();

    assert_eq!(result.volumes.len(), 1);
    assert_eq!(result.volumes[0].dim(), (1, 3, 3, 4, 1));
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(
        result.diagnostics[0].subject,
        format!("{}#0", report.display())
    );
    assert!(matches!(
        result.diagnostics[0].error,
        Error::GeometryMismatch { .. }
    ));
}

#[test]
fn files_and_directories_are_loaded_as_one_set() {
    let root = tempdir().unwrap();
    let nested = root.path().join("more");
    std::fs::create_dir(&nested).unwrap();
    let first = Slice::at("1.2.3.4", 0.0, 1).write(root.path(), "first.dcm");
    write_series(
        &nested,
        "rest",
        &[Slice::at("1.2.3.4", 1.0, 2), Slice::at("1.2.3.4", 2.0, 3)],
    );

    let result = VolumeLoader::default()
        .load_from_paths(&[first, nested])
        .unwrap();

    assert!(result.diagnostics.is_empty());
    assert_eq!(result.volumes.len(), 1);
    let volume = &result.volumes[0];
    assert_eq!(volume.dim(), (1, 3, 3, 4, 1));
    let values: Vec<f64> = (0..3)
        .filter_map(|z| volume.voxel_f64(0, z, 0, 0, 0))
        .collect();
    assert_eq!(values, vec![1.0, 2.0, 3.0]);
}

#[test]
fn multi_frame_file_is_assembled_frame_by_frame() {
    let dir = tempdir().unwrap();
    let path = Slice::at("1.2.3.4", 0.0, 40)
        .with_frames(3)
        .write(dir.path(), "cine.dcm");

    let result = VolumeLoader::default().load_from_file_paths(&[path]).unwrap();

    assert!(result.diagnostics.is_empty());
    assert_eq!(result.volumes.len(), 1);
    let volume = &result.volumes[0];
    assert_eq!(volume.dim(), (1, 3, 3, 4, 1));
    for z in 0..3 {
        assert_eq!(volume.voxel_f64(0, z, 2, 3, 0), Some(40.0 + z as f64));
    }
    assert_eq!(volume.metadata().source_files.len(), 1);
}

#[test]
fn float_pixel_data_gives_a_float_volume() {
    let dir = tempdir().unwrap();
    let slices: Vec<Slice> = (0..2)
        .map(|z| Slice::at("1.2.3.4", z as f64, 5 + z as u16).as_float())
        .collect();
    let paths = write_series(dir.path(), "pet", &slices);

    let result = VolumeLoader::default().load_from_file_paths(&paths).unwrap();

    assert!(result.diagnostics.is_empty());
    let volume = &result.volumes[0];
    assert_eq!(
        volume.pixel_type(),
        PixelType::new(ComponentType::F32, Components::Scalar)
    );
    assert_eq!(volume.voxel_f64(0, 0, 1, 1, 0), Some(5.0));
    assert_eq!(volume.voxel_f64(0, 1, 1, 1, 0), Some(6.0));
}

#[test]
fn empty_directory_has_no_valid_images() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        VolumeLoader::default().load_from_directory(dir.path()),
        Err(Error::NoValidImages)
    ));
}
