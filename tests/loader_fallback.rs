use std::fs;
use std::path::Path;

use tempfile::{Builder, NamedTempFile};
use voxdiff::PointCloud;
use voxdiff_io::{load, write_pcd, write_ply, DecodeError, IngestionError, ScanFormat};

fn write_las(path: &Path, points: &[[f64; 3]]) {
    let mut builder = las::Builder::from((1, 2));
    builder.point_format = las::point::Format::new(0).unwrap();
    let header = builder.into_header().unwrap();
    let mut writer = las::Writer::from_path(path, header).unwrap();
    for p in points {
        let mut point = las::point::Point::default();
        point.x = p[0];
        point.y = p[1];
        point.z = p[2];
        writer.write(point).unwrap();
    }
}

fn write_e57(path: &Path, points: &[[f64; 3]]) {
    let mut writer = e57::E57Writer::from_file(path, "voxdiff-fallback").unwrap();
    let prototype = vec![
        e57::Record::CARTESIAN_X_F64,
        e57::Record::CARTESIAN_Y_F64,
        e57::Record::CARTESIAN_Z_F64,
    ];
    let mut scan = writer.add_pointcloud("scan-0", prototype).unwrap();
    for &[x, y, z] in points {
        scan.add_point(vec![
            e57::RecordValue::Double(x),
            e57::RecordValue::Double(y),
            e57::RecordValue::Double(z),
        ])
        .unwrap();
    }
    scan.finalize().unwrap();
    writer.finalize().unwrap();
}

const POINTS: [[f64; 3]; 3] = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [-1.5, 0.25, 8.0]];

#[test]
fn las_without_extension_loads_via_fallback() {
    let las_file = Builder::new().suffix(".las").tempfile().unwrap();
    write_las(las_file.path(), &POINTS);

    // same bytes, suffix stripped the way an upload pipeline would
    let bare = NamedTempFile::new().unwrap();
    fs::copy(las_file.path(), bare.path()).unwrap();

    let cloud = load(bare.path()).unwrap();
    assert_eq!(cloud.len(), 3);
    for (loaded, expected) in cloud.iter_points().zip(POINTS) {
        for axis in 0..3 {
            assert!((loaded[axis] - expected[axis]).abs() < 0.01);
        }
    }
}

#[test]
fn las_with_misleading_extension_loads_via_fallback() {
    let upload = Builder::new().suffix(".dat").tempfile().unwrap();
    write_las(upload.path(), &POINTS);
    assert_eq!(load(upload.path()).unwrap().len(), 3);
}

#[test]
fn unparseable_without_extension_names_the_empty_extension() {
    let bare = NamedTempFile::new().unwrap();
    fs::write(bare.path(), [0xde, 0xad, 0xbe, 0xef, 0x00, 0x01, 0x02]).unwrap();

    let err = load(bare.path()).unwrap_err();
    assert!(matches!(err, IngestionError::Undetected { .. }));
    let msg = err.to_string();
    assert!(msg.contains("extension ''"), "{msg}");
    assert!(msg.contains(bare.path().to_str().unwrap()), "{msg}");
}

#[test]
fn corrupt_ply_does_not_fall_back() {
    let ply = Builder::new().suffix(".ply").tempfile().unwrap();
    // LAS bytes would be accepted by the fallback chain
    write_las(ply.path(), &POINTS);

    match load(ply.path()).unwrap_err() {
        IngestionError::Decode { format, source, .. } => {
            assert_eq!(format, ScanFormat::Ply);
            assert!(matches!(source, DecodeError::Malformed(_)));
        }
        other => panic!("expected a PLY decode error, got {other}"),
    }
}

#[test]
fn corrupt_las_by_extension_is_decode_error() {
    let las_file = Builder::new().suffix(".LAZ").tempfile().unwrap();
    write_ply(las_file.path(), &PointCloud::from_points(&POINTS)).unwrap();

    let err = load(las_file.path()).unwrap_err();
    assert!(matches!(err, IngestionError::Decode { format: ScanFormat::Las, .. }));
}

#[test]
fn pcd_by_extension_and_without() {
    let cloud = PointCloud::from_points(&POINTS);
    let named = Builder::new().suffix(".pcd").tempfile().unwrap();
    write_pcd(named.path(), &cloud).unwrap();
    assert_eq!(load(named.path()).unwrap(), cloud);

    let bare = NamedTempFile::new().unwrap();
    fs::copy(named.path(), bare.path()).unwrap();
    assert_eq!(load(bare.path()).unwrap(), cloud);
}

#[test]
fn e57_by_extension_and_via_fallback() {
    let named = Builder::new().suffix(".e57").tempfile().unwrap();
    write_e57(named.path(), &POINTS);
    assert_eq!(load(named.path()).unwrap(), PointCloud::from_points(&POINTS));

    // LAS is tried first and must step aside on the E57 signature
    let bare = Builder::new().suffix(".bin").tempfile().unwrap();
    fs::copy(named.path(), bare.path()).unwrap();
    assert_eq!(load(bare.path()).unwrap(), PointCloud::from_points(&POINTS));
}
