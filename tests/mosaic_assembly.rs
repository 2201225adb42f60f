use geo::{MultiPolygon, polygon};
use ndarray::Array3;

use s2pipe::core::acquisition::MosaicOutcome;
use s2pipe::core::acquisition::mosaic::build_mosaic;
use s2pipe::io::vector::Boundary;
use s2pipe::io::writers::tiff::{TiffOptions, write_geotiff_stack};
use s2pipe::{GeoRasterReader, RasterStack};

const ND: u16 = 65535;
const DATE: i64 = 1_600_000_000_000;

fn subtile(x0: f64, values: [u16; 2]) -> RasterStack<u16> {
    let mut data = Array3::<u16>::zeros((2, 2, 2));
    data.index_axis_mut(ndarray::Axis(0), 0).fill(values[0]);
    data.index_axis_mut(ndarray::Axis(0), 1).fill(values[1]);
    RasterStack {
        data,
        geotransform: [x0, 10.0, 0.0, 4_100_020.0, 0.0, -10.0],
        projection: "EPSG:32629".to_string(),
        nodata: Some(ND as f64),
    }
}

fn bands() -> Vec<String> {
    vec!["B4".to_string(), "B8".to_string()]
}

fn write_parts(date_dir: &std::path::Path) {
    std::fs::create_dir_all(date_dir).unwrap();
    let mut left = subtile(500_000.0, [100, 200]);
    left.data[[0, 0, 0]] = 0;
    left.data[[1, 0, 0]] = 0;
    write_geotiff_stack(
        &date_dir.join(format!("S2SR_image_part_1_{}_tile_T29SPD.tif", DATE)),
        &left,
        &bands(),
        TiffOptions::default(),
    )
    .unwrap();
    write_geotiff_stack(
        &date_dir.join(format!("S2SR_image_part_2_{}_tile_T29SPD.tif", DATE)),
        &subtile(500_020.0, [300, 400]),
        &bands(),
        TiffOptions::default(),
    )
    .unwrap();
}

#[test]
fn subtiles_merge_into_one_mosaic() {
    let dir = tempfile::tempdir().unwrap();
    let date_dir = dir.path().join(DATE.to_string());
    write_parts(&date_dir);
    let output = dir.path().join("mosaics").join(format!("S2SR_{}.tif", DATE));

    let outcome = build_mosaic(&date_dir, &output, DATE, None, &bands(), ND).unwrap();
    assert_eq!(
        outcome,
        MosaicOutcome::Written {
            path: output.clone(),
            zeroed: 1
        }
    );
    assert!(!date_dir.exists());

    let reader = GeoRasterReader::open(&output).unwrap();
    assert_eq!(reader.band_descriptions().unwrap(), bands());
    let stack = reader.read_stack::<u16>().unwrap();
    assert_eq!(stack.data.dim(), (2, 2, 4));
    assert_eq!(stack.geotransform[0], 500_000.0);
    assert_eq!(stack.data[[0, 0, 0]], ND);
    assert_eq!(stack.data[[0, 1, 0]], 100);
    assert_eq!(stack.data[[1, 1, 1]], 200);
    assert_eq!(stack.data[[0, 0, 3]], 300);
    assert_eq!(stack.data[[1, 1, 2]], 400);
}

#[test]
fn mosaic_outside_boundary_removes_date() {
    let dir = tempfile::tempdir().unwrap();
    let date_dir = dir.path().join(DATE.to_string());
    write_parts(&date_dir);
    let output = dir.path().join("mosaic.tif");
    let far = polygon![
        (x: 600_000.0, y: 4_200_000.0),
        (x: 600_100.0, y: 4_200_000.0),
        (x: 600_100.0, y: 4_200_100.0),
        (x: 600_000.0, y: 4_200_000.0)
    ];
    let boundary = Boundary::new(MultiPolygon::new(vec![far]));

    let outcome = build_mosaic(&date_dir, &output, DATE, Some(&boundary), &bands(), ND).unwrap();
    assert_eq!(outcome, MosaicOutcome::OutsideBoundary);
    assert!(!date_dir.exists());
    assert!(!output.exists());
}

#[test]
fn empty_date_has_no_parts() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = build_mosaic(
        &dir.path().join("missing"),
        &dir.path().join("mosaic.tif"),
        DATE,
        None,
        &bands(),
        ND,
    )
    .unwrap();
    assert_eq!(outcome, MosaicOutcome::NoParts);
}
