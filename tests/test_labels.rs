mod common;

use common::*;
use imageproc::point::Point;
use platescan::label::{self, YoloLabel};
use std::fs;

#[test]
fn test_box_label_round_trip() {
    // Pixel box covering (10, 10) through (50, 30).
    let bbox = BoundingBox::from_points(&[Point::new(10, 10), Point::new(50, 30)]).unwrap();
    assert_eq!(bbox, BoundingBox::new(10, 10, 41, 21));
    let label = YoloLabel::from_box(bbox, 100, 100, 0);
    assert_eq!(label.to_string(), "0 0.300000 0.200000 0.440000 0.220000");
    assert_eq!(
        label,
        YoloLabel::from_points(&[[10.0, 10.0], [50.0, 30.0]], 100, 100, 0).unwrap()
    );

    let parsed: YoloLabel = label.to_string().parse().unwrap();
    let expanded = parsed.denormalize(100, 100).unwrap();
    assert_eq!(expanded, BoundingBox::new(8, 9, 44, 22));

    // Removing the 5% margin again lands within a pixel of the original box.
    let inset = |extent: u32| (extent as f64 * 0.05 / 1.1).round() as u32;
    let (dx, dy) = (inset(expanded.width), inset(expanded.height));
    let recovered = [
        expanded.x + dx,
        expanded.y + dy,
        expanded.right() - dx,
        expanded.bottom() - dy,
    ];
    for (got, want) in recovered.into_iter().zip([10u32, 10, 50, 30]) {
        assert!(got.abs_diff(want) <= 1, "recovered {recovered:?}");
    }
}

#[test]
fn test_convert_annotations_writes_label_files() {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let images_root = dir.path().join("data");
    let out = dir.path().join("yolo");
    write_png(&images_root, "train/car_01.png", &uniform_scene());

    let annotations = dir.path().join("train.json");
    fs::write(
        &annotations,
        r#"[
            {"file": "train/car_01.png", "nums": [
                {"box": [[30, 50], [150, 50], [150, 100], [30, 100]]},
                {"box": [[200, 20], [260, 20], [260, 40], [200, 40]]}
            ]}
        ]"#,
    )
    .unwrap();

    let summary = label::convert_annotations(&annotations, &images_root, &out).unwrap();
    assert_eq!(summary.images, 1);
    assert_eq!(summary.labels, 2);

    let lines = fs::read_to_string(out.join("car_01.txt")).unwrap();
    let labels: Vec<YoloLabel> = lines.lines().map(|l| l.parse().unwrap()).collect();
    assert_eq!(labels.len(), 2);
    assert!(labels.iter().all(|l| l.class_id == 0));
    assert_eq!(
        fs::read_to_string(out.join("classes.txt")).unwrap(),
        "license-plate"
    );

    // A second run appends to the label file.
    label::convert_annotations(&annotations, &images_root, &out).unwrap();
    let lines = fs::read_to_string(out.join("car_01.txt")).unwrap();
    assert_eq!(lines.lines().count(), 4);
}

#[test]
fn test_missing_image_is_an_error() {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let annotations = dir.path().join("train.json");
    fs::write(&annotations, r#"[{"file": "train/missing.png", "nums": []}]"#).unwrap();
    let result = label::convert_annotations(&annotations, dir.path(), dir.path().join("out"));
    assert!(result.is_err());
}
