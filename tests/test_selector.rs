mod common;

use common::*;

fn boxed(x: u32, y: u32, width: u32, height: u32) -> Candidate {
    Candidate::from_box(BoundingBox::new(x, y, width, height))
}

#[test]
fn test_aspect_ratio_band_boundaries() {
    let gray = ramp(200, 60);
    let selector = RegionSelector::default();

    for (width, accepted) in [(80, true), (100, true), (79, false), (101, false)] {
        let plate = selector
            .locate_license_plate(&gray, &[boxed(0, 0, width, 20)], false)
            .unwrap();
        assert_eq!(plate.is_some(), accepted, "width {width}");
    }
}

#[test]
fn test_first_match_wins() {
    let gray = ramp(300, 100);
    let candidates = vec![
        boxed(0, 0, 30, 30),
        boxed(10, 10, 90, 20),
        boxed(50, 50, 200, 45),
    ];
    let plate = RegionSelector::default()
        .locate_license_plate(&gray, &candidates, false)
        .unwrap()
        .expect("second candidate qualifies");
    assert_eq!(plate.bounding_box(), BoundingBox::new(10, 10, 90, 20));
    assert_eq!(plate.roi.dimensions(), (90, 20));
    assert_eq!((plate.crop.width(), plate.crop.height()), (90, 20));
}

#[test]
fn test_zero_height_candidate_is_skipped() {
    let gray = ramp(200, 60);
    let candidates = vec![boxed(0, 0, 80, 0), boxed(0, 0, 0, 0), boxed(5, 5, 90, 20)];
    let plate = RegionSelector::default()
        .locate_license_plate(&gray, &candidates, false)
        .unwrap()
        .expect("last candidate qualifies");
    assert_eq!(plate.bounding_box(), BoundingBox::new(5, 5, 90, 20));
}

#[test]
fn test_no_candidates_is_not_an_error() {
    let gray = ramp(200, 60);
    let plate = RegionSelector::default()
        .locate_license_plate(&gray, &[], true)
        .unwrap();
    assert!(plate.is_none());
}

#[test]
fn test_roi_is_inverse_binarized() {
    let gray = ramp(200, 40);
    let plate = RegionSelector::default()
        .locate_license_plate(&gray, &[boxed(0, 0, 180, 40)], false)
        .unwrap()
        .unwrap();
    // Dark side of the ramp becomes foreground.
    assert_eq!(plate.roi.get_pixel(0, 0)[0], 255);
    assert_eq!(plate.roi.get_pixel(179, 0)[0], 0);
}

#[test]
fn test_clear_border_empties_edge_touching_blobs() {
    let gray = ramp(200, 40);
    let plate = RegionSelector::default()
        .locate_license_plate(&gray, &[boxed(0, 0, 180, 40)], true)
        .unwrap()
        .unwrap();
    assert!(plate.roi.pixels().all(|p| p[0] == 0));
}

#[test]
fn test_quadrilateral_policy_ignores_boxes() {
    let selector = RegionSelector::new(AcceptancePolicy::Quadrilateral);
    assert!(selector.select(&[boxed(0, 0, 90, 20)]).is_none());
}
