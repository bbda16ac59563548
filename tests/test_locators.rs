mod common;

use common::*;
use platescan::{CascadeConfig, CascadeLocator, PlateFinder, PlateScanConfig, Strategy};
use std::sync::Arc;

#[test]
fn test_polygon_locator_finds_rectangular_plate() {
    let scene = plate_scene();
    let plate = EdgePolygonLocator::default()
        .locate_plate_polygon(&scene.gray, &scene.color)
        .unwrap()
        .expect("rectangle should be found");

    assert!(plate.candidate.is_quadrilateral());
    let bbox = plate.bounding_box();
    let (x, y, w, h) = PLATE_RECT;
    assert!((bbox.x as i32 - x).abs() <= 4, "{bbox:?}");
    assert!((bbox.y as i32 - y).abs() <= 4, "{bbox:?}");
    assert!((bbox.width as i32 - w as i32).abs() <= 8, "{bbox:?}");
    assert!((bbox.height as i32 - h as i32).abs() <= 8, "{bbox:?}");
    assert_eq!(
        plate.roi.dimensions(),
        (plate.crop.width(), plate.crop.height())
    );
    assert!(plate.roi.pixels().any(|p| p[0] == 255));
}

#[test]
fn test_polygon_locator_rejects_disc() {
    let scene = disc_scene();
    let plate = EdgePolygonLocator::default()
        .locate_plate_polygon(&scene.gray, &scene.color)
        .unwrap();
    assert!(plate.is_none());
}

#[test]
fn test_polygon_locator_checks_dimensions() {
    let scene = plate_scene();
    let smaller = image::imageops::crop_imm(&scene.gray, 0, 0, 100, 100).to_image();
    let result = EdgePolygonLocator::default().locate_plate_polygon(&smaller, &scene.color);
    assert!(matches!(
        result,
        Err(platescan::PlateError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_uniform_image_yields_nothing_from_every_locator() {
    let scene = uniform_scene();
    let cascade = CascadeLocator::new(Arc::new(edge_cascade()), CascadeConfig::default());
    let locators: Vec<Box<dyn Locator>> = vec![
        Box::new(MorphologicalLocator::default()),
        Box::new(EdgePolygonLocator::default()),
        Box::new(cascade.clone()),
    ];
    for locator in &locators {
        let candidates = locator.locate(&scene).unwrap();
        assert!(candidates.is_empty(), "{} found {candidates:?}", locator.name());
    }
    assert_eq!(cascade.locate_region(&scene.color), None);
}

#[test]
fn test_morphological_candidates_are_ranked_and_truncated() {
    let scene = plate_scene();
    let locator = MorphologicalLocator::default();
    for keep in [1, 3, 10] {
        let candidates = locator.locate_candidates(&scene.gray, keep).unwrap();
        assert!(candidates.len() <= keep);
        assert!(candidates.windows(2).all(|w| w[0].area() >= w[1].area()));
        for candidate in &candidates {
            let bbox = candidate.bounding_box();
            assert!(bbox.right() <= 300 && bbox.bottom() <= 200);
        }
    }
}

#[test]
fn test_morphological_finder_accepts_text_dense_plate() {
    let scene = dense_plate_scene();
    let config = PlateScanConfig::default();
    let finder = PlateFinder::new(Strategy::Morphological, &config, None).unwrap();
    let plate = finder
        .find(&scene)
        .unwrap()
        .expect("plate text should be accepted");

    let bbox = plate.bounding_box();
    let (x, y, w, h) = PLATE_TEXT_RECT;
    assert!((bbox.x as i32 - x).abs() <= 4, "{bbox:?}");
    assert!((bbox.y as i32 - y).abs() <= 4, "{bbox:?}");
    assert!((bbox.width as i32 - w as i32).abs() <= 8, "{bbox:?}");
    assert!((bbox.height as i32 - h as i32).abs() <= 8, "{bbox:?}");
    let ratio = bbox.aspect_ratio().unwrap();
    assert!((4.0..=5.0).contains(&ratio), "aspect ratio {ratio}");

    assert_eq!(plate.roi.dimensions(), (bbox.width, bbox.height));
    let glyph_pixels = plate.roi.pixels().filter(|p| p[0] == 255).count();
    assert!(glyph_pixels > 0);

    // Glyphs sit inside the crop, so clearing the border keeps all of them.
    let finder = PlateFinder::new(
        Strategy::Morphological,
        &config.with_clear_border(true),
        None,
    )
    .unwrap();
    let cleared = finder.find(&scene).unwrap().expect("plate text should be accepted");
    assert_eq!(cleared.bounding_box(), bbox);
    let (rw, rh) = cleared.roi.dimensions();
    assert!(cleared.roi.enumerate_pixels().all(|(px, py, p)| {
        let on_border = px == 0 || py == 0 || px == rw - 1 || py == rh - 1;
        !on_border || p[0] == 0
    }));
    assert_eq!(
        cleared.roi.pixels().filter(|p| p[0] == 255).count(),
        glyph_pixels
    );
}

#[test]
fn test_cascade_finder_crops_first_detection() {
    let gray = image::GrayImage::from_fn(80, 40, |_, y| image::Luma([if y < 20 { 230 } else { 10 }]));
    let color = image::DynamicImage::ImageLuma8(gray).to_rgb8();
    let scene = PlateImage::from_dynamic(&image::DynamicImage::ImageRgb8(color)).unwrap();

    let config = PlateScanConfig::default();
    let locator = CascadeLocator::new(
        Arc::new(edge_cascade()),
        CascadeConfig {
            min_neighbors: 0,
            ..config.cascade.clone()
        },
    );
    let bbox = locator
        .locate_region(&scene.color)
        .expect("edge should trigger the cascade");
    assert!(bbox.y < 20 && bbox.bottom() > 20);

    let finder = PlateFinder::new(
        Strategy::Cascade,
        &config,
        Some(Arc::new(edge_cascade())),
    )
    .unwrap();
    assert_eq!(finder.strategy(), Strategy::Cascade);
    assert!(finder.find(&uniform_scene()).unwrap().is_none());
}
