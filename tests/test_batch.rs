mod common;

use common::*;
use platescan::batch::{self, BatchSummary, Outcome};
use platescan::{PlateFinder, PlateScanConfig, Strategy};
use std::sync::Arc;

#[tokio::test]
async fn test_batch_reports_each_image() {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    write_png(dir.path(), "a_plate.png", &plate_scene());
    write_png(dir.path(), "b_uniform.png", &uniform_scene());
    std::fs::write(dir.path().join("c_broken.png"), b"not an image").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

    let paths = batch::list_images(dir.path()).unwrap();
    assert_eq!(paths.len(), 3);

    let finder = PlateFinder::new(Strategy::Polygon, &PlateScanConfig::default(), None).unwrap();
    let results = batch::run_batch(Arc::new(finder), paths.clone(), None, 2).await;

    let returned: Vec<_> = results.iter().map(|r| r.path.clone()).collect();
    assert_eq!(returned, paths);
    assert!(matches!(results[0].outcome, Outcome::Found(_)));
    assert!(matches!(results[1].outcome, Outcome::NotFound));
    assert!(matches!(results[2].outcome, Outcome::Failed(_)));
    assert_eq!(
        BatchSummary::from_results(&results),
        BatchSummary {
            found: 1,
            not_found: 1,
            failed: 1
        }
    );
}

#[test]
fn test_load_plate_image_resizes_to_width() {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let path = write_png(dir.path(), "scene.png", &plate_scene());

    let image = batch::load_plate_image(&path, Some(700)).unwrap();
    assert_eq!(image.dimensions(), (700, 466));
    let original = batch::load_plate_image(&path, None).unwrap();
    assert_eq!(original.dimensions(), (300, 200));
}
