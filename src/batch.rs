use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::finder::PlateFinder;
use crate::models::{LicensePlate, PlateImage};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"];

/// Scale `image` to `width` pixels wide, keeping the aspect ratio.
/// The new height is truncated, never below one pixel.
pub fn resize_to_width(image: &DynamicImage, width: u32) -> DynamicImage {
    if width == 0 || image.width() == width || image.width() == 0 {
        return image.clone();
    }
    let ratio = width as f64 / image.width() as f64;
    let height = ((image.height() as f64 * ratio) as u32).max(1);
    image.resize_exact(width, height, FilterType::Triangle)
}

/// Decode an image file and derive its grayscale view.
pub fn load_plate_image(path: impl AsRef<Path>, resize_width: Option<u32>) -> Result<PlateImage> {
    let path = path.as_ref();
    let decoded = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    debug!(path = %path.display(), width = decoded.width(), height = decoded.height(), "decoded image");
    let image = match resize_width {
        Some(width) => resize_to_width(&decoded, width),
        None => decoded,
    };
    PlateImage::from_dynamic(&image)
}

/// Image files directly inside `dir`, sorted by path.
pub fn list_images(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if path.is_file() && is_image {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

#[derive(Debug)]
pub enum Outcome {
    Found(LicensePlate),
    NotFound,
    /// Decoding or processing failed; the batch carries on.
    Failed(String),
}

#[derive(Debug)]
pub struct BatchResult {
    pub path: PathBuf,
    pub outcome: Outcome,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub found: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[BatchResult]) -> Self {
        results.iter().fold(Self::default(), |mut summary, result| {
            match result.outcome {
                Outcome::Found(_) => summary.found += 1,
                Outcome::NotFound => summary.not_found += 1,
                Outcome::Failed(_) => summary.failed += 1,
            }
            summary
        })
    }
}

fn process_one(finder: &PlateFinder, path: &Path, resize_width: Option<u32>) -> Outcome {
    let found = load_plate_image(path, resize_width).and_then(|image| finder.find(&image));
    match found {
        Ok(Some(plate)) => Outcome::Found(plate),
        Ok(None) => Outcome::NotFound,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping image");
            Outcome::Failed(e.to_string())
        }
    }
}

/// Locate plates in every file of `paths`, at most `jobs` images at a time.
///
/// Results come back in the order of `paths`. A failing image is reported
/// as [`Outcome::Failed`] and does not stop the batch.
pub async fn run_batch(
    finder: Arc<PlateFinder>,
    paths: Vec<PathBuf>,
    resize_width: Option<u32>,
    jobs: usize,
) -> Vec<BatchResult> {
    let jobs = jobs.max(1);
    let semaphore = Arc::new(Semaphore::new(jobs));
    info!(images = paths.len(), jobs, strategy = %finder.strategy(), "batch started");

    let mut tasks = JoinSet::new();
    for (index, path) in paths.into_iter().enumerate() {
        let finder = finder.clone();
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let start = Instant::now();
            let Ok(_permit) = semaphore.acquire_owned().await else {
                let outcome = Outcome::Failed("worker pool closed".into());
                return (index, BatchResult { path, outcome, elapsed: start.elapsed() });
            };
            let worker_path = path.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                process_one(&finder, &worker_path, resize_width)
            })
            .await
            .unwrap_or_else(|e| Outcome::Failed(format!("worker panicked: {e}")));
            (index, BatchResult { path, outcome, elapsed: start.elapsed() })
        });
    }

    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => warn!(error = %e, "batch task aborted"),
        }
    }
    results.sort_by_key(|(index, _)| *index);
    let results: Vec<BatchResult> = results.into_iter().map(|(_, result)| result).collect();

    let summary = BatchSummary::from_results(&results);
    info!(
        found = summary.found,
        not_found = summary.not_found,
        failed = summary.failed,
        "batch finished"
    );
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn resize_keeps_aspect_ratio() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(1400, 1051, Rgb([1, 2, 3])));
        let resized = resize_to_width(&image, 700);
        assert_eq!((resized.width(), resized.height()), (700, 525));
    }

    #[test]
    fn summary_counts_outcomes() {
        let result = |outcome| BatchResult {
            path: PathBuf::from("x.png"),
            outcome,
            elapsed: Duration::ZERO,
        };
        let results = vec![
            result(Outcome::NotFound),
            result(Outcome::Failed("bad".into())),
            result(Outcome::NotFound),
        ];
        assert_eq!(
            BatchSummary::from_results(&results),
            BatchSummary {
                found: 0,
                not_found: 2,
                failed: 1
            }
        );
    }
}
