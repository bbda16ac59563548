use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::integral_image::{integral_image, integral_squared_image};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument, trace, warn};

use crate::config::CascadeConfig;
use crate::detection::Locator;
use crate::error::{PlateError, Result};
use crate::models::{BoundingBox, Candidate, PlateImage};

/// Multi-scale object detector over a grayscale image.
pub trait CascadeClassifier: Send + Sync {
    /// Detections in the order the classifier produces them.
    /// `min_neighbors` is the number of overlapping raw hits a detection
    /// needs before it is reported.
    fn detect_multi_scale(
        &self,
        gray: &GrayImage,
        scale_factor: f32,
        min_neighbors: u32,
    ) -> Vec<BoundingBox>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaarRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaarFeature {
    pub rects: Vec<HaarRect>,
}

/// Decision stump on a single feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeakClassifier {
    pub feature: HaarFeature,
    pub threshold: f32,
    pub left_value: f32,
    pub right_value: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeStage {
    pub threshold: f32,
    pub weak_classifiers: Vec<WeakClassifier>,
}

/// Boosted Haar cascade loaded from a JSON model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaarCascade {
    pub window_width: u32,
    pub window_height: u32,
    pub stages: Vec<CascadeStage>,
}

type Integral = ImageBuffer<Luma<u64>, Vec<u64>>;

struct IntegralImages {
    sum: Integral,
    squared: Integral,
}

impl IntegralImages {
    fn new(gray: &GrayImage) -> Self {
        Self {
            sum: integral_image::<_, u64>(gray),
            squared: integral_squared_image::<_, u64>(gray),
        }
    }

    fn rect_sum(table: &Integral, x: u32, y: u32, width: u32, height: u32) -> u64 {
        let (x1, y1) = (x + width, y + height);
        table.get_pixel(x1, y1)[0] + table.get_pixel(x, y)[0]
            - table.get_pixel(x, y1)[0]
            - table.get_pixel(x1, y)[0]
    }
}

impl HaarCascade {
    pub fn from_json(json: &str) -> Result<Self> {
        let cascade: HaarCascade = serde_json::from_str(json)?;
        cascade.validate()?;
        Ok(cascade)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Reject models whose windows are empty or whose rectangles fall
    /// outside the detection window.
    pub fn validate(&self) -> Result<()> {
        if self.window_width == 0 || self.window_height == 0 {
            return Err(PlateError::InvalidModel(format!(
                "window must be non-empty, got {}x{}",
                self.window_width, self.window_height
            )));
        }
        if self.stages.is_empty() {
            return Err(PlateError::InvalidModel("cascade has no stages".into()));
        }
        for (s, stage) in self.stages.iter().enumerate() {
            if stage.weak_classifiers.is_empty() {
                return Err(PlateError::InvalidModel(format!(
                    "stage {s} has no weak classifiers"
                )));
            }
            for rect in stage.weak_classifiers.iter().flat_map(|w| &w.feature.rects) {
                if rect.width == 0
                    || rect.height == 0
                    || rect.x.saturating_add(rect.width) > self.window_width
                    || rect.y.saturating_add(rect.height) > self.window_height
                {
                    return Err(PlateError::InvalidModel(format!(
                        "stage {s} has a rectangle outside the {}x{} window: {rect:?}",
                        self.window_width, self.window_height
                    )));
                }
            }
        }
        Ok(())
    }

    fn evaluate_window(&self, integrals: &IntegralImages, x: u32, y: u32, scale: f32) -> bool {
        let width = (self.window_width as f32 * scale).round() as u32;
        let height = (self.window_height as f32 * scale).round() as u32;
        let area = (width as u64 * height as u64) as f64;

        let sum = IntegralImages::rect_sum(&integrals.sum, x, y, width, height) as f64;
        let squared = IntegralImages::rect_sum(&integrals.squared, x, y, width, height) as f64;
        let mean = sum / area;
        let variance = squared / area - mean * mean;
        // Flat windows carry no texture to classify.
        if variance <= 1.0 {
            return false;
        }
        let std_dev = variance.sqrt();

        self.stages.iter().all(|stage| {
            let total: f32 = stage
                .weak_classifiers
                .iter()
                .map(|weak| {
                    let value = weak
                        .feature
                        .rects
                        .iter()
                        .map(|r| {
                            let rx = x + (r.x as f32 * scale) as u32;
                            let ry = y + (r.y as f32 * scale) as u32;
                            let rw = ((r.width as f32 * scale) as u32)
                                .min((x + width).saturating_sub(rx));
                            let rh = ((r.height as f32 * scale) as u32)
                                .min((y + height).saturating_sub(ry));
                            r.weight as f64
                                * IntegralImages::rect_sum(&integrals.sum, rx, ry, rw, rh) as f64
                        })
                        .sum::<f64>()
                        / (area * std_dev);
                    if (value as f32) < weak.threshold {
                        weak.left_value
                    } else {
                        weak.right_value
                    }
                })
                .sum();
            total >= stage.threshold
        })
    }
}

impl CascadeClassifier for HaarCascade {
    fn detect_multi_scale(
        &self,
        gray: &GrayImage,
        scale_factor: f32,
        min_neighbors: u32,
    ) -> Vec<BoundingBox> {
        let (img_w, img_h) = gray.dimensions();
        if img_w == 0 || img_h == 0 || scale_factor <= 1.0 {
            return Vec::new();
        }
        // Fields are public, so a model may not have gone through `from_json`.
        if let Err(e) = self.validate() {
            warn!(error = %e, "skipping detection with an invalid cascade");
            return Vec::new();
        }
        let integrals = IntegralImages::new(gray);

        let mut hits = Vec::new();
        let mut scale = 1.0f32;
        loop {
            let width = (self.window_width as f32 * scale).round() as u32;
            let height = (self.window_height as f32 * scale).round() as u32;
            if width > img_w || height > img_h {
                break;
            }
            // Two scaled pixels at fine scales, one beyond.
            let stride = if scale <= 2.0 { 2.0 } else { 1.0 };
            let step = (stride * scale).round().max(1.0) as u32;
            for y in (0..=img_h - height).step_by(step as usize) {
                for x in (0..=img_w - width).step_by(step as usize) {
                    if self.evaluate_window(&integrals, x, y, scale) {
                        hits.push(BoundingBox::new(x, y, width, height));
                    }
                }
            }
            scale *= scale_factor;
        }
        trace!(raw = hits.len(), "cascade window hits");

        group_rectangles(&hits, min_neighbors, 0.2)
    }
}

fn similar(a: &BoundingBox, b: &BoundingBox, eps: f64) -> bool {
    let delta = eps * (a.width.min(b.width) + a.height.min(b.height)) as f64 * 0.5;
    let close = |p: u32, q: u32| (p as f64 - q as f64).abs() <= delta;
    close(a.x, b.x) && close(a.y, b.y) && close(a.right(), b.right()) && close(a.bottom(), b.bottom())
}

fn find_root(parents: &mut [usize], mut i: usize) -> usize {
    while parents[i] != i {
        parents[i] = parents[parents[i]];
        i = parents[i];
    }
    i
}

/// Merge overlapping raw detections into averaged clusters.
///
/// Clusters backed by `min_neighbors` or fewer hits are dropped, as are
/// weaker clusters sitting inside a stronger one. With `min_neighbors == 0`
/// the raw hits are returned untouched. Output follows the order in which
/// each cluster's first hit appears.
pub fn group_rectangles(hits: &[BoundingBox], min_neighbors: u32, eps: f64) -> Vec<BoundingBox> {
    if min_neighbors == 0 || hits.is_empty() {
        return hits.to_vec();
    }

    let mut parents: Vec<usize> = (0..hits.len()).collect();
    for i in 0..hits.len() {
        for j in (i + 1)..hits.len() {
            if similar(&hits[i], &hits[j], eps) {
                let (ri, rj) = (find_root(&mut parents, i), find_root(&mut parents, j));
                if ri != rj {
                    parents[ri.max(rj)] = ri.min(rj);
                }
            }
        }
    }

    // (root, count, summed x/y/w/h) in order of first appearance.
    let mut clusters: Vec<(usize, u32, [u64; 4])> = Vec::new();
    for (i, hit) in hits.iter().enumerate() {
        let root = find_root(&mut parents, i);
        let index = match clusters.iter().position(|c| c.0 == root) {
            Some(index) => index,
            None => {
                clusters.push((root, 0, [0; 4]));
                clusters.len() - 1
            }
        };
        let cluster = &mut clusters[index];
        cluster.1 += 1;
        cluster.2[0] += hit.x as u64;
        cluster.2[1] += hit.y as u64;
        cluster.2[2] += hit.width as u64;
        cluster.2[3] += hit.height as u64;
    }

    let averaged: Vec<(BoundingBox, u32)> = clusters
        .into_iter()
        .filter(|c| c.1 > min_neighbors)
        .map(|(_, count, sums)| {
            let avg = |s: u64| (s as f64 / count as f64).round() as u32;
            (
                BoundingBox::new(avg(sums[0]), avg(sums[1]), avg(sums[2]), avg(sums[3])),
                count,
            )
        })
        .collect();

    averaged
        .iter()
        .enumerate()
        .filter(|&(i, &(inner, n1))| {
            !averaged.iter().enumerate().any(|(j, &(outer, n2))| {
                let dx = (outer.width as f64 * eps).round() as i64;
                let dy = (outer.height as f64 * eps).round() as i64;
                j != i
                    && n2 > min_neighbors
                    && inner.x as i64 >= outer.x as i64 - dx
                    && inner.y as i64 >= outer.y as i64 - dy
                    && inner.right() as i64 <= outer.right() as i64 + dx
                    && inner.bottom() as i64 <= outer.bottom() as i64 + dy
                    && (n2 > n1.max(3) || n1 < 3)
            })
        })
        .map(|(_, &(bbox, _))| bbox)
        .collect()
}

/// Locates a plate with a pre-trained cascade classifier.
#[derive(Clone)]
pub struct CascadeLocator {
    classifier: Arc<dyn CascadeClassifier>,
    config: CascadeConfig,
}

impl CascadeLocator {
    pub fn new(classifier: Arc<dyn CascadeClassifier>, config: CascadeConfig) -> Self {
        Self { classifier, config }
    }

    fn first_detection(&self, gray: &GrayImage) -> Option<BoundingBox> {
        self.classifier
            .detect_multi_scale(gray, self.config.scale_factor, self.config.min_neighbors)
            .into_iter()
            .find_map(|bbox| bbox.clamp_to(gray.width(), gray.height()))
    }

    /// Box of the first detection on the grayscale version of `color`,
    /// clamped to the image. Remaining detections are ignored.
    #[instrument(skip_all, fields(width = color.width(), height = color.height()))]
    pub fn locate_region(&self, color: &RgbImage) -> Option<BoundingBox> {
        let gray = image::imageops::grayscale(color);
        let first = self.first_detection(&gray);
        match first {
            Some(bbox) => debug!(?bbox, "cascade detection"),
            None => debug!("cascade found no plate"),
        }
        first
    }
}

impl Locator for CascadeLocator {
    fn name(&self) -> &str {
        "cascade"
    }

    fn locate(&self, image: &PlateImage) -> Result<Vec<Candidate>> {
        Ok(self
            .first_detection(&image.gray)
            .map(Candidate::from_box)
            .into_iter()
            .collect())
    }
}
