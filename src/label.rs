//! Conversion of plate polygon annotations into YOLO detection labels.

use serde::Deserialize;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{PlateError, Result};
use crate::models::BoundingBox;

pub const PLATE_CLASS_ID: u32 = 0;
pub const PLATE_CLASS_NAME: &str = "license-plate";

/// Fraction of the box size added as margin on every side.
const MARGIN: f64 = 0.05;

/// One `classId cx cy w h` line, all coordinates relative to the image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloLabel {
    pub class_id: u32,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl YoloLabel {
    /// Label for the extent of `points`, grown by a 5% margin per side.
    /// The margin is rounded to whole pixels, ties to even.
    pub fn from_points(
        points: &[[f64; 2]],
        image_width: u32,
        image_height: u32,
        class_id: u32,
    ) -> Option<Self> {
        let first = points.first()?;
        let (mut x_min, mut y_min) = (first[0], first[1]);
        let (mut x_max, mut y_max) = (x_min, y_min);
        for &[x, y] in points {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }

        Some(Self::from_extent([x_min, x_max], [y_min, y_max], image_width, image_height, class_id))
    }

    /// Label for the pixels covered by `bbox`, i.e. the extreme points
    /// `(x, y)` and `(x + width - 1, y + height - 1)`.
    pub fn from_box(bbox: BoundingBox, image_width: u32, image_height: u32, class_id: u32) -> Self {
        let (x, y) = (bbox.x as f64, bbox.y as f64);
        let last = |extent: u32| extent.saturating_sub(1) as f64;
        Self::from_extent(
            [x, x + last(bbox.width)],
            [y, y + last(bbox.height)],
            image_width,
            image_height,
            class_id,
        )
    }

    fn from_extent(
        [x_min, x_max]: [f64; 2],
        [y_min, y_max]: [f64; 2],
        image_width: u32,
        image_height: u32,
        class_id: u32,
    ) -> Self {
        let offset_x = ((x_max - x_min) * MARGIN).round_ties_even();
        let offset_y = ((y_max - y_min) * MARGIN).round_ties_even();
        let (x_min, x_max) = (x_min - offset_x, x_max + offset_x);
        let (y_min, y_max) = (y_min - offset_y, y_max + offset_y);

        let (w, h) = (image_width as f64, image_height as f64);
        Self {
            class_id,
            x_center: (x_max + x_min) / 2.0 / w,
            y_center: (y_max + y_min) / 2.0 / h,
            width: (x_max - x_min) / w,
            height: (y_max - y_min) / h,
        }
    }

    /// Pixel box of the (margin-expanded) label, clamped to the image.
    pub fn denormalize(&self, image_width: u32, image_height: u32) -> Option<BoundingBox> {
        let (w, h) = (image_width as f64, image_height as f64);
        let x_min = ((self.x_center - self.width / 2.0) * w).round().max(0.0);
        let y_min = ((self.y_center - self.height / 2.0) * h).round().max(0.0);
        let x_max = ((self.x_center + self.width / 2.0) * w).round().max(0.0);
        let y_max = ((self.y_center + self.height / 2.0) * h).round().max(0.0);
        BoundingBox::new(
            x_min as u32,
            y_min as u32,
            (x_max - x_min) as u32,
            (y_max - y_min) as u32,
        )
        .clamp_to(image_width, image_height)
    }
}

impl fmt::Display for YoloLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_id, self.x_center, self.y_center, self.width, self.height
        )
    }
}

impl FromStr for YoloLabel {
    type Err = PlateError;

    fn from_str(line: &str) -> Result<Self> {
        let invalid = || PlateError::InvalidLabel(line.to_string());
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [class_id, x_center, y_center, width, height] = fields[..] else {
            return Err(invalid());
        };
        let coord = |s: &str| s.parse::<f64>().map_err(|_| invalid());
        Ok(Self {
            class_id: class_id.parse().map_err(|_| invalid())?,
            x_center: coord(x_center)?,
            y_center: coord(y_center)?,
            width: coord(width)?,
            height: coord(height)?,
        })
    }
}

/// A single annotated plate outline.
#[derive(Debug, Clone, Deserialize)]
pub struct PlateAnnotation {
    #[serde(rename = "box")]
    pub points: Vec<[f64; 2]>,
}

/// All plates annotated on one image, `file` relative to the images root.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageAnnotation {
    pub file: String,
    #[serde(default)]
    pub nums: Vec<PlateAnnotation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionSummary {
    pub images: usize,
    pub labels: usize,
}

pub fn read_annotations(path: impl AsRef<Path>) -> Result<Vec<ImageAnnotation>> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Label file for an annotated image: `<out_dir>/<file stem>.txt`.
pub fn label_path(out_dir: &Path, file: &str) -> PathBuf {
    let stem = Path::new(file)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string());
    out_dir.join(format!("{stem}.txt"))
}

/// Convert every annotation in `annotations` into YOLO label files.
///
/// Lines are appended to existing label files, so repeated runs accumulate.
/// `classes.txt` is rewritten with the single plate class.
pub fn convert_annotations(
    annotations: impl AsRef<Path>,
    images_root: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
) -> Result<ConversionSummary> {
    let (images_root, out_dir) = (images_root.as_ref(), out_dir.as_ref());
    let entries = read_annotations(annotations)?;
    fs::create_dir_all(out_dir)?;

    let mut summary = ConversionSummary::default();
    for entry in &entries {
        let (width, height) = image::image_dimensions(images_root.join(&entry.file))?;
        let path = label_path(out_dir, &entry.file);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        for plate in &entry.nums {
            let label = YoloLabel::from_points(&plate.points, width, height, PLATE_CLASS_ID)
                .ok_or_else(|| PlateError::EmptyAnnotation(entry.file.clone()))?;
            writeln!(file, "{label}")?;
            summary.labels += 1;
        }
        summary.images += 1;
        debug!(file = %entry.file, plates = entry.nums.len(), "processed annotation");
    }

    fs::write(out_dir.join("classes.txt"), PLATE_CLASS_NAME)?;
    info!(images = summary.images, labels = summary.labels, "wrote YOLO labels");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_label_matches_reference_values() {
        let label = YoloLabel::from_points(&[[10.0, 10.0], [50.0, 30.0]], 100, 100, 0).unwrap();
        assert_eq!(label.to_string(), "0 0.300000 0.200000 0.440000 0.220000");
    }

    #[test]
    fn margin_rounds_half_to_even() {
        // 50 * 0.05 = 2.5 rounds down to 2; 30 * 0.05 = 1.5 rounds up to 2.
        let label = YoloLabel::from_points(&[[0.0, 0.0], [50.0, 30.0]], 100, 100, 0).unwrap();
        assert!((label.width - 0.54).abs() < 1e-9);
        assert!((label.height - 0.34).abs() < 1e-9);
    }

    #[test]
    fn polygon_uses_extreme_coordinates() {
        let quad = [[12.0, 40.0], [60.0, 35.0], [62.0, 50.0], [10.0, 55.0]];
        let label = YoloLabel::from_points(&quad, 200, 100, 0).unwrap();
        let bbox = YoloLabel::from_points(&[[10.0, 35.0], [62.0, 55.0]], 200, 100, 0).unwrap();
        assert_eq!(label, bbox);
        assert!(YoloLabel::from_points(&[], 200, 100, 0).is_none());
    }

    #[test]
    fn parses_what_it_prints() {
        let label: YoloLabel = "0 0.300000 0.200000 0.440000 0.220000".parse().unwrap();
        assert_eq!(label.denormalize(100, 100), Some(BoundingBox::new(8, 9, 44, 22)));
        assert!("0 0.3 0.2".parse::<YoloLabel>().is_err());
    }

    #[test]
    fn label_path_drops_directories_and_extension() {
        assert_eq!(
            label_path(Path::new("out"), "train/car_01.jpg"),
            Path::new("out").join("car_01.txt")
        );
    }
}
