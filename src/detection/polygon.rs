use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::PolygonConfig;
use crate::detection::Locator;
use crate::detection::contours;
use crate::detection::preprocessing;
use crate::detection::selector::{AcceptancePolicy, RegionSelector};
use crate::detection::steps::{BilateralStep, EdgeClosingStep, EdgeDetectionStep};
use crate::error::{PlateError, Result};
use crate::models::{BoundingBox, Candidate, LicensePlate, PlateImage, ensure_not_empty};
use crate::pipeline::{Pipeline, StageObserver, notify, notify_color};

/// Finds a plate as the largest contour that simplifies to a quadrilateral.
pub struct EdgePolygonLocator {
    config: PolygonConfig,
    pipeline: Pipeline,
    selector: RegionSelector,
}

impl EdgePolygonLocator {
    pub fn new(config: PolygonConfig) -> Self {
        let pipeline = Self::build_pipeline(&config);
        Self {
            config,
            pipeline,
            selector: RegionSelector::new(AcceptancePolicy::Quadrilateral),
        }
    }

    pub fn build_pipeline(config: &PolygonConfig) -> Pipeline {
        let pipeline = Pipeline::new()
            .add_step(Arc::new(BilateralStep {
                diameter: config.bilateral_diameter,
                sigma_color: config.sigma_color,
                sigma_space: config.sigma_space,
            }))
            .add_step(Arc::new(EdgeDetectionStep {
                low_threshold: config.canny_low,
                high_threshold: config.canny_high,
            }));
        if config.edge_closing > 0 {
            pipeline.add_step(Arc::new(EdgeClosingStep {
                dilations: config.edge_closing,
            }))
        } else {
            pipeline
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.pipeline = self.pipeline.with_observer(observer);
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Polygon approximations of the `keep` largest contours, largest first.
    /// Contours collapsing to fewer than three vertices are dropped.
    pub fn polygon_candidates(&self, gray: &GrayImage) -> Result<Vec<Candidate>> {
        ensure_not_empty(gray)?;
        let edges = self.pipeline.run(gray)?.image;
        let ranked = contours::rank_by_area(contours::find_all_contours(&edges), self.config.keep);

        Ok(ranked
            .into_iter()
            .filter_map(|contour| {
                let epsilon = self.config.epsilon_fraction * contour.perimeter();
                let vertices = contours::approximate_closed_polygon(&contour.points, epsilon);
                (vertices.len() >= 3).then(|| Candidate::polygon(vertices, contour))
            })
            .collect())
    }

    /// Largest quadrilateral contour, masked out of `color` and cropped.
    #[instrument(skip_all, fields(width = gray.width(), height = gray.height()))]
    pub fn locate_plate_polygon(
        &self,
        gray: &GrayImage,
        color: &RgbImage,
    ) -> Result<Option<LicensePlate>> {
        if gray.dimensions() != color.dimensions() {
            return Err(PlateError::DimensionMismatch {
                color: color.dimensions(),
                gray: gray.dimensions(),
            });
        }
        let candidates = self.polygon_candidates(gray)?;
        let Some(accepted) = self.selector.select(&candidates) else {
            debug!(examined = candidates.len(), "no contour detected");
            return Ok(None);
        };
        debug!(bbox = ?accepted.bounding_box(), "found quadrilateral contour");
        Ok(self.extract(color, accepted.clone()))
    }

    fn extract(&self, color: &RgbImage, candidate: Candidate) -> Option<LicensePlate> {
        let mask = polygon_mask(color.width(), color.height(), &candidate.outline());
        let bbox = mask_extent(&mask)?;

        let masked: RgbImage = ImageBuffer::from_fn(color.width(), color.height(), |x, y| {
            if mask.get_pixel(x, y)[0] > 0 {
                *color.get_pixel(x, y)
            } else {
                Rgb([0, 0, 0])
            }
        });
        let crop =
            image::imageops::crop_imm(&masked, bbox.x, bbox.y, bbox.width, bbox.height).to_image();
        let crop_gray = DynamicImage::ImageRgb8(crop.clone()).to_luma8();
        let roi = preprocessing::otsu_binarize_inverted(&crop_gray);

        notify(self.pipeline.observers(), "Plate Mask", &mask);
        notify_color(self.pipeline.observers(), "License Plate", &crop);

        Some(LicensePlate {
            crop: DynamicImage::ImageRgb8(crop),
            roi,
            candidate,
        })
    }
}

impl Default for EdgePolygonLocator {
    fn default() -> Self {
        Self::new(PolygonConfig::default())
    }
}

impl Locator for EdgePolygonLocator {
    fn name(&self) -> &str {
        "polygon"
    }

    fn locate(&self, image: &PlateImage) -> Result<Vec<Candidate>> {
        self.polygon_candidates(&image.gray)
    }
}

/// Filled polygon rasterized as 255 on a black `width` x `height` mask.
pub fn polygon_mask(width: u32, height: u32, vertices: &[Point<i32>]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    let mut vertices = vertices.to_vec();
    vertices.dedup();
    if vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }
    if vertices.len() >= 3 {
        draw_polygon_mut(&mut mask, &vertices, Luma([255u8]));
    }
    mask
}

/// Box around the non-zero pixels of a mask.
pub fn mask_extent(mask: &GrayImage) -> Option<BoundingBox> {
    let points: Vec<Point<i32>> = mask
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] > 0)
        .map(|(x, y, _)| Point::new(x as i32, y as i32))
        .collect();
    BoundingBox::from_points(&points)
}
