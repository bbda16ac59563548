use image::GrayImage;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::MorphologicalConfig;
use crate::detection::Locator;
use crate::detection::contours;
use crate::detection::steps::*;
use crate::error::Result;
use crate::models::{Candidate, PlateImage, ensure_not_empty};
use crate::pipeline::{Pipeline, StageObserver};

/// Finds bright, text-dense, horizontally elongated regions.
///
/// A blackhat map emphasises dark glyphs, its horizontal gradient marks
/// character strokes, and the result is intersected with a mask of locally
/// light areas. The largest surviving blobs are returned as box candidates.
pub struct MorphologicalLocator {
    config: MorphologicalConfig,
    pipeline: Pipeline,
}

impl MorphologicalLocator {
    pub fn new(config: MorphologicalConfig) -> Self {
        let pipeline = Self::build_pipeline(&config);
        Self { config, pipeline }
    }

    /// The fixed stage sequence for `config`.
    pub fn build_pipeline(config: &MorphologicalConfig) -> Pipeline {
        Pipeline::new()
            .add_step(Arc::new(BlackhatStep {
                kernel: config.rect_kernel,
            }))
            .add_step(Arc::new(LightMaskStep {
                kernel: config.square_kernel,
                mask: LIGHT_MASK.to_string(),
            }))
            .add_step(Arc::new(ScharrStep))
            .add_step(Arc::new(GradientThresholdStep {
                blur_sigma: config.blur_sigma,
                kernel: config.rect_kernel,
            }))
            .add_step(Arc::new(ErodeDilateStep {
                erosions: config.cleanup_erosions,
                dilations: config.cleanup_dilations,
            }))
            .add_step(Arc::new(FuseMaskStep {
                mask: LIGHT_MASK.to_string(),
                dilations: config.fusion_dilations,
                erosions: config.fusion_erosions,
            }))
    }

    pub fn with_observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.pipeline = self.pipeline.with_observer(observer);
        self
    }

    pub fn config(&self) -> &MorphologicalConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Final fused binary mask the contours are traced on.
    pub fn candidate_mask(&self, gray: &GrayImage) -> Result<GrayImage> {
        ensure_not_empty(gray)?;
        Ok(self.pipeline.run(gray)?.image)
    }

    /// Up to `keep` box candidates, largest contour area first.
    #[instrument(skip_all, fields(width = gray.width(), height = gray.height(), keep = keep))]
    pub fn locate_candidates(&self, gray: &GrayImage, keep: usize) -> Result<Vec<Candidate>> {
        let mask = self.candidate_mask(gray)?;
        let external = contours::find_external_contours(&mask);
        let found = external.len();
        let ranked = contours::rank_by_area(external, keep);
        debug!(found, kept = ranked.len(), "ranked plate candidates");

        Ok(ranked.into_iter().map(Candidate::from_contour).collect())
    }
}

impl Default for MorphologicalLocator {
    fn default() -> Self {
        Self::new(MorphologicalConfig::default())
    }
}

impl Locator for MorphologicalLocator {
    fn name(&self) -> &str {
        "morphological"
    }

    fn locate(&self, image: &PlateImage) -> Result<Vec<Candidate>> {
        self.locate_candidates(&image.gray, self.config.keep)
    }
}
