use image::{DynamicImage, GrayImage};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::config::SelectorConfig;
use crate::detection::preprocessing;
use crate::error::Result;
use crate::models::{BoundingBox, Candidate, LicensePlate, ensure_not_empty};
use crate::pipeline::{StageObserver, notify};

/// Geometric test a candidate must pass to be accepted as a plate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcceptancePolicy {
    /// Bounding-box width/height inside `[min, max]`, both ends inclusive.
    AspectRatio { min: f64, max: f64 },
    /// Simplified polygon with exactly four vertices.
    Quadrilateral,
}

impl AcceptancePolicy {
    pub fn accepts(&self, candidate: &Candidate) -> bool {
        let bbox = candidate.bounding_box();
        if bbox.is_degenerate() {
            trace!(?bbox, "skipping degenerate candidate");
            return false;
        }
        match *self {
            AcceptancePolicy::AspectRatio { min, max } => bbox
                .aspect_ratio()
                .is_some_and(|ratio| min <= ratio && ratio <= max),
            AcceptancePolicy::Quadrilateral => candidate.is_quadrilateral(),
        }
    }
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        let config = SelectorConfig::default();
        AcceptancePolicy::AspectRatio {
            min: config.min_aspect_ratio,
            max: config.max_aspect_ratio,
        }
    }
}

/// Picks the first acceptable candidate and extracts its binarized crop.
#[derive(Clone, Default)]
pub struct RegionSelector {
    policy: AcceptancePolicy,
    observers: Vec<Arc<dyn StageObserver>>,
}

impl RegionSelector {
    pub fn new(policy: AcceptancePolicy) -> Self {
        Self {
            policy,
            observers: Vec::new(),
        }
    }

    pub fn from_config(config: &SelectorConfig) -> Self {
        Self::new(AcceptancePolicy::AspectRatio {
            min: config.min_aspect_ratio,
            max: config.max_aspect_ratio,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn policy(&self) -> AcceptancePolicy {
        self.policy
    }

    /// First candidate, in the given order, that passes the policy.
    /// Later candidates are never examined once one is accepted.
    pub fn select<'a>(&self, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
        candidates.iter().find(|c| self.policy.accepts(c))
    }

    /// Accept the first qualifying candidate and crop it out of `gray`.
    ///
    /// Returns `Ok(None)` when no candidate qualifies. With `clear_border`,
    /// binarized blobs touching the crop edge are treated as noise and
    /// removed from the ROI.
    pub fn locate_license_plate(
        &self,
        gray: &GrayImage,
        candidates: &[Candidate],
        clear_border: bool,
    ) -> Result<Option<LicensePlate>> {
        ensure_not_empty(gray)?;
        let Some(candidate) = self.select(candidates) else {
            debug!(examined = candidates.len(), "no candidate passed the acceptance policy");
            return Ok(None);
        };
        debug!(bbox = ?candidate.bounding_box(), "accepted plate candidate");
        Ok(self.extract(gray, candidate.clone(), clear_border))
    }

    /// Crop `candidate`'s box from `gray` and binarize it, with no policy
    /// check. `None` if the box lies outside the image.
    pub fn extract(
        &self,
        gray: &GrayImage,
        candidate: Candidate,
        clear_border: bool,
    ) -> Option<LicensePlate> {
        let bbox = candidate.bounding_box().clamp_to(gray.width(), gray.height())?;
        let crop = crop_gray(gray, bbox);
        let mut roi = preprocessing::otsu_binarize_inverted(&crop);
        if clear_border {
            roi = preprocessing::clear_border(&roi);
        }

        notify(&self.observers, "License Plate", &crop);
        notify(&self.observers, "Region Of Interest", &roi);

        Some(LicensePlate {
            crop: DynamicImage::ImageLuma8(crop),
            roi,
            candidate,
        })
    }
}

pub(crate) fn crop_gray(gray: &GrayImage, bbox: BoundingBox) -> GrayImage {
    image::imageops::crop_imm(gray, bbox.x, bbox.y, bbox.width, bbox.height).to_image()
}
