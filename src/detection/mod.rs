pub mod cascade;
pub mod contours;
pub mod morphological;
pub mod polygon;
pub mod preprocessing;
pub mod selector;
pub mod steps;

use crate::error::Result;
use crate::models::{Candidate, PlateImage};

pub use cascade::{CascadeClassifier, CascadeLocator, HaarCascade};
pub use morphological::MorphologicalLocator;
pub use polygon::EdgePolygonLocator;
pub use selector::{AcceptancePolicy, RegionSelector};

/// A strategy that proposes plate regions for an image.
pub trait Locator: Send + Sync {
    fn name(&self) -> &str;

    /// Candidate regions, most plausible first.
    fn locate(&self, image: &PlateImage) -> Result<Vec<Candidate>>;
}
