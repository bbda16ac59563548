//! License-plate region localization.
//!
//! Three interchangeable [`Locator`] strategies propose plate regions; a
//! [`RegionSelector`] accepts the first geometrically plausible candidate and
//! extracts a binarized crop. [`PlateFinder`] wires a strategy to its
//! selection step.

pub mod batch;
pub mod config;
pub mod detection;
pub mod error;
pub mod finder;
pub mod label;
pub mod models;
pub mod pipeline;

pub use config::{
    CascadeConfig, KernelSize, MorphologicalConfig, PlateScanConfig, PolygonConfig, SelectorConfig,
};
pub use detection::{
    AcceptancePolicy, CascadeClassifier, CascadeLocator, EdgePolygonLocator, HaarCascade, Locator,
    MorphologicalLocator, RegionSelector,
};
pub use error::{PlateError, Result};
pub use finder::{PlateFinder, Strategy};
pub use label::YoloLabel;
pub use models::{BoundingBox, Candidate, Contour, LicensePlate, PlateImage};
pub use pipeline::{DebugDirObserver, Pipeline, PipelineData, PipelineStep, StageObserver};
