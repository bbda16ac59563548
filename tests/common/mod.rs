mod fixtures;
pub use fixtures::*;

pub use platescan::{
    AcceptancePolicy, BoundingBox, Candidate, EdgePolygonLocator, Locator, MorphologicalLocator,
    PlateImage, RegionSelector,
};
