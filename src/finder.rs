use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::config::PlateScanConfig;
use crate::detection::{
    CascadeClassifier, CascadeLocator, EdgePolygonLocator, Locator, MorphologicalLocator,
    RegionSelector,
};
use crate::error::{PlateError, Result};
use crate::models::{Candidate, LicensePlate, PlateImage};
use crate::pipeline::StageObserver;

/// Which locator a [`PlateFinder`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    #[value(name = "morph")]
    #[serde(rename = "morph")]
    Morphological,
    Polygon,
    Cascade,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Morphological => "morph",
            Strategy::Polygon => "polygon",
            Strategy::Cascade => "cascade",
        })
    }
}

/// One locator strategy wired to the step that turns its output into a plate.
pub enum PlateFinder {
    Morphological {
        locator: MorphologicalLocator,
        selector: RegionSelector,
        clear_border: bool,
    },
    Polygon(EdgePolygonLocator),
    Cascade {
        locator: CascadeLocator,
        selector: RegionSelector,
        clear_border: bool,
    },
}

impl PlateFinder {
    /// Build the finder for `strategy`. The cascade strategy needs a
    /// classifier; the others ignore it.
    pub fn new(
        strategy: Strategy,
        config: &PlateScanConfig,
        classifier: Option<Arc<dyn CascadeClassifier>>,
    ) -> Result<Self> {
        let clear_border = config.selector.clear_border;
        Ok(match strategy {
            Strategy::Morphological => PlateFinder::Morphological {
                locator: MorphologicalLocator::new(config.morphological.clone()),
                selector: RegionSelector::from_config(&config.selector),
                clear_border,
            },
            Strategy::Polygon => PlateFinder::Polygon(EdgePolygonLocator::new(config.polygon.clone())),
            Strategy::Cascade => {
                let classifier = classifier.ok_or_else(|| {
                    PlateError::InvalidModel("the cascade strategy needs a model".into())
                })?;
                PlateFinder::Cascade {
                    locator: CascadeLocator::new(classifier, config.cascade.clone()),
                    selector: RegionSelector::default(),
                    clear_border,
                }
            }
        })
    }

    pub fn with_observer(self, observer: Arc<dyn StageObserver>) -> Self {
        match self {
            PlateFinder::Morphological {
                locator,
                selector,
                clear_border,
            } => PlateFinder::Morphological {
                locator: locator.with_observer(observer.clone()),
                selector: selector.with_observer(observer),
                clear_border,
            },
            PlateFinder::Polygon(locator) => PlateFinder::Polygon(locator.with_observer(observer)),
            PlateFinder::Cascade {
                locator,
                selector,
                clear_border,
            } => PlateFinder::Cascade {
                locator,
                selector: selector.with_observer(observer),
                clear_border,
            },
        }
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            PlateFinder::Morphological { .. } => Strategy::Morphological,
            PlateFinder::Polygon(_) => Strategy::Polygon,
            PlateFinder::Cascade { .. } => Strategy::Cascade,
        }
    }

    pub fn locator(&self) -> &dyn Locator {
        match self {
            PlateFinder::Morphological { locator, .. } => locator,
            PlateFinder::Polygon(locator) => locator,
            PlateFinder::Cascade { locator, .. } => locator,
        }
    }

    /// Run the strategy end to end. `Ok(None)` means no plate was found.
    pub fn find(&self, image: &PlateImage) -> Result<Option<LicensePlate>> {
        let plate = match self {
            PlateFinder::Morphological {
                locator,
                selector,
                clear_border,
            } => {
                let candidates = locator.locate(image)?;
                selector.locate_license_plate(&image.gray, &candidates, *clear_border)?
            }
            PlateFinder::Polygon(locator) => locator.locate_plate_polygon(&image.gray, &image.color)?,
            PlateFinder::Cascade {
                locator,
                selector,
                clear_border,
            } => locator.locate_region(&image.color).and_then(|bbox| {
                selector.extract(&image.gray, Candidate::from_box(bbox), *clear_border)
            }),
        };
        if let Some(plate) = &plate {
            info!(strategy = %self.strategy(), bbox = ?plate.bounding_box(), "plate located");
        }
        Ok(plate)
    }
}
