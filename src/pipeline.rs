use image::{GrayImage, RgbImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

use crate::error::{PlateError, Result};

/// Data that flows through a locator pipeline
#[derive(Clone)]
pub struct PipelineData {
    /// The current working image
    pub image: GrayImage,

    /// The grayscale input the pipeline started from (shared via Arc)
    pub source: Arc<GrayImage>,

    /// Named side images produced by earlier steps (e.g. the light-region mask)
    pub masks: HashMap<String, GrayImage>,
}

impl PipelineData {
    /// Create PipelineData for a full grayscale image
    pub fn from_image(image: GrayImage) -> Self {
        let source = Arc::new(image.clone());
        Self {
            image,
            source,
            masks: HashMap::new(),
        }
    }

    /// Replace the working image, keeping source and masks
    pub fn with_image(mut self, image: GrayImage) -> Self {
        self.image = image;
        self
    }

    /// Store a named mask
    pub fn with_mask(mut self, name: impl Into<String>, mask: GrayImage) -> Self {
        self.masks.insert(name.into(), mask);
        self
    }

    /// Look up a mask produced by an earlier step
    pub fn mask(&self, name: &str) -> Result<&GrayImage> {
        self.masks
            .get(name)
            .ok_or_else(|| PlateError::MissingMask(name.to_string()))
    }
}

/// Side-effect-only hook invoked at pipeline checkpoints.
///
/// Observers see intermediate images but can never change what a locator
/// computes.
pub trait StageObserver: Send + Sync {
    fn observe(&self, stage: &str, image: &GrayImage);

    fn observe_color(&self, stage: &str, image: &RgbImage) {
        let gray = image::DynamicImage::ImageRgb8(image.clone()).to_luma8();
        self.observe(stage, &gray);
    }
}

/// Notify every observer; no-op when the list is empty.
pub(crate) fn notify(observers: &[Arc<dyn StageObserver>], stage: &str, image: &GrayImage) {
    for observer in observers {
        observer.observe(stage, image);
    }
}

pub(crate) fn notify_color(observers: &[Arc<dyn StageObserver>], stage: &str, image: &RgbImage) {
    for observer in observers {
        observer.observe_color(stage, image);
    }
}

/// Writes every observed image to `<dir>/<NN>_<stage>/01.png`.
#[derive(Debug)]
pub struct DebugDirObserver {
    output_dir: PathBuf,
    counter: AtomicUsize,
}

impl DebugDirObserver {
    /// The directory must be empty or non-existent
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(PlateError::Io(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("debug directory is not empty: {}", output_dir.display()),
                )));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        Ok(Self {
            output_dir,
            counter: AtomicUsize::new(0),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn stage_dir(&self, stage: &str) -> Result<PathBuf> {
        let index = self.counter.fetch_add(1, Ordering::Relaxed);
        let name = format!(
            "{:02}_{}",
            index,
            stage.to_lowercase().replace([' ', '/'], "_")
        );
        let dir = self.output_dir.join(name);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn save_gray(&self, stage: &str, image: &GrayImage) -> Result<PathBuf> {
        let path = self.stage_dir(stage)?.join("01.png");
        image.save(&path)?;
        Ok(path)
    }

    fn save_color(&self, stage: &str, image: &RgbImage) -> Result<PathBuf> {
        let path = self.stage_dir(stage)?.join("01.png");
        image.save(&path)?;
        Ok(path)
    }
}

impl StageObserver for DebugDirObserver {
    fn observe(&self, stage: &str, image: &GrayImage) {
        match self.save_gray(stage, image) {
            Ok(path) => debug!(stage, path = %path.display(), "saved debug image"),
            Err(e) => warn!(stage, error = %e, "failed to save debug image"),
        }
    }

    fn observe_color(&self, stage: &str, image: &RgbImage) {
        match self.save_color(stage, image) {
            Ok(path) => debug!(stage, path = %path.display(), "saved debug image"),
            Err(e) => warn!(stage, error = %e, "failed to save debug image"),
        }
    }
}

/// One pure image transform with named parameters
pub trait PipelineStep: Send + Sync {
    /// Consume the data and return the transformed data
    fn process(&self, data: PipelineData) -> Result<PipelineData>;

    /// Human-readable name for this step (used in logs and debug output)
    fn name(&self) -> &str;

    /// The image observers should see after this step
    fn preview<'a>(&self, data: &'a PipelineData) -> &'a GrayImage {
        &data.image
    }
}

/// Ordered list of steps with optional observers
#[derive(Clone, Default)]
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    observers: Vec<Arc<dyn StageObserver>>,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Helper method to add a step from a Box
    pub fn add_step_boxed(mut self, step: Box<dyn PipelineStep>) -> Self {
        self.steps.push(Arc::from(step));
        self
    }

    /// Attach an observer notified after every step
    pub fn with_observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn observers(&self) -> &[Arc<dyn StageObserver>] {
        &self.observers
    }

    /// Names of the configured steps, in execution order
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step on a grayscale input
    pub fn run(&self, input: &GrayImage) -> Result<PipelineData> {
        self.run_partial(input, self.steps.len())
    }

    /// Run only the first `num_steps` steps (useful for inspecting a stage)
    pub fn run_partial(&self, input: &GrayImage, num_steps: usize) -> Result<PipelineData> {
        let mut data = PipelineData::from_image(input.clone());

        for step in self.steps.iter().take(num_steps) {
            debug!(step = step.name(), "running pipeline step");
            data = step.process(data)?;
            notify(&self.observers, step.name(), step.preview(&data));
        }

        Ok(data)
    }
}
