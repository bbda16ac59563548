use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use platescan::batch::{self, BatchSummary, Outcome};
use platescan::label;
use platescan::{
    CascadeClassifier, DebugDirObserver, HaarCascade, PlateFinder, PlateScanConfig, Strategy,
};

#[derive(Parser)]
#[command(name = "platescan")]
#[command(about = "Locate license plate regions in photographs")]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Locate the plate in a single image
    Locate {
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        #[command(flatten)]
        options: LocateOptions,

        /// Save intermediate images to directory (must be empty)
        #[arg(long, value_name = "DIR")]
        debug_out: Option<PathBuf>,

        /// Write the binarized plate region to this file
        #[arg(long, value_name = "PATH")]
        save_roi: Option<PathBuf>,
    },
    /// Locate plates in every image of a directory
    Batch {
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        #[command(flatten)]
        options: LocateOptions,

        /// Images processed concurrently
        #[arg(short, long, default_value_t = 4)]
        jobs: usize,
    },
    /// Convert polygon annotations into YOLO label files
    Labels {
        #[arg(value_name = "ANNOTATIONS")]
        annotations: PathBuf,

        /// Directory the annotated `file` paths are relative to
        #[arg(long, value_name = "DIR")]
        images_root: PathBuf,

        #[arg(long, value_name = "DIR")]
        out: PathBuf,
    },
}

#[derive(Args)]
struct LocateOptions {
    #[arg(long, value_enum, default_value_t = Strategy::Morphological)]
    strategy: Strategy,

    /// Cascade model (JSON), required by the cascade strategy
    #[arg(long, value_name = "MODEL")]
    cascade: Option<PathBuf>,

    /// Number of largest contours kept as candidates
    #[arg(long)]
    keep: Option<usize>,

    /// Remove binarized blobs touching the plate border
    #[arg(long)]
    clear_border: bool,

    /// Resize width before localization; 0 keeps the original size
    #[arg(long, value_name = "PX")]
    resize_width: Option<u32>,

    /// JSON configuration file
    #[arg(long, value_name = "CFG")]
    config: Option<PathBuf>,
}

impl LocateOptions {
    fn load_config(&self) -> anyhow::Result<PlateScanConfig> {
        let mut config = match &self.config {
            Some(path) => PlateScanConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PlateScanConfig::default(),
        };
        if let Some(keep) = self.keep {
            config = config.with_keep(keep);
        }
        if self.clear_border {
            config = config.with_clear_border(true);
        }
        if let Some(width) = self.resize_width {
            config = config.with_resize_width((width > 0).then_some(width));
        }
        Ok(config)
    }

    fn build_finder(&self, config: &PlateScanConfig) -> anyhow::Result<PlateFinder> {
        let classifier = match &self.cascade {
            Some(path) => {
                let model = HaarCascade::from_file(path)
                    .with_context(|| format!("Failed to load cascade model {}", path.display()))?;
                Some(Arc::new(model) as Arc<dyn CascadeClassifier>)
            }
            None => None,
        };
        Ok(PlateFinder::new(self.strategy, config, classifier)?)
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn locate(
    image_path: PathBuf,
    options: LocateOptions,
    debug_out: Option<PathBuf>,
    save_roi: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = options.load_config()?;
    let mut finder = options.build_finder(&config)?;
    if let Some(dir) = debug_out {
        let observer = DebugDirObserver::new(&dir)
            .with_context(|| format!("Cannot write debug images to {}", dir.display()))?;
        finder = finder.with_observer(Arc::new(observer));
    }

    let image = batch::load_plate_image(&image_path, config.resize_width)
        .with_context(|| format!("Failed to load image {}", image_path.display()))?;
    let (width, height) = image.dimensions();

    match finder.find(&image)? {
        Some(plate) => {
            let bbox = plate.bounding_box();
            println!(
                "{}: plate at ({}, {}) {}x{} in {}x{} [{}]",
                image_path.display(),
                bbox.x,
                bbox.y,
                bbox.width,
                bbox.height,
                width,
                height,
                finder.strategy()
            );
            if let Some(path) = save_roi {
                plate
                    .roi
                    .save(&path)
                    .with_context(|| format!("Failed to save ROI to {}", path.display()))?;
            }
        }
        None => println!("{}: no license plate found", image_path.display()),
    }
    Ok(())
}

async fn run_batch(dir: PathBuf, options: LocateOptions, jobs: usize) -> anyhow::Result<()> {
    let config = options.load_config()?;
    let finder = Arc::new(options.build_finder(&config)?);
    let paths = batch::list_images(&dir)
        .with_context(|| format!("Failed to list images in {}", dir.display()))?;

    let results = batch::run_batch(finder, paths, config.resize_width, jobs).await;
    for result in &results {
        match &result.outcome {
            Outcome::Found(plate) => {
                let bbox = plate.bounding_box();
                println!(
                    "{}: plate at ({}, {}) {}x{}",
                    result.path.display(),
                    bbox.x,
                    bbox.y,
                    bbox.width,
                    bbox.height
                );
            }
            Outcome::NotFound => println!("{}: no license plate found", result.path.display()),
            Outcome::Failed(reason) => println!("{}: failed: {reason}", result.path.display()),
        }
    }

    let summary = BatchSummary::from_results(&results);
    println!(
        "\n{} found, {} not found, {} failed",
        summary.found, summary.not_found, summary.failed
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Locate {
            image_path,
            options,
            debug_out,
            save_roi,
        } => locate(image_path, options, debug_out, save_roi),
        Command::Batch { dir, options, jobs } => run_batch(dir, options, jobs).await,
        Command::Labels {
            annotations,
            images_root,
            out,
        } => {
            let summary = label::convert_annotations(&annotations, &images_root, &out)
                .with_context(|| format!("Failed to convert {}", annotations.display()))?;
            println!(
                "Wrote {} labels for {} images to {}",
                summary.labels,
                summary.images,
                out.display()
            );
            Ok(())
        }
    }
}
