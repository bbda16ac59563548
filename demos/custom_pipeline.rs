use image::ImageReader;
use platescan::detection::steps::*;
use platescan::{Candidate, Pipeline, RegionSelector};
use platescan::detection::contours;
use std::env;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <image_path>", args[0]);
        std::process::exit(1);
    }

    let image_path = &args[1];
    let gray = ImageReader::open(image_path)?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?
        .to_luma8();

    println!("Loaded image: {}x{}", gray.width(), gray.height());

    // Wider plate kernel and a stronger fusion closing than the defaults
    let pipeline = Pipeline::new()
        .add_step(Arc::new(BlackhatStep {
            kernel: platescan::KernelSize::new(17, 5),
        }))
        .add_step(Arc::new(LightMaskStep {
            kernel: platescan::KernelSize::square(5),
            mask: LIGHT_MASK.to_string(),
        }))
        .add_step_boxed(Box::new(ScharrStep))
        .add_step(Arc::new(GradientThresholdStep {
            blur_sigma: 1.5,
            kernel: platescan::KernelSize::new(17, 5),
        }))
        .add_step(Arc::new(ErodeDilateStep {
            erosions: 2,
            dilations: 2,
        }))
        .add_step(Arc::new(FuseMaskStep {
            mask: LIGHT_MASK.to_string(),
            dilations: 3,
            erosions: 1,
        }));

    println!("\n=== Partial Pipeline (Stop After Scharr) ===");
    let partial = pipeline.run_partial(&gray, 3)?;
    let max = partial.image.pixels().map(|p| p[0]).max().unwrap_or(0);
    println!("Gradient map peak: {max}");

    println!("\n=== Custom Pipeline ===");
    let mask = pipeline.run(&gray)?.image;
    let ranked = contours::rank_by_area(contours::find_external_contours(&mask), 10);
    let candidates: Vec<Candidate> = ranked.into_iter().map(Candidate::from_contour).collect();
    for (i, candidate) in candidates.iter().enumerate() {
        let bbox = candidate.bounding_box();
        println!(
            "  {}: ({}, {}) {}x{} ratio={:.2}",
            i + 1,
            bbox.x,
            bbox.y,
            bbox.width,
            bbox.height,
            candidate.aspect_ratio().unwrap_or(0.0)
        );
    }

    match RegionSelector::default().locate_license_plate(&gray, &candidates, true)? {
        Some(plate) => {
            plate.roi.save("plate_roi.png")?;
            println!("\nSaved plate_roi.png ({}x{})", plate.roi.width(), plate.roi.height());
        }
        None => println!("\nNo candidate passed the aspect-ratio test"),
    }

    Ok(())
}
