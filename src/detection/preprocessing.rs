use image::{GrayImage, ImageBuffer, Luma};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::{self, gaussian_blur_f32};
use imageproc::gradients::horizontal_scharr;
use imageproc::morphology::{
    Mask, dilate, erode, grayscale_close, grayscale_dilate, grayscale_erode,
};
use imageproc::region_labelling::{Connectivity, connected_components};
use std::collections::HashSet;

use crate::config::KernelSize;

/// Apply Gaussian blur to reduce noise
pub fn apply_blur(img: &GrayImage, sigma: f32) -> GrayImage {
    gaussian_blur_f32(img, sigma)
}

/// Detect edges using Canny edge detector
pub fn detect_edges(img: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    canny(img, low_threshold, high_threshold)
}

/// Global Otsu binarization: pixels above the level become 255.
pub fn otsu_binarize(img: &GrayImage) -> GrayImage {
    threshold(img, otsu_level(img), ThresholdType::Binary)
}

/// Inverse Otsu binarization: dark glyphs on a bright plate become 255.
pub fn otsu_binarize_inverted(img: &GrayImage) -> GrayImage {
    threshold(img, otsu_level(img), ThresholdType::BinaryInverted)
}

/// `iterations` binary dilations with a 3x3 square.
pub fn dilate_square(img: &GrayImage, iterations: u8) -> GrayImage {
    if iterations == 0 {
        return img.clone();
    }
    dilate(img, Norm::LInf, iterations)
}

/// `iterations` binary erosions with a 3x3 square.
pub fn erode_square(img: &GrayImage, iterations: u8) -> GrayImage {
    if iterations == 0 {
        return img.clone();
    }
    erode(img, Norm::LInf, iterations)
}

/// Pixelwise AND of two binary images of the same size.
pub fn bitwise_and(a: &GrayImage, b: &GrayImage) -> GrayImage {
    ImageBuffer::from_fn(a.width(), a.height(), |x, y| {
        let keep = b.get_pixel(x, y)[0] > 0;
        Luma([if keep { a.get_pixel(x, y)[0] } else { 0 }])
    })
}

/// Rectangular structuring element anchored at its centre.
/// Each side is clamped to 1..=255.
fn rect_mask(kernel: KernelSize) -> Mask {
    let width = kernel.width.clamp(1, 255);
    let height = kernel.height.clamp(1, 255);
    let footprint = GrayImage::from_pixel(width, height, Luma([255]));
    Mask::from_image(&footprint, (width / 2) as u8, (height / 2) as u8)
}

/// Grayscale dilation with a rectangular kernel.
pub fn dilate_rect(img: &GrayImage, kernel: KernelSize) -> GrayImage {
    grayscale_dilate(img, &rect_mask(kernel))
}

/// Grayscale erosion with a rectangular kernel.
pub fn erode_rect(img: &GrayImage, kernel: KernelSize) -> GrayImage {
    grayscale_erode(img, &rect_mask(kernel))
}

/// Dilation followed by erosion: fills dark gaps narrower than the kernel.
pub fn close_rect(img: &GrayImage, kernel: KernelSize) -> GrayImage {
    grayscale_close(img, &rect_mask(kernel))
}

/// Closing minus input: dark features on a lighter surround become bright.
pub fn blackhat(img: &GrayImage, kernel: KernelSize) -> GrayImage {
    let closed = close_rect(img, kernel);
    ImageBuffer::from_fn(img.width(), img.height(), |x, y| {
        Luma([closed.get_pixel(x, y)[0].saturating_sub(img.get_pixel(x, y)[0])])
    })
}

/// Absolute horizontal Scharr derivative, min/max rescaled to 0..=255.
/// A flat response rescales to all zeros.
pub fn horizontal_gradient(img: &GrayImage) -> GrayImage {
    let gradient = horizontal_scharr(img);
    let magnitudes: Vec<f32> = gradient.pixels().map(|p| (p[0] as f32).abs()).collect();
    let min = magnitudes.iter().copied().fold(f32::INFINITY, f32::min);
    let max = magnitudes.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;

    let rescaled = magnitudes
        .into_iter()
        .map(|v| {
            if range > 0.0 {
                (255.0 * (v - min) / range) as u8
            } else {
                0
            }
        })
        .collect();
    GrayImage::from_raw(img.width(), img.height(), rescaled).unwrap_or_else(|| {
        // dimensions always match the gradient buffer
        GrayImage::new(img.width(), img.height())
    })
}

/// Edge-preserving smoothing over a `diameter` wide window, weighted by
/// spatial distance and intensity difference.
pub fn bilateral_filter(
    img: &GrayImage,
    diameter: u32,
    sigma_color: f32,
    sigma_space: f32,
) -> GrayImage {
    let black = img.pixels().all(|p| p[0] == 0);
    if diameter < 2 || sigma_color <= 0.0 || sigma_space <= 0.0 || black {
        return img.clone();
    }
    filter::bilateral_filter(img, diameter, sigma_color, sigma_space)
}

/// Zero every foreground blob (8-connected) that touches the image border.
pub fn clear_border(img: &GrayImage) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }
    let labels = connected_components(img, Connectivity::Eight, Luma([0u8]));

    let mut touching = HashSet::new();
    for x in 0..width {
        touching.insert(labels.get_pixel(x, 0)[0]);
        touching.insert(labels.get_pixel(x, height - 1)[0]);
    }
    for y in 0..height {
        touching.insert(labels.get_pixel(0, y)[0]);
        touching.insert(labels.get_pixel(width - 1, y)[0]);
    }
    touching.remove(&0);

    ImageBuffer::from_fn(width, height, |x, y| {
        if touching.contains(&labels.get_pixel(x, y)[0]) {
            Luma([0])
        } else {
            *img.get_pixel(x, y)
        }
    })
}
