use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;
use platescan::PlateImage;
use platescan::detection::cascade::{
    CascadeStage, HaarCascade, HaarFeature, HaarRect, WeakClassifier,
};
use std::path::{Path, PathBuf};

pub const BACKGROUND: u8 = 40;
pub const PLATE: u8 = 220;

/// The plate rectangle drawn by [`plate_scene`].
pub const PLATE_RECT: (i32, i32, u32, u32) = (60, 70, 180, 45);

/// 300x200 dark scene with a bright plate-shaped rectangle carrying dark
/// character bars.
pub fn plate_scene() -> PlateImage {
    let mut color = RgbImage::from_pixel(300, 200, Rgb([BACKGROUND; 3]));
    let (x, y, w, h) = PLATE_RECT;
    draw_filled_rect_mut(&mut color, Rect::at(x, y).of_size(w, h), Rgb([PLATE; 3]));
    for i in 0..7 {
        let bar = Rect::at(x + 15 + i * 23, y + 10).of_size(8, 25);
        draw_filled_rect_mut(&mut color, bar, Rgb([20, 20, 20]));
    }
    PlateImage::from_dynamic(&DynamicImage::ImageRgb8(color)).expect("valid scene")
}

/// Text block of [`dense_plate_scene`]: 21 strokes, 2px wide at a 6px pitch.
pub const PLATE_TEXT_RECT: (i32, i32, u32, u32) = (89, 82, 122, 26);

/// 300x200 dark scene with a 150x40 bright plate whose characters are
/// tightly packed thin strokes, the way printed plate text reads once
/// downscaled.
pub fn dense_plate_scene() -> PlateImage {
    let mut color = RgbImage::from_pixel(300, 200, Rgb([BACKGROUND; 3]));
    draw_filled_rect_mut(&mut color, Rect::at(75, 75).of_size(150, 40), Rgb([PLATE; 3]));
    let (x, y, _, h) = PLATE_TEXT_RECT;
    for i in 0..21 {
        let stroke = Rect::at(x + i * 6, y).of_size(2, h);
        draw_filled_rect_mut(&mut color, stroke, Rgb([20, 20, 20]));
    }
    PlateImage::from_dynamic(&DynamicImage::ImageRgb8(color)).expect("valid scene")
}

/// Same scene size with a bright disc instead of a plate.
pub fn disc_scene() -> PlateImage {
    let mut color = RgbImage::from_pixel(300, 200, Rgb([BACKGROUND; 3]));
    draw_filled_circle_mut(&mut color, (150, 100), 60, Rgb([PLATE; 3]));
    PlateImage::from_dynamic(&DynamicImage::ImageRgb8(color)).expect("valid scene")
}

pub fn uniform_scene() -> PlateImage {
    let color = RgbImage::from_pixel(300, 200, Rgb([128; 3]));
    PlateImage::from_dynamic(&DynamicImage::ImageRgb8(color)).expect("valid scene")
}

/// Grayscale gradient, so every crop binarizes to something non-trivial.
pub fn ramp(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, _| Luma([(x * 255 / width.max(1)) as u8]))
}

/// Single-stage cascade firing on a bright-over-dark horizontal edge.
pub fn edge_cascade() -> HaarCascade {
    let rect = |y, weight| HaarRect {
        x: 0,
        y,
        width: 20,
        height: 5,
        weight,
    };
    HaarCascade {
        window_width: 20,
        window_height: 10,
        stages: vec![CascadeStage {
            threshold: 0.5,
            weak_classifiers: vec![WeakClassifier {
                feature: HaarFeature {
                    rects: vec![rect(0, 1.0), rect(5, -1.0)],
                },
                threshold: 0.5,
                left_value: 0.0,
                right_value: 1.0,
            }],
        }],
    }
}

/// Save `image` as PNG under `dir` and return its path.
pub fn write_png(dir: &Path, name: &str, image: &PlateImage) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create image directory");
    }
    image.color.save(&path).expect("Failed to save test image");
    path
}
