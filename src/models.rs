use image::{DynamicImage, GrayImage, RgbImage};
use imageproc::geometry::{arc_length, contour_area};
use imageproc::point::Point;
use serde::{Deserialize, Serialize};

use crate::error::{PlateError, Result};

/// Axis-aligned box in source image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Tight box around a point set, inclusive of the extreme pixels.
    /// Negative coordinates are clamped to zero.
    pub fn from_points(points: &[Point<i32>]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        let min_x = min_x.max(0);
        let min_y = min_y.max(0);
        if max_x < min_x || max_y < min_y {
            return None;
        }
        Some(Self {
            x: min_x as u32,
            y: min_y as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        })
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height; `None` when the height is zero.
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.height == 0 {
            return None;
        }
        Some(self.width as f64 / self.height as f64)
    }

    /// Intersect with a `width` x `height` image. `None` when nothing is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Self> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let clamped = Self {
            x: self.x,
            y: self.y,
            width: self.width.min(width - self.x),
            height: self.height.min(height - self.y),
        };
        (!clamped.is_degenerate()).then_some(clamped)
    }

    pub fn corners(&self) -> [Point<i32>; 4] {
        let (x0, y0) = (self.x as i32, self.y as i32);
        let (x1, y1) = (x0 + self.width as i32 - 1, y0 + self.height as i32 - 1);
        [
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }
}

/// Closed boundary of a foreground blob.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<Point<i32>>,
}

impl Contour {
    pub fn new(points: Vec<Point<i32>>) -> Self {
        Self { points }
    }

    /// Enclosed area (shoelace formula), always non-negative.
    pub fn area(&self) -> f64 {
        contour_area(&self.points)
    }

    /// Length of the closed boundary.
    pub fn perimeter(&self) -> f64 {
        arc_length(&self.points, true)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(&self.points).unwrap_or_default()
    }
}

impl From<imageproc::contours::Contour<i32>> for Contour {
    fn from(contour: imageproc::contours::Contour<i32>) -> Self {
        Self::new(contour.points)
    }
}

/// A region proposed by a locator.
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    /// Axis-aligned box, optionally with the contour it was derived from.
    Box {
        bbox: BoundingBox,
        contour: Option<Contour>,
    },
    /// Simplified polygon and the contour it approximates.
    Polygon {
        vertices: Vec<Point<i32>>,
        contour: Contour,
    },
}

impl Candidate {
    pub fn from_box(bbox: BoundingBox) -> Self {
        Candidate::Box { bbox, contour: None }
    }

    pub fn from_contour(contour: Contour) -> Self {
        Candidate::Box {
            bbox: contour.bounding_box(),
            contour: Some(contour),
        }
    }

    pub fn polygon(vertices: Vec<Point<i32>>, contour: Contour) -> Self {
        Candidate::Polygon { vertices, contour }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            Candidate::Box { bbox, .. } => *bbox,
            Candidate::Polygon { vertices, .. } => {
                BoundingBox::from_points(vertices).unwrap_or_default()
            }
        }
    }

    /// Contour area when a contour is known, box area otherwise.
    pub fn area(&self) -> f64 {
        match self.contour() {
            Some(contour) => contour.area(),
            None => self.bounding_box().area() as f64,
        }
    }

    pub fn aspect_ratio(&self) -> Option<f64> {
        self.bounding_box().aspect_ratio()
    }

    pub fn is_quadrilateral(&self) -> bool {
        matches!(self, Candidate::Polygon { vertices, .. } if vertices.len() == 4)
    }

    pub fn contour(&self) -> Option<&Contour> {
        match self {
            Candidate::Box { contour, .. } => contour.as_ref(),
            Candidate::Polygon { contour, .. } => Some(contour),
        }
    }

    /// Outline points: polygon vertices or the four box corners.
    pub fn outline(&self) -> Vec<Point<i32>> {
        match self {
            Candidate::Box { bbox, .. } => bbox.corners().to_vec(),
            Candidate::Polygon { vertices, .. } => vertices.clone(),
        }
    }
}

/// A decoded photograph together with its grayscale view.
#[derive(Debug, Clone)]
pub struct PlateImage {
    pub color: RgbImage,
    pub gray: GrayImage,
}

impl PlateImage {
    pub fn new(color: RgbImage, gray: GrayImage) -> Result<Self> {
        if color.dimensions() != gray.dimensions() {
            return Err(PlateError::DimensionMismatch {
                color: color.dimensions(),
                gray: gray.dimensions(),
            });
        }
        ensure_not_empty(&gray)?;
        Ok(Self { color, gray })
    }

    pub fn from_dynamic(image: &DynamicImage) -> Result<Self> {
        Self::new(image.to_rgb8(), image.to_luma8())
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.gray.dimensions()
    }
}

pub(crate) fn ensure_not_empty(image: &GrayImage) -> Result<()> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(PlateError::EmptyImage { width, height });
    }
    Ok(())
}

/// An accepted plate region.
#[derive(Debug, Clone)]
pub struct LicensePlate {
    /// The source pixels inside the accepted region.
    pub crop: DynamicImage,
    /// Binarized crop: dark glyphs become white foreground.
    pub roi: GrayImage,
    /// The candidate that was accepted.
    pub candidate: Candidate,
}

impl LicensePlate {
    pub fn bounding_box(&self) -> BoundingBox {
        self.candidate.bounding_box()
    }
}
