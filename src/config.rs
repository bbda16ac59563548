use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Rectangular structuring element, `width` x `height` pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelSize {
    pub width: u32,
    pub height: u32,
}

impl KernelSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn square(side: u32) -> Self {
        Self::new(side, side)
    }
}

/// Parameters of the blackhat/gradient candidate search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphologicalConfig {
    /// Plate-shaped kernel for the blackhat and gradient closing.
    pub rect_kernel: KernelSize,
    /// Kernel for the light-region closing.
    pub square_kernel: KernelSize,
    /// Gaussian sigma; 1.1 matches a 5x5 kernel.
    pub blur_sigma: f32,
    pub cleanup_erosions: u8,
    pub cleanup_dilations: u8,
    pub fusion_dilations: u8,
    pub fusion_erosions: u8,
    /// Number of largest contours returned.
    pub keep: usize,
}

impl Default for MorphologicalConfig {
    fn default() -> Self {
        Self {
            rect_kernel: KernelSize::new(13, 5),
            square_kernel: KernelSize::square(3),
            blur_sigma: 1.1,
            cleanup_erosions: 2,
            cleanup_dilations: 2,
            fusion_dilations: 2,
            fusion_erosions: 1,
            keep: 10,
        }
    }
}

/// Aspect-ratio band used when picking a box candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
    /// Drop binarized blobs that touch the crop border.
    pub clear_border: bool,
}

impl Default for SelectorConfig {
    /// Russian plates are 520x112 mm.
    fn default() -> Self {
        Self {
            min_aspect_ratio: 4.0,
            max_aspect_ratio: 5.0,
            clear_border: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolygonConfig {
    pub bilateral_diameter: u32,
    pub sigma_color: f32,
    pub sigma_space: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// 3x3 dilations applied to the edge map before tracing; 0 disables.
    pub edge_closing: u8,
    pub keep: usize,
    /// Douglas-Peucker tolerance as a fraction of the contour perimeter.
    pub epsilon_fraction: f64,
}

impl Default for PolygonConfig {
    fn default() -> Self {
        Self {
            bilateral_diameter: 11,
            sigma_color: 17.0,
            sigma_space: 17.0,
            canny_low: 30.0,
            canny_high: 200.0,
            edge_closing: 1,
            keep: 10,
            epsilon_fraction: 0.018,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    pub scale_factor: f32,
    pub min_neighbors: u32,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 5,
        }
    }
}

/// Top-level configuration, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlateScanConfig {
    /// Images are resized to this width (aspect preserved) before search.
    pub resize_width: Option<u32>,
    pub morphological: MorphologicalConfig,
    pub selector: SelectorConfig,
    pub polygon: PolygonConfig,
    pub cascade: CascadeConfig,
}

impl Default for PlateScanConfig {
    fn default() -> Self {
        Self {
            resize_width: Some(700),
            morphological: MorphologicalConfig::default(),
            selector: SelectorConfig::default(),
            polygon: PolygonConfig::default(),
            cascade: CascadeConfig::default(),
        }
    }
}

impl PlateScanConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn with_resize_width(mut self, width: Option<u32>) -> Self {
        self.resize_width = width;
        self
    }

    /// Candidate count kept by both contour-based locators.
    pub fn with_keep(mut self, keep: usize) -> Self {
        self.morphological.keep = keep;
        self.polygon.keep = keep;
        self
    }

    pub fn with_clear_border(mut self, clear_border: bool) -> Self {
        self.selector.clear_border = clear_border;
        self
    }
}
