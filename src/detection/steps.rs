use crate::config::KernelSize;
use crate::detection::preprocessing;
use crate::error::Result;
use crate::pipeline::{PipelineData, PipelineStep};
use image::GrayImage;

/// Name under which [`LightMaskStep`] stores its mask.
pub const LIGHT_MASK: &str = "light";

/// Morphological blackhat with a plate-shaped rectangle
pub struct BlackhatStep {
    pub kernel: KernelSize,
}

impl PipelineStep for BlackhatStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData> {
        let blackhat = preprocessing::blackhat(&data.source, self.kernel);
        Ok(data.with_image(blackhat))
    }

    fn name(&self) -> &str {
        "Blackhat"
    }
}

/// Closing + Otsu on the source image, stored as a named mask.
/// The working image passes through untouched.
pub struct LightMaskStep {
    pub kernel: KernelSize,
    pub mask: String,
}

impl PipelineStep for LightMaskStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData> {
        let closed = preprocessing::close_rect(&data.source, self.kernel);
        let light = preprocessing::otsu_binarize(&closed);
        let name = self.mask.clone();
        Ok(data.with_mask(name, light))
    }

    fn name(&self) -> &str {
        "Light Regions"
    }

    fn preview<'a>(&self, data: &'a PipelineData) -> &'a GrayImage {
        data.masks.get(&self.mask).unwrap_or(&data.image)
    }
}

/// Rescaled absolute horizontal Scharr gradient
pub struct ScharrStep;

impl PipelineStep for ScharrStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData> {
        let gradient = preprocessing::horizontal_gradient(&data.image);
        Ok(data.with_image(gradient))
    }

    fn name(&self) -> &str {
        "Scharr"
    }
}

/// Blur, close with the plate kernel, then Otsu
pub struct GradientThresholdStep {
    pub blur_sigma: f32,
    pub kernel: KernelSize,
}

impl PipelineStep for GradientThresholdStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData> {
        let blurred = preprocessing::apply_blur(&data.image, self.blur_sigma);
        let closed = preprocessing::close_rect(&blurred, self.kernel);
        let thresh = preprocessing::otsu_binarize(&closed);
        Ok(data.with_image(thresh))
    }

    fn name(&self) -> &str {
        "Grad Thresh"
    }
}

/// Erosions then dilations with a 3x3 square, removing speckle
pub struct ErodeDilateStep {
    pub erosions: u8,
    pub dilations: u8,
}

impl PipelineStep for ErodeDilateStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData> {
        let eroded = preprocessing::erode_square(&data.image, self.erosions);
        let dilated = preprocessing::dilate_square(&eroded, self.dilations);
        Ok(data.with_image(dilated))
    }

    fn name(&self) -> &str {
        "Grad Erode/Dilate"
    }
}

/// Intersect with a named mask, then dilate and erode to close gaps
pub struct FuseMaskStep {
    pub mask: String,
    pub dilations: u8,
    pub erosions: u8,
}

impl PipelineStep for FuseMaskStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData> {
        let fused = preprocessing::bitwise_and(&data.image, data.mask(&self.mask)?);
        let dilated = preprocessing::dilate_square(&fused, self.dilations);
        let closed = preprocessing::erode_square(&dilated, self.erosions);
        Ok(data.with_image(closed))
    }

    fn name(&self) -> &str {
        "Final"
    }
}

/// Edge-preserving smoothing
pub struct BilateralStep {
    pub diameter: u32,
    pub sigma_color: f32,
    pub sigma_space: f32,
}

impl PipelineStep for BilateralStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData> {
        let smoothed = preprocessing::bilateral_filter(
            &data.image,
            self.diameter,
            self.sigma_color,
            self.sigma_space,
        );
        Ok(data.with_image(smoothed))
    }

    fn name(&self) -> &str {
        "Bilateral Filter"
    }
}

/// Detect edges using Canny
pub struct EdgeDetectionStep {
    pub low_threshold: f32,
    pub high_threshold: f32,
}

impl PipelineStep for EdgeDetectionStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData> {
        let edges =
            preprocessing::detect_edges(&data.image, self.low_threshold, self.high_threshold);
        Ok(data.with_image(edges))
    }

    fn name(&self) -> &str {
        "Edge Detection"
    }
}

/// Bridge one-pixel breaks in an edge map
pub struct EdgeClosingStep {
    pub dilations: u8,
}

impl PipelineStep for EdgeClosingStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData> {
        let closed = preprocessing::dilate_square(&data.image, self.dilations);
        Ok(data.with_image(closed))
    }

    fn name(&self) -> &str {
        "Edge Closing"
    }
}
