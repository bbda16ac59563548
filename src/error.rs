use thiserror::Error;

/// Errors surfaced by the localization core.
///
/// "No plate found" is not an error: locators return `None` or an empty
/// candidate list for that.
#[derive(Debug, Error)]
pub enum PlateError {
    #[error("input image is empty ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("color image is {color:?} but grayscale view is {gray:?}")]
    DimensionMismatch { color: (u32, u32), gray: (u32, u32) },

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("pipeline mask `{0}` was never produced by an earlier step")]
    MissingMask(String),

    #[error("invalid cascade model: {0}")]
    InvalidModel(String),

    #[error("annotation for `{0}` has no points")]
    EmptyAnnotation(String),

    #[error("malformed label line `{0}`")]
    InvalidLabel(String),
}

pub type Result<T, E = PlateError> = std::result::Result<T, E>;
