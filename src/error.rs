use thiserror::Error;

/// Failures the engine degrades around. None of them stop the frame loop.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The render surface or background image is missing for this frame.
    #[error("render resource unavailable: {0}")]
    ResourceUnavailable(&'static str),
    /// The container has a zero-sized side; the rebuild is retried next frame.
    #[error("invalid container dimensions {width}x{height}")]
    InvalidDimensions { width: f32, height: f32 },
    /// A glyph could not be rasterized; the text fallback is kept for good.
    #[error("failed to rasterize glyph {glyph:?}: {reason}")]
    AssetDecodeFailure { glyph: String, reason: String },
    /// Motion or orientation data is not available on this host.
    #[error("sensor unavailable: {0}")]
    SensorUnavailable(String),
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
