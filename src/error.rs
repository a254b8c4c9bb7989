//! Error types for the rendering pipeline.

use thiserror::Error;

/// Opaque failure reported by an external layout engine.
pub type EngineError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while rendering a netlist.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The skin document is not well-formed
    #[error("skin parse error: {0}")]
    SkinParse(String),

    /// The netlist carries no modules at all
    #[error("netlist contains no modules")]
    EmptyNetlist,

    /// The skin has no `generic` template to fall back to for unknown cell types
    #[error("skin defines no generic fallback template")]
    NoGenericTemplate,

    /// The layout engine produced a zero-length routing step
    #[error("start and end are the same")]
    ZeroLengthStep,

    /// The layout engine produced a diagonal routing step
    #[error("start and end aren't orthogonal")]
    DiagonalStep,

    /// Failure propagated verbatim from the layout engine
    #[error("layout engine error: {0}")]
    Engine(EngineError),
}

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;
