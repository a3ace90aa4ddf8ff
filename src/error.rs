use thiserror::Error;

use crate::frame::FrameError;

/// Failure taxonomy for the plotting pipeline.
///
/// Every error is fatal: a panel that fails aborts the whole render call.
/// Dataframe failures pass through unwrapped as `Upstream`.
#[derive(Debug, Error)]
pub enum PlotError {
    /// The plot description itself is inconsistent: unknown facet
    /// dimensions or faceter names, geom aesthetic sets that do not
    /// cover their required/grouped subsets, clashing default scales.
    #[error("configuration error: {0}")]
    Config(String),

    /// The data does not satisfy a contract: a required aesthetic
    /// resolved to nothing, a grouped aesthetic varies within a group,
    /// a dodge group spans more than one coordinate value.
    #[error("data error: {0}")]
    Data(String),

    /// A panel id or panel-grid size out of bounds.
    #[error("range error: {0}")]
    Range(String),

    /// Propagated unchanged from the dataframe collaborator.
    #[error(transparent)]
    Upstream(#[from] FrameError),

    /// Failure reported by the graphics backend.
    #[error("backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, PlotError>;

impl PlotError {
    pub fn config(msg: impl Into<String>) -> Self {
        PlotError::Config(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        PlotError::Data(msg.into())
    }

    pub fn range(msg: impl Into<String>) -> Self {
        PlotError::Range(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        PlotError::Backend(msg.into())
    }
}
