/// Crate-wide result alias.
pub type XssimResult<T> = Result<T, XssimError>;

/// Errors produced by negotiation, SSIM computation, and the stream collaborators.
///
/// Running out of input on one side only is not an error: the session treats it as a normal
/// end-of-stream and logs a warning.
#[derive(thiserror::Error, Debug)]
pub enum XssimError {
    /// A frame pair disagrees with the negotiated geometry, or the two frames of a pair disagree
    /// with each other. Fatal for the session.
    #[error(
        "dimension mismatch: {context}: expected {}x{}, got {}x{}",
        .expected.0,
        .expected.1,
        .got.0,
        .got.1
    )]
    DimensionMismatch {
        /// Negotiated (or reference) `(width, height)`.
        expected: (u32, u32),
        /// Offending `(width, height)`.
        got: (u32, u32),
        /// Which input or check produced the mismatch.
        context: String,
    },

    /// The visualization buffer could not be allocated. Fatal for the session.
    #[error("allocation failure: could not reserve {bytes} bytes for the visualization buffer")]
    AllocationFailure {
        /// Requested allocation size.
        bytes: usize,
    },

    /// The session is drained or failed and accepts no further pairs.
    #[error("session closed: {0}")]
    SessionClosed(String),

    /// Invalid configuration, geometry, or buffer layout.
    #[error("validation error: {0}")]
    Validation(String),

    /// Failure while reading from or writing to an external collaborator.
    #[error("io error: {0}")]
    Io(String),

    /// Failure while driving an external process (`ffmpeg`) or worker pool.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// Context-wrapped error from a lower layer.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl XssimError {
    /// Build a [`XssimError::DimensionMismatch`] value.
    pub fn dimension_mismatch(
        expected: (u32, u32),
        got: (u32, u32),
        context: impl Into<String>,
    ) -> Self {
        Self::DimensionMismatch {
            expected,
            got,
            context: context.into(),
        }
    }

    /// Build a [`XssimError::SessionClosed`] value.
    pub fn session_closed(msg: impl Into<String>) -> Self {
        Self::SessionClosed(msg.into())
    }

    /// Build a [`XssimError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`XssimError::Io`] value.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Build a [`XssimError::Evaluation`] value.
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
