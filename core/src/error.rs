use thiserror::Error;

/// Failures raised by the resolution machinery itself rather than by user code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// An eventual value was resolved with itself.
    #[error("an eventual value cannot be resolved with itself")]
    SelfResolution,
    /// Every handle that could settle the value was dropped while it was pending.
    #[error("eventual value was dropped before it settled")]
    Abandoned,
}

// Lets plain `String` act as a rejection cause.
impl From<ResolutionError> for String {
    fn from(error: ResolutionError) -> Self {
        error.to_string()
    }
}
