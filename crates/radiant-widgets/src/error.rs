use radiant_core::CellError;
use radiant_runtime::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DispatchError>;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Programmer error in the widget wiring; retrying will not help.
    #[error("widget configuration error: {message}")]
    Configuration { message: String },

    #[error(transparent)]
    Cell(#[from] CellError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DispatchError {
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
