//! Errors raised by containers, variables and the index translator.

use thiserror::Error;

use crate::types::Datatype;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A variable or attribute does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Malformed index expression.
    #[error("invalid index: {0}")]
    InvalidIndex(String),

    /// Index feature which is not supported, such as strided slices.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Operation not supported in the mode the container was opened with.
    #[error("invalid mode: {0}")]
    InvalidMode(String),

    /// Step accessed out of order, or outside of an active step.
    #[error("step order: {0}")]
    StepOrder(String),

    /// No more steps are available.
    #[error("end of stream")]
    EndOfStream,

    /// Written data does not match the shape of the declared variable.
    #[error("shape of {name} is {expected:?}, got {found:?}")]
    Shape {
        name: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// Requested element type does not match the variable.
    #[error("datatype is {expected}, got {found}")]
    Datatype { expected: Datatype, found: Datatype },

    /// Error reported by the engine.
    #[error(transparent)]
    Engine(#[from] anyhow::Error),
}

impl Error {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Error::EndOfStream)
    }
}
