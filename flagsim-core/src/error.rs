//! Error types for FlagSim.
//!
//! Only initialization and scene loading can fail. Once a `Simulation`
//! exists, per-frame numerical edge cases are skipped locally instead.

use crate::diagnostics::Diagnostics;
use crate::eval::EvalError;
use crate::parser::ParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),

    /// The host supplied no vertices.
    #[error("mesh has no vertices")]
    MissingMesh,

    /// The host supplied vertices but no triangle data.
    #[error("mesh has no triangles")]
    MissingTriangles,

    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("scene has {} error(s):\n{0}", .0.error_count())]
    Analysis(Diagnostics),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SimResult<T> = Result<T, SimError>;
