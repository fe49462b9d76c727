use std::{error::Error, fmt, io};

/// The solver's result type.
pub type Result<T> = std::result::Result<T, SolverErr>;

/// Every failure the solver can surface.
#[derive(Debug)]
pub enum SolverErr {
    /// Invalid or unrecognized configuration, raised before any training step.
    Config(String),
    UnknownUpdateRule(String),
    /// A parameter name that the optimizer state doesn't know about.
    UnknownParam(String),
    ShapeMismatch {
        param: String,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    LengthMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    MissingGradient(String),
    EmptyDataset(&'static str),
    /// A failure reported by the model itself.
    Model(String),
    /// A pool job failed, the pool was torn down before this was returned.
    Worker {
        shard: usize,
        source: Box<SolverErr>,
    },
    WorkerPanicked {
        shard: usize,
        detail: String,
    },
    PoolTerminated,
    InvalidState {
        expected: &'static str,
        got: &'static str,
    },
    Interrupted {
        iteration: usize,
    },
    Io(io::Error),
    Serialization(serde_json::Error),
}

impl fmt::Display for SolverErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverErr::Config(msg) => write!(f, "configuration error: {msg}"),
            SolverErr::UnknownUpdateRule(name) => write!(f, "invalid update rule \"{name}\""),
            SolverErr::UnknownParam(name) => write!(f, "unknown parameter \"{name}\""),
            SolverErr::ShapeMismatch {
                param,
                got,
                expected,
            } => write!(
                f,
                "shape mismatch for {param}: got {got:?}, expected {expected:?}"
            ),
            SolverErr::LengthMismatch {
                what,
                got,
                expected,
            } => write!(f, "length mismatch for {what}: got {got}, expected {expected}"),
            SolverErr::MissingGradient(name) => write!(f, "no gradient for parameter \"{name}\""),
            SolverErr::EmptyDataset(what) => write!(f, "the {what} dataset is empty"),
            SolverErr::Model(msg) => write!(f, "model error: {msg}"),
            SolverErr::Worker { shard, source } => {
                write!(f, "worker failed on shard {shard}: {source}")
            }
            SolverErr::WorkerPanicked { shard, detail } => {
                write!(f, "worker panicked on shard {shard}: {detail}")
            }
            SolverErr::PoolTerminated => write!(f, "the worker pool was already terminated"),
            SolverErr::InvalidState { expected, got } => {
                write!(f, "invalid solver state: expected {expected}, got {got}")
            }
            SolverErr::Interrupted { iteration } => {
                write!(f, "training interrupted at iteration {iteration}")
            }
            SolverErr::Io(e) => write!(f, "io error: {e}"),
            SolverErr::Serialization(e) => write!(f, "serialization error: {e}"),
        }
    }
}

impl Error for SolverErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SolverErr::Worker { source, .. } => Some(source.as_ref()),
            SolverErr::Io(e) => Some(e),
            SolverErr::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SolverErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for SolverErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

impl SolverErr {
    /// Whether this error is a configuration error, detected before training.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            SolverErr::Config(_) | SolverErr::UnknownUpdateRule(_)
        )
    }
}
