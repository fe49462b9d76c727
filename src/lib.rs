pub mod checkpoint;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod execution;
pub mod model;
pub mod optimization;
pub mod training;

pub use config::SolverConfig;
pub use data::{Data, Dataset};
pub use error::{Result, SolverErr};
pub use model::{Model, ParamStore};
pub use training::{Solver, SolverState, StopHandle, TrainReport};
