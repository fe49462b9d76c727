mod solver;
mod state;
mod stop;

pub use solver::{LrSchedule, Solver, TrainReport};
pub use state::{NO_ACCURACY, SolverState, TrainingState};
pub use stop::StopHandle;
