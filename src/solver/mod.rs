//! The daemon solver: its score bookkeeping, its search and its lifecycle.

mod director;
mod manager;
mod search;

pub use director::ScoreDirector;
pub use manager::{SearchFactory, SolverManager, SolverState};
pub use search::{CheapestInsertion, Search, StepOutcome};
