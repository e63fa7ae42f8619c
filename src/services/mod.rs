//! Service layer separating cross-cutting concerns from pipeline logic

pub mod progress;

pub use progress::{
    CascadeStage, ConsoleProgressReporter, NoOpProgressReporter, ProgressReporter,
    ProgressTracker, ProgressUpdate,
};
