//! Incremental node search

pub mod query;
pub mod scheduler;
pub mod timer;

pub use query::{Matcher, SearchQuery};
pub use scheduler::{SearchScheduler, SearchState};
pub use timer::MatchJobsTimer;
