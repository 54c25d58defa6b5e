pub mod config;
pub mod error;
pub mod fetch;
pub mod load;
pub mod pipeline;
pub mod process;
pub mod schema;

pub use error::{PipelineError, PipelineResult};
pub use pipeline::{Pipeline, RunSummary};
