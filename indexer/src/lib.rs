pub mod config;
pub mod error;
pub mod extract;
pub mod indexer;
pub mod load;
pub mod normalize;
pub mod planner;
pub mod rpc;

pub use crate::error::{PipelineError, RunError, SetupError, TransportError};
pub use crate::indexer::Indexer;
pub use crate::load::LoadSummary;
pub use crate::planner::{BlockRange, WindowPolicy};
