pub mod connections;
pub mod error;
pub mod models;
pub mod providers;
pub mod schema;
pub mod types;

pub use connections::*;
pub use error::*;
pub use models::*;
pub use providers::*;
pub use types::*;
