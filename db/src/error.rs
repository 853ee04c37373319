use diesel::result::Error as DieselError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DestinationError {
    #[error("Configuration Error: {0}")]
    ConfigError(String),

    #[error("Connection Pool Error: {0}")]
    PoolError(String),

    #[error("Migration Error: {0}")]
    MigrationError(String),

    #[error("Query Error: {0}")]
    QueryError(#[from] DieselError),

    #[error("Value Out Of Range: {field} = {value} does not fit BIGINT")]
    OutOfRange { field: &'static str, value: u64 },

    #[error("Unknown Table: {0}")]
    UnknownTable(String),
}
