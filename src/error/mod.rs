//! Error types

mod types;

pub use types::{is_table_not_found, ProvisionError};

/// Result type alias for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisionError>;
