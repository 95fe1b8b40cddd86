//! DynamoDB table provisioner library

// Public modules
pub mod config;
pub mod db;
pub mod demo;
pub mod error;
pub mod logging;
pub mod provisioner;

// Re-export commonly used types
pub use config::Settings;
pub use error::ProvisionError;
pub use provisioner::{TableProvisioner, TableState, WaiterConfig};
