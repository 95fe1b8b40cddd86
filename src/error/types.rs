//! Provisioning error types

use std::time::Duration;

use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_smithy_runtime_api::client::result::SdkError;
use thiserror::Error;

/// Errors that can occur while provisioning or exercising a table
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Any store failure that is not classified further
    #[error("DynamoDB {operation} failed: {message}")]
    Store {
        operation: &'static str,
        code: Option<String>,
        message: String,
    },

    /// The table did not reach ACTIVE before the waiter deadline
    #[error(
        "timed out while waiting for table '{table}' to become active \
         (waited {timeout:?}, last status: {last_status})"
    )]
    ProvisioningTimeout {
        table: String,
        timeout: Duration,
        last_status: String,
    },

    #[error("Table '{table}' not found")]
    TableNotFound { table: String },

    #[error("Table '{table}' has key schema [{actual}], expected [{expected}]")]
    SchemaMismatch {
        table: String,
        expected: String,
        actual: String,
    },

    #[error("No item in '{table}' with id={id} and date={date}")]
    ItemNotFound { table: String, id: String, date: i64 },

    #[error("Query on '{table}' for id={id} and date >= {lower_bound} returned no items")]
    EmptyQueryResult {
        table: String,
        id: String,
        lower_bound: i64,
    },

    #[error("Attribute '{name}' is missing")]
    MissingAttribute { name: String },

    #[error("Attribute '{name}' is not of type {expected}")]
    AttributeType { name: String, expected: &'static str },

    #[error("Attribute '{name}' holds '{value}', which is not a valid number")]
    InvalidNumber { name: String, value: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProvisionError {
    /// Wrap an SDK failure for the given operation, keeping the service error code
    pub fn store<E, R>(operation: &'static str, err: SdkError<E, R>) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        ProvisionError::Store {
            operation,
            code: err.code().map(str::to_string),
            message: DisplayErrorContext(&err).to_string(),
        }
    }

    /// Build a store failure from its parts (used by non-SDK stores)
    pub fn store_failure(
        operation: &'static str,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ProvisionError::Store {
            operation,
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Service error code of a store failure, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            ProvisionError::Store { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Check if this is a waiter timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProvisionError::ProvisioningTimeout { .. })
    }
}

/// Whether a DescribeTable failure means the table does not exist
pub fn is_table_not_found<R>(err: &SdkError<DescribeTableError, R>) -> bool {
    match err {
        SdkError::ServiceError(service_err) => {
            service_err.err().is_resource_not_found_exception()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::types::error::ResourceNotFoundException;
    use aws_smithy_runtime_api::http::{Response, StatusCode};
    use aws_smithy_types::body::SdkBody;

    fn raw_response(status: u16) -> Response {
        Response::new(StatusCode::try_from(status).unwrap(), SdkBody::empty())
    }

    #[test]
    fn test_resource_not_found_is_table_not_found() {
        let err = SdkError::service_error(
            DescribeTableError::ResourceNotFoundException(
                ResourceNotFoundException::builder()
                    .message("Cannot do operations on a non-existent table")
                    .build(),
            ),
            raw_response(400),
        );

        assert!(is_table_not_found(&err));
    }

    #[test]
    fn test_other_failures_are_not_table_not_found() {
        let err: SdkError<DescribeTableError, Response> =
            SdkError::construction_failure("endpoint unreachable");

        assert!(!is_table_not_found(&err));

        let wrapped = ProvisionError::store("DescribeTable", err);
        assert!(wrapped.to_string().starts_with("DynamoDB DescribeTable failed"));
        assert_eq!(wrapped.code(), None);
    }

    #[test]
    fn test_store_failure_keeps_code() {
        let err = ProvisionError::store_failure("CreateTable", "ResourceInUseException", "exists");
        assert_eq!(err.code(), Some("ResourceInUseException"));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_timeout_display() {
        let err = ProvisionError::ProvisioningTimeout {
            table: "contacts".to_string(),
            timeout: Duration::from_secs(120),
            last_status: "CREATING".to_string(),
        };

        assert!(err.is_timeout());
        let message = err.to_string();
        assert!(message.contains("contacts"));
        assert!(message.contains("CREATING"));
    }
}
