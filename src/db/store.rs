//! Table store abstraction
//!
//! The five table operations the provisioner needs. [`DynamoDbStore`] talks to
//! DynamoDB; [`InMemoryStore`] is a substitutable stand-in.
//!
//! [`DynamoDbStore`]: crate::db::DynamoDbStore
//! [`InMemoryStore`]: crate::db::InMemoryStore

use async_trait::async_trait;

use crate::db::models::{Item, ItemKey, RangeQuery, TableDescription, TableSchema};
use crate::error::Result;

/// Names of the store operations, used in error reports and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    DescribeTable,
    CreateTable,
    PutItem,
    GetItem,
    Query,
}

impl StoreOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOperation::DescribeTable => "DescribeTable",
            StoreOperation::CreateTable => "CreateTable",
            StoreOperation::PutItem => "PutItem",
            StoreOperation::GetItem => "GetItem",
            StoreOperation::Query => "Query",
        }
    }
}

/// Request/response access to a key-value table store.
///
/// Every call is a single round trip; none of them retry.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Describe a table. A missing table is `Ok(None)`, not an error.
    async fn describe_table(&self, table: &str) -> Result<Option<TableDescription>>;

    /// Request creation of a table. Returns once the request is accepted;
    /// the table is usually not ACTIVE yet.
    async fn create_table(&self, table: &str, schema: &TableSchema) -> Result<()>;

    /// Unconditional put, replacing any item with the same key
    async fn put_item(&self, table: &str, item: Item) -> Result<()>;

    async fn get_item(&self, table: &str, key: &ItemKey) -> Result<Option<Item>>;

    /// All items matching the query, ascending by sort key
    async fn query(&self, table: &str, query: &RangeQuery) -> Result<Vec<Item>>;
}
