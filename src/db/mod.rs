//! Database module
//!
//! Contains the table store abstraction, its DynamoDB and in-memory
//! implementations, and the item/schema models.

pub mod dynamodb;
pub mod memory;
pub mod models;
pub mod store;

pub use dynamodb::DynamoDbStore;
pub use memory::{Activation, InMemoryStore};
pub use models::{
    Contact, Item, ItemKey, KeyAttribute, RangeQuery, TableDescription, TableSchema,
    TableStatus, PARTITION_KEY, SORT_KEY,
};
pub use store::{StoreOperation, TableStore};
