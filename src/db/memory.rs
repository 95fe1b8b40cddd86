//! In-memory table store
//!
//! A [`TableStore`] that keeps tables in process memory. Tables go through the
//! same CREATING -> ACTIVE lifecycle as DynamoDB, driven by describe-table
//! calls instead of wall-clock time, and failures can be injected per
//! operation. Used for offline runs (`--in-memory`) and tests.

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::db::models::{
    Item, ItemKey, RangeQuery, TableDescription, TableSchema, TableStatus,
};
use crate::db::store::{StoreOperation, TableStore};
use crate::error::{ProvisionError, Result};

/// How a freshly created table reaches ACTIVE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Report CREATING for this many describe calls, then ACTIVE
    AfterDescribes(u32),
    /// Stay in CREATING forever
    Never,
}

impl Default for Activation {
    fn default() -> Self {
        Activation::AfterDescribes(1)
    }
}

#[derive(Debug)]
struct MemoryTable {
    schema: TableSchema,
    status: TableStatus,
    /// Describe calls left before a CREATING table turns ACTIVE; None = never
    describes_until_active: Option<u32>,
    items: Vec<Item>,
}

impl MemoryTable {
    fn describe(&self, name: &str) -> TableDescription {
        TableDescription {
            name: name.to_string(),
            status: self.status.clone(),
            key_schema: self.schema.key_attributes().cloned().collect(),
            billing_mode: Some(self.schema.billing_mode.clone()),
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    tables: HashMap<String, MemoryTable>,
    activation: Activation,
    failures: HashMap<StoreOperation, String>,
    calls: HashMap<StoreOperation, u32>,
}

/// Table store held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    /// Empty store; created tables become ACTIVE on the second describe
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how newly created tables reach ACTIVE
    pub fn with_activation(self, activation: Activation) -> Self {
        self.lock().activation = activation;
        self
    }

    /// Seed an ACTIVE table with the given schema
    pub fn with_table(self, name: impl Into<String>, schema: TableSchema) -> Self {
        self.lock().tables.insert(
            name.into(),
            MemoryTable {
                schema,
                status: TableStatus::Active,
                describes_until_active: Some(0),
                items: Vec::new(),
            },
        );
        self
    }

    /// Make the next call of `operation` fail with `message`
    pub fn fail_next(&self, operation: StoreOperation, message: impl Into<String>) {
        self.lock().failures.insert(operation, message.into());
    }

    /// How many times `operation` has been called
    pub fn calls(&self, operation: StoreOperation) -> u32 {
        self.lock().calls.get(&operation).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call and consume any injected failure for it
    fn enter(&self, operation: StoreOperation) -> Result<MutexGuard<'_, StoreState>> {
        let mut state = self.lock();
        *state.calls.entry(operation).or_insert(0) += 1;

        if let Some(message) = state.failures.remove(&operation) {
            return Err(ProvisionError::store_failure(
                operation.as_str(),
                "InjectedFailure",
                message,
            ));
        }

        Ok(state)
    }
}

fn not_found(operation: StoreOperation, table: &str) -> ProvisionError {
    ProvisionError::store_failure(
        operation.as_str(),
        "ResourceNotFoundException",
        format!("Requested resource not found: Table: {} not found", table),
    )
}

fn active_table<'a>(
    state: &'a mut StoreState,
    operation: StoreOperation,
    table: &str,
) -> Result<&'a mut MemoryTable> {
    match state.tables.get_mut(table) {
        Some(entry) if entry.status.is_active() => Ok(entry),
        _ => Err(not_found(operation, table)),
    }
}

fn validation_error(operation: StoreOperation, err: ProvisionError) -> ProvisionError {
    ProvisionError::store_failure(
        operation.as_str(),
        "ValidationException",
        format!("One or more parameter values were invalid: {}", err),
    )
}

/// Order two scalar key values the way DynamoDB does: numerically for N,
/// lexicographically for S and B
fn compare_values(left: &AttributeValue, right: &AttributeValue) -> Option<Ordering> {
    match (left, right) {
        (AttributeValue::N(l), AttributeValue::N(r)) => {
            let l: f64 = l.parse().ok()?;
            let r: f64 = r.parse().ok()?;
            l.partial_cmp(&r)
        }
        (AttributeValue::S(l), AttributeValue::S(r)) => Some(l.cmp(r)),
        (AttributeValue::B(l), AttributeValue::B(r)) => Some(l.as_ref().cmp(r.as_ref())),
        _ => None,
    }
}

fn same_key(schema: &TableSchema, left: &Item, right: &Item) -> bool {
    schema
        .key_attributes()
        .all(|key| left.get(&key.name) == right.get(&key.name))
}

#[async_trait]
impl TableStore for InMemoryStore {
    async fn describe_table(&self, table: &str) -> Result<Option<TableDescription>> {
        let mut state = self.enter(StoreOperation::DescribeTable)?;

        let Some(entry) = state.tables.get_mut(table) else {
            return Ok(None);
        };

        if entry.status == TableStatus::Creating {
            match entry.describes_until_active.as_mut() {
                Some(0) => entry.status = TableStatus::Active,
                Some(remaining) => *remaining -= 1,
                None => {}
            }
        }

        Ok(Some(entry.describe(table)))
    }

    async fn create_table(&self, table: &str, schema: &TableSchema) -> Result<()> {
        let mut state = self.enter(StoreOperation::CreateTable)?;

        if state.tables.contains_key(table) {
            return Err(ProvisionError::store_failure(
                StoreOperation::CreateTable.as_str(),
                "ResourceInUseException",
                format!("Table already exists: {}", table),
            ));
        }

        let describes_until_active = match state.activation {
            Activation::AfterDescribes(count) => Some(count),
            Activation::Never => None,
        };

        state.tables.insert(
            table.to_string(),
            MemoryTable {
                schema: schema.clone(),
                status: TableStatus::Creating,
                describes_until_active,
                items: Vec::new(),
            },
        );

        Ok(())
    }

    async fn put_item(&self, table: &str, item: Item) -> Result<()> {
        let mut state = self.enter(StoreOperation::PutItem)?;
        let entry = active_table(&mut state, StoreOperation::PutItem, table)?;

        item.validate_key(&entry.schema)
            .map_err(|e| validation_error(StoreOperation::PutItem, e))?;

        let schema = entry.schema.clone();
        entry.items.retain(|existing| !same_key(&schema, existing, &item));
        entry.items.push(item);

        Ok(())
    }

    async fn get_item(&self, table: &str, key: &ItemKey) -> Result<Option<Item>> {
        let mut state = self.enter(StoreOperation::GetItem)?;
        let entry = active_table(&mut state, StoreOperation::GetItem, table)?;

        let probe = Item::from(key.to_attributes());
        probe
            .validate_key(&entry.schema)
            .map_err(|e| validation_error(StoreOperation::GetItem, e))?;

        Ok(entry
            .items
            .iter()
            .find(|item| same_key(&entry.schema, item, &probe))
            .cloned())
    }

    async fn query(&self, table: &str, query: &RangeQuery) -> Result<Vec<Item>> {
        let mut state = self.enter(StoreOperation::Query)?;
        let entry = active_table(&mut state, StoreOperation::Query, table)?;

        let sort_key_matches = entry
            .schema
            .sort_key
            .as_ref()
            .is_some_and(|key| key.name == query.sort_key);
        if entry.schema.partition_key.name != query.partition_key || !sort_key_matches {
            return Err(ProvisionError::store_failure(
                StoreOperation::Query.as_str(),
                "ValidationException",
                "Query condition missed key schema element",
            ));
        }

        let mut matches: Vec<Item> = entry
            .items
            .iter()
            .filter(|item| item.get(&query.partition_key) == Some(&query.partition_value))
            .filter(|item| {
                item.get(&query.sort_key)
                    .and_then(|value| compare_values(value, &query.lower_bound))
                    .is_some_and(|ordering| ordering != Ordering::Less)
            })
            .cloned()
            .collect();

        matches.sort_by(|a, b| {
            match (a.get(&query.sort_key), b.get(&query.sort_key)) {
                (Some(a), Some(b)) => compare_values(a, b).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            }
        });

        Ok(matches)
    }
}
