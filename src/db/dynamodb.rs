//! DynamoDB-backed table store
//!
//! This module implements [`TableStore`] on top of the AWS DynamoDB SDK client.

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeDefinition, KeySchemaElement};
use aws_sdk_dynamodb::Client as DynamoDbSdkClient;

use crate::db::models::{Item, ItemKey, RangeQuery, TableDescription, TableSchema};
use crate::db::store::{StoreOperation, TableStore};
use crate::error::{is_table_not_found, ProvisionError, Result};

/// Table store that forwards every call to DynamoDB.
#[derive(Clone)]
pub struct DynamoDbStore {
    /// AWS DynamoDB SDK client
    client: DynamoDbSdkClient,
}

impl DynamoDbStore {
    /// Create a new store over an SDK client.
    ///
    /// # Arguments
    /// * `client` - AWS DynamoDB SDK client, already pointed at the right endpoint
    pub fn new(client: DynamoDbSdkClient) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying AWS SDK client
    pub fn client(&self) -> &DynamoDbSdkClient {
        &self.client
    }
}

#[async_trait]
impl TableStore for DynamoDbStore {
    async fn describe_table(&self, table: &str) -> Result<Option<TableDescription>> {
        match self.client.describe_table().table_name(table).send().await {
            Ok(output) => {
                let description = output.table().ok_or_else(|| {
                    ProvisionError::store_failure(
                        StoreOperation::DescribeTable.as_str(),
                        "MissingTableDescription",
                        format!("no table description returned for '{}'", table),
                    )
                })?;
                Ok(Some(TableDescription::from(description)))
            }
            Err(err) if is_table_not_found(&err) => {
                tracing::debug!(table = %table, "Table does not exist");
                Ok(None)
            }
            Err(err) => Err(ProvisionError::store(StoreOperation::DescribeTable.as_str(), err)),
        }
    }

    async fn create_table(&self, table: &str, schema: &TableSchema) -> Result<()> {
        let mut request = self
            .client
            .create_table()
            .table_name(table)
            .billing_mode(schema.billing_mode.clone());

        for key in schema.key_attributes() {
            request = request
                .attribute_definitions(
                    AttributeDefinition::builder()
                        .attribute_name(&key.name)
                        .attribute_type(key.attribute_type.clone())
                        .build()
                        .map_err(|e| ProvisionError::InvalidRequest(e.to_string()))?,
                )
                .key_schema(
                    KeySchemaElement::builder()
                        .attribute_name(&key.name)
                        .key_type(key.key_type.clone())
                        .build()
                        .map_err(|e| ProvisionError::InvalidRequest(e.to_string()))?,
                );
        }

        request
            .send()
            .await
            .map_err(|e| ProvisionError::store(StoreOperation::CreateTable.as_str(), e))?;

        tracing::debug!(table = %table, keys = %schema.describe_keys(), "Create table accepted");

        Ok(())
    }

    async fn put_item(&self, table: &str, item: Item) -> Result<()> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(item.into_inner()))
            .send()
            .await
            .map_err(|e| ProvisionError::store(StoreOperation::PutItem.as_str(), e))?;

        Ok(())
    }

    async fn get_item(&self, table: &str, key: &ItemKey) -> Result<Option<Item>> {
        let result = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(key.to_attributes()))
            .send()
            .await
            .map_err(|e| ProvisionError::store(StoreOperation::GetItem.as_str(), e))?;

        Ok(result.item.map(Item::from))
    }

    async fn query(&self, table: &str, query: &RangeQuery) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut exclusive_start_key = None;

        // Follow LastEvaluatedKey until the result set is exhausted
        loop {
            let result = self
                .client
                .query()
                .table_name(table)
                .key_condition_expression(RangeQuery::KEY_CONDITION)
                .set_expression_attribute_names(Some(query.attribute_names()))
                .set_expression_attribute_values(Some(query.attribute_values()))
                .set_exclusive_start_key(exclusive_start_key.take())
                .send()
                .await
                .map_err(|e| ProvisionError::store(StoreOperation::Query.as_str(), e))?;

            items.extend(result.items.unwrap_or_default().into_iter().map(Item::from));

            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => {
                    tracing::debug!(table = %table, fetched = items.len(), "Fetching next query page");
                    exclusive_start_key = Some(key);
                }
                _ => break,
            }
        }

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{create_dynamodb_client, Settings};

    #[tokio::test]
    async fn test_store_creation() {
        let settings = Settings::default();
        let store = DynamoDbStore::new(create_dynamodb_client(&settings).await);

        assert_eq!(
            store.client().config().region().map(|r| r.as_ref()),
            Some("us-east-1")
        );
    }
}
