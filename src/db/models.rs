//! DynamoDB data models
//!
//! This module defines the table schema, table description and item types
//! exchanged with a [`TableStore`](crate::db::TableStore).

use aws_sdk_dynamodb::types::{
    AttributeValue, BillingMode, KeyType, ScalarAttributeType,
    TableDescription as SdkTableDescription, TableStatus as SdkTableStatus,
};
use std::collections::HashMap;
use std::fmt;

use crate::error::{ProvisionError, Result};

/// Partition key attribute of the contacts table
pub const PARTITION_KEY: &str = "id";

/// Sort key attribute of the contacts table
pub const SORT_KEY: &str = "date";

/// One key attribute: its name, scalar type and role in the key schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttribute {
    pub name: String,
    pub attribute_type: ScalarAttributeType,
    pub key_type: KeyType,
}

impl KeyAttribute {
    pub fn hash(name: impl Into<String>, attribute_type: ScalarAttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            key_type: KeyType::Hash,
        }
    }

    pub fn range(name: impl Into<String>, attribute_type: ScalarAttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            key_type: KeyType::Range,
        }
    }
}

impl fmt::Display for KeyAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/{}",
            self.name,
            self.attribute_type.as_str(),
            self.key_type.as_str()
        )
    }
}

/// Key schema and billing mode a table is created with.
///
/// The key schema is immutable once the table exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub partition_key: KeyAttribute,
    pub sort_key: Option<KeyAttribute>,
    pub billing_mode: BillingMode,
}

impl TableSchema {
    /// `id` (string, HASH) + `date` (number, RANGE), on-demand billing
    pub fn contacts() -> Self {
        Self {
            partition_key: KeyAttribute::hash(PARTITION_KEY, ScalarAttributeType::S),
            sort_key: Some(KeyAttribute::range(SORT_KEY, ScalarAttributeType::N)),
            billing_mode: BillingMode::PayPerRequest,
        }
    }

    /// Key attributes in declaration order (partition first)
    pub fn key_attributes(&self) -> impl Iterator<Item = &KeyAttribute> {
        std::iter::once(&self.partition_key).chain(self.sort_key.as_ref())
    }

    /// Whether a described key schema is exactly this one, ignoring order
    pub fn matches(&self, key_schema: &[KeyAttribute]) -> bool {
        let expected: Vec<&KeyAttribute> = self.key_attributes().collect();
        key_schema.len() == expected.len() && expected.iter().all(|key| key_schema.contains(key))
    }

    pub fn describe_keys(&self) -> String {
        join_keys(self.key_attributes())
    }
}

pub(crate) fn join_keys<'a>(keys: impl Iterator<Item = &'a KeyAttribute>) -> String {
    keys.map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Table lifecycle status as reported by describe-table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableStatus {
    Creating,
    Active,
    Updating,
    Deleting,
    Other(String),
}

impl TableStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, TableStatus::Active)
    }

    pub fn as_str(&self) -> &str {
        match self {
            TableStatus::Creating => "CREATING",
            TableStatus::Active => "ACTIVE",
            TableStatus::Updating => "UPDATING",
            TableStatus::Deleting => "DELETING",
            TableStatus::Other(status) => status,
        }
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&SdkTableStatus> for TableStatus {
    fn from(status: &SdkTableStatus) -> Self {
        match status {
            SdkTableStatus::Creating => TableStatus::Creating,
            SdkTableStatus::Active => TableStatus::Active,
            SdkTableStatus::Updating => TableStatus::Updating,
            SdkTableStatus::Deleting => TableStatus::Deleting,
            other => TableStatus::Other(other.as_str().to_string()),
        }
    }
}

/// What describe-table tells us about an existing table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescription {
    pub name: String,
    pub status: TableStatus,
    pub key_schema: Vec<KeyAttribute>,
    pub billing_mode: Option<BillingMode>,
}

impl From<&SdkTableDescription> for TableDescription {
    fn from(table: &SdkTableDescription) -> Self {
        // Key types live in the attribute definitions, not in the key schema
        let key_schema = table
            .key_schema()
            .iter()
            .map(|element| {
                let attribute_type = table
                    .attribute_definitions()
                    .iter()
                    .find(|definition| definition.attribute_name() == element.attribute_name())
                    .map(|definition| definition.attribute_type().clone())
                    .unwrap_or_else(|| ScalarAttributeType::from("UNKNOWN"));

                KeyAttribute {
                    name: element.attribute_name().to_string(),
                    attribute_type,
                    key_type: element.key_type().clone(),
                }
            })
            .collect();

        Self {
            name: table.table_name().unwrap_or_default().to_string(),
            status: table
                .table_status()
                .map(TableStatus::from)
                .unwrap_or_else(|| TableStatus::Other("UNKNOWN".to_string())),
            key_schema,
            billing_mode: table
                .billing_mode_summary()
                .and_then(|summary| summary.billing_mode())
                .cloned(),
        }
    }
}

/// A stored item: attribute name to typed value.
///
/// The store is schemaless beyond the key attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item(HashMap<String, AttributeValue>);

impl Item {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a string attribute
    pub fn with_string(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), AttributeValue::S(value.into()));
        self
    }

    /// Set a number attribute
    pub fn with_number(mut self, name: impl Into<String>, value: i64) -> Self {
        self.0.insert(name.into(), AttributeValue::N(value.to_string()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.0.get(name)
    }

    /// Read a string attribute, failing if it is absent or not a string
    pub fn get_string(&self, name: &str) -> Result<&str> {
        match self.0.get(name) {
            Some(AttributeValue::S(value)) => Ok(value),
            Some(_) => Err(ProvisionError::AttributeType {
                name: name.to_string(),
                expected: "S",
            }),
            None => Err(ProvisionError::MissingAttribute {
                name: name.to_string(),
            }),
        }
    }

    /// Read an integral number attribute
    pub fn get_number(&self, name: &str) -> Result<i64> {
        match self.0.get(name) {
            Some(AttributeValue::N(value)) => {
                value.parse().map_err(|_| ProvisionError::InvalidNumber {
                    name: name.to_string(),
                    value: value.clone(),
                })
            }
            Some(_) => Err(ProvisionError::AttributeType {
                name: name.to_string(),
                expected: "N",
            }),
            None => Err(ProvisionError::MissingAttribute {
                name: name.to_string(),
            }),
        }
    }

    /// Check that every key attribute of `schema` is present with its declared type
    pub fn validate_key(&self, schema: &TableSchema) -> Result<()> {
        for key in schema.key_attributes() {
            let value = self.0.get(&key.name).ok_or_else(|| ProvisionError::MissingAttribute {
                name: key.name.clone(),
            })?;

            match (&key.attribute_type, value) {
                (ScalarAttributeType::S, AttributeValue::S(_)) => {}
                (ScalarAttributeType::B, AttributeValue::B(_)) => {}
                (ScalarAttributeType::N, AttributeValue::N(number)) => {
                    if number.parse::<f64>().is_err() {
                        return Err(ProvisionError::InvalidNumber {
                            name: key.name.clone(),
                            value: number.clone(),
                        });
                    }
                }
                (expected, _) => {
                    return Err(ProvisionError::AttributeType {
                        name: key.name.clone(),
                        expected: scalar_type_name(expected),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn into_inner(self) -> HashMap<String, AttributeValue> {
        self.0
    }
}

impl From<HashMap<String, AttributeValue>> for Item {
    fn from(attributes: HashMap<String, AttributeValue>) -> Self {
        Self(attributes)
    }
}

fn scalar_type_name(attribute_type: &ScalarAttributeType) -> &'static str {
    match attribute_type {
        ScalarAttributeType::S => "S",
        ScalarAttributeType::N => "N",
        ScalarAttributeType::B => "B",
        _ => "UNKNOWN",
    }
}

/// Primary key of one item, named after the table's key attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemKey {
    pub partition_key: String,
    pub id: String,
    pub sort_key: String,
    pub date: i64,
}

impl ItemKey {
    /// Key of the contacts table (`id` + `date`)
    pub fn new(id: impl Into<String>, date: i64) -> Self {
        Self {
            partition_key: PARTITION_KEY.to_string(),
            id: id.into(),
            sort_key: SORT_KEY.to_string(),
            date,
        }
    }

    /// Key for a table with a string partition key and a number sort key
    pub fn for_schema(schema: &TableSchema, id: impl Into<String>, date: i64) -> Result<Self> {
        let sort_key = schema.sort_key.as_ref().ok_or_else(|| {
            ProvisionError::InvalidRequest("point read needs a table with a sort key".to_string())
        })?;

        if schema.partition_key.attribute_type != ScalarAttributeType::S
            || sort_key.attribute_type != ScalarAttributeType::N
        {
            return Err(ProvisionError::InvalidRequest(format!(
                "point read needs a string partition key and a number sort key, table has {}",
                schema.describe_keys()
            )));
        }

        Ok(Self {
            partition_key: schema.partition_key.name.clone(),
            id: id.into(),
            sort_key: sort_key.name.clone(),
            date,
        })
    }

    /// Render as the key map expected by get-item
    pub fn to_attributes(&self) -> HashMap<String, AttributeValue> {
        HashMap::from([
            (self.partition_key.clone(), AttributeValue::S(self.id.clone())),
            (self.sort_key.clone(), AttributeValue::N(self.date.to_string())),
        ])
    }
}

/// Partition key equality plus a sort key lower bound.
///
/// Rendered as `#pk = :hashKey and #sk >= :rangeKey`; the names go through
/// expression attribute names because `date` is a reserved word.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    pub partition_key: String,
    pub partition_value: AttributeValue,
    pub sort_key: String,
    pub lower_bound: AttributeValue,
}

impl RangeQuery {
    pub const KEY_CONDITION: &'static str = "#pk = :hashKey and #sk >= :rangeKey";

    /// Build a query for `id` with `date >= lower_bound`
    pub fn from_lower_bound(schema: &TableSchema, id: &str, lower_bound: i64) -> Result<Self> {
        let sort_key = schema.sort_key.as_ref().ok_or_else(|| {
            ProvisionError::InvalidRequest("range query needs a table with a sort key".to_string())
        })?;

        Ok(Self {
            partition_key: schema.partition_key.name.clone(),
            partition_value: AttributeValue::S(id.to_string()),
            sort_key: sort_key.name.clone(),
            lower_bound: AttributeValue::N(lower_bound.to_string()),
        })
    }

    pub fn attribute_names(&self) -> HashMap<String, String> {
        HashMap::from([
            ("#pk".to_string(), self.partition_key.clone()),
            ("#sk".to_string(), self.sort_key.clone()),
        ])
    }

    pub fn attribute_values(&self) -> HashMap<String, AttributeValue> {
        HashMap::from([
            (":hashKey".to_string(), self.partition_value.clone()),
            (":rangeKey".to_string(), self.lower_bound.clone()),
        ])
    }
}

/// Contact record written by the demonstration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    /// Partition key
    pub id: String,

    /// Sort key, e.g. 20220410
    pub date: i64,

    pub name: Option<String>,
    pub email: Option<String>,
}

impl Contact {
    pub fn to_item(&self) -> Item {
        let mut item = Item::new()
            .with_string(PARTITION_KEY, self.id.clone())
            .with_number(SORT_KEY, self.date);
        if let Some(name) = &self.name {
            item = item.with_string("name", name.clone());
        }
        if let Some(email) = &self.email {
            item = item.with_string("email", email.clone());
        }
        item
    }
}

impl Default for Contact {
    fn default() -> Self {
        Self {
            id: "123".to_string(),
            date: 20220410,
            name: Some("John".to_string()),
            email: Some("john@a.com".to_string()),
        }
    }
}

impl TryFrom<&Item> for Contact {
    type Error = ProvisionError;

    fn try_from(item: &Item) -> Result<Self> {
        Ok(Self {
            id: item.get_string(PARTITION_KEY)?.to_string(),
            date: item.get_number(SORT_KEY)?,
            name: optional_string(item, "name")?,
            email: optional_string(item, "email")?,
        })
    }
}

fn optional_string(item: &Item, name: &str) -> Result<Option<String>> {
    match item.get_string(name) {
        Ok(value) => Ok(Some(value.to_string())),
        Err(ProvisionError::MissingAttribute { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}
